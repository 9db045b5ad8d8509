use async_trait::async_trait;
use relayq_core::domain::job::TaskArgs;
use relayq_core::domain::task::TaskFailure;
use serde_json::Value;
use std::path::Path;

use super::TaskHandler;
use super::process::{capture, shell};

/// `relayq.run_command(command, cwd=None)`: runs through the host shell, returns stdout
pub struct RunCommand;

#[async_trait]
impl TaskHandler for RunCommand {
    async fn run(&self, args: &TaskArgs) -> Result<Value, TaskFailure> {
        let command = args
            .get_str(0, "command")
            .ok_or_else(|| TaskFailure::invalid_arguments("run_command requires a command"))?;

        let mut child = shell(command);
        if let Some(cwd) = args.get_str(1, "cwd") {
            if !Path::new(cwd).is_dir() {
                return Err(TaskFailure::not_found(format!(
                    "Working directory not found: {cwd}"
                )));
            }
            child.current_dir(cwd);
        }

        let captured = capture(child)
            .await
            .map_err(|e| TaskFailure::external(format!("Command execution failed: {e}")))?;

        if !captured.success() {
            return Err(TaskFailure::external(format!(
                "Command failed: {}",
                captured.stderr
            )));
        }

        Ok(Value::String(captured.stdout))
    }
}
