//! Workflow selector
//!
//! `select_target <job_type> [<params_json>]` prints the identifier of the
//! destination chosen by the routing policy and exits 0. Any failure (usage,
//! unreadable policy, unknown job type, unmet constraint, malformed
//! parameters) prints `Error: ...` on stderr and exits 1.

use clap::Parser;
use clap::error::ErrorKind;
use relayq_core::policy::DEFAULT_POLICY_PATH;
use relayq_core::{PolicyStore, RoutingPolicy, Selection, parse_params, select};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "select_target")]
#[command(about = "Print the destination for a job type under the routing policy")]
struct Args {
    /// Job type as named in the policy routes
    job_type: String,

    /// Job parameters as a JSON object
    #[arg(default_value = "{}")]
    params: String,

    /// Routing policy document
    #[arg(long, env = "RELAYQ_POLICY", default_value = DEFAULT_POLICY_PATH)]
    policy: PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", usage_message(&e));
            return ExitCode::FAILURE;
        }
    };

    let store = match PolicyStore::load(&args.policy) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args.job_type, &args.params, store.policy()) {
        Ok((identifier, warning)) => {
            if let Some(warning) = warning {
                eprintln!("Warning: {warning}");
            }
            println!("{identifier}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Identifier to print, plus an optional warning for stderr
fn run(
    job_type: &str,
    params: &str,
    policy: &RoutingPolicy,
) -> Result<(String, Option<String>), String> {
    let params = parse_params(params).map_err(|e| e.to_string())?;
    let selection = select(job_type, &params, policy).map_err(|e| e.to_string())?;
    Ok((
        policy.identifier(selection.destination).to_string(),
        alias_warning(&selection),
    ))
}

fn alias_warning(selection: &Selection) -> Option<String> {
    selection.aliased.then(|| {
        format!(
            "tag '{}' has no destination of its own; using the {} destination",
            selection.matched_tag.as_deref().unwrap_or_default(),
            selection.destination
        )
    })
}

/// First line of clap's rendering, without its own `error: ` prefix
fn usage_message(e: &clap::Error) -> String {
    let rendered = e.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}
