//! Capabilities service
//!
//! Probes the host for the external tools the task contracts rely on. The
//! result is advertised at registration so the fleet view shows which hosts
//! can transcode or transcribe.

use anyhow::Result;
use std::collections::BTreeSet;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Capability every worker has
pub const SHELL_CAPABILITY: &str = "shell";

/// Service trait for capability discovery
pub trait CapabilitiesService: Send + Sync {
    /// Capability identifiers to advertise to the broker
    fn discover(&self) -> Result<Vec<String>>;
}

/// An external tool and how to check it runs
#[derive(Debug, Clone)]
pub struct ToolProbe {
    pub capability: String,
    pub program: String,
    pub version_arg: &'static str,
}

impl ToolProbe {
    pub fn new(capability: &str, program: impl Into<String>, version_arg: &'static str) -> Self {
        Self {
            capability: capability.to_string(),
            program: program.into(),
            version_arg,
        }
    }

    fn available(&self) -> bool {
        Command::new(&self.program)
            .arg(self.version_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Standard implementation of CapabilitiesService
pub struct StandardCapabilitiesService {
    probes: Vec<ToolProbe>,
}

impl StandardCapabilitiesService {
    pub fn new(probes: Vec<ToolProbe>) -> Self {
        Self { probes }
    }

    /// Probes for the tools used by the built-in tasks
    pub fn for_tools(ffmpeg: &str, whisper: &str) -> Self {
        Self::new(vec![
            ToolProbe::new("tool.ffmpeg", ffmpeg, "-version"),
            ToolProbe::new("tool.whisper", whisper, "--version"),
        ])
    }
}

impl CapabilitiesService for StandardCapabilitiesService {
    fn discover(&self) -> Result<Vec<String>> {
        info!("Discovering worker capabilities");

        let mut capabilities = BTreeSet::new();
        capabilities.insert(SHELL_CAPABILITY.to_string());

        for probe in &self.probes {
            if probe.available() {
                capabilities.insert(probe.capability.clone());
            } else {
                debug!("{} not usable; not advertising {}", probe.program, probe.capability);
            }
        }

        Ok(capabilities.into_iter().collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_available_tools_only() {
        let service = StandardCapabilitiesService::new(vec![
            ToolProbe::new("tool.present", "true", "--version"),
            ToolProbe::new("tool.broken", "false", "--version"),
            ToolProbe::new("tool.absent", "/definitely/not/a/tool", "--version"),
        ]);

        let capabilities = service.discover().unwrap();
        assert_eq!(capabilities, vec!["shell", "tool.present"]);
    }
}
