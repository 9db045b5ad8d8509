//! Worker process recycling
//!
//! The binary runs in two roles. The supervisor spawns a child copy of itself
//! and restarts it whenever the child exits with [`RECYCLE_EXIT_CODE`], which
//! the child does after finishing its task budget. Any other exit ends the
//! supervisor too.
//!
//! Both roles stop on Ctrl-C, and on SIGTERM on unix, which is what systemd
//! and launchd send.

use anyhow::{Context, Result};
use std::process::ExitStatus;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Exit code a child uses to ask for a fresh replacement
pub const RECYCLE_EXIT_CODE: i32 = 75;

/// Set in the child's environment
const CHILD_ENV: &str = "RELAYQ_WORKER_CHILD";

/// Whether this process is a supervised child
pub fn is_child() -> bool {
    std::env::var_os(CHILD_ENV).is_some()
}

/// Signal that asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

/// Resolves once the process is asked to stop
pub async fn stop_signal() -> std::io::Result<StopSignal> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| StopSignal::Interrupt),
            _ = terminate.recv() => Ok(StopSignal::Terminate),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| StopSignal::Interrupt)
    }
}

/// What the supervisor should do after a child exits
#[derive(Debug, PartialEq, Eq)]
enum Next {
    Respawn,
    Stop,
    Fail(String),
}

fn next_step(status: ExitStatus) -> Next {
    match status.code() {
        Some(RECYCLE_EXIT_CODE) => Next::Respawn,
        Some(0) => Next::Stop,
        _ => Next::Fail(status.to_string()),
    }
}

/// Runs worker children until one exits without asking to be recycled
pub async fn supervise() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the worker executable")?;
    let mut generation: u64 = 0;

    loop {
        generation += 1;
        info!("Starting worker process #{}", generation);

        let mut child = Command::new(&exe)
            .args(std::env::args_os().skip(1))
            .env(CHILD_ENV, generation.to_string())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn worker process")?;

        let status = tokio::select! {
            status = child.wait() => status.context("Failed to wait for worker process")?,
            signal = stop_signal() => {
                let signal = signal.context("Failed to listen for shutdown signals")?;
                // Ctrl-C reaches the whole foreground process group; a
                // SIGTERM is usually addressed to the supervisor alone.
                if signal == StopSignal::Terminate {
                    forward_terminate(&child);
                }
                info!("Shutdown requested ({:?}); waiting for worker process to deregister", signal);
                child.wait().await.context("Failed to wait for worker process")?;
                return Ok(());
            }
        };

        match next_step(status) {
            Next::Respawn => info!("Worker process #{} recycled", generation),
            Next::Stop => {
                info!("Worker process exited cleanly");
                return Ok(());
            }
            Next::Fail(status) => {
                warn!("Worker process #{} died: {}", generation, status);
                anyhow::bail!("Worker process exited with {}", status);
            }
        }
    }
}

fn forward_terminate(child: &Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) {
        // SAFETY: kill has no memory-safety preconditions.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            warn!(
                "Failed to forward SIGTERM to worker process: {}",
                std::io::Error::last_os_error()
            );
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_next_step() {
        // Raw wait statuses carry the exit code in the high byte
        assert_eq!(
            next_step(ExitStatus::from_raw(RECYCLE_EXIT_CODE << 8)),
            Next::Respawn
        );
        assert_eq!(next_step(ExitStatus::from_raw(0)), Next::Stop);
        assert!(matches!(
            next_step(ExitStatus::from_raw(1 << 8)),
            Next::Fail(_)
        ));
        // Killed by SIGKILL
        assert!(matches!(next_step(ExitStatus::from_raw(9)), Next::Fail(_)));
    }

    #[tokio::test]
    async fn test_stop_signal_on_sigterm() {
        let waiter = tokio::spawn(stop_signal());
        // Let the handler register before the signal is raised
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // SAFETY: raising a signal the runtime now handles
        unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };

        let signal = waiter.await.unwrap().unwrap();
        assert_eq!(signal, StopSignal::Terminate);
    }
}
