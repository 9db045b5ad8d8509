//! RelayQ Client
//!
//! Everything a job producer, a worker or a dashboard needs to talk to the
//! message transport.
//!
//! The transport is always constructed by the caller and injected, so tests
//! can swap [`HttpTransport`] for the in-process [`MemoryTransport`].
//!
//! # Example
//!
//! ```no_run
//! use relayq_client::{HttpTransport, JobClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = JobClient::new(Arc::new(HttpTransport::new("http://localhost:8765")));
//!
//!     // Run a command on the Raspberry Pi and wait up to a minute for it
//!     let handle = client.run_on_rpi("uptime", None).await?;
//!     let output = handle.wait(Some(Duration::from_secs(60))).await?;
//!
//!     println!("{}", output);
//!     Ok(())
//! }
//! ```

mod episodes;
pub mod error;
mod handle;
mod jobs;
mod status;
pub mod transport;

// Re-export commonly used types
pub use episodes::{DispatchError, DispatchedEpisode, EpisodeDispatcher, Settlement};
pub use error::{ClientError, Result};
pub use handle::JobHandle;
pub use jobs::{DEFAULT_POLL_INTERVAL, DEFAULT_WHISPER_MODEL, JobClient, default_transcode_output};
pub use status::{WorkerStatusAggregator, aggregate};
pub use transport::{ControlPlane, HttpTransport, MemoryTransport, Transport, WorkerTransport};
