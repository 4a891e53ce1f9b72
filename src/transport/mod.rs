//! Transport module - the characteristic write/notify seam.
//!
//! The physical link (BLE GATT, serial, ...) is an external collaborator.
//! The crate only needs two things from it:
//! - [`Transport::write_chunk`] to push one bounded chunk and await completion
//! - a stream of inbound notifications, delivered as `mpsc::Receiver<Bytes>`
//!
//! [`ChannelTransport`] is an in-memory implementation built on tokio
//! channels, used for loopback setups and tests.

mod channel;

use async_trait::async_trait;
use thiserror::Error;

pub use channel::{ChannelEndpoint, ChannelTransport, DEFAULT_CHANNEL_CAPACITY};

/// Failure writing an outbound buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The transport refused or failed a chunk.
    #[error("transport rejected chunk: {0}")]
    Rejected(String),

    /// The link went away mid-write.
    #[error("transport disconnected")]
    Disconnected,

    /// No write slot became free within the configured admission timeout.
    #[error("timed out waiting for a write slot")]
    AdmissionTimeout,
}

/// A connected, chunk-oriented byte link.
///
/// Implementations must be safe to call concurrently; the scheduler bounds
/// how many calls are in flight at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one chunk, suspending until the link reports completion.
    ///
    /// `with_response` selects an acknowledged write when the link supports it.
    async fn write_chunk(&self, chunk: &[u8], with_response: bool) -> Result<(), WriteError>;

    /// Check if the link is currently usable.
    fn is_connected(&self) -> bool;
}
