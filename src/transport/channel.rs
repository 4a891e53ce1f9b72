//! In-memory transport built on tokio channels.
//!
//! A pair behaves like two GATT peers: chunks written through one endpoint's
//! transport arrive as notifications on the other endpoint.
//!
//! # Example
//!
//! ```
//! use eventlink::transport::{ChannelTransport, Transport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (a, mut b) = ChannelTransport::pair(8);
//! a.transport.write_chunk(b"hello", false).await.unwrap();
//! assert_eq!(b.notifications.recv().await.unwrap().as_ref(), b"hello");
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{Transport, WriteError};

/// Default notification queue depth per direction.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Writing half of an in-memory link.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
    connected: AtomicBool,
    latency: Duration,
}

/// One side of a [`ChannelTransport::pair`].
#[derive(Debug)]
pub struct ChannelEndpoint {
    /// Writes go to the peer's `notifications`.
    pub transport: ChannelTransport,
    /// Chunks written by the peer.
    pub notifications: mpsc::Receiver<Bytes>,
}

impl ChannelTransport {
    /// Create a transport writing into `tx`.
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            connected: AtomicBool::new(true),
            latency: Duration::ZERO,
        }
    }

    /// Create two cross-connected endpoints.
    pub fn pair(capacity: usize) -> (ChannelEndpoint, ChannelEndpoint) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);

        let a = ChannelEndpoint {
            transport: ChannelTransport::new(b_tx),
            notifications: a_rx,
        };
        let b = ChannelEndpoint {
            transport: ChannelTransport::new(a_tx),
            notifications: b_rx,
        };
        (a, b)
    }

    /// Delay every write by `latency` to imitate a slow radio link.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Mark the link as down. Subsequent writes fail with
    /// [`WriteError::Disconnected`].
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn write_chunk(&self, chunk: &[u8], _with_response: bool) -> Result<(), WriteError> {
        if !self.is_connected() {
            return Err(WriteError::Disconnected);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        // The channel always waits for queue space, so both write modes are
        // acknowledged here.
        self.tx
            .send(Bytes::copy_from_slice(chunk))
            .await
            .map_err(|_| WriteError::Disconnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}
