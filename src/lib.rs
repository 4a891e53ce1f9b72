//! # eventlink
//!
//! Event messaging over chunked, notification-based byte links such as a
//! BLE GATT characteristic pair.
//!
//! The crate layers a self-delimiting, byte-stuffed frame protocol on top of
//! a raw byte stream and regulates how fast outbound bytes enter the link.
//!
//! ## Architecture
//!
//! - **Outbound**: [`Framer`] → [`WriteScheduler`] → [`Transport::write_chunk`]
//! - **Inbound**: notifications → [`StreamParser`] → [`Dispatcher`] → handlers
//!
//! [`Session`] owns one of each per connection.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use eventlink::{EventContext, HandlerFilter, SendOptions, Session, SessionConfig};
//! use eventlink::transport::ChannelTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> eventlink::Result<()> {
//! let (node, peer) = ChannelTransport::pair(32);
//! let session = Session::new(SessionConfig::with_addr(0x02), Arc::new(node.transport))?;
//!
//! session.on_event(HandlerFilter::event("ping").sender(0x01), |ctx: &EventContext<'_>| {
//!     println!("ping from {:#04x}: {}", ctx.sender(), ctx.payload());
//!     Ok(())
//! });
//!
//! session.send("hello", "world", SendOptions::broadcast()).await?;
//! println!("{:?}", session.flow_stats());
//! # drop(peer);
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport::write_chunk`]: transport::Transport::write_chunk

pub mod codec;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod scheduler;
pub mod transport;

mod session;

pub use error::{EventLinkError, Result};
pub use handler::{Dispatcher, EventContext, HandlerFilter};
pub use protocol::{Frame, Framer, Header, Identity, SendOptions, StreamParser};
pub use scheduler::{FlowStats, SchedulerConfig, WriteScheduler};
pub use session::{InboundReport, Session, SessionConfig, SourceId, DEFAULT_SOURCE};
pub use transport::{Transport, WriteError};
