//! Event context for handlers.
//!
//! Handlers receive a borrowed view of the decoded frame:
//! - `name` / `payload` - the event text
//! - `header` / `sender` - addressing
//! - `json` - decode the payload into a serde type
//! - `reply_options` - addressing for an answer to the sender
//!
//! # Example
//!
//! ```ignore
//! dispatcher.on_event(HandlerFilter::event("ping"), |ctx: &EventContext<'_>| {
//!     tracing::info!(from = ctx.sender(), "ping: {}", ctx.payload());
//!     Ok(())
//! });
//! ```

use crate::codec::JsonCodec;
use crate::error::Result;
use crate::protocol::{Frame, Header, SendOptions};

/// Context passed to event handlers.
///
/// Borrowed for the duration of one dispatch; copy out anything a handler
/// needs to keep.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    frame: &'a Frame,
    local_addr: u8,
}

impl<'a> EventContext<'a> {
    /// Create a context for `frame` received by `local_addr`.
    pub fn new(frame: &'a Frame, local_addr: u8) -> Self {
        Self { frame, local_addr }
    }

    /// Event name.
    #[inline]
    pub fn name(&self) -> &'a str {
        &self.frame.name
    }

    /// Payload text.
    #[inline]
    pub fn payload(&self) -> &'a str {
        &self.frame.payload
    }

    /// Decoded header.
    #[inline]
    pub fn header(&self) -> &'a Header {
        &self.frame.header
    }

    /// Sender address.
    #[inline]
    pub fn sender(&self) -> u8 {
        self.frame.header.sender
    }

    /// Full frame, raw bytes included.
    #[inline]
    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    /// Decode the payload as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        JsonCodec::decode(&self.frame.payload)
    }

    /// Header for a reply to this event.
    pub fn reply_header(&self) -> Header {
        self.frame.header.response_to(self.local_addr)
    }

    /// Send options addressed back to the sender.
    pub fn reply_options(&self) -> SendOptions {
        SendOptions::reply_to(&self.frame.header)
    }
}
