//! Handler filters.
//!
//! A [`HandlerFilter`] is a closed set of optional constraints. Unset fields
//! match anything; set fields are ANDed.
//!
//! # Example
//!
//! ```
//! use eventlink::handler::HandlerFilter;
//!
//! let filter = HandlerFilter::event("temp").sender(0x05).flags(0x01);
//! assert_eq!(filter.event_name.as_deref(), Some("temp"));
//! ```

use crate::protocol::{Frame, Header, BROADCAST_ADDR, BROADCAST_GROUP};

/// Constraints a frame must satisfy to reach a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerFilter {
    /// Exact event name. Ignored for raw handlers.
    pub event_name: Option<String>,
    /// Sender address; `0xFF` accepts any sender.
    pub sender: Option<u8>,
    /// Receiver group; `0x00` accepts any group.
    pub group: Option<u8>,
    /// Exact flags byte.
    pub flags: Option<u8>,
}

impl HandlerFilter {
    /// Match every frame.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match a single event name.
    pub fn event(name: impl Into<String>) -> Self {
        Self {
            event_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Require a sender address.
    pub fn sender(mut self, addr: u8) -> Self {
        self.sender = Some(addr);
        self
    }

    /// Require a receiver group.
    pub fn group(mut self, group: u8) -> Self {
        self.group = Some(group);
        self
    }

    /// Require an exact flags byte.
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Check a decoded frame, event name included.
    pub fn matches(&self, frame: &Frame) -> bool {
        if let Some(name) = &self.event_name {
            if *name != frame.name {
                return false;
            }
        }
        self.matches_header(&frame.header)
    }

    /// Check the addressing constraints only.
    pub fn matches_header(&self, header: &Header) -> bool {
        let sender_ok = match self.sender {
            None | Some(BROADCAST_ADDR) => true,
            Some(addr) => addr == header.sender,
        };
        let group_ok = match self.group {
            None | Some(BROADCAST_GROUP) => true,
            Some(group) => group == header.receiver_group,
        };
        let flags_ok = self.flags.map_or(true, |flags| flags == header.flags);

        sender_ok && group_ok && flags_ok
    }
}
