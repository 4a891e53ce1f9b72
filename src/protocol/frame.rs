//! Frame struct and the outbound framer.
//!
//! # Example
//!
//! ```
//! use eventlink::protocol::{Framer, SendOptions};
//!
//! let mut framer = Framer::new(0x02);
//! let bytes = framer.build("PING", "", SendOptions::broadcast()).unwrap();
//!
//! assert_eq!(
//!     bytes.as_ref(),
//!     &[0x01, 0x1B, 0x22, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, b'P', b'I', b'N', b'G', 0x1F, 0x04]
//! );
//! ```

use bytes::Bytes;

use super::wire_format::{
    max_frame_len, stuff_into, Header, Identity, BROADCAST_ADDR, BROADCAST_GROUP, EOT,
    MAX_NAME_SIZE, MAX_PAYLOAD_SIZE, SOH, STX, US,
};
use crate::error::{EventLinkError, Result};

/// A complete decoded protocol frame.
///
/// Frames are immutable once built. `raw` holds the exact wire bytes from
/// `SOH` to `EOT` inclusive (still stuffed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Event name.
    pub name: String,
    /// Payload text.
    pub payload: String,
    /// Wire bytes of the frame.
    pub raw: Bytes,
}

impl Frame {
    /// Get the sender address.
    #[inline]
    pub fn sender(&self) -> u8 {
        self.header.sender
    }

    /// Get the receiver address.
    #[inline]
    pub fn receiver(&self) -> u8 {
        self.header.receiver
    }

    /// Get the flags byte.
    #[inline]
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// Get the message id.
    #[inline]
    pub fn message_id(&self) -> u16 {
        self.header.message_id
    }

    /// Check if this frame is addressed to the given local node.
    #[inline]
    pub fn is_addressed_to(&self, identity: &Identity) -> bool {
        identity.accepts(&self.header)
    }
}

/// Addressing and flags for an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Receiver virtual address.
    pub receiver: u8,
    /// Sender group.
    pub sender_group: u8,
    /// Receiver group.
    pub receiver_group: u8,
    /// Flags byte.
    pub flags: u8,
}

impl SendOptions {
    /// Broadcast to every node in every group.
    pub fn broadcast() -> Self {
        Self {
            receiver: BROADCAST_ADDR,
            sender_group: BROADCAST_GROUP,
            receiver_group: BROADCAST_GROUP,
            flags: 0,
        }
    }

    /// Address a single node.
    pub fn to(receiver: u8) -> Self {
        Self {
            receiver,
            ..Self::broadcast()
        }
    }

    /// Set the receiver group.
    pub fn group(mut self, receiver_group: u8) -> Self {
        self.receiver_group = receiver_group;
        self
    }

    /// Set the sender group.
    pub fn from_group(mut self, sender_group: u8) -> Self {
        self.sender_group = sender_group;
        self
    }

    /// Set the flags byte.
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Options that reply to `header` (see [`Header::response_to`]).
    pub fn reply_to(header: &Header) -> Self {
        Self::to(header.sender)
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::broadcast()
    }
}

/// Encodes outbound frames and owns the message id counter.
///
/// One framer per connection; the counter is never shared.
#[derive(Debug, Clone)]
pub struct Framer {
    local_addr: u8,
    next_message_id: u16,
}

impl Framer {
    /// Create a framer for the given local address, counter starting at 0.
    pub fn new(local_addr: u8) -> Self {
        Self {
            local_addr,
            next_message_id: 0,
        }
    }

    /// Local address injected as sender.
    #[inline]
    pub fn local_addr(&self) -> u8 {
        self.local_addr
    }

    /// Change the local address.
    pub fn set_local_addr(&mut self, addr: u8) {
        self.local_addr = addr;
    }

    /// Message id the next frame will carry.
    #[inline]
    pub fn next_message_id(&self) -> u16 {
        self.next_message_id
    }

    /// Encode an event into a byte-stuffed frame.
    ///
    /// The counter only advances when a frame is actually produced.
    pub fn build(&mut self, name: &str, payload: &str, opts: SendOptions) -> Result<Bytes> {
        check_len("event name", name.len(), MAX_NAME_SIZE)?;
        check_len("payload", payload.len(), MAX_PAYLOAD_SIZE)?;

        let header = Header {
            sender: self.local_addr,
            receiver: opts.receiver,
            sender_group: opts.sender_group,
            receiver_group: opts.receiver_group,
            flags: opts.flags,
            message_id: self.next_message_id,
        };
        self.next_message_id = self.next_message_id.wrapping_add(1);

        Ok(encode_frame(&header, name.as_bytes(), payload.as_bytes()))
    }
}

/// Encode a frame from an explicit header.
///
/// Lengths are not checked here; [`Framer::build`] is the checked entry point.
pub fn encode_frame(header: &Header, name: &[u8], payload: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(max_frame_len(name.len(), payload.len()));
    buf.push(SOH);
    stuff_into(&header.encode(), &mut buf);
    buf.push(STX);
    stuff_into(name, &mut buf);
    buf.push(US);
    stuff_into(payload, &mut buf);
    buf.push(EOT);
    Bytes::from(buf)
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(EventLinkError::FrameTooLarge { field, len, max });
    }
    Ok(())
}
