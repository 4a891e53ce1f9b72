//! Wire format encoding and decoding.
//!
//! A frame on the wire looks like:
//! ```text
//! ┌─────┬──────────────────┬─────┬──────────────┬────┬─────────────────┬─────┐
//! │ SOH │ stuffed(header)  │ STX │ stuffed(name)│ US │ stuffed(payload)│ EOT │
//! │ 0x01│ 7 bytes raw      │ 0x02│ ≤31 bytes raw│0x1F│ ≤2047 bytes raw │ 0x04│
//! └─────┴──────────────────┴─────┴──────────────┴────┴─────────────────┴─────┘
//! ```
//!
//! The raw header is
//! `[sender, receiver, sender_group, receiver_group, flags, msg_id_hi, msg_id_lo]`.
//!
//! Any delimiter value appearing inside a segment is replaced by
//! `ESC, byte ^ 0x20`. Delimiters are only ever written between segments.

/// Start of header.
pub const SOH: u8 = 0x01;
/// Start of text (event name follows).
pub const STX: u8 = 0x02;
/// Unit separator (payload follows).
pub const US: u8 = 0x1F;
/// End of transmission.
pub const EOT: u8 = 0x04;
/// Escape prefix for stuffed bytes.
pub const ESC: u8 = 0x1B;

/// XOR mask applied to an escaped byte.
pub const ESCAPE_MASK: u8 = 0x20;

/// Bytes that must be stuffed when they occur inside a segment.
pub const CONTROL_BYTES: [u8; 5] = [SOH, STX, US, EOT, ESC];

/// Raw header size in bytes (before stuffing).
pub const HEADER_SIZE: usize = 7;

/// Maximum event name length in bytes (before stuffing).
pub const MAX_NAME_SIZE: usize = 31;

/// Maximum payload length in bytes (before stuffing).
pub const MAX_PAYLOAD_SIZE: usize = 2047;

/// Broadcast virtual address.
pub const BROADCAST_ADDR: u8 = 0xFF;

/// Wildcard group.
pub const BROADCAST_GROUP: u8 = 0x00;

/// Check whether a byte belongs to the control set.
#[inline]
pub fn is_control(byte: u8) -> bool {
    CONTROL_BYTES.contains(&byte)
}

/// Append `input` to `out`, stuffing every control byte.
pub fn stuff_into(input: &[u8], out: &mut Vec<u8>) {
    for &byte in input {
        if is_control(byte) {
            out.push(ESC);
            out.push(byte ^ ESCAPE_MASK);
        } else {
            out.push(byte);
        }
    }
}

/// Stuff a segment into a new buffer.
pub fn stuff(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 8);
    stuff_into(input, &mut out);
    out
}

/// Upper bound on the stuffed size of a frame with the given raw segment lengths.
#[inline]
pub fn max_frame_len(name_len: usize, payload_len: usize) -> usize {
    4 + 2 * (HEADER_SIZE + name_len + payload_len)
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Virtual address of the sender.
    pub sender: u8,
    /// Virtual address of the receiver (`0xFF` = broadcast).
    pub receiver: u8,
    /// Group the sender belongs to.
    pub sender_group: u8,
    /// Group the frame is addressed to (`0x00` = all groups).
    pub receiver_group: u8,
    /// Application flags byte.
    pub flags: u8,
    /// Diagnostic message counter, wraps at 65536.
    pub message_id: u16,
}

impl Header {
    /// Encode the header to its raw 7-byte form (message id big endian).
    ///
    /// # Example
    ///
    /// ```
    /// use eventlink::protocol::Header;
    ///
    /// let header = Header {
    ///     sender: 0x02,
    ///     receiver: 0xFF,
    ///     sender_group: 0,
    ///     receiver_group: 0,
    ///     flags: 0,
    ///     message_id: 0x0102,
    /// };
    /// assert_eq!(header.encode(), [0x02, 0xFF, 0, 0, 0, 0x01, 0x02]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let [hi, lo] = self.message_id.to_be_bytes();
        [
            self.sender,
            self.receiver,
            self.sender_group,
            self.receiver_group,
            self.flags,
            hi,
            lo,
        ]
    }

    /// Decode a raw (unstuffed) header.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            sender: buf[0],
            receiver: buf[1],
            sender_group: buf[2],
            receiver_group: buf[3],
            flags: buf[4],
            message_id: u16::from_be_bytes([buf[5], buf[6]]),
        }
    }

    /// Check if the frame targets every node.
    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.receiver == BROADCAST_ADDR
    }

    /// Build a header addressed back to the sender of `self`.
    ///
    /// Groups and flags are cleared; the message id is assigned by the
    /// framer when the reply is built.
    pub fn response_to(&self, local_addr: u8) -> Self {
        Self {
            sender: local_addr,
            receiver: self.sender,
            sender_group: BROADCAST_GROUP,
            receiver_group: BROADCAST_GROUP,
            flags: 0,
            message_id: 0,
        }
    }
}

/// Local node identity used for protocol-level acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    /// Local virtual address.
    pub addr: u8,
    /// Local group.
    pub group: u8,
}

impl Identity {
    /// Create an identity.
    pub fn new(addr: u8, group: u8) -> Self {
        Self { addr, group }
    }

    /// A frame is for us if it names our address (or broadcast) and our
    /// group (or the wildcard group).
    pub fn accepts(&self, header: &Header) -> bool {
        let addr_ok = header.receiver == self.addr || header.is_broadcast();
        let group_ok = header.receiver_group == self.group || header.receiver_group == BROADCAST_GROUP;
        addr_ok && group_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(receiver: u8, receiver_group: u8) -> Header {
        Header {
            sender: 0x10,
            receiver,
            sender_group: 0x01,
            receiver_group,
            flags: 0,
            message_id: 7,
        }
    }

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header {
            sender: 1,
            receiver: 2,
            sender_group: 3,
            receiver_group: 4,
            flags: 5,
            message_id: 0xBEEF,
        };
        let encoded = original.encode();
        assert_eq!(encoded, [1, 2, 3, 4, 5, 0xBE, 0xEF]);
        assert_eq!(Header::decode(&encoded), original);
    }

    #[test]
    fn test_stuff_control_bytes() {
        let stuffed = stuff(&[0x01, 0x02, 0x1F, 0x04, 0x1B]);
        assert_eq!(
            stuffed,
            vec![0x1B, 0x21, 0x1B, 0x22, 0x1B, 0x3F, 0x1B, 0x24, 0x1B, 0x3B]
        );
    }

    #[test]
    fn test_stuff_passes_other_bytes() {
        let input: Vec<u8> = (0u8..=255).filter(|b| !is_control(*b)).collect();
        assert_eq!(stuff(&input), input);
    }

    #[test]
    fn test_stuffed_output_has_no_raw_delimiters() {
        let input: Vec<u8> = (0u8..=255).collect();
        let stuffed = stuff(&input);
        for (i, &b) in stuffed.iter().enumerate() {
            if b == ESC {
                // Every ESC must be the first half of a pair
                assert!(i + 1 < stuffed.len());
                assert!(!is_control(stuffed[i + 1]));
            }
            assert!(![SOH, STX, US, EOT].contains(&b));
        }
    }

    #[test]
    fn test_max_frame_len_bounds_worst_case() {
        let name = [ESC; MAX_NAME_SIZE];
        let payload = [SOH; MAX_PAYLOAD_SIZE];
        let len = 4 + stuff(&[ESC; HEADER_SIZE]).len() + stuff(&name).len() + stuff(&payload).len();
        assert_eq!(len, max_frame_len(MAX_NAME_SIZE, MAX_PAYLOAD_SIZE));
    }

    #[test]
    fn test_identity_accepts_direct_and_broadcast() {
        let me = Identity::new(0x05, 0x02);

        assert!(me.accepts(&header(0x05, 0x02)));
        assert!(me.accepts(&header(BROADCAST_ADDR, 0x02)));
        assert!(me.accepts(&header(0x05, BROADCAST_GROUP)));
        assert!(me.accepts(&header(BROADCAST_ADDR, BROADCAST_GROUP)));

        assert!(header(BROADCAST_ADDR, 0x02).is_broadcast());
        assert!(!header(0x05, BROADCAST_GROUP).is_broadcast());
    }

    #[test]
    fn test_identity_rejects_other_targets() {
        let me = Identity::new(0x05, 0x02);

        assert!(!me.accepts(&header(0x06, 0x02)));
        assert!(!me.accepts(&header(0x05, 0x03)));
    }

    #[test]
    fn test_response_to_swaps_addresses() {
        let incoming = header(0x05, 0x02);
        let reply = incoming.response_to(0x05);

        assert_eq!(reply.sender, 0x05);
        assert_eq!(reply.receiver, 0x10);
        assert_eq!(reply.receiver_group, BROADCAST_GROUP);
        assert_eq!(reply.flags, 0);
    }
}
