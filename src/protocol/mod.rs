//! Protocol module - wire format, framing, and stream parsing.
//!
//! This module implements the event frame protocol:
//! - 7-byte addressing header and byte stuffing
//! - Outbound [`Framer`] with a per-connection message id counter
//! - Inbound [`StreamParser`] that reassembles frames from arbitrary chunks

mod frame;
mod parser;
mod wire_format;

pub use frame::{encode_frame, Frame, Framer, SendOptions};
pub use parser::{ParseError, ParseResult, ParserState, StreamParser};
pub use wire_format::{
    is_control, max_frame_len, stuff, stuff_into, Header, Identity, BROADCAST_ADDR,
    BROADCAST_GROUP, CONTROL_BYTES, EOT, ESC, ESCAPE_MASK, HEADER_SIZE, MAX_NAME_SIZE,
    MAX_PAYLOAD_SIZE, SOH, STX, US,
};
