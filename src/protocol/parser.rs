//! Streaming frame parser.
//!
//! [`StreamParser`] consumes arbitrarily chunked bytes and yields complete
//! frames. State survives between [`StreamParser::feed`] calls, so a frame
//! may span any number of chunks, down to one byte each.
//!
//! Escapes are resolved before the state machine sees a byte. The machine
//! receives either a raw control byte (a delimiter) or a literal data byte,
//! so an escaped delimiter inside a segment is always data.
//!
//! Every error resets the parser to [`ParserState::AwaitingStart`] and
//! scanning resumes with the next byte of the same chunk. A raw `SOH` seen
//! mid-frame aborts the partial frame and starts a new one on the spot.
//!
//! # Example
//!
//! ```
//! use eventlink::protocol::{Framer, SendOptions, StreamParser};
//!
//! let mut framer = Framer::new(0x02);
//! let bytes = framer.build("temp", "21.5", SendOptions::broadcast()).unwrap();
//!
//! let mut parser = StreamParser::new();
//! assert!(parser.feed(&bytes[..4]).is_empty());
//!
//! let out = parser.feed(&bytes[4..]);
//! let frame = out[0].as_ref().unwrap();
//! assert_eq!(frame.name, "temp");
//! assert_eq!(frame.payload, "21.5");
//! ```

use std::fmt;

use bytes::BytesMut;
use thiserror::Error;

use super::frame::Frame;
use super::wire_format::{
    is_control, max_frame_len, Header, EOT, ESC, ESCAPE_MASK, HEADER_SIZE, MAX_NAME_SIZE,
    MAX_PAYLOAD_SIZE, SOH, STX, US,
};

/// Position of the parser within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserState {
    /// Skipping bytes until `SOH`.
    AwaitingStart,
    /// Collecting the 7 header bytes.
    ReadingHeader,
    /// Header complete, `STX` must follow.
    AwaitingTextStart,
    /// Collecting the event name until `US`.
    ReadingName,
    /// Collecting the payload until `EOT`.
    ReadingPayload,
}

impl fmt::Display for ParserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingStart => "awaiting start",
            Self::ReadingHeader => "reading header",
            Self::AwaitingTextStart => "awaiting text start",
            Self::ReadingName => "reading name",
            Self::ReadingPayload => "reading payload",
        };
        f.write_str(name)
    }
}

/// Malformed inbound bytes. Never fatal: the parser has already reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A delimiter (or data byte) appeared where the grammar forbids it.
    #[error("unexpected byte 0x{byte:02X} while {state}")]
    UnexpectedByte {
        /// State the parser was in.
        state: ParserState,
        /// Offending byte (unescaped value for data bytes).
        byte: u8,
    },

    /// Event name or payload is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidEncoding {
        /// `"event name"` or `"payload"`.
        field: &'static str,
    },

    /// Event name exceeded its capacity before `US`.
    #[error("event name exceeds {} bytes", MAX_NAME_SIZE)]
    NameTooLong,

    /// Payload exceeded its capacity before `EOT`.
    #[error("payload exceeds {} bytes", MAX_PAYLOAD_SIZE)]
    PayloadTooLong,
}

/// Result of a single `feed` item.
pub type ParseResult = std::result::Result<Frame, ParseError>;

/// A byte after escape resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    /// Raw delimiter byte.
    Control(u8),
    /// Literal segment byte.
    Data(u8),
}

/// Persistent frame assembly state machine.
pub struct StreamParser {
    state: ParserState,
    escape_pending: bool,
    header: [u8; HEADER_SIZE],
    header_len: usize,
    name: BytesMut,
    decoded_name: String,
    payload: BytesMut,
    /// Wire bytes of the frame in progress, `SOH` included.
    raw: BytesMut,
}

impl StreamParser {
    /// Create a parser waiting for the first `SOH`.
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingStart,
            escape_pending: false,
            header: [0u8; HEADER_SIZE],
            header_len: 0,
            name: BytesMut::with_capacity(MAX_NAME_SIZE + 1),
            decoded_name: String::new(),
            payload: BytesMut::with_capacity(MAX_PAYLOAD_SIZE + 1),
            raw: BytesMut::with_capacity(max_frame_len(MAX_NAME_SIZE, MAX_PAYLOAD_SIZE)),
        }
    }

    /// Consume one inbound chunk and return every frame or error it completed,
    /// in arrival order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<ParseResult> {
        let mut out = Vec::new();
        for &byte in data {
            if let Some(item) = self.step(byte) {
                out.push(item);
            }
        }
        out
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Check if an `ESC` is waiting for its partner byte.
    #[inline]
    pub fn escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// Check if no frame is in progress.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::AwaitingStart && !self.escape_pending
    }

    /// Drop any partial frame and wait for the next `SOH`.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitingStart;
        self.escape_pending = false;
        self.header_len = 0;
        self.name.clear();
        self.decoded_name.clear();
        self.payload.clear();
        self.raw.clear();
    }

    fn step(&mut self, byte: u8) -> Option<ParseResult> {
        if self.state != ParserState::AwaitingStart {
            self.raw.extend_from_slice(&[byte]);
        }

        let input = if self.escape_pending {
            self.escape_pending = false;
            if is_control(byte) {
                // ESC is never followed by a raw delimiter in a stuffed segment
                if self.state == ParserState::AwaitingStart {
                    Input::Control(byte)
                } else {
                    return Some(Err(self.violation(Input::Control(byte))));
                }
            } else {
                Input::Data(byte ^ ESCAPE_MASK)
            }
        } else if byte == ESC {
            self.escape_pending = true;
            return None;
        } else if is_control(byte) {
            Input::Control(byte)
        } else {
            Input::Data(byte)
        };

        self.advance(input)
    }

    fn advance(&mut self, input: Input) -> Option<ParseResult> {
        match (self.state, input) {
            (ParserState::AwaitingStart, Input::Control(SOH)) => {
                self.begin_frame();
                None
            }
            (ParserState::AwaitingStart, _) => None,

            (ParserState::ReadingHeader, Input::Data(b)) => {
                self.header[self.header_len] = b;
                self.header_len += 1;
                if self.header_len == HEADER_SIZE {
                    self.state = ParserState::AwaitingTextStart;
                }
                None
            }

            (ParserState::AwaitingTextStart, Input::Control(STX)) => {
                self.name.clear();
                self.state = ParserState::ReadingName;
                None
            }

            (ParserState::ReadingName, Input::Data(b)) => {
                if self.name.len() >= MAX_NAME_SIZE {
                    self.reset();
                    return Some(Err(ParseError::NameTooLong));
                }
                self.name.extend_from_slice(&[b]);
                None
            }
            (ParserState::ReadingName, Input::Control(US)) => {
                match std::str::from_utf8(&self.name) {
                    Ok(name) => {
                        self.decoded_name = name.to_owned();
                        self.payload.clear();
                        self.state = ParserState::ReadingPayload;
                        None
                    }
                    Err(_) => {
                        self.reset();
                        Some(Err(ParseError::InvalidEncoding {
                            field: "event name",
                        }))
                    }
                }
            }

            (ParserState::ReadingPayload, Input::Data(b)) => {
                if self.payload.len() >= MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Some(Err(ParseError::PayloadTooLong));
                }
                self.payload.extend_from_slice(&[b]);
                None
            }
            (ParserState::ReadingPayload, Input::Control(EOT)) => Some(self.finish_frame()),

            (_, input) => Some(Err(self.violation(input))),
        }
    }

    fn begin_frame(&mut self) {
        self.reset();
        self.raw.extend_from_slice(&[SOH]);
        self.state = ParserState::ReadingHeader;
    }

    fn finish_frame(&mut self) -> ParseResult {
        let payload = match std::str::from_utf8(&self.payload) {
            Ok(p) => p.to_owned(),
            Err(_) => {
                self.reset();
                return Err(ParseError::InvalidEncoding { field: "payload" });
            }
        };

        let frame = Frame {
            header: Header::decode(&self.header),
            name: std::mem::take(&mut self.decoded_name),
            payload,
            raw: self.raw.split().freeze(),
        };
        self.reset();
        Ok(frame)
    }

    /// Report a grammar violation and reset. A raw `SOH` immediately opens
    /// a new frame so back-to-back traffic is not lost.
    fn violation(&mut self, input: Input) -> ParseError {
        let byte = match input {
            Input::Control(b) | Input::Data(b) => b,
        };
        let err = ParseError::UnexpectedByte {
            state: self.state,
            byte,
        };
        if input == Input::Control(SOH) {
            self.begin_frame();
        } else {
            self.reset();
        }
        err
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamParser")
            .field("state", &self.state)
            .field("escape_pending", &self.escape_pending)
            .field("buffered", &self.raw.len())
            .finish()
    }
}
