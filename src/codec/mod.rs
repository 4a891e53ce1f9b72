//! Codec module - structured payload encoding.
//!
//! Event payloads are UTF-8 text. [`JsonCodec`] maps serde types to and from
//! that text using `serde_json`.
//!
//! Codecs are marker structs with static methods rather than trait objects.

mod json;

pub use json::JsonCodec;
