//! JSON codec using `serde_json`.
//!
//! Payloads are UTF-8 text on the wire, so structured values travel as
//! compact JSON. The encoded text must still fit the 2047-byte payload
//! capacity; the framer rejects anything larger.
//!
//! # Example
//!
//! ```
//! use eventlink::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Reading {
//!     sensor: u8,
//!     celsius: f32,
//! }
//!
//! let reading = Reading { sensor: 3, celsius: 21.5 };
//! let text = JsonCodec::encode(&reading).unwrap();
//! assert_eq!(text, r#"{"sensor":3,"celsius":21.5}"#);
//!
//! let decoded: Reading = JsonCodec::decode(&text).unwrap();
//! assert_eq!(decoded, reading);
//! ```

use crate::error::Result;

/// JSON codec for structured payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value as compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode JSON payload text to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON for type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        Ok(serde_json::from_str(text)?)
    }
}
