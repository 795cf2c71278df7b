//! Decoding of operation responses and metadata payloads.

use std::fmt;
use std::marker::PhantomData;

use prost::Message;
use prost_types::Any;

use crate::convert::{type_name_from_url, type_url_matches, unpack};
use crate::error::{Error, Result};

/// Turns a raw payload into a typed value. Must not perform I/O.
pub trait Decoder<T>: Send + Sync {
    fn decode(&self, payload: &Any) -> Result<T>;
}

impl<T, F> Decoder<T> for F
where
    F: Fn(&Any) -> Result<T> + Send + Sync,
{
    fn decode(&self, payload: &Any) -> Result<T> {
        self(payload)
    }
}

/// Decodes `Any.value` as the prost message `T`.
///
/// When built with [`ProstDecoder::expecting`], a payload whose type URL
/// names a different message is rejected. Payloads without a type URL are
/// decoded as-is.
pub struct ProstDecoder<T> {
    type_name: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProstDecoder<T> {
    pub fn new() -> Self {
        Self {
            type_name: None,
            _marker: PhantomData,
        }
    }

    /// Require payloads to carry `type_name` in their type URL.
    pub fn expecting(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ProstDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ProstDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProstDecoder")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl<T: Message + Default> Decoder<T> for ProstDecoder<T> {
    fn decode(&self, payload: &Any) -> Result<T> {
        if let Some(expected) = &self.type_name {
            if !payload.type_url.is_empty() && !type_url_matches(&payload.type_url, expected) {
                return Err(Error::Decode(format!(
                    "expected {}, got {}",
                    expected,
                    type_name_from_url(&payload.type_url)
                )));
            }
        }
        unpack(payload)
    }
}
