//! Helpers for `google.protobuf.Any` payloads.

use prost::Message;
use prost_types::Any;

use crate::error::{Error, Result};

/// Default type URL prefix for protocol buffer messages.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com";

/// Build a fully-qualified type URL from a message type name.
///
/// # Examples
/// ```
/// use gapic_runtime::convert::type_url;
/// assert_eq!(
///     type_url("google.cloud.optimization.v1.OptimizeToursResponse"),
///     "type.googleapis.com/google.cloud.optimization.v1.OptimizeToursResponse"
/// );
/// ```
pub fn type_url(type_name: &str) -> String {
    format!("{}/{}", TYPE_URL_PREFIX, type_name)
}

/// Extract the type name suffix from a type URL.
///
/// Returns the part after the last `/` or the whole string if no `/` present.
pub fn type_name_from_url(type_url: &str) -> &str {
    type_url.rsplit('/').next().unwrap_or(type_url)
}

/// Check whether a type URL names the given fully-qualified message type.
pub fn type_url_matches(type_url: &str, type_name: &str) -> bool {
    type_name_from_url(type_url) == type_name
}

/// Pack a message into an `Any` under `type_name`.
pub fn pack<M: Message>(type_name: &str, message: &M) -> Any {
    Any {
        type_url: type_url(type_name),
        value: message.encode_to_vec(),
    }
}

/// Decode the bytes of an `Any` as `M`, ignoring its type URL.
pub fn unpack<M: Message + Default>(any: &Any) -> Result<M> {
    M::decode(any.value.as_slice()).map_err(Error::from)
}
