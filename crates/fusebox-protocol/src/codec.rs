//! Codec trait and implementations for encoding proposals and commit
//! frames.
//!
//! The authority and its observers only agree on the *shape* of the data
//! ([`Proposal`](crate::Proposal), [`Commit`](crate::Commit)); the byte
//! format is a strategy behind the [`Codec`] trait. [`JsonCodec`] is the
//! default because frames stay readable in logs.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to bytes and back.
///
/// `Send + Sync + 'static` because a codec is shared by the match actor
/// and every observer task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature (on by default).
///
/// ```rust
/// use fusebox_protocol::{Codec, Command, JsonCodec, ParticipantId, Proposal};
///
/// let codec = JsonCodec;
/// let proposal = Proposal::new(
///     ParticipantId(1),
///     Command::Pass { target: ParticipantId(2) },
/// );
///
/// let bytes = codec.encode(&proposal).unwrap();
/// let decoded: Proposal = codec.decode(&bytes).unwrap();
/// assert_eq!(proposal, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
