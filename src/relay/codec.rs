//! MessagePack envelope encoding.
//!
//! Frames share no memory, so every relay crosses the boundary as an
//! encoded payload. Decoding is two-phase: try a known
//! [`RelayMessage`], then fall back to [`RawEnvelope`] so unknown types
//! can be logged with their tag before being dropped.

use bytes::Bytes;

use super::protocol::{RawEnvelope, RelayMessage};

/// Maximum encoded envelope size (16 MiB). Capture relays carry media
/// bytes; anything larger is refused at the sender.
pub const MAX_ENVELOPE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("envelope too large: {0} bytes (max {MAX_ENVELOPE_SIZE})")]
    EnvelopeTooLarge(usize),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

pub fn encode(msg: &RelayMessage) -> Result<Bytes, RelayError> {
    let payload = rmp_serde::to_vec_named(msg)?;
    if payload.len() > MAX_ENVELOPE_SIZE {
        return Err(RelayError::EnvelopeTooLarge(payload.len()));
    }
    Ok(Bytes::from(payload))
}

/// Result of decoding one payload.
#[derive(Debug)]
pub enum DecodeResult {
    Ok(RelayMessage),
    /// Well-formed envelope with a `type` this build does not know.
    UnknownType(RawEnvelope),
    Malformed(rmp_serde::decode::Error),
}

pub fn decode(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<RelayMessage>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}
