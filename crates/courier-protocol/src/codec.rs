//! Codec for encoding and decoding Courier envelopes.
//!
//! Envelopes are serialized with MessagePack behind a fixed header carrying
//! the body length and the sender's protocol version.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::envelope::Envelope;
use crate::version::{Version, PROTOCOL_VERSION};

/// Maximum body size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Full header size: length prefix followed by major and minor version bytes.
pub const HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + 2;

/// Protocol errors that can occur during encoding/decoding.
///
/// Any decode-side variant means the frame is malformed and must be dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// Frame was produced by an incompatible protocol version.
    #[error("Incompatible protocol version {0} (local {PROTOCOL_VERSION})")]
    IncompatibleVersion(Version),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error (unknown kind, missing or mistyped field).
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Encode an envelope to bytes.
///
/// The encoded format is:
/// - 4 bytes: Big-endian body length
/// - 1 byte: Protocol major version
/// - 1 byte: Protocol minor version
/// - N bytes: MessagePack-encoded envelope
///
/// # Errors
///
/// Returns an error if the envelope is too large or encoding fails.
pub fn encode(envelope: &Envelope) -> Result<Bytes, ProtocolError> {
    let body = rmp_serde::to_vec_named(envelope)?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(&PROTOCOL_VERSION.to_bytes());
    buf.extend_from_slice(&body);

    Ok(buf.freeze())
}

/// Decode an envelope from exactly one encoded frame.
///
/// # Errors
///
/// Returns an error if the frame is truncated, too large, carries trailing
/// bytes, comes from an incompatible version, or its body is not a valid
/// envelope.
pub fn decode(data: &[u8]) -> Result<Envelope, ProtocolError> {
    if data.len() < HEADER_SIZE {
        return Err(ProtocolError::Incomplete(HEADER_SIZE - data.len()));
    }

    let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let version = Version::from_bytes([data[4], data[5]]);
    if !version.is_compatible_with(&PROTOCOL_VERSION) {
        return Err(ProtocolError::IncompatibleVersion(version));
    }

    let total_size = HEADER_SIZE + length;
    if data.len() < total_size {
        return Err(ProtocolError::Incomplete(total_size - data.len()));
    }
    if data.len() > total_size {
        return Err(ProtocolError::Invalid(format!(
            "{} trailing bytes after body",
            data.len() - total_size
        )));
    }

    let envelope = rmp_serde::from_slice(&data[HEADER_SIZE..total_size])?;
    Ok(envelope)
}
