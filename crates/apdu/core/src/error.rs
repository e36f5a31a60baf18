//! Error type shared by the APDU framing layer

use crate::transport::TransportError;

/// Errors produced while building or parsing APDU frames
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serialized request frame has an inconsistent length
    #[error("invalid request frame length: {0}")]
    InvalidRequestLength(usize),

    /// The response frame is shorter than the 2-byte status word
    #[error("invalid response frame length: {0}")]
    InvalidResponseLength(usize),

    /// Request data exceeds the single-byte Lc limit
    #[error("request data too long for short APDU: {0} bytes")]
    DataTooLong(usize),

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}
