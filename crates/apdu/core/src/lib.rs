//! Core types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types for exchanging APDU frames
//! with a smart card according to ISO/IEC 7816-4:
//!
//! - Building and parsing APDU request and response frames
//! - Status word extraction and interpretation
//! - The blocking card transport contract, including ordered batch
//!   transmission
//!
//! Higher-level protocol logic (command semantics, secure sessions) lives in
//! the crates built on top of this one.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use error::Error;
pub use request::ApduRequest;
pub use response::{ApduResponse, StatusWord};
pub use transport::{CardTransport, MockTransport, TransportError};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error};

    pub use crate::request::ApduRequest;
    pub use crate::response::{ApduResponse, StatusWord};
    pub use crate::transport::{CardTransport, TransportError};
}
