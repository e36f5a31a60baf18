//! APDU response frames and status words
//!
//! Every response ends with a 2-byte status word; what precedes it, if
//! anything, is the response data. Responses are never mutated after receipt.

use std::fmt;

use bytes::Bytes;

use crate::Error;

/// The 2-byte trailer of every APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u16);

impl StatusWord {
    /// Status word reported by a successfully executed command
    pub const SUCCESS: Self = Self(0x9000);

    /// Create a status word from its two trailer bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self(((sw1 as u16) << 8) | sw2 as u16)
    }

    /// Create a status word from its 16-bit value
    pub const fn from_u16(value: u16) -> Self {
        Self(value)
    }

    /// First status byte
    pub const fn sw1(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Second status byte
    pub const fn sw2(&self) -> u8 {
        self.0 as u8
    }

    /// The 16-bit value
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether this is the success status 9000h
    pub const fn is_success(&self) -> bool {
        self.0 == 0x9000
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}h", self.0)
    }
}

impl From<u16> for StatusWord {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// A parsed APDU response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    data: Bytes,
    status: StatusWord,
}

impl ApduResponse {
    /// Build a response from its parts
    pub const fn new(data: Bytes, status: StatusWord) -> Self {
        Self { data, status }
    }

    /// A data-less success response
    pub const fn success() -> Self {
        Self {
            data: Bytes::new(),
            status: StatusWord::SUCCESS,
        }
    }

    /// Parse a raw response frame
    ///
    /// Requires at least the 2-byte status word.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < 2 {
            return Err(Error::InvalidResponseLength(raw.len()));
        }
        let (data, trailer) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: Bytes::copy_from_slice(data),
            status: StatusWord::new(trailer[0], trailer[1]),
        })
    }

    /// Response data preceding the status word (possibly empty)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Response data as shared bytes
    pub const fn data_bytes(&self) -> &Bytes {
        &self.data
    }

    /// The status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is 9000h
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Re-serialize to the wire format
    pub fn to_bytes(&self) -> Bytes {
        let mut raw = Vec::with_capacity(self.data.len() + 2);
        raw.extend_from_slice(&self.data);
        raw.push(self.status.sw1());
        raw.push(self.status.sw2());
        raw.into()
    }
}

impl fmt::Display for ApduResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", hex::encode_upper(&self.data), self.status)
    }
}
