//! APDU request frame construction
//!
//! A request frame is the ordered byte sequence
//! `{CLA, INS, P1, P2, [Lc, data], [Le]}`. Frames are built once through the
//! constructor combinators and never mutated afterwards.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// A single APDU request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduRequest {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Bytes>,
    le: Option<u8>,
}

impl ApduRequest {
    /// Create a case-1 request (header only)
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Attach outgoing data (Lc + data field)
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attach an expected response length (Le field)
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Class byte
    pub const fn cla(&self) -> u8 {
        self.cla
    }

    /// Instruction byte
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// First parameter byte
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter byte
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Outgoing data field, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length, if any
    pub const fn le(&self) -> Option<u8> {
        self.le
    }

    /// Length of the serialized frame
    pub fn frame_length(&self) -> usize {
        let mut length = 4;
        if let Some(data) = &self.data {
            length += 1 + data.len();
        }
        if self.le.is_some() {
            length += 1;
        }
        length
    }

    /// Serialize to the wire format
    ///
    /// Fails with [`Error::DataTooLong`] if the data field does not fit a
    /// single-byte Lc.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        if let Some(data) = &self.data {
            if data.len() > 255 {
                return Err(Error::DataTooLong(data.len()));
            }
        }

        let mut buffer = BytesMut::with_capacity(self.frame_length());
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }

    /// Parse a request frame from raw bytes
    ///
    /// Used by diagnostics and tests; the engine itself only serializes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < 4 {
            return Err(Error::InvalidRequestLength(raw.len()));
        }

        let mut request = Self::new(raw[0], raw[1], raw[2], raw[3]);

        if raw.len() == 4 {
            return Ok(request);
        }
        if raw.len() == 5 {
            // Case 2: the fifth byte is Le
            request.le = Some(raw[4]);
            return Ok(request);
        }

        let lc = raw[4] as usize;
        match raw.len() {
            n if n == 5 + lc => {
                request.data = Some(Bytes::copy_from_slice(&raw[5..5 + lc]));
            }
            n if n == 5 + lc + 1 => {
                request.data = Some(Bytes::copy_from_slice(&raw[5..5 + lc]));
                request.le = Some(raw[5 + lc]);
            }
            n => return Err(Error::InvalidRequestLength(n)),
        }

        Ok(request)
    }
}

impl fmt::Display for ApduRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bytes() {
            Ok(bytes) => write!(f, "{}", hex::encode_upper(bytes)),
            Err(_) => write!(
                f,
                "{:02X}{:02X}{:02X}{:02X}(oversized data)",
                self.cla, self.ins, self.p1, self.p2
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_case_4_serialization() {
        let request = ApduRequest::new(0x00, 0x8A, 0x09, 0x39)
            .with_data(hex!("0102030405060708").to_vec())
            .with_le(0x00);
        assert_eq!(
            request.to_bytes().unwrap().as_ref(),
            hex!("008A0939080102030405060708 00")
        );
    }

    #[test]
    fn test_frame_length() {
        let case1 = ApduRequest::new(0x00, 0xB2, 0x01, 0x3C);
        assert_eq!(case1.frame_length(), 4);

        let case2 = case1.clone().with_le(0x1D);
        assert_eq!(case2.frame_length(), 5);

        let case3 = ApduRequest::new(0x00, 0xDC, 0x01, 0x3C).with_data(vec![0u8; 16]);
        assert_eq!(case3.frame_length(), 21);

        let case4 = case3.with_le(0x00);
        assert_eq!(case4.frame_length(), 22);
    }

    #[test]
    fn test_data_too_long() {
        let request = ApduRequest::new(0x00, 0xDC, 0x01, 0x3C).with_data(vec![0u8; 256]);
        assert!(matches!(request.to_bytes(), Err(Error::DataTooLong(256))));
    }

    #[test]
    fn test_round_trip() {
        let frames: &[&[u8]] = &[
            &hex!("00B2013C"),
            &hex!("00B2013C1D"),
            &hex!("00DC013C03010203"),
            &hex!("008A0939040102030400"),
        ];
        for frame in frames {
            let parsed = ApduRequest::from_bytes(frame).unwrap();
            assert_eq!(parsed.to_bytes().unwrap().as_ref(), *frame);
        }

        // Truncated data field
        assert!(ApduRequest::from_bytes(&hex!("00DC013C05FF")).is_err());
        // Missing header bytes
        assert!(ApduRequest::from_bytes(&hex!("00DC01")).is_err());
    }
}
