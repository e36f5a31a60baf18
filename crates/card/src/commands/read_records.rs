//! READ RECORDS command

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};
use tracing::debug;

use crate::card::CardClass;
use crate::commands::CommandRef;
use crate::error::{Error, Result};
use crate::status;

/// Largest addressable short file identifier (5 bits)
pub(crate) const SFI_MAX: u8 = 0x1E;

/// Read scope selected through P2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read exactly one record
    OneRecord,
    /// Read from the record to the end of the file
    MultipleRecords,
}

impl ReadMode {
    const fn p2_variant(self) -> u8 {
        match self {
            Self::OneRecord => 4,
            Self::MultipleRecords => 5,
        }
    }
}

/// READ RECORDS command (INS B2h)
///
/// Read-only: never consumes session-buffer capacity.
#[derive(Debug)]
pub struct ReadRecordsCmd {
    sfi: u8,
    record_number: u8,
    request: ApduRequest,
    data: Option<Bytes>,
}

impl ReadRecordsCmd {
    /// Build a READ RECORDS request
    ///
    /// `expected_length` becomes Le; 0 asks for all available data.
    pub fn new(
        card_class: CardClass,
        sfi: u8,
        record_number: u8,
        mode: ReadMode,
        expected_length: u8,
    ) -> Result<Self> {
        if record_number < 1 {
            return Err(Error::InvalidArgument("record number must be >= 1"));
        }
        if sfi > SFI_MAX {
            return Err(Error::InvalidArgument("SFI out of range (max 1Eh)"));
        }

        let p2 = sfi * 8 + mode.p2_variant();
        let request = ApduRequest::new(
            card_class.value(),
            CommandRef::ReadRecords.instruction(),
            record_number,
            p2,
        )
        .with_le(expected_length);

        debug!(sfi = format_args!("{sfi:02X}h"), record_number, "built read records");

        Ok(Self {
            sfi,
            record_number,
            request,
            data: None,
        })
    }

    /// The request frame
    pub const fn request(&self) -> &ApduRequest {
        &self.request
    }

    /// Addressed file
    pub const fn sfi(&self) -> u8 {
        self.sfi
    }

    /// First record read
    pub const fn record_number(&self) -> u8 {
        self.record_number
    }

    /// Record content returned by the card, available after parsing
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Check the status word and capture the record content
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(CommandRef::ReadRecords, response.status())?;
        self.data = Some(response.data_bytes().clone());
        Ok(())
    }
}
