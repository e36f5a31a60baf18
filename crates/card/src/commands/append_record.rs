//! APPEND RECORD command

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};

use crate::card::CardClass;
use crate::commands::{CommandRef, read_records::SFI_MAX};
use crate::error::{Error, Result};
use crate::status;

/// APPEND RECORD command (INS E2h)
///
/// Pushes a new record into a cyclic file; consumes session-buffer capacity.
#[derive(Debug)]
pub struct AppendRecordCmd {
    sfi: u8,
    request: ApduRequest,
}

impl AppendRecordCmd {
    /// Build an APPEND RECORD request
    pub fn new(card_class: CardClass, sfi: u8, record_data: impl Into<Bytes>) -> Result<Self> {
        if sfi > SFI_MAX {
            return Err(Error::InvalidArgument("SFI out of range (max 1Eh)"));
        }
        let data = record_data.into();
        if data.is_empty() {
            return Err(Error::InvalidArgument("record data must not be empty"));
        }
        if data.len() > 255 {
            return Err(Error::InvalidArgument("record data exceeds 255 bytes"));
        }

        let p2 = if sfi == 0 { 0x00 } else { sfi * 8 };
        let request = ApduRequest::new(
            card_class.value(),
            CommandRef::AppendRecord.instruction(),
            0x00,
            p2,
        )
        .with_data(data);

        Ok(Self { sfi, request })
    }

    /// The request frame
    pub const fn request(&self) -> &ApduRequest {
        &self.request
    }

    /// Addressed file
    pub const fn sfi(&self) -> u8 {
        self.sfi
    }

    /// Check the status word; a successful append returns no data
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(CommandRef::AppendRecord, response.status())
    }
}
