//! UPDATE RECORD command

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};
use tracing::debug;

use crate::card::CardClass;
use crate::commands::{CommandRef, read_records::SFI_MAX};
use crate::error::{Error, Result};
use crate::status;

/// UPDATE RECORD command (INS DCh)
///
/// Replaces a record's content; consumes session-buffer capacity.
#[derive(Debug)]
pub struct UpdateRecordCmd {
    sfi: u8,
    record_number: u8,
    request: ApduRequest,
}

impl UpdateRecordCmd {
    /// Build an UPDATE RECORD request
    ///
    /// `sfi` 0 targets the current file.
    pub fn new(
        card_class: CardClass,
        sfi: u8,
        record_number: u8,
        new_record_data: impl Into<Bytes>,
    ) -> Result<Self> {
        if record_number < 1 {
            return Err(Error::InvalidArgument("record number must be >= 1"));
        }
        if sfi > SFI_MAX {
            return Err(Error::InvalidArgument("SFI out of range (max 1Eh)"));
        }
        let data = new_record_data.into();
        if data.is_empty() {
            return Err(Error::InvalidArgument("record data must not be empty"));
        }
        if data.len() > 255 {
            return Err(Error::InvalidArgument("record data exceeds 255 bytes"));
        }

        let p2 = if sfi == 0 { 0x04 } else { sfi * 8 + 4 };
        let request = ApduRequest::new(
            card_class.value(),
            CommandRef::UpdateRecord.instruction(),
            record_number,
            p2,
        )
        .with_data(data);

        debug!(sfi = format_args!("{sfi:02X}h"), record_number, "built update record");

        Ok(Self {
            sfi,
            record_number,
            request,
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

    /// Updated record
    pub const fn record_number(&self) -> u8 {
        self.record_number
    }

    /// Check the status word; a successful update returns no data
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(CommandRef::UpdateRecord, response.status())
    }
}
