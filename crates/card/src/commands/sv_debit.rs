//! SV DEBIT / SV UNDEBIT commands
//!
//! Two-phase construction: the validating constructor lays the fixed part of
//! the card payload and exposes the compact summary destined for the SAM's
//! SV preparation; `finalize` consumes the SAM's complementary data and
//! assembles the final frame by fixed-offset concatenation. The request is
//! unavailable until finalization — an unfinalized command must never reach
//! the transport.

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};
use tracing::debug;

use crate::card::CalypsoCard;
use crate::commands::CommandRef;
use crate::crypto::SvOperationKind;
use crate::error::{Error, Result};
use crate::status;

/// Direction of a stored-value debit operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvAction {
    /// Withdraw from the stored value (INS BAh)
    Debit,
    /// Cancel a previous debit (INS BCh)
    Undebit,
}

/// SV DEBIT / SV UNDEBIT command
///
/// Consumes session-buffer capacity when executed inside a session.
#[derive(Debug)]
pub struct SvDebitCmd {
    action: SvAction,
    cla: u8,
    signature_length: usize,
    /// Card payload: fixed head laid at construction, SAM fields at
    /// finalization
    data_in: Vec<u8>,
    request: Option<ApduRequest>,
    response_data: Option<Bytes>,
}

impl SvDebitCmd {
    /// Phase 1: validate and lay the fixed part of the payload
    ///
    /// `amount` is in stored-value units, 0..=32767. `date` and `time` are
    /// 2-byte values opaque to the card.
    pub fn new(
        card: &CalypsoCard,
        action: SvAction,
        amount: i32,
        kvc: u8,
        date: &[u8],
        time: &[u8],
    ) -> Result<Self> {
        if !(0..=32767).contains(&amount) {
            return Err(Error::InvalidArgument(
                "amount is outside allowed boundaries (0 <= amount <= 32767)",
            ));
        }
        if date.len() != 2 || time.len() != 2 {
            return Err(Error::InvalidArgument("date and time must be 2 bytes each"));
        }

        let signature_length = card.revision().sv_signature_length();
        let mut data_in = vec![0u8; 15 + signature_length];

        // data_in[0] is filled at finalization
        let amount_field = match action {
            SvAction::Debit => -(amount as i16),
            SvAction::Undebit => amount as i16,
        };
        data_in[1..3].copy_from_slice(&amount_field.to_be_bytes());
        data_in[3] = date[0];
        data_in[4] = date[1];
        data_in[5] = time[0];
        data_in[6] = time[1];
        data_in[7] = kvc;
        // data_in[8..] is filled at finalization

        debug!(?action, amount, "prepared SV debit payload");

        Ok(Self {
            action,
            cla: card.card_class().value(),
            signature_length,
            data_in,
            request: None,
            response_data: None,
        })
    }

    /// The command kind, depending on the action
    pub const fn command_ref(&self) -> CommandRef {
        match self.action {
            SvAction::Debit => CommandRef::SvDebit,
            SvAction::Undebit => CommandRef::SvUndebit,
        }
    }

    /// The SAM preparation kind for this command
    pub const fn sv_operation_kind(&self) -> SvOperationKind {
        SvOperationKind::Debit
    }

    /// Compact summary payload for the SAM's SV preparation
    ///
    /// Instruction byte, placeholder P1/P2, the Lc of the final card frame,
    /// then the fixed head of the card payload.
    pub fn sam_prepare_data(&self) -> Bytes {
        let mut data = vec![0u8; 12];
        data[0] = self.command_ref().instruction();
        // data[1..3]: P1/P2, ignored by the SAM
        data[3] = self.data_in.len() as u8;
        data[4..12].copy_from_slice(&self.data_in[0..8]);
        data.into()
    }

    /// Phase 2: assemble the final frame from the SAM's complementary data
    ///
    /// Layout: 4-byte SAM id, P1, P2, KVC-challenge byte, 3-byte transaction
    /// number, then the 5- or 10-byte signature fragment matching the card
    /// revision.
    pub fn finalize(&mut self, complementary_data: &[u8]) -> Result<()> {
        if complementary_data.len() != 10 + self.signature_length {
            return Err(Error::InvalidArgument(
                "SV preparation data length does not match the card revision",
            ));
        }

        let p1 = complementary_data[4];
        let p2 = complementary_data[5];

        self.data_in[0] = complementary_data[6];
        self.data_in[8..12].copy_from_slice(&complementary_data[0..4]);
        self.data_in[12..15].copy_from_slice(&complementary_data[7..10]);
        self.data_in[15..].copy_from_slice(&complementary_data[10..]);

        self.request = Some(
            ApduRequest::new(self.cla, self.command_ref().instruction(), p1, p2)
                .with_data(self.data_in.clone()),
        );
        Ok(())
    }

    /// The request frame, available once finalized
    pub const fn request(&self) -> Option<&ApduRequest> {
        self.request.as_ref()
    }

    /// Response data (new balance or postponed marker), available after
    /// parsing
    pub const fn response_data(&self) -> Option<&Bytes> {
        self.response_data.as_ref()
    }

    /// Check the status word and keep the response payload
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(self.command_ref(), response.status())?;
        self.response_data = Some(response.data_bytes().clone());
        Ok(())
    }
}
