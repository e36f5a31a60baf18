//! SV RELOAD command
//!
//! Same two-phase construction as SV DEBIT: the constructor validates the
//! inputs and lays the fixed part of the payload, `finalize` folds in the
//! SAM's complementary data.

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};
use tracing::debug;

use crate::card::CalypsoCard;
use crate::commands::CommandRef;
use crate::crypto::SvOperationKind;
use crate::error::{Error, Result};
use crate::status;

/// SV RELOAD command
///
/// Consumes session-buffer capacity when executed inside a session.
#[derive(Debug)]
pub struct SvReloadCmd {
    cla: u8,
    signature_length: usize,
    data_in: Vec<u8>,
    request: Option<ApduRequest>,
    response_data: Option<Bytes>,
}

impl SvReloadCmd {
    /// Phase 1: validate and lay the fixed part of the payload
    ///
    /// `amount` is in stored-value units, -8388608..=8388607 (signed 24-bit).
    /// `date`, `time` and `free` are 2-byte values opaque to the card.
    pub fn new(
        card: &CalypsoCard,
        amount: i32,
        kvc: u8,
        date: &[u8],
        time: &[u8],
        free: &[u8],
    ) -> Result<Self> {
        if !(-8_388_608..=8_388_607).contains(&amount) {
            return Err(Error::InvalidArgument(
                "amount is outside allowed boundaries (-8388608 <= amount <= 8388607)",
            ));
        }
        if date.len() != 2 || time.len() != 2 || free.len() != 2 {
            return Err(Error::InvalidArgument(
                "date, time and free must be 2 bytes each",
            ));
        }

        let signature_length = card.revision().sv_signature_length();
        let mut data_in = vec![0u8; 18 + signature_length];

        // data_in[0] is filled at finalization
        data_in[1] = date[0];
        data_in[2] = date[1];
        data_in[3] = free[0];
        data_in[4] = kvc;
        data_in[5] = free[1];
        data_in[6..9].copy_from_slice(&amount.to_be_bytes()[1..4]);
        data_in[9] = time[0];
        data_in[10] = time[1];
        // data_in[11..] is filled at finalization

        debug!(amount, "prepared SV reload payload");

        Ok(Self {
            cla: card.card_class().value(),
            signature_length,
            data_in,
            request: None,
            response_data: None,
        })
    }

    /// The command kind
    pub const fn command_ref(&self) -> CommandRef {
        CommandRef::SvReload
    }

    /// The SAM preparation kind for this command
    pub const fn sv_operation_kind(&self) -> SvOperationKind {
        SvOperationKind::Reload
    }

    /// Compact summary payload for the SAM's SV preparation
    pub fn sam_prepare_data(&self) -> Bytes {
        let mut data = vec![0u8; 15];
        data[0] = self.command_ref().instruction();
        // data[1..3]: P1/P2, ignored by the SAM
        data[3] = self.data_in.len() as u8;
        data[4..15].copy_from_slice(&self.data_in[0..11]);
        data.into()
    }

    /// Phase 2: assemble the final frame from the SAM's complementary data
    pub fn finalize(&mut self, complementary_data: &[u8]) -> Result<()> {
        if complementary_data.len() != 10 + self.signature_length {
            return Err(Error::InvalidArgument(
                "SV preparation data length does not match the card revision",
            ));
        }

        let p1 = complementary_data[4];
        let p2 = complementary_data[5];

        self.data_in[0] = complementary_data[6];
        self.data_in[11..15].copy_from_slice(&complementary_data[0..4]);
        self.data_in[15..18].copy_from_slice(&complementary_data[7..10]);
        self.data_in[18..].copy_from_slice(&complementary_data[10..]);

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

    /// Response data, available after parsing
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardClass, CardRevision};
    use hex_literal::hex;

    fn rev31_card() -> CalypsoCard {
        CalypsoCard::new(CardClass::Iso, CardRevision::Rev3_1, false, 430)
    }

    fn rev32_card() -> CalypsoCard {
        CalypsoCard::new(CardClass::Iso, CardRevision::Rev3_2, true, 430)
    }

    #[test]
    fn test_amount_bounds() {
        let card = rev31_card();
        for amount in [-8_388_608, -1, 0, 8_388_607] {
            assert!(SvReloadCmd::new(&card, amount, 0x30, &[0, 0], &[0, 0], &[0, 0]).is_ok());
        }
        for amount in [-8_388_609, 8_388_608] {
            assert!(matches!(
                SvReloadCmd::new(&card, amount, 0x30, &[0, 0], &[0, 0], &[0, 0]),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_amount_is_signed_24_bit_big_endian() {
        let card = rev31_card();
        let cmd = SvReloadCmd::new(&card, 1, 0x30, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert_eq!(&cmd.sam_prepare_data()[10..13], hex!("000001"));

        let cmd = SvReloadCmd::new(&card, -1, 0x30, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert_eq!(&cmd.sam_prepare_data()[10..13], hex!("FFFFFF"));

        let cmd = SvReloadCmd::new(&card, -8_388_608, 0x30, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert_eq!(&cmd.sam_prepare_data()[10..13], hex!("800000"));
    }

    #[test]
    fn test_sam_prepare_layout() {
        let card = rev31_card();
        let cmd = SvReloadCmd::new(
            &card,
            100,
            0x30,
            &hex!("7E10"),
            &hex!("A5B2"),
            &hex!("F1F2"),
        )
        .unwrap();
        let data = cmd.sam_prepare_data();
        assert_eq!(data.len(), 15);
        assert_eq!(data[0], 0xB8);
        // Lc = 23 bytes for a 5-byte signature
        assert_eq!(data[3], 0x17);
        assert_eq!(&data[5..7], hex!("7E10"));
        assert_eq!(data[7], 0xF1);
        assert_eq!(data[8], 0x30);
        assert_eq!(data[9], 0xF2);
        assert_eq!(&data[10..13], hex!("000064"));
        assert_eq!(&data[13..15], hex!("A5B2"));
    }

    #[test]
    fn test_rev32_lc_field() {
        let card = rev32_card();
        let cmd = SvReloadCmd::new(&card, 1, 0x30, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert_eq!(cmd.sam_prepare_data()[3], 0x1C);
    }

    #[test]
    fn test_finalize_rejects_mismatched_length() {
        let card = rev31_card();
        let mut cmd = SvReloadCmd::new(&card, 1, 0x30, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert!(matches!(
            cmd.finalize(&[0u8; 20]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(cmd.request().is_none());
        assert!(cmd.finalize(&[0u8; 15]).is_ok());
        assert!(cmd.request().is_some());
    }

    #[test]
    fn test_finalize_assembles_frame_by_offsets() {
        let card = rev31_card();
        let mut cmd = SvReloadCmd::new(
            &card,
            100,
            0x30,
            &hex!("7E10"),
            &hex!("A5B2"),
            &hex!("F1F2"),
        )
        .unwrap();

        cmd.finalize(&hex!("01020304 02FF C7 D1D2D3 E1E2E3E4E5"))
            .unwrap();

        let request = cmd.request().unwrap();
        assert_eq!(request.p1(), 0x02);
        assert_eq!(request.p2(), 0xFF);
        assert_eq!(
            request.data().unwrap(),
            hex!("C7 7E10 F1 30 F2 000064 A5B2 01020304 D1D2D3 E1E2E3E4E5")
        );
    }
}
