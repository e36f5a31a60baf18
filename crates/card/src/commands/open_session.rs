//! OPEN SECURE SESSION command (revision 3)

use bytes::BufMut;
use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes, BytesMut};
use tracing::debug;

use crate::card::CalypsoCard;
use crate::commands::{CommandRef, read_records::SFI_MAX};
use crate::error::{Error, Result};
use crate::status;

/// Session parameters reported by the card when the session opens
#[derive(Debug, Clone)]
pub struct OpenSessionData {
    /// Card challenge: 3-byte transaction counter plus random bytes
    pub challenge: Bytes,
    /// Whether the previous session was ratified
    pub previous_session_ratified: bool,
    /// Whether the card grants the extended session control functions
    pub extended_control_authorized: bool,
    /// Key identifier (KIF) selected by the card
    pub kif: u8,
    /// Key version (KVC) selected by the card
    pub kvc: u8,
    /// Content of the record read atomically with the opening, if requested
    pub record_data: Bytes,
}

/// OPEN SECURE SESSION command (INS 8Ah)
///
/// Carries the SAM challenge and optionally reads one record under session
/// authentication. Cannot run inside a session, so it never consumes the
/// session buffer.
#[derive(Debug)]
pub struct OpenSessionCmd {
    sfi: u8,
    record_number: u8,
    challenge_length: usize,
    request: ApduRequest,
    data: Option<OpenSessionData>,
}

impl OpenSessionCmd {
    /// Build an OPEN SECURE SESSION request
    ///
    /// `key_index` selects the session key (1..=3). `record_number` 0 skips
    /// the atomic read; otherwise `sfi`/`record_number` select the record to
    /// read under the opening.
    pub fn new(
        card: &CalypsoCard,
        key_index: u8,
        sam_challenge: &[u8],
        sfi: u8,
        record_number: u8,
    ) -> Result<Self> {
        if !(1..=3).contains(&key_index) {
            return Err(Error::InvalidArgument("key index must be in 1..=3"));
        }
        if sfi > SFI_MAX {
            return Err(Error::InvalidArgument("SFI out of range (max 1Eh)"));
        }
        if record_number > 30 {
            return Err(Error::InvalidArgument(
                "record number does not fit the P1 encoding (max 30)",
            ));
        }
        if sam_challenge.len() != card.challenge_length() {
            return Err(Error::InvalidArgument(
                "SAM challenge length does not match the card's session mode",
            ));
        }

        let p1 = record_number * 8 + key_index;
        let (p2, data) = if card.is_extended_mode_supported() {
            // Extended mode prefixes the challenge with a one-byte marker
            let mut data = BytesMut::with_capacity(sam_challenge.len() + 1);
            data.put_u8(0x00);
            data.put_slice(sam_challenge);
            (sfi * 8 + 2, data.freeze())
        } else {
            (sfi * 8 + 1, Bytes::copy_from_slice(sam_challenge))
        };

        // Case 4: incoming and outgoing data
        let request = ApduRequest::new(
            card.card_class().value(),
            CommandRef::OpenSession.instruction(),
            p1,
            p2,
        )
        .with_data(data)
        .with_le(0x00);

        debug!(
            key_index,
            sfi = format_args!("{sfi:02X}h"),
            record_number,
            "built open secure session"
        );

        Ok(Self {
            sfi,
            record_number,
            challenge_length: card.challenge_length(),
            request,
            data: None,
        })
    }

    /// The request frame
    pub const fn request(&self) -> &ApduRequest {
        &self.request
    }

    /// File read under the opening (0 when none)
    pub const fn sfi(&self) -> u8 {
        self.sfi
    }

    /// Record read under the opening (0 when none)
    pub const fn record_number(&self) -> u8 {
        self.record_number
    }

    /// Session parameters, available after parsing
    pub const fn session_data(&self) -> Option<&OpenSessionData> {
        self.data.as_ref()
    }

    /// Check the status word and extract the session parameters
    ///
    /// Layout: challenge (4 bytes, 8 in extended mode), flags byte (bit 0 =
    /// previous session not ratified, bit 1 = extended control authorized),
    /// KIF, KVC, record-data length, record data.
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(CommandRef::OpenSession, response.status())?;

        let raw = response.data();
        let header_len = self.challenge_length + 4;
        if raw.len() < header_len {
            return Err(Error::InvalidResponse(
                CommandRef::OpenSession,
                "response shorter than the session parameter header",
            ));
        }

        let challenge = response.data_bytes().slice(0..self.challenge_length);
        let flags = raw[self.challenge_length];
        let kif = raw[self.challenge_length + 1];
        let kvc = raw[self.challenge_length + 2];
        let record_len = raw[self.challenge_length + 3] as usize;

        if raw.len() != header_len + record_len {
            return Err(Error::InvalidResponse(
                CommandRef::OpenSession,
                "record data length field inconsistent with the frame",
            ));
        }

        self.data = Some(OpenSessionData {
            challenge,
            previous_session_ratified: flags & 0x01 == 0x00,
            extended_control_authorized: flags & 0x02 != 0x00,
            kif,
            kvc,
            record_data: response.data_bytes().slice(header_len..),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardClass, CardRevision};
    use hex_literal::hex;

    fn standard_card() -> CalypsoCard {
        CalypsoCard::new(CardClass::Iso, CardRevision::Rev3_1, false, 430)
    }

    #[test]
    fn test_frame_layout_standard_mode() {
        let card = standard_card();
        let cmd = OpenSessionCmd::new(&card, 1, &hex!("11223344"), 0x07, 1).unwrap();
        // P1 = 1*8 + 1, P2 = 7*8 + 1
        assert_eq!(
            cmd.request().to_bytes().unwrap().as_ref(),
            hex!("008A0939041122334400")
        );
    }

    #[test]
    fn test_frame_layout_extended_mode() {
        let card = CalypsoCard::new(CardClass::Iso, CardRevision::Rev3_2, true, 430);
        let cmd = OpenSessionCmd::new(&card, 3, &hex!("1122334455667788"), 0x07, 1).unwrap();
        // P2 gains the extended variant, data gains the marker byte
        assert_eq!(
            cmd.request().to_bytes().unwrap().as_ref(),
            hex!("008A0B3A 09 00 1122334455667788 00")
        );
    }

    #[test]
    fn test_challenge_length_must_match_mode() {
        let card = standard_card();
        assert!(matches!(
            OpenSessionCmd::new(&card, 1, &hex!("112233"), 0x07, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_key_index_bounds() {
        let card = standard_card();
        assert!(OpenSessionCmd::new(&card, 0, &hex!("11223344"), 0x07, 1).is_err());
        assert!(OpenSessionCmd::new(&card, 4, &hex!("11223344"), 0x07, 1).is_err());
    }

    #[test]
    fn test_parse_session_parameters() {
        let card = standard_card();
        let mut cmd = OpenSessionCmd::new(&card, 1, &hex!("11223344"), 0x07, 1).unwrap();

        // challenge 0x000102AA, flags 03h, KIF 30h, KVC 79h, 4 record bytes
        let response =
            ApduResponse::from_bytes(&hex!("000102AA 03 30 79 04 DEADBEEF 9000")).unwrap();
        cmd.parse_response(&response).unwrap();

        let data = cmd.session_data().unwrap();
        assert_eq!(data.challenge.as_ref(), hex!("000102AA"));
        assert!(!data.previous_session_ratified);
        assert!(data.extended_control_authorized);
        assert_eq!(data.kif, 0x30);
        assert_eq!(data.kvc, 0x79);
        assert_eq!(data.record_data.as_ref(), hex!("DEADBEEF"));
    }

    #[test]
    fn test_parse_without_record_read() {
        let card = standard_card();
        let mut cmd = OpenSessionCmd::new(&card, 1, &hex!("11223344"), 0, 0).unwrap();
        let response = ApduResponse::from_bytes(&hex!("000102AA 00 30 79 00 9000")).unwrap();
        cmd.parse_response(&response).unwrap();

        let data = cmd.session_data().unwrap();
        assert!(data.previous_session_ratified);
        assert!(data.record_data.is_empty());
    }

    #[test]
    fn test_parse_inconsistent_length() {
        let card = standard_card();
        let mut cmd = OpenSessionCmd::new(&card, 1, &hex!("11223344"), 0x07, 1).unwrap();
        let response = ApduResponse::from_bytes(&hex!("000102AA 00 30 79 05 DEAD 9000")).unwrap();
        assert!(matches!(
            cmd.parse_response(&response),
            Err(Error::InvalidResponse(CommandRef::OpenSession, _))
        ));
    }

    #[test]
    fn test_parse_already_open() {
        let card = standard_card();
        let mut cmd = OpenSessionCmd::new(&card, 1, &hex!("11223344"), 0x07, 1).unwrap();
        let response = ApduResponse::from_bytes(&hex!("6985")).unwrap();
        let err = cmd.parse_response(&response).unwrap_err();
        assert_eq!(
            err.status_kind(),
            Some(crate::status::StatusKind::AccessForbidden)
        );
    }
}
