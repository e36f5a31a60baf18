//! CLOSE SECURE SESSION command

use calyx_apdu_core::{ApduRequest, ApduResponse, Bytes};
use tracing::debug;

use crate::card::CalypsoCard;
use crate::commands::CommandRef;
use crate::error::{Error, Result};
use crate::status;

/// CLOSE SECURE SESSION command (INS 8Eh)
///
/// Carries the terminal signature half produced by the crypto service; the
/// card answers with its own signature half.
#[derive(Debug)]
pub struct CloseSessionCmd {
    signature_length: usize,
    request: ApduRequest,
    card_signature: Option<Bytes>,
    postponed_data: Option<Bytes>,
}

impl CloseSessionCmd {
    /// Build a CLOSE SECURE SESSION request
    ///
    /// `ratify` asks the card to ratify the session immediately instead of
    /// waiting for the next command.
    pub fn new(card: &CalypsoCard, terminal_signature: &[u8], ratify: bool) -> Result<Self> {
        if terminal_signature.len() != card.session_signature_length() {
            return Err(Error::InvalidArgument(
                "terminal signature length does not match the card's session mode",
            ));
        }

        let p1 = if ratify { 0x80 } else { 0x00 };
        let request = ApduRequest::new(
            card.card_class().value(),
            CommandRef::CloseSession.instruction(),
            p1,
            0x00,
        )
        .with_data(Bytes::copy_from_slice(terminal_signature))
        .with_le(0x00);

        debug!(ratify, "built close secure session");

        Ok(Self {
            signature_length: card.session_signature_length(),
            request,
            card_signature: None,
            postponed_data: None,
        })
    }

    /// The request frame
    pub const fn request(&self) -> &ApduRequest {
        &self.request
    }

    /// The card's signature half, available after parsing
    pub const fn card_signature(&self) -> Option<&Bytes> {
        self.card_signature.as_ref()
    }

    /// Data postponed to session close (SV signatures), available after
    /// parsing; empty for plain sessions
    pub const fn postponed_data(&self) -> Option<&Bytes> {
        self.postponed_data.as_ref()
    }

    /// Check the status word and split the card signature off the payload
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        status::check(CommandRef::CloseSession, response.status())?;

        let raw = response.data();
        if raw.len() < self.signature_length {
            return Err(Error::InvalidResponse(
                CommandRef::CloseSession,
                "response shorter than the card signature",
            ));
        }

        let split = raw.len() - self.signature_length;
        self.postponed_data = Some(response.data_bytes().slice(0..split));
        self.card_signature = Some(response.data_bytes().slice(split..));
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
    fn test_frame_layout() {
        let card = standard_card();
        let cmd = CloseSessionCmd::new(&card, &hex!("A1A2A3A4"), false).unwrap();
        assert_eq!(
            cmd.request().to_bytes().unwrap().as_ref(),
            hex!("008E000004A1A2A3A400")
        );

        let cmd = CloseSessionCmd::new(&card, &hex!("A1A2A3A4"), true).unwrap();
        assert_eq!(cmd.request().p1(), 0x80);
    }

    #[test]
    fn test_signature_length_checked() {
        let card = standard_card();
        assert!(matches!(
            CloseSessionCmd::new(&card, &hex!("A1A2"), false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_card_signature() {
        let card = standard_card();
        let mut cmd = CloseSessionCmd::new(&card, &hex!("A1A2A3A4"), false).unwrap();
        let response = ApduResponse::from_bytes(&hex!("B1B2B3B4 9000")).unwrap();
        cmd.parse_response(&response).unwrap();
        assert_eq!(cmd.card_signature().unwrap().as_ref(), hex!("B1B2B3B4"));
        assert!(cmd.postponed_data().unwrap().is_empty());
    }

    #[test]
    fn test_parse_postponed_data_precedes_signature() {
        let card = standard_card();
        let mut cmd = CloseSessionCmd::new(&card, &hex!("A1A2A3A4"), false).unwrap();
        let response = ApduResponse::from_bytes(&hex!("CCDDEE B1B2B3B4 9000")).unwrap();
        cmd.parse_response(&response).unwrap();
        assert_eq!(cmd.postponed_data().unwrap().as_ref(), hex!("CCDDEE"));
        assert_eq!(cmd.card_signature().unwrap().as_ref(), hex!("B1B2B3B4"));
    }

    #[test]
    fn test_parse_bad_terminal_signature_status() {
        let card = standard_card();
        let mut cmd = CloseSessionCmd::new(&card, &hex!("A1A2A3A4"), false).unwrap();
        let response = ApduResponse::from_bytes(&hex!("6988")).unwrap();
        let err = cmd.parse_response(&response).unwrap_err();
        assert_eq!(
            err.status_kind(),
            Some(crate::status::StatusKind::SecurityConditionNotMet)
        );
    }
}
