//! MAC synchronization around command transmission
//!
//! The crypto service must see every session frame in transmission order.
//! For commands whose success response is statusword-only, the request and
//! an assumed 9000h are folded in before transmission, which lets the engine
//! batch several commands into one transport exchange; the assumption is
//! reconciled against the real status afterwards. Commands that return data
//! fold the actual response in after transmission instead.
//!
//! When encryption is active the pre-transmit hook also rewrites the frame:
//! the payload is enciphered first and the accumulator sees the enciphered
//! frame; the post-transmit hook deciphers the response and folds in the
//! deciphered data followed by the real status. The sync flavor is
//! immaterial on this path since the response must round-trip through the
//! service anyway.

use calyx_apdu_core::{ApduRequest, ApduResponse};

use crate::commands::SyncMode;
use crate::constants::APDU_RESPONSE_9000;
use crate::crypto::CardCryptoService;
use crate::error::{Error, Result};

fn sync_err(err: crate::crypto::CryptoError) -> Error {
    Error::CryptoSynchronizationFailed(err)
}

/// Feed the outgoing frame to the accumulator, enciphering it if required
///
/// Returns the frame to actually transmit when it differs from `request`.
pub(crate) fn prepare_request<S: CardCryptoService>(
    service: &mut S,
    request: &ApduRequest,
    sync_mode: SyncMode,
    encrypt: bool,
) -> Result<Option<ApduRequest>> {
    if encrypt {
        let Some(data) = request.data() else {
            // Nothing to encipher; the frame still feeds the accumulator
            service.update_mac(&request.to_bytes()?).map_err(sync_err)?;
            return Ok(None);
        };
        let ciphered = service.encrypt(data).map_err(sync_err)?;
        let mut rebuilt = ApduRequest::new(request.cla(), request.ins(), request.p1(), request.p2())
            .with_data(ciphered);
        if let Some(le) = request.le() {
            rebuilt = rebuilt.with_le(le);
        }
        service.update_mac(&rebuilt.to_bytes()?).map_err(sync_err)?;
        return Ok(Some(rebuilt));
    }

    service.update_mac(&request.to_bytes()?).map_err(sync_err)?;
    if sync_mode == SyncMode::Anticipated {
        service.update_mac(&APDU_RESPONSE_9000).map_err(sync_err)?;
    }
    Ok(None)
}

/// Feed the incoming frame to the accumulator, deciphering it if required
///
/// Returns the deciphered response when encryption rewrote it; the caller
/// parses that one instead.
pub(crate) fn absorb_response<S: CardCryptoService>(
    service: &mut S,
    response: &ApduResponse,
    sync_mode: SyncMode,
    encrypt: bool,
) -> Result<Option<ApduResponse>> {
    if encrypt {
        let data = if response.data().is_empty() {
            bytes::Bytes::new()
        } else {
            let plain = service.decrypt(response.data()).map_err(sync_err)?;
            service.update_mac(&plain).map_err(sync_err)?;
            plain
        };
        let status = response.status();
        service
            .update_mac(&[status.sw1(), status.sw2()])
            .map_err(sync_err)?;
        return Ok(Some(ApduResponse::new(data, status)));
    }

    if sync_mode == SyncMode::Deferred {
        service.update_mac(&response.to_bytes()).map_err(sync_err)?;
    }
    // Anticipated: a success status matches the assumed 9000h already folded
    // in, so reconciliation is the identity; a non-success status fails the
    // command and aborts the session, discarding the accumulator.
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::mock::{CryptoCall, RecordingCryptoService};
    use hex_literal::hex;

    #[test]
    fn test_anticipated_folds_request_and_assumed_status() {
        let mut service = RecordingCryptoService::new();
        let request = ApduRequest::new(0x00, 0xDC, 0x01, 0x3C).with_data(hex!("0102").to_vec());

        let rewritten =
            prepare_request(&mut service, &request, SyncMode::Anticipated, false).unwrap();
        assert!(rewritten.is_none());
        assert_eq!(
            service.journal,
            vec![
                CryptoCall::UpdateMac(hex!("00DC013C020102").to_vec()),
                CryptoCall::UpdateMac(hex!("9000").to_vec()),
            ]
        );

        let response = ApduResponse::success();
        let rewritten =
            absorb_response(&mut service, &response, SyncMode::Anticipated, false).unwrap();
        assert!(rewritten.is_none());
        // no further accumulator updates
        assert_eq!(service.journal.len(), 2);
    }

    #[test]
    fn test_deferred_folds_actual_response() {
        let mut service = RecordingCryptoService::new();
        let request = ApduRequest::new(0x00, 0xB2, 0x01, 0x3C).with_le(0x02);

        prepare_request(&mut service, &request, SyncMode::Deferred, false).unwrap();
        assert_eq!(
            service.journal,
            vec![CryptoCall::UpdateMac(hex!("00B2013C02").to_vec())]
        );

        let response = ApduResponse::from_bytes(&hex!("CAFE 9000")).unwrap();
        absorb_response(&mut service, &response, SyncMode::Deferred, false).unwrap();
        assert_eq!(
            service.journal[1],
            CryptoCall::UpdateMac(hex!("CAFE9000").to_vec())
        );
    }

    #[test]
    fn test_encryption_rewrites_both_directions() {
        let mut service = RecordingCryptoService::new();
        let request = ApduRequest::new(0x00, 0xDC, 0x01, 0x3C).with_data(hex!("0102").to_vec());

        let rewritten = prepare_request(&mut service, &request, SyncMode::Anticipated, true)
            .unwrap()
            .unwrap();
        // the enciphered frame feeds the accumulator
        assert_eq!(rewritten.data().unwrap(), hex!("FEFD"));
        assert_eq!(
            service.journal,
            vec![
                CryptoCall::Encrypt(hex!("0102").to_vec()),
                CryptoCall::UpdateMac(hex!("00DC013C02FEFD").to_vec()),
            ]
        );

        let response = ApduResponse::from_bytes(&hex!("FEFD 9000")).unwrap();
        let plain = absorb_response(&mut service, &response, SyncMode::Anticipated, true)
            .unwrap()
            .unwrap();
        assert_eq!(plain.data(), hex!("0102"));
        assert_eq!(
            &service.journal[2..],
            &[
                CryptoCall::Decrypt(hex!("FEFD").to_vec()),
                CryptoCall::UpdateMac(hex!("0102").to_vec()),
                CryptoCall::UpdateMac(hex!("9000").to_vec()),
            ]
        );
    }

    #[test]
    fn test_encryption_passes_dataless_frames_through() {
        let mut service = RecordingCryptoService::new();
        let request = ApduRequest::new(0x00, 0xB2, 0x01, 0x3C).with_le(0x1D);
        let rewritten = prepare_request(&mut service, &request, SyncMode::Deferred, true).unwrap();
        assert!(rewritten.is_none());
        assert_eq!(
            service.journal,
            vec![CryptoCall::UpdateMac(hex!("00B2013C1D").to_vec())]
        );

        // a statusword-only response skips the decrypt round-trip
        let plain = absorb_response(&mut service, &ApduResponse::success(), SyncMode::Deferred, true)
            .unwrap()
            .unwrap();
        assert!(plain.data().is_empty());
        assert_eq!(
            service.journal[1],
            CryptoCall::UpdateMac(hex!("9000").to_vec())
        );
    }

    #[test]
    fn test_service_failure_maps_to_crypto_error() {
        let mut service = RecordingCryptoService {
            fail_update_mac: true,
            ..RecordingCryptoService::new()
        };
        let request = ApduRequest::new(0x00, 0xDC, 0x01, 0x3C).with_data(vec![0x01]);
        assert!(matches!(
            prepare_request(&mut service, &request, SyncMode::Anticipated, false),
            Err(Error::CryptoSynchronizationFailed(_))
        ));
    }
}
