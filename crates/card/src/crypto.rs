//! Crypto-service contract
//!
//! The engine never computes a MAC, signature or cipher itself: everything
//! cryptographic is delegated to an external service backed by a SAM
//! (Security Access Module). The service owns the running session MAC
//! accumulator; the engine only guarantees the order of the update calls.

use bytes::Bytes;

/// Errors raised by the crypto service
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The card's session signature did not verify
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The service rejected its input
    #[error("invalid crypto input: {0}")]
    InvalidInput(&'static str),

    /// The SAM channel failed
    #[error("crypto service unavailable: {0}")]
    Unavailable(&'static str),
}

/// Kind of stored-value operation submitted to the SAM for preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvOperationKind {
    /// SV Debit or SV Undebit
    Debit,
    /// SV Reload
    Reload,
}

/// Contract between the session engine and the SAM-backed crypto service
///
/// One service instance backs exactly one transaction context; the engine
/// drives it strictly sequentially.
pub trait CardCryptoService {
    /// Produce the terminal challenge opening a session
    fn get_challenge(&mut self, length: usize) -> Result<Bytes, CryptoError>;

    /// Seed the session MAC accumulator with the card's open-session
    /// response data
    fn initialize_session(&mut self, open_session_data: &[u8]) -> Result<(), CryptoError>;

    /// Fold `data` into the session MAC accumulator
    fn update_mac(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Encrypt a command payload for transmission
    fn encrypt(&mut self, payload: &[u8]) -> Result<Bytes, CryptoError>;

    /// Decrypt a response payload
    fn decrypt(&mut self, payload: &[u8]) -> Result<Bytes, CryptoError>;

    /// Close the accumulator and produce the terminal signature half
    fn finalize_session(&mut self) -> Result<Bytes, CryptoError>;

    /// Verify the card's signature half against the finalized session
    ///
    /// Together with [`CardCryptoService::finalize_session`] this realizes
    /// session authentication; the card's close-session exchange happens
    /// between the two calls.
    fn verify_card_signature(&mut self, signature: &[u8]) -> Result<(), CryptoError>;

    /// Run the SAM's SV preparation for a debit or reload operation
    ///
    /// `data` is the compact summary payload emitted by the SV command
    /// builder; the returned complementary data carries P1/P2, the SAM id,
    /// the challenge, the transaction number and the signature fragment.
    fn prepare_sv_operation(
        &mut self,
        kind: SvOperationKind,
        data: &[u8],
    ) -> Result<Bytes, CryptoError>;
}
