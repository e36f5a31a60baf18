//! Terminal-side protocol engine for Calypso smart cards
//!
//! Builds and parses the binary command frames of the Calypso revision 2/3
//! command set and coordinates secure sessions over them:
//!
//! - Command codec with per-command validation and status-word registry
//! - Secure-session state machine with modifications-buffer accounting
//! - MAC/encryption synchronization against an external SAM-backed crypto
//!   service
//! - Two-phase Stored-Value debit and reload signing
//!
//! The engine is deliberately agnostic of readers and of the SAM itself: it
//! consumes a [`CardTransport`](calyx_apdu_core::CardTransport) and a
//! [`CardCryptoService`](crypto::CardCryptoService) and orchestrates the
//! ordered exchange between the two.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod card;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod session;
pub mod status;
pub mod transaction;

pub use card::{CalypsoCard, CardClass, CardRevision, SecuritySettings};
pub use commands::{CardCommand, CommandRef, ReadMode, SvAction};
pub use crypto::{CardCryptoService, CryptoError, SvOperationKind};
pub use error::{Error, Result};
pub use session::{SessionBuffer, SessionState};
pub use status::StatusKind;
pub use transaction::CardTransactionManager;

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::card::{CalypsoCard, CardClass, CardRevision, SecuritySettings};
    pub use crate::commands::{CardCommand, CommandRef, ReadMode, SvAction};
    pub use crate::crypto::{CardCryptoService, CryptoError, SvOperationKind};
    pub use crate::error::{Error, Result};
    pub use crate::session::SessionState;
    pub use crate::status::StatusKind;
    pub use crate::transaction::CardTransactionManager;

    pub use calyx_apdu_core::prelude::*;
}
