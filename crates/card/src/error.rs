//! Error taxonomy for Calypso card operations
//!
//! Three families matter to callers: caller mistakes caught before any byte
//! reaches the card ([`Error::InvalidArgument`]), card rejections carrying a
//! status kind ([`Error::Command`]), and session-fatal engine conditions
//! (desynchronization, crypto failures, authentication failure). Any error
//! raised while a session is open leaves the session closed; the caller must
//! release the channel before opening a new one.

use calyx_apdu_core::{StatusWord, TransportError};

use crate::commands::CommandRef;
use crate::crypto::CryptoError;
use crate::status::StatusKind;

/// Result type for Calypso card operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Calypso card operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller precondition was violated; nothing was sent to the card
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The card rejected a command with a non-success status word
    #[error("{command} rejected: {description} ({status})")]
    Command {
        /// The command the card rejected
        command: CommandRef,
        /// The reported status word
        status: StatusWord,
        /// Error kind resolved through the status registry
        kind: StatusKind,
        /// Registry description of the status word
        description: &'static str,
    },

    /// A response frame was well-formed but its data did not match the
    /// command's expected layout
    #[error("malformed {0} response: {1}")]
    InvalidResponse(CommandRef, &'static str),

    /// The transport returned a different number of responses than requests
    #[error("desynchronized: {requests} requests, {responses} responses")]
    Desynchronized {
        /// Number of request frames submitted
        requests: usize,
        /// Number of response frames received
        responses: usize,
    },

    /// A buffer-consuming command would exceed the card's session buffer
    #[error("session buffer overflow: {requested} bytes requested, {available} available")]
    SessionBufferOverflow {
        /// Bytes the rejected reservation asked for
        requested: usize,
        /// Bytes left in the session buffer
        available: usize,
    },

    /// The crypto service failed while synchronizing a command
    #[error("crypto synchronization failed")]
    CryptoSynchronizationFailed(#[source] CryptoError),

    /// The session signatures did not match at close
    #[error("session authentication failed")]
    SessionAuthenticationFailed,

    /// The operation is not permitted in the current session state
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// APDU framing failure
    #[error(transparent)]
    Apdu(#[from] calyx_apdu_core::Error),
}

impl Error {
    /// The status kind for card-rejected commands, if applicable
    pub const fn status_kind(&self) -> Option<StatusKind> {
        match self {
            Self::Command { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
