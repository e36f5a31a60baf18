//! Secure-session machinery
//!
//! A secure session brackets a group of commands between an OPEN SECURE
//! SESSION and a CLOSE SECURE SESSION exchange, with a SAM-computed MAC over
//! every frame in between. This module holds the pieces the transaction
//! engine composes: the modifications-buffer tracker and the MAC
//! synchronization hooks.

pub mod buffer;
pub(crate) mod sync;

pub use buffer::SessionBuffer;

/// Lifecycle of the secure session driven by the transaction engine
///
/// The only legal walk is `Closed` to `Open` to `AwaitingClose` and back to
/// `Closed`; any error collapses straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session active
    Closed,
    /// Session opened, commands may run inside it
    Open,
    /// Close command sent, card signature not yet verified
    AwaitingClose,
}

impl SessionState {
    /// Whether commands run under session protection in this state
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}
