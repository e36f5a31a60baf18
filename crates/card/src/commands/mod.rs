//! Calypso command codec
//!
//! One module per command kind. Each command is built by a validating
//! constructor (every precondition is checked before a single byte is
//! produced), carries its finalized request frame, and parses its own
//! response through the status registry.
//!
//! [`CardCommand`] is the closed dispatch point the session engine works
//! with; the session control commands (open/close) are driven directly by
//! the engine and are not part of it.

pub mod append_record;
pub mod close_session;
pub mod open_session;
pub mod read_records;
pub mod sv_debit;
pub mod sv_reload;
pub mod update_record;

use std::fmt;

use calyx_apdu_core::{ApduRequest, ApduResponse};

pub use append_record::AppendRecordCmd;
pub use close_session::CloseSessionCmd;
pub use open_session::{OpenSessionCmd, OpenSessionData};
pub use read_records::{ReadMode, ReadRecordsCmd};
pub use sv_debit::{SvAction, SvDebitCmd};
pub use sv_reload::SvReloadCmd;
pub use update_record::UpdateRecordCmd;

use crate::error::{Error, Result};

/// Reference identifying a command kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRef {
    /// OPEN SECURE SESSION
    OpenSession,
    /// CLOSE SECURE SESSION
    CloseSession,
    /// READ RECORDS
    ReadRecords,
    /// UPDATE RECORD
    UpdateRecord,
    /// APPEND RECORD
    AppendRecord,
    /// SV DEBIT
    SvDebit,
    /// SV UNDEBIT
    SvUndebit,
    /// SV RELOAD
    SvReload,
}

impl CommandRef {
    /// The instruction byte of this command
    pub const fn instruction(self) -> u8 {
        use crate::constants::ins;
        match self {
            Self::OpenSession => ins::OPEN_SESSION,
            Self::CloseSession => ins::CLOSE_SESSION,
            Self::ReadRecords => ins::READ_RECORDS,
            Self::UpdateRecord => ins::UPDATE_RECORD,
            Self::AppendRecord => ins::APPEND_RECORD,
            Self::SvDebit => ins::SV_DEBIT,
            Self::SvUndebit => ins::SV_UNDEBIT,
            Self::SvReload => ins::SV_RELOAD,
        }
    }

    /// Human-readable command name
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenSession => "Open Secure Session",
            Self::CloseSession => "Close Secure Session",
            Self::ReadRecords => "Read Records",
            Self::UpdateRecord => "Update Record",
            Self::AppendRecord => "Append Record",
            Self::SvDebit => "SV Debit",
            Self::SvUndebit => "SV Undebit",
            Self::SvReload => "SV Reload",
        }
    }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a command synchronizes the session MAC around its transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// The success response carries no data: the MAC accumulator is updated
    /// with the request and an assumed 9000h status before transmission,
    /// reconciled against the real status afterwards
    Anticipated,
    /// The response carries data: the accumulator is updated with the
    /// request before transmission and with the actual response after
    Deferred,
}

/// A command executable inside or outside a secure session
///
/// The closed set of in-transaction commands; the engine dispatches on the
/// variant instead of virtual per-command overrides.
#[derive(Debug)]
pub enum CardCommand {
    /// READ RECORDS
    ReadRecords(ReadRecordsCmd),
    /// UPDATE RECORD
    UpdateRecord(UpdateRecordCmd),
    /// APPEND RECORD
    AppendRecord(AppendRecordCmd),
    /// SV DEBIT or SV UNDEBIT (two-phase, SAM co-signed)
    SvDebit(SvDebitCmd),
    /// SV RELOAD (two-phase, SAM co-signed)
    SvReload(SvReloadCmd),
}

impl CardCommand {
    /// The command kind
    pub const fn command_ref(&self) -> CommandRef {
        match self {
            Self::ReadRecords(_) => CommandRef::ReadRecords,
            Self::UpdateRecord(_) => CommandRef::UpdateRecord,
            Self::AppendRecord(_) => CommandRef::AppendRecord,
            Self::SvDebit(cmd) => cmd.command_ref(),
            Self::SvReload(_) => CommandRef::SvReload,
        }
    }

    /// The finalized request frame
    ///
    /// Fails for a two-phase SV command whose SAM finalization is still
    /// pending: such a command must never reach the transport.
    pub fn request(&self) -> Result<&ApduRequest> {
        match self {
            Self::ReadRecords(cmd) => Ok(cmd.request()),
            Self::UpdateRecord(cmd) => Ok(cmd.request()),
            Self::AppendRecord(cmd) => Ok(cmd.request()),
            Self::SvDebit(cmd) => cmd.request().ok_or(Error::InvalidState(
                "SV debit command not finalized with SAM data",
            )),
            Self::SvReload(cmd) => cmd.request().ok_or(Error::InvalidState(
                "SV reload command not finalized with SAM data",
            )),
        }
    }

    /// Whether a successful execution consumes session-buffer capacity
    pub const fn uses_session_buffer(&self) -> bool {
        match self {
            Self::ReadRecords(_) => false,
            Self::UpdateRecord(_) | Self::AppendRecord(_) | Self::SvDebit(_) | Self::SvReload(_) => {
                true
            }
        }
    }

    /// Session-buffer bytes a successful execution consumes
    pub fn session_buffer_cost(&self) -> usize {
        if !self.uses_session_buffer() {
            return 0;
        }
        self.request()
            .ok()
            .and_then(|request| request.data())
            .map_or(0, <[u8]>::len)
    }

    /// MAC synchronization flavor of this command
    pub const fn sync_mode(&self) -> SyncMode {
        match self {
            Self::ReadRecords(_) => SyncMode::Deferred,
            Self::UpdateRecord(_) | Self::AppendRecord(_) | Self::SvDebit(_) | Self::SvReload(_) => {
                SyncMode::Anticipated
            }
        }
    }

    /// Check the status word and extract the command's typed output
    pub fn parse_response(&mut self, response: &ApduResponse) -> Result<()> {
        match self {
            Self::ReadRecords(cmd) => cmd.parse_response(response),
            Self::UpdateRecord(cmd) => cmd.parse_response(response),
            Self::AppendRecord(cmd) => cmd.parse_response(response),
            Self::SvDebit(cmd) => cmd.parse_response(response),
            Self::SvReload(cmd) => cmd.parse_response(response),
        }
    }
}
