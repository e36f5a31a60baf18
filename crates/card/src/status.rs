//! Status-word registry
//!
//! Maps each command's possible status words to a description and an error
//! kind. Resolution order: the command-specific table, then the base table
//! shared by all commands, then a generic "unexpected status" entry. Lookup
//! is a pure function of the tables and the status word.

use calyx_apdu_core::StatusWord;

use crate::commands::CommandRef;
use crate::error::Error;

/// Classification of a non-success status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// A parameter of the request is not accepted by the card
    IllegalParameter,
    /// The addressed data cannot be accessed as requested
    DataAccessDenied,
    /// Security conditions are not fulfilled
    SecurityConditionNotMet,
    /// Access is forbidden in the current card state
    AccessForbidden,
    /// The session modifications buffer is exhausted
    SessionBufferOverflow,
    /// The addressed file does not exist
    FileNotFound,
    /// The addressed record does not exist
    RecordNotFound,
    /// Request/response bookkeeping mismatch
    Desynchronized,
    /// A status word no table accounts for
    Unexpected,
}

/// Registry entry for one status word
#[derive(Debug, Clone, Copy)]
pub struct StatusProperties {
    /// Human-readable description of the card's verdict
    pub description: &'static str,
    /// Error kind, or `None` for success entries
    pub kind: Option<StatusKind>,
}

type Entry = (u16, StatusProperties);

const fn ok(description: &'static str) -> StatusProperties {
    StatusProperties {
        description,
        kind: None,
    }
}

const fn err(description: &'static str, kind: StatusKind) -> StatusProperties {
    StatusProperties {
        description,
        kind: Some(kind),
    }
}

/// Entries shared by every command
const BASE_TABLE: &[Entry] = &[
    (0x9000, ok("Command executed successfully")),
    (
        0x6700,
        err("Lc value not supported", StatusKind::IllegalParameter),
    ),
    (
        0x6B00,
        err("P1 or P2 value not supported", StatusKind::IllegalParameter),
    ),
    (
        0x6D00,
        err("Instruction unknown or incorrect", StatusKind::IllegalParameter),
    ),
    (
        0x6E00,
        err("Class not supported", StatusKind::IllegalParameter),
    ),
];

const OPEN_SESSION_TABLE: &[Entry] = &[
    (
        0x6700,
        err("Lc value not supported", StatusKind::IllegalParameter),
    ),
    (
        0x6900,
        err("Transaction counter is at its maximum", StatusKind::AccessForbidden),
    ),
    (
        0x6982,
        err(
            "Security conditions not fulfilled (PIN code not presented)",
            StatusKind::SecurityConditionNotMet,
        ),
    ),
    (
        0x6985,
        err(
            "Access forbidden (a session is already open or DF is invalidated)",
            StatusKind::AccessForbidden,
        ),
    ),
    (
        0x6A81,
        err("Wrong key index", StatusKind::IllegalParameter),
    ),
    (0x6A82, err("File not found", StatusKind::FileNotFound)),
    (
        0x6A83,
        err(
            "Record not found (record index is above NumRec)",
            StatusKind::RecordNotFound,
        ),
    ),
];

const CLOSE_SESSION_TABLE: &[Entry] = &[
    (
        0x6700,
        err("Lc signature length inconsistent", StatusKind::IllegalParameter),
    ),
    (
        0x6985,
        err("No session was opened", StatusKind::AccessForbidden),
    ),
    (
        0x6988,
        err("Incorrect terminal signature", StatusKind::SecurityConditionNotMet),
    ),
];

const READ_RECORDS_TABLE: &[Entry] = &[
    (
        0x6981,
        err("Command forbidden on binary files", StatusKind::DataAccessDenied),
    ),
    (
        0x6982,
        err(
            "Security conditions not fulfilled (no session, wrong key)",
            StatusKind::SecurityConditionNotMet,
        ),
    ),
    (
        0x6985,
        err(
            "Access forbidden (Never access mode, stored value log file)",
            StatusKind::AccessForbidden,
        ),
    ),
    (
        0x6986,
        err("Command not allowed (no current EF)", StatusKind::DataAccessDenied),
    ),
    (0x6A82, err("File not found", StatusKind::FileNotFound)),
    (
        0x6A83,
        err(
            "Record not found (record index is 0 or above NumRec)",
            StatusKind::RecordNotFound,
        ),
    ),
];

const UPDATE_RECORD_TABLE: &[Entry] = &[
    (
        0x6400,
        err(
            "Too many modifications in session",
            StatusKind::SessionBufferOverflow,
        ),
    ),
    (
        0x6700,
        err("Lc value not supported", StatusKind::DataAccessDenied),
    ),
    (
        0x6981,
        err(
            "Command forbidden on cyclic files when the record exists and is not record 01h",
            StatusKind::DataAccessDenied,
        ),
    ),
    (
        0x6982,
        err(
            "Security conditions not fulfilled (no session, wrong key, encryption required)",
            StatusKind::SecurityConditionNotMet,
        ),
    ),
    (
        0x6985,
        err(
            "Access forbidden (Never access mode, DF is invalidated)",
            StatusKind::AccessForbidden,
        ),
    ),
    (
        0x6986,
        err("Command not allowed (no current EF)", StatusKind::DataAccessDenied),
    ),
    (0x6A82, err("File not found", StatusKind::FileNotFound)),
    (
        0x6A83,
        err(
            "Record not found (record index is 0 or above NumRec)",
            StatusKind::RecordNotFound,
        ),
    ),
];

const APPEND_RECORD_TABLE: &[Entry] = &[
    (
        0x6400,
        err(
            "Too many modifications in session",
            StatusKind::SessionBufferOverflow,
        ),
    ),
    (
        0x6700,
        err("Lc value not supported", StatusKind::DataAccessDenied),
    ),
    (
        0x6981,
        err("The current EF is not a cyclic EF", StatusKind::DataAccessDenied),
    ),
    (
        0x6982,
        err(
            "Security conditions not fulfilled (no session, wrong key)",
            StatusKind::SecurityConditionNotMet,
        ),
    ),
    (
        0x6985,
        err(
            "Access forbidden (Never access mode, DF is invalidated)",
            StatusKind::AccessForbidden,
        ),
    ),
    (
        0x6986,
        err("Command not allowed (no current EF)", StatusKind::DataAccessDenied),
    ),
    (0x6A82, err("File not found", StatusKind::FileNotFound)),
];

const SV_OPERATION_TABLE: &[Entry] = &[
    (
        0x6400,
        err(
            "Too many modifications in session",
            StatusKind::SessionBufferOverflow,
        ),
    ),
    (
        0x6700,
        err("Lc value not supported", StatusKind::IllegalParameter),
    ),
    (
        0x6900,
        err("Transaction counter is 0", StatusKind::AccessForbidden),
    ),
    (
        0x6985,
        err(
            "Preconditions not satisfied (a session is open or SV already done)",
            StatusKind::AccessForbidden,
        ),
    ),
    (
        0x6988,
        err("Incorrect signatureHi", StatusKind::SecurityConditionNotMet),
    ),
];

const fn command_table(command: CommandRef) -> &'static [Entry] {
    match command {
        CommandRef::OpenSession => OPEN_SESSION_TABLE,
        CommandRef::CloseSession => CLOSE_SESSION_TABLE,
        CommandRef::ReadRecords => READ_RECORDS_TABLE,
        CommandRef::UpdateRecord => UPDATE_RECORD_TABLE,
        CommandRef::AppendRecord => APPEND_RECORD_TABLE,
        CommandRef::SvDebit | CommandRef::SvUndebit | CommandRef::SvReload => SV_OPERATION_TABLE,
    }
}

fn scan(table: &'static [Entry], status: StatusWord) -> Option<&'static StatusProperties> {
    table
        .iter()
        .find(|(sw, _)| *sw == status.to_u16())
        .map(|(_, properties)| properties)
}

/// Resolve a status word for a command
///
/// Falls back to the base table, then to a generic `Unexpected` entry.
pub fn lookup(command: CommandRef, status: StatusWord) -> StatusProperties {
    scan(command_table(command), status)
        .or_else(|| scan(BASE_TABLE, status))
        .copied()
        .unwrap_or(StatusProperties {
            description: "Unexpected status word",
            kind: Some(StatusKind::Unexpected),
        })
}

/// Check a status word, turning non-success entries into [`Error::Command`]
pub fn check(command: CommandRef, status: StatusWord) -> Result<(), Error> {
    let properties = lookup(command, status);
    match properties.kind {
        None => Ok(()),
        Some(kind) => Err(Error::Command {
            command,
            status,
            kind,
            description: properties.description,
        }),
    }
}
