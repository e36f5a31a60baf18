//! Constants of the Calypso command referential
//!
//! CLA bytes and instruction codes. Status words live in the registry
//! tables of [`crate::status`].

/// Command classes
pub mod cla {
    /// ISO addressing class
    pub const ISO: u8 = 0x00;
    /// Legacy Calypso addressing class
    pub const LEGACY: u8 = 0x94;
}

/// Instruction codes
pub mod ins {
    /// OPEN SECURE SESSION (revision 3)
    pub const OPEN_SESSION: u8 = 0x8A;
    /// CLOSE SECURE SESSION
    pub const CLOSE_SESSION: u8 = 0x8E;
    /// READ RECORDS
    pub const READ_RECORDS: u8 = 0xB2;
    /// UPDATE RECORD
    pub const UPDATE_RECORD: u8 = 0xDC;
    /// APPEND RECORD
    pub const APPEND_RECORD: u8 = 0xE2;
    /// SV RELOAD
    pub const SV_RELOAD: u8 = 0xB8;
    /// SV DEBIT
    pub const SV_DEBIT: u8 = 0xBA;
    /// SV UNDEBIT
    pub const SV_UNDEBIT: u8 = 0xBC;
}

/// The success response frame assumed by anticipated MAC synchronization
pub const APDU_RESPONSE_9000: [u8; 2] = [0x90, 0x00];
