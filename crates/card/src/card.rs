//! Calypso card model
//!
//! Static facts about the card a transaction runs against: which class byte
//! it expects, its revision (which drives signature lengths and extended-mode
//! framing), and its declared modifications-buffer capacity.

/// Addressing class of the card
///
/// Legacy cards use the proprietary 94h class byte; revision 3 cards use the
/// ISO class byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardClass {
    /// ISO addressing mode (CLA = 00h)
    Iso,
    /// Legacy addressing mode (CLA = 94h)
    Legacy,
}

impl CardClass {
    /// The CLA byte for this addressing mode
    pub const fn value(self) -> u8 {
        match self {
            Self::Iso => crate::constants::cla::ISO,
            Self::Legacy => crate::constants::cla::LEGACY,
        }
    }
}

/// Calypso product revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CardRevision {
    /// Revision 2.4 (legacy)
    Rev2_4,
    /// Revision 3.1
    Rev3_1,
    /// Revision 3.2 (extended signatures)
    Rev3_2,
}

impl CardRevision {
    /// Length of the signature half exchanged during SV operations
    ///
    /// Revision 3.2 cards use a 10-byte signature, earlier revisions 5 bytes.
    pub const fn sv_signature_length(self) -> usize {
        match self {
            Self::Rev3_2 => 10,
            _ => 5,
        }
    }
}

/// Immutable description of the card bound to a transaction
#[derive(Debug, Clone)]
pub struct CalypsoCard {
    card_class: CardClass,
    revision: CardRevision,
    extended_mode: bool,
    modifications_buffer_size: usize,
}

impl CalypsoCard {
    /// Describe a card
    ///
    /// `modifications_buffer_size` is the session-buffer capacity in bytes as
    /// declared by the card's startup information.
    pub const fn new(
        card_class: CardClass,
        revision: CardRevision,
        extended_mode: bool,
        modifications_buffer_size: usize,
    ) -> Self {
        Self {
            card_class,
            revision,
            extended_mode,
            modifications_buffer_size,
        }
    }

    /// The card's addressing class
    pub const fn card_class(&self) -> CardClass {
        self.card_class
    }

    /// The card's revision
    pub const fn revision(&self) -> CardRevision {
        self.revision
    }

    /// Whether the extended session mode is supported and enabled
    pub const fn is_extended_mode_supported(&self) -> bool {
        self.extended_mode
    }

    /// Declared session-buffer capacity in bytes
    pub const fn modifications_buffer_size(&self) -> usize {
        self.modifications_buffer_size
    }

    /// Length of the session challenge expected by this card
    pub const fn challenge_length(&self) -> usize {
        if self.extended_mode { 8 } else { 4 }
    }

    /// Length of each session signature half
    pub const fn session_signature_length(&self) -> usize {
        if self.extended_mode { 8 } else { 4 }
    }
}

/// Security settings for a transaction
#[derive(Debug, Clone, Copy, Default)]
pub struct SecuritySettings {
    encryption: bool,
    ratify_on_close: bool,
}

impl SecuritySettings {
    /// Settings with neither encryption nor immediate ratification
    pub const fn new() -> Self {
        Self {
            encryption: false,
            ratify_on_close: false,
        }
    }

    /// Mandate encryption of every in-session command
    pub const fn with_encryption(mut self) -> Self {
        self.encryption = true;
        self
    }

    /// Ask the card to ratify the session as part of the close command
    pub const fn with_ratification_on_close(mut self) -> Self {
        self.ratify_on_close = true;
        self
    }

    /// Whether in-session commands must be encrypted
    pub const fn is_encryption_required(&self) -> bool {
        self.encryption
    }

    /// Whether the close command requests immediate ratification
    pub const fn is_ratification_on_close(&self) -> bool {
        self.ratify_on_close
    }
}
