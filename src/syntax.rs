//! EDI transmission syntax classification.

use serde::Serialize;

/// Transmission syntaxes recognised by the format detector.
///
/// `FuzzyX12` marks a stream whose `ISA` sender/receiver fields are
/// short-padded but which is otherwise structurally valid X12; it behaves
/// as X12 everywhere downstream while signalling degraded confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyntaxKind {
    /// ANSI X12 (`ISA`…`IEA`).
    X12,
    /// UN/EDIFACT (`UNB`…`UNZ`).
    Edifact,
    /// TRADACOMS (`STX`…`END`).
    Tradacoms,
    /// X12 with tolerated short sender/receiver fields.
    FuzzyX12,
    /// Not a recognised EDI syntax.
    Unknown,
}

impl SyntaxKind {
    /// True for both strict and fuzzy X12.
    #[must_use]
    pub const fn is_x12(self) -> bool { matches!(self, Self::X12 | Self::FuzzyX12) }

    /// True for EDIFACT.
    #[must_use]
    pub const fn is_edifact(self) -> bool { matches!(self, Self::Edifact) }

    /// True for TRADACOMS.
    #[must_use]
    pub const fn is_tradacoms(self) -> bool { matches!(self, Self::Tradacoms) }

    /// Name of the segment that closes an interchange in this syntax.
    #[must_use]
    pub const fn closing_segment(self) -> Option<&'static str> {
        match self {
            Self::X12 | Self::FuzzyX12 => Some("IEA"),
            Self::Edifact => Some("UNZ"),
            Self::Tradacoms => Some("END"),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X12 => f.write_str("X12"),
            Self::Edifact => f.write_str("EDIFACT"),
            Self::Tradacoms => f.write_str("TRADACOMS"),
            Self::FuzzyX12 => f.write_str("FuzzyX12"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}
