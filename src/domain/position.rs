//! Player position labels derived from upstream element type codes.

use serde::{Deserialize, Serialize};

/// Playing position of an FPL element.
///
/// Upstream encodes positions as small integer codes. Codes outside the
/// known table map to [`Position::Unknown`] rather than failing the read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GKP")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "FWD")]
    Forward,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Position {
    /// Map an upstream `element_type` code to a position label. Total over
    /// all inputs: unrecognised codes become `Unknown`.
    pub fn from_element_type(code: i64) -> Self {
        match code {
            1 => Position::Goalkeeper,
            2 => Position::Defender,
            3 => Position::Midfielder,
            4 => Position::Forward,
            _ => Position::Unknown,
        }
    }

    /// Parse a short label. Returns `None` for anything outside the four
    /// known positions; `Unknown` is not addressable by filter.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "GKP" => Some(Position::Goalkeeper),
            "DEF" => Some(Position::Defender),
            "MID" => Some(Position::Midfielder),
            "FWD" => Some(Position::Forward),
            _ => None,
        }
    }

    /// The short label used in cache keys and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GKP",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
            Position::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
