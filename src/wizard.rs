//! Wizard codes: five-segment hierarchical taxonomy addresses
//!
//! A wizard code is five underscore-joined 5-digit segments, 29 characters
//! total, e.g. `01000_00100_01000_00100_00800`. Segment *i* equal to `00000`
//! means "unspecified below level *i*".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of segments in a wizard code
pub const SEGMENTS: usize = 5;

/// Digits per segment
pub const SEGMENT_LEN: usize = 5;

/// Total string length: five segments plus four separators
pub const WIZARD_LEN: usize = SEGMENTS * SEGMENT_LEN + (SEGMENTS - 1);

/// The zero segment used to blank out unspecified levels
pub const ZERO_SEGMENT: &str = "00000";

/// A validated five-segment taxonomy code.
///
/// Stored as the canonical 29-character string; segment access works on
/// fixed offsets, so parsing validates shape once up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WizardCode(String);

impl WizardCode {
    /// The all-zero sentinel recorded for insufficient-information outcomes.
    pub fn flagged() -> Self {
        WizardCode("00000_00000_00000_00000_00000".to_string())
    }

    /// Parse and validate a wizard code string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != WIZARD_LEN {
            return Err(Error::InvalidInput(format!(
                "wizard code must be {} characters, got {:?}",
                WIZARD_LEN, s
            )));
        }
        for (i, part) in s.split('_').enumerate() {
            if i >= SEGMENTS {
                return Err(Error::InvalidInput(format!(
                    "wizard code has too many segments: {:?}",
                    s
                )));
            }
            if part.len() != SEGMENT_LEN || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidInput(format!(
                    "wizard segment {} is not 5 digits: {:?}",
                    i + 1,
                    s
                )));
            }
        }
        if s.split('_').count() != SEGMENTS {
            return Err(Error::InvalidInput(format!(
                "wizard code must have {} segments: {:?}",
                SEGMENTS, s
            )));
        }
        Ok(WizardCode(s.to_string()))
    }

    /// Build a code from five segments.
    pub fn from_segments(segments: [&str; SEGMENTS]) -> Result<Self> {
        Self::parse(&segments.join("_"))
    }

    /// Segment at zero-based `level` (0 = top level).
    pub fn segment(&self, level: usize) -> &str {
        let start = level * (SEGMENT_LEN + 1);
        &self.0[start..start + SEGMENT_LEN]
    }

    /// The top-level segment, used as the level1 id.
    pub fn level1_id(&self) -> &str {
        self.segment(0)
    }

    /// Truncate to the first `depth` segments, zero-filling the rest.
    pub fn truncated_to(&self, depth: usize) -> WizardCode {
        let mut parts: Vec<&str> = Vec::with_capacity(SEGMENTS);
        for i in 0..SEGMENTS {
            if i < depth {
                parts.push(self.segment(i));
            } else {
                parts.push(ZERO_SEGMENT);
            }
        }
        WizardCode(parts.join("_"))
    }

    /// True if this is the all-zero insufficient-information sentinel.
    pub fn is_flagged(&self) -> bool {
        *self == Self::flagged()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WizardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WizardCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        WizardCode::parse(&value)
    }
}

impl From<WizardCode> for String {
    fn from(value: WizardCode) -> Self {
        value.0
    }
}
