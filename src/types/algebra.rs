//! Constraint algebra: two totally ordered trust-strength scales.
//!
//! ```text
//! EdgeOperator:  I2I > DI2I > NI2I > ANY
//! StrengthLevel: TEL_ANCHORED > KEL_ANCHORED > SAID_ONLY > ANY
//! ```
//!
//! Both scales follow the same rule: `a` satisfies `b` iff `rank(a) >= rank(b)`.
//! Ranks are explicit per variant so adding a variant forces every `match`
//! to be revisited.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Relationship constraint on an issuer→subject credential edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOperator {
    /// Issuer-to-Issuer: child issuer is the parent subject.
    #[serde(rename = "I2I")]
    I2i,
    /// Delegated-Issuer-to-Issuer: child issuer is in the delegation chain.
    #[serde(rename = "DI2I")]
    Di2i,
    /// Non-Issuer-to-Issuer: third-party attestation.
    #[serde(rename = "NI2I")]
    Ni2i,
    /// No relationship constraint.
    #[serde(rename = "ANY")]
    Any,
}

impl EdgeOperator {
    /// All operators, strongest first.
    pub const ALL: [EdgeOperator; 4] = [Self::I2i, Self::Di2i, Self::Ni2i, Self::Any];

    /// Position in the total order (higher = stronger).
    pub fn rank(self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Ni2i => 1,
            Self::Di2i => 2,
            Self::I2i => 3,
        }
    }

    /// Wire code, e.g. `"DI2I"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::I2i => "I2I",
            Self::Di2i => "DI2I",
            Self::Ni2i => "NI2I",
            Self::Any => "ANY",
        }
    }

    /// Whether this operator is at least as strong as `required`.
    pub fn satisfies(self, required: EdgeOperator) -> bool {
        operator_satisfies(self, required)
    }
}

impl PartialOrd for EdgeOperator {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeOperator {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Default for EdgeOperator {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for EdgeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EdgeOperator {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('@') {
            "I2I" => Ok(Self::I2i),
            "DI2I" => Ok(Self::Di2i),
            "NI2I" => Ok(Self::Ni2i),
            "ANY" => Ok(Self::Any),
            other => Err(ParseEnumError::new("edge operator", other)),
        }
    }
}

/// Verification strength achieved for an artifact operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrengthLevel {
    /// No verification.
    Any,
    /// Content integrity via SAID.
    SaidOnly,
    /// Signature plus key-state verification.
    KelAnchored,
    /// Full credential chain anchored in a TEL.
    TelAnchored,
}

impl StrengthLevel {
    /// All levels, strongest first.
    pub const ALL: [StrengthLevel; 4] = [
        Self::TelAnchored,
        Self::KelAnchored,
        Self::SaidOnly,
        Self::Any,
    ];

    /// Position in the total order (higher = stronger).
    pub fn rank(self) -> u8 {
        match self {
            Self::Any => 0,
            Self::SaidOnly => 1,
            Self::KelAnchored => 2,
            Self::TelAnchored => 3,
        }
    }

    /// Wire code, e.g. `"KEL_ANCHORED"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::SaidOnly => "SAID_ONLY",
            Self::KelAnchored => "KEL_ANCHORED",
            Self::TelAnchored => "TEL_ANCHORED",
        }
    }

    /// Whether this level is at least as strong as `required`.
    pub fn satisfies(self, required: StrengthLevel) -> bool {
        strength_satisfies(self, required)
    }
}

impl PartialOrd for StrengthLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StrengthLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Default for StrengthLevel {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StrengthLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANY" => Ok(Self::Any),
            "SAID_ONLY" | "SAID" => Ok(Self::SaidOnly),
            "KEL_ANCHORED" | "KEL" => Ok(Self::KelAnchored),
            "TEL_ANCHORED" | "TEL" => Ok(Self::TelAnchored),
            _ => Err(ParseEnumError::new("strength level", s)),
        }
    }
}

/// `actual` satisfies `required` iff it is equal or stronger.
pub fn operator_satisfies(actual: EdgeOperator, required: EdgeOperator) -> bool {
    actual.rank() >= required.rank()
}

/// `actual` satisfies `required` iff it is equal or stronger.
pub fn strength_satisfies(actual: StrengthLevel, required: StrengthLevel) -> bool {
    actual.rank() >= required.rank()
}

/// Human-readable name for an edge operator.
pub fn operator_name(op: EdgeOperator) -> &'static str {
    match op {
        EdgeOperator::I2i => "Issuer-to-Issuer",
        EdgeOperator::Di2i => "Delegated-Issuer-to-Issuer",
        EdgeOperator::Ni2i => "Non-Issuer-to-Issuer",
        EdgeOperator::Any => "Any",
    }
}

/// Human-readable name for a strength level.
pub fn strength_name(level: StrengthLevel) -> &'static str {
    match level {
        StrengthLevel::Any => "Any",
        StrengthLevel::SaidOnly => "SAID-Only",
        StrengthLevel::KelAnchored => "KEL-Anchored",
        StrengthLevel::TelAnchored => "TEL-Anchored",
    }
}
