//! Cardinal rules: minimum verification strength per artifact operation.
//!
//! Each (artifact type, operation) pair maps to one [`StrengthLevel`]. An
//! operation passes when `actual >= min_strength`. A pair with no rule is
//! ungoverned and passes.
//!
//! | type | register | rotate | deprecate | revoke | verify | resolve | execute |
//! |------|----------|--------|-----------|--------|--------|---------|---------|
//! | alg  | TEL      | KEL    | KEL       | TEL    | SAID   | ANY     | SAID    |
//! | sch  | TEL      | TEL    | KEL       | TEL    | SAID   | ANY     | -       |
//! | pro  | TEL      | KEL    | KEL       | TEL    | SAID   | ANY     | -       |
//! | pkg  | TEL      | TEL    | KEL       | TEL    | SAID   | ANY     | KEL     |
//! | run  | TEL      | KEL    | KEL       | TEL    | SAID   | ANY     | KEL     |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::types::algebra::{strength_satisfies, ParseEnumError, StrengthLevel};

/// Governed artifact class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Algorithms (cryptographic, hashing, KDF).
    Alg,
    /// Credential schemas.
    Sch,
    /// Protocols.
    Pro,
    /// Software packages.
    Pkg,
    /// Execution runtimes.
    Run,
}

impl ArtifactType {
    /// All artifact types.
    pub const ALL: [ArtifactType; 5] = [Self::Alg, Self::Sch, Self::Pro, Self::Pkg, Self::Run];

    /// Short code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Alg => "alg",
            Self::Sch => "sch",
            Self::Pro => "pro",
            Self::Pkg => "pkg",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ArtifactType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("artifact type", s))
    }
}

/// Artifact lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// First registration.
    Register,
    /// Version rotation under the same identity.
    Rotate,
    /// Deprecation in favour of a successor.
    Deprecate,
    /// Hard revocation.
    Revoke,
    /// Integrity and status verification.
    Verify,
    /// Identifier resolution.
    Resolve,
    /// Use or execution.
    Execute,
}

impl Operation {
    /// All operations in lifecycle order.
    pub const ALL: [Operation; 7] = [
        Self::Register,
        Self::Rotate,
        Self::Deprecate,
        Self::Revoke,
        Self::Verify,
        Self::Resolve,
        Self::Execute,
    ];

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Rotate => "rotate",
            Self::Deprecate => "deprecate",
            Self::Revoke => "revoke",
            Self::Verify => "verify",
            Self::Resolve => "resolve",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("operation", s))
    }
}

/// Minimum strength for one operation on one artifact type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalRule {
    /// Governed artifact type.
    pub artifact_type: ArtifactType,
    /// Governed operation.
    pub operation: Operation,
    /// Minimum strength.
    pub min_strength: StrengthLevel,
    /// Why this strength is required.
    #[serde(default)]
    pub rationale: String,
}

impl CardinalRule {
    /// Create a rule.
    pub fn new(
        artifact_type: ArtifactType,
        operation: Operation,
        min_strength: StrengthLevel,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            artifact_type,
            operation,
            min_strength,
            rationale: rationale.into(),
        }
    }
}

/// Cardinal rules indexed by (artifact type, operation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardinalRuleSet {
    rules: BTreeMap<(ArtifactType, Operation), CardinalRule>,
}

impl CardinalRuleSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for its pair.
    pub fn add(&mut self, rule: CardinalRule) {
        self.rules.insert((rule.artifact_type, rule.operation), rule);
    }

    /// Rule for a pair.
    pub fn get(&self, artifact_type: ArtifactType, operation: Operation) -> Option<&CardinalRule> {
        self.rules.get(&(artifact_type, operation))
    }

    /// Whether a pair is governed.
    pub fn contains(&self, artifact_type: ArtifactType, operation: Operation) -> bool {
        self.rules.contains_key(&(artifact_type, operation))
    }

    /// Rules for one artifact type, in operation order.
    pub fn rules_for_type(&self, artifact_type: ArtifactType) -> impl Iterator<Item = &CardinalRule> {
        self.rules
            .range((artifact_type, Operation::Register)..=(artifact_type, Operation::Execute))
            .map(|(_, rule)| rule)
    }

    /// All rules.
    pub fn all_rules(&self) -> impl Iterator<Item = &CardinalRule> {
        self.rules.values()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<CardinalRule> for CardinalRuleSet {
    fn from_iter<I: IntoIterator<Item = CardinalRule>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.add(rule);
        }
        set
    }
}

/// Outcome of one cardinal check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardinalCheckResult {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Governing rule, if any.
    pub rule: Option<CardinalRule>,
    /// Strength achieved.
    pub actual_strength: StrengthLevel,
    /// Explanation.
    pub message: String,
}

/// Evaluates artifact operations against a rule set.
#[derive(Debug, Clone)]
pub struct CardinalChecker {
    ruleset: CardinalRuleSet,
}

impl Default for CardinalChecker {
    fn default() -> Self {
        Self::new(default_cardinal_rules())
    }
}

impl CardinalChecker {
    /// Checker over `ruleset`.
    pub fn new(ruleset: CardinalRuleSet) -> Self {
        Self { ruleset }
    }

    /// The rule set.
    pub fn ruleset(&self) -> &CardinalRuleSet {
        &self.ruleset
    }

    /// Check one operation.
    pub fn check(
        &self,
        artifact_type: ArtifactType,
        operation: Operation,
        actual_strength: StrengthLevel,
    ) -> CardinalCheckResult {
        let Some(rule) = self.ruleset.get(artifact_type, operation) else {
            return CardinalCheckResult {
                allowed: true,
                rule: None,
                actual_strength,
                message: format!("No cardinal rule for {}:{}", artifact_type, operation),
            };
        };

        let allowed = strength_satisfies(actual_strength, rule.min_strength);
        let message = if allowed {
            format!(
                "{} on {}: {} meets {}",
                operation, artifact_type, actual_strength, rule.min_strength
            )
        } else {
            format!(
                "{} on {} requires {} but has {}",
                operation, artifact_type, rule.min_strength, actual_strength
            )
        };
        debug!(artifact = %artifact_type, operation = %operation, allowed, "cardinal check");

        CardinalCheckResult {
            allowed,
            rule: Some(rule.clone()),
            actual_strength,
            message,
        }
    }

    /// Check every governed operation of one artifact type.
    pub fn check_all(
        &self,
        artifact_type: ArtifactType,
        actual_strength: StrengthLevel,
    ) -> BTreeMap<Operation, CardinalCheckResult> {
        self.ruleset
            .rules_for_type(artifact_type)
            .map(|rule| {
                (
                    rule.operation,
                    self.check(artifact_type, rule.operation, actual_strength),
                )
            })
            .collect()
    }
}

/// The standard table for all five artifact types.
pub fn default_cardinal_rules() -> CardinalRuleSet {
    use ArtifactType::*;
    use Operation::*;
    use StrengthLevel::{Any, KelAnchored as Kel, SaidOnly as Said, TelAnchored as Tel};

    let table: [(ArtifactType, &[(Operation, StrengthLevel, &str)]); 5] = [
        (
            Alg,
            &[
                (Register, Tel, "a trust root needs the full credential chain"),
                (Rotate, Kel, "a new version needs a key-state verified signature"),
                (Deprecate, Kel, "deprecation needs the controller's current keys"),
                (Revoke, Tel, "revocation must be recorded in the registry"),
                (Verify, Said, "integrity needs only the content digest"),
                (Resolve, Any, "lookup is unrestricted"),
                (Execute, Said, "executing needs the content to match its digest"),
            ],
        ),
        (
            Sch,
            &[
                (Register, Tel, "schemas anchor every credential issued under them"),
                (Rotate, Tel, "schema changes affect every issuer"),
                (Deprecate, Kel, "deprecation needs the controller's current keys"),
                (Revoke, Tel, "revocation must be recorded in the registry"),
                (Verify, Said, "integrity needs only the content digest"),
                (Resolve, Any, "lookup is unrestricted"),
            ],
        ),
        (
            Pro,
            &[
                (Register, Tel, "protocols need a registered trust root"),
                (Rotate, Kel, "a new version needs a key-state verified signature"),
                (Deprecate, Kel, "deprecation needs the controller's current keys"),
                (Revoke, Tel, "revocation must be recorded in the registry"),
                (Verify, Said, "integrity needs only the content digest"),
                (Resolve, Any, "lookup is unrestricted"),
            ],
        ),
        (
            Pkg,
            &[
                (Register, Tel, "supply-chain entry needs the full credential chain"),
                (Rotate, Tel, "every release must be registered"),
                (Deprecate, Kel, "deprecation needs the maintainer's current keys"),
                (Revoke, Tel, "revocation must be recorded in the registry"),
                (Verify, Said, "integrity needs only the content digest"),
                (Resolve, Any, "lookup is unrestricted"),
                (Execute, Kel, "installing code needs a signed release"),
            ],
        ),
        (
            Run,
            &[
                (Register, Tel, "runtimes need a registered trust root"),
                (Rotate, Kel, "a new version needs a key-state verified signature"),
                (Deprecate, Kel, "deprecation needs the controller's current keys"),
                (Revoke, Tel, "revocation must be recorded in the registry"),
                (Verify, Said, "integrity needs only the content digest"),
                (Resolve, Any, "lookup is unrestricted"),
                (Execute, Kel, "running code needs a signed runtime"),
            ],
        ),
    ];

    table
        .into_iter()
        .flat_map(|(artifact, rows)| {
            rows.iter()
                .map(move |&(op, strength, why)| CardinalRule::new(artifact, op, strength, why))
        })
        .collect()
}
