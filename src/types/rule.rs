//! Rule and authorization-matrix records.
//!
//! The serde shape of these types is the shape of the `rules[]` and
//! `credential_matrix[]` entries inside a governance framework credential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::algebra::EdgeOperator;

/// How a failing rule affects the overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEnforcement {
    /// A failure denies the edge.
    #[serde(alias = "STRICT")]
    Strict,
    /// A failure is reported but never blocks.
    #[serde(alias = "ADVISORY")]
    Advisory,
}

impl Default for RuleEnforcement {
    fn default() -> Self {
        Self::Strict
    }
}

impl fmt::Display for RuleEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Advisory => write!(f, "advisory"),
        }
    }
}

/// One declarative constraint inside a governance framework.
///
/// `field_constraints` maps a label to a single comparison expression;
/// every entry must hold for the rule to pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRule {
    /// Unique name within the framework.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Edge type this rule governs (exact match).
    pub applies_to: String,
    /// Minimum operator the edge must declare.
    #[serde(default)]
    pub required_operator: EdgeOperator,
    /// Label → expression source.
    #[serde(default)]
    pub field_constraints: BTreeMap<String, String>,
    /// Maximum delegation chain depth, if limited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delegation_depth: Option<u32>,
    /// Enforcement level.
    #[serde(default)]
    pub enforcement: RuleEnforcement,
}

impl ConstraintRule {
    /// Create a strict rule with no field constraints.
    pub fn new(
        name: impl Into<String>,
        applies_to: impl Into<String>,
        required_operator: EdgeOperator,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            applies_to: applies_to.into(),
            required_operator,
            field_constraints: BTreeMap::new(),
            max_delegation_depth: None,
            enforcement: RuleEnforcement::Strict,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a field constraint.
    pub fn with_field_constraint(
        mut self,
        label: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.field_constraints.insert(label.into(), expression.into());
        self
    }

    /// Limit the delegation depth.
    pub fn with_max_delegation_depth(mut self, depth: u32) -> Self {
        self.max_delegation_depth = Some(depth);
        self
    }

    /// Set the enforcement level.
    pub fn with_enforcement(mut self, enforcement: RuleEnforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// Whether this rule governs `edge_type`.
    pub fn applies(&self, edge_type: &str) -> bool {
        self.applies_to == edge_type
    }

    /// Whether a failure of this rule denies the edge.
    pub fn is_strict(&self) -> bool {
        self.enforcement == RuleEnforcement::Strict
    }
}

/// One cell of a role × action authorization grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialMatrixEntry {
    /// Action name (e.g. `issue`).
    pub action: String,
    /// Role name (e.g. `QVI`).
    pub role: String,
    /// Minimum operator for this cell.
    #[serde(default)]
    pub required_operator: EdgeOperator,
    /// Whether the role may perform the action at all.
    #[serde(default = "default_allowed")]
    pub allowed: bool,
}

fn default_allowed() -> bool {
    true
}

impl CredentialMatrixEntry {
    /// Create an allowed cell.
    pub fn allow(
        action: impl Into<String>,
        role: impl Into<String>,
        required_operator: EdgeOperator,
    ) -> Self {
        Self {
            action: action.into(),
            role: role.into(),
            required_operator,
            allowed: true,
        }
    }

    /// Create a denied cell.
    pub fn deny(action: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            role: role.into(),
            required_operator: EdgeOperator::Any,
            allowed: false,
        }
    }
}
