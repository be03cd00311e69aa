//! Reusable rule and matrix templates.
//!
//! Each factory returns plain [`ConstraintRule`] / [`CredentialMatrixEntry`]
//! records, so patterns compose by concatenation:
//!
//! ```
//! use keri_governance::patterns::{delegation_depth, jurisdiction_match};
//! use keri_governance::{EdgeOperator, RuleEnforcement};
//!
//! let rules = [
//!     jurisdiction_match("iss", "jurisdiction", "country", RuleEnforcement::Strict),
//!     delegation_depth("delegate", 3, EdgeOperator::Di2i, RuleEnforcement::Strict),
//! ]
//! .concat();
//! assert_eq!(rules.len(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::types::algebra::EdgeOperator;
use crate::types::framework::{Authorities, FrameworkDraft};
use crate::types::rule::{ConstraintRule, CredentialMatrixEntry, RuleEnforcement};

/// Issuer attribute compared by [`jurisdiction_match`] in the standard framework.
pub const DEFAULT_ISSUER_JURISDICTION_FIELD: &str = "jurisdiction";
/// Subject attribute compared by [`jurisdiction_match`] in the standard framework.
pub const DEFAULT_SUBJECT_JURISDICTION_FIELD: &str = "country";
/// Subject attribute holding the issuance date.
pub const DEFAULT_FRESHNESS_FIELD: &str = "issuance_date";
/// Subject attribute holding the expiry date.
pub const DEFAULT_EXPIRY_FIELD: &str = "expiry_date";

/// Issuer and subject must agree on jurisdiction.
pub fn jurisdiction_match(
    applies_to: &str,
    issuer_field: &str,
    subject_field: &str,
    enforcement: RuleEnforcement,
) -> Vec<ConstraintRule> {
    vec![ConstraintRule::new("jurisdiction-match", applies_to, EdgeOperator::Di2i)
        .with_description(format!("Issuer {} must match subject {}", issuer_field, subject_field))
        .with_field_constraint(
            "jurisdiction",
            format!("$issuer.{} == $subject.{}", issuer_field, subject_field),
        )
        .with_enforcement(enforcement)]
}

/// Cap the delegation chain length.
pub fn delegation_depth(
    applies_to: &str,
    max_depth: u32,
    required_operator: EdgeOperator,
    enforcement: RuleEnforcement,
) -> Vec<ConstraintRule> {
    vec![ConstraintRule::new("delegation-depth-limit", applies_to, required_operator)
        .with_description(format!("Delegation chain must not exceed depth {}", max_depth))
        .with_max_delegation_depth(max_depth)
        .with_enforcement(enforcement)]
}

/// One minimum-operator rule per edge type.
pub fn operator_floor(
    edge_types: &[&str],
    minimum: EdgeOperator,
    enforcement: RuleEnforcement,
) -> Vec<ConstraintRule> {
    edge_types
        .iter()
        .map(|edge_type| {
            ConstraintRule::new(format!("operator-floor-{}", edge_type), *edge_type, minimum)
                .with_description(format!("Edge '{}' requires at least @{} operator", edge_type, minimum))
                .with_enforcement(enforcement)
        })
        .collect()
}

/// Full role × action grid.
///
/// Cells are emitted action-major. `denied` cells are `allowed = false`
/// with operator `ANY`; `overrides` replace `default_operator` for a cell.
/// Both are keyed by `(action, role)`.
pub fn role_action_matrix(
    roles: &[&str],
    actions: &[&str],
    default_operator: EdgeOperator,
    denied: &BTreeSet<(&str, &str)>,
    overrides: &BTreeMap<(&str, &str), EdgeOperator>,
) -> Vec<CredentialMatrixEntry> {
    let mut entries = Vec::with_capacity(roles.len() * actions.len());
    for &action in actions {
        for &role in roles {
            let key = (action, role);
            let entry = if denied.contains(&key) {
                CredentialMatrixEntry::deny(action, role)
            } else {
                let operator = overrides.get(&key).copied().unwrap_or(default_operator);
                CredentialMatrixEntry::allow(action, role, operator)
            };
            entries.push(entry);
        }
    }
    entries
}

/// Expiry in the future (with `enforcement`) and an issuance date present
/// (always advisory).
pub fn temporal_validity(
    applies_to: &str,
    freshness_field: &str,
    expiry_field: &str,
    enforcement: RuleEnforcement,
) -> Vec<ConstraintRule> {
    vec![
        ConstraintRule::new("temporal-not-expired", applies_to, EdgeOperator::Any)
            .with_description(format!("Credential {} must be in the future", expiry_field))
            .with_field_constraint("expiry", format!("$subject.{} > $now.timestamp", expiry_field))
            .with_enforcement(enforcement),
        ConstraintRule::new("temporal-freshness", applies_to, EdgeOperator::Any)
            .with_description(format!("Credential {} must exist", freshness_field))
            .with_field_constraint("freshness", format!("$subject.{} != \"\"", freshness_field))
            .with_enforcement(RuleEnforcement::Advisory),
    ]
}

/// Operator requirements along a trust chain, root to leaf.
///
/// The first edge gets `root`, the last `leaf`, everything between
/// `intermediate`. A single-edge chain is all root.
pub fn chain_integrity(
    chain_edges: &[&str],
    root: EdgeOperator,
    intermediate: EdgeOperator,
    leaf: EdgeOperator,
) -> Vec<ConstraintRule> {
    let last = chain_edges.len().saturating_sub(1);
    chain_edges
        .iter()
        .enumerate()
        .map(|(i, edge_type)| {
            let (position, operator) = match i {
                0 => ("root", root),
                i if i == last => ("leaf", leaf),
                _ => ("intermediate", intermediate),
            };
            ConstraintRule::new(format!("chain-{}-{}", position, edge_type), *edge_type, operator)
                .with_description(format!("Chain {} edge '{}' requires @{}", position, edge_type, operator))
        })
        .collect()
}

/// Rules, matrix and authorities of a composed framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFramework {
    /// Composed rules.
    pub rules: Vec<ConstraintRule>,
    /// Authorization grid.
    pub credential_matrix: Vec<CredentialMatrixEntry>,
    /// Role descriptions.
    pub authorities: Authorities,
}

impl StandardFramework {
    /// Draft a framework credential from this content.
    pub fn into_draft(self, name: impl Into<String>, version: impl Into<String>) -> FrameworkDraft {
        FrameworkDraft::new(name, version)
            .with_rules(self.rules)
            .with_matrix(self.credential_matrix)
            .with_authorities(self.authorities)
    }
}

/// vLEI-style framework: GLEIF → QVI → LE.
///
/// ```text
/// GLEIF -[@I2I]-> QVI -[@DI2I]-> LE -[@NI2I]-> ...
/// ```
pub fn vlei_standard_framework() -> StandardFramework {
    const CHAIN: [&str; 3] = ["gleif_auth", "qvi_issue", "le_assign"];

    let rules = [
        jurisdiction_match(
            "qvi_issue",
            DEFAULT_ISSUER_JURISDICTION_FIELD,
            DEFAULT_SUBJECT_JURISDICTION_FIELD,
            RuleEnforcement::Strict,
        ),
        delegation_depth("delegate", 3, EdgeOperator::Di2i, RuleEnforcement::Strict),
        operator_floor(&CHAIN, EdgeOperator::Di2i, RuleEnforcement::Strict),
        chain_integrity(&CHAIN, EdgeOperator::I2i, EdgeOperator::Di2i, EdgeOperator::Ni2i),
        temporal_validity(
            "qvi_issue",
            DEFAULT_FRESHNESS_FIELD,
            DEFAULT_EXPIRY_FIELD,
            RuleEnforcement::Strict,
        ),
    ]
    .concat();

    let denied = BTreeSet::from([("issue", "LE"), ("delegate", "LE")]);
    let overrides = BTreeMap::from([
        (("issue", "GLEIF"), EdgeOperator::I2i),
        (("revoke", "GLEIF"), EdgeOperator::I2i),
        (("delegate", "GLEIF"), EdgeOperator::I2i),
        (("query", "LE"), EdgeOperator::Ni2i),
    ]);
    let credential_matrix = role_action_matrix(
        &["GLEIF", "QVI", "LE"],
        &["issue", "revoke", "delegate", "query"],
        EdgeOperator::Di2i,
        &denied,
        &overrides,
    );

    let authorities = Authorities::from([
        ("GLEIF".to_string(), vec!["Root of trust; authorizes QVIs".to_string()]),
        ("QVI".to_string(), vec!["Qualified vLEI Issuer, delegated by GLEIF".to_string()]),
        ("LE".to_string(), vec!["Legal Entity, credentialed by a QVI".to_string()]),
    ]);

    StandardFramework {
        rules,
        credential_matrix,
        authorities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::framework::ensure_unique_rule_names;

    #[test]
    fn test_jurisdiction_match_expression() {
        let rules = jurisdiction_match("iss", "region", "country", RuleEnforcement::Advisory);
        assert_eq!(rules[0].name, "jurisdiction-match");
        assert_eq!(rules[0].required_operator, EdgeOperator::Di2i);
        assert_eq!(rules[0].field_constraints["jurisdiction"], "$issuer.region == $subject.country");
        assert!(!rules[0].is_strict());
    }

    #[test]
    fn test_operator_floor_one_rule_per_edge() {
        let rules = operator_floor(&["a", "b"], EdgeOperator::I2i, RuleEnforcement::Strict);
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["operator-floor-a", "operator-floor-b"]);
        assert_eq!(rules[1].description, "Edge 'b' requires at least @I2I operator");
    }

    #[test]
    fn test_role_action_matrix_order_and_cells() {
        let denied = BTreeSet::from([("issue", "LE")]);
        let overrides = BTreeMap::from([(("revoke", "QVI"), EdgeOperator::I2i)]);
        let matrix = role_action_matrix(
            &["QVI", "LE"],
            &["issue", "revoke"],
            EdgeOperator::Di2i,
            &denied,
            &overrides,
        );
        let cells: Vec<_> = matrix.iter().map(|e| (e.action.as_str(), e.role.as_str())).collect();
        assert_eq!(cells, vec![("issue", "QVI"), ("issue", "LE"), ("revoke", "QVI"), ("revoke", "LE")]);
        assert!(!matrix[1].allowed);
        assert_eq!(matrix[1].required_operator, EdgeOperator::Any);
        assert_eq!(matrix[2].required_operator, EdgeOperator::I2i);
        assert_eq!(matrix[3].required_operator, EdgeOperator::Di2i);
    }

    #[test]
    fn test_temporal_validity() {
        let rules = temporal_validity("iss", "issued", "expires", RuleEnforcement::Strict);
        assert_eq!(rules[0].field_constraints["expiry"], "$subject.expires > $now.timestamp");
        assert_eq!(rules[1].field_constraints["freshness"], "$subject.issued != \"\"");
        assert!(!rules[1].is_strict());
    }

    #[test]
    fn test_chain_integrity_positions() {
        let rules = chain_integrity(&["a", "b", "c"], EdgeOperator::I2i, EdgeOperator::Di2i, EdgeOperator::Ni2i);
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["chain-root-a", "chain-intermediate-b", "chain-leaf-c"]);
        assert!(chain_integrity(&[], EdgeOperator::I2i, EdgeOperator::Di2i, EdgeOperator::Ni2i).is_empty());
        let single = chain_integrity(&["only"], EdgeOperator::I2i, EdgeOperator::Di2i, EdgeOperator::Ni2i);
        assert_eq!(single[0].required_operator, EdgeOperator::I2i);
    }

    #[test]
    fn test_vlei_standard_framework() {
        let standard = vlei_standard_framework();
        assert_eq!(standard.rules.len(), 10);
        assert!(ensure_unique_rule_names(&standard.rules).is_ok());
        assert_eq!(standard.credential_matrix.len(), 12);
        assert_eq!(standard.authorities.len(), 3);
        let denied: Vec<_> = standard
            .credential_matrix
            .iter()
            .filter(|e| !e.allowed)
            .map(|e| (e.action.as_str(), e.role.as_str()))
            .collect();
        assert_eq!(denied, vec![("issue", "LE"), ("delegate", "LE")]);
    }
}
