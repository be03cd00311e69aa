//! Governance framework credentials.
//!
//! A framework is an ACDC-shaped JSON credential whose attributes carry the
//! rules, the credential matrix and the role authorities:
//!
//! ```text
//! {
//!   "v": "ACDC10JSON000000_", "d": <SAID>, "i": <steward AID>, "s": "GovernanceFramework",
//!   "a": { "d": <SAID>, "name", "version", "rules": [..], "credential_matrix": [..],
//!          "authorities": {role: [aid]}, "evolution_mode"? },
//!   "e": { "supersedes": {"d": <prior SAID>}?, "ratification": {"d": <SAID>}? }
//! }
//! ```
//!
//! Parsed frameworks are immutable. A new version is a new credential with a
//! new SAID and a `supersedes` edge.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::rule::{ConstraintRule, CredentialMatrixEntry};
use crate::canonical::content_said;

/// Credential version string stamped on issued frameworks.
pub const CREDENTIAL_VERSION: &str = "ACDC10JSON000000_";

/// Schema label of framework credentials.
pub const FRAMEWORK_SCHEMA: &str = "GovernanceFramework";

/// Version assumed when a credential omits one.
pub const DEFAULT_FRAMEWORK_VERSION: &str = "1.0.0";

/// Role name → authorized AIDs.
pub type Authorities = BTreeMap<String, Vec<String>>;

/// Error parsing a credential into a [`GovernanceFramework`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialParseError {
    /// The credential is not a JSON object.
    #[error("Credential is not an object")]
    NotAnObject,
    /// The `d` field is missing or empty.
    #[error("Credential has no SAID")]
    MissingSaid,
    /// The `a` block is missing or not an object.
    #[error("Credential has no attribute block")]
    MissingAttributes,
    /// A field has the wrong shape.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// Two rules share a name.
    #[error("Duplicate rule name: {0}")]
    DuplicateRule(String),
}

/// Version metadata of one framework credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkVersion {
    /// SAID of this version.
    pub said: String,
    /// Semantic version `MAJOR.MINOR.PATCH`.
    pub version: String,
    /// SAID of the version this one replaces.
    pub supersedes_said: Option<String>,
    /// AID that issued this version.
    pub steward_aid: Option<String>,
}

/// Parsed governance framework credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernanceFramework {
    /// Content address.
    pub said: String,
    /// Display name.
    pub name: String,
    /// Version metadata.
    pub version_info: FrameworkVersion,
    /// AID of the authorizing controller.
    pub steward: Option<String>,
    /// Rules in declaration order.
    pub rules: Vec<ConstraintRule>,
    /// Role × action grid in declaration order.
    pub credential_matrix: Vec<CredentialMatrixEntry>,
    /// Role authorities.
    pub authorities: Authorities,
    /// SAID of the prior version.
    pub supersedes: Option<String>,
    /// Original credential, kept for provenance.
    pub raw: Value,
}

impl GovernanceFramework {
    /// Parse a framework credential.
    pub fn from_credential(raw: Value) -> Result<Self, CredentialParseError> {
        let root = raw.as_object().ok_or(CredentialParseError::NotAnObject)?;

        let said = root
            .get("d")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(CredentialParseError::MissingSaid)?
            .to_string();

        let attrs = root
            .get("a")
            .and_then(Value::as_object)
            .ok_or(CredentialParseError::MissingAttributes)?;

        let name = optional_string(attrs, "name")?.unwrap_or_default();
        let version = optional_string(attrs, "version")?
            .unwrap_or_else(|| DEFAULT_FRAMEWORK_VERSION.to_string());
        let rules: Vec<ConstraintRule> = optional_field(attrs, "rules")?.unwrap_or_default();
        ensure_unique_rule_names(&rules)?;
        let credential_matrix: Vec<CredentialMatrixEntry> =
            optional_field(attrs, "credential_matrix")?.unwrap_or_default();
        let authorities: Authorities = optional_field(attrs, "authorities")?.unwrap_or_default();

        let steward = optional_string(root, "i")?.filter(|s| !s.is_empty());
        let supersedes = edge_said(root, "supersedes")?;

        Ok(Self {
            version_info: FrameworkVersion {
                said: said.clone(),
                version,
                supersedes_said: supersedes.clone(),
                steward_aid: steward.clone(),
            },
            said,
            name,
            steward,
            rules,
            credential_matrix,
            authorities,
            supersedes,
            raw,
        })
    }

    /// Semantic version string.
    pub fn version(&self) -> &str {
        &self.version_info.version
    }

    /// Rules governing `edge_type`, in declaration order.
    pub fn rules_for<'a>(&'a self, edge_type: &'a str) -> impl Iterator<Item = &'a ConstraintRule> + 'a {
        self.rules.iter().filter(move |r| r.applies(edge_type))
    }

    /// Look up a rule by name.
    pub fn rule(&self, name: &str) -> Option<&ConstraintRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// The matrix cell for `(action, role)`.
    pub fn matrix_entry(&self, action: &str, role: &str) -> Option<&CredentialMatrixEntry> {
        self.credential_matrix
            .iter()
            .find(|e| e.action == action && e.role == role)
    }

    /// Whether `aid` is listed under `role`.
    pub fn is_authorized(&self, role: &str, aid: &str) -> bool {
        self.authorities
            .get(role)
            .is_some_and(|aids| aids.iter().any(|a| a == aid))
    }

    /// SAID of the ratification credential, for deliberation-born versions.
    pub fn ratification_said(&self) -> Option<&str> {
        self.raw
            .pointer("/e/ratification/d")
            .and_then(Value::as_str)
    }

    /// Evolution mode recorded in the credential, if any.
    pub fn evolution_mode(&self) -> Option<&str> {
        self.raw.pointer("/a/evolution_mode").and_then(Value::as_str)
    }
}

fn optional_string(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, CredentialParseError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CredentialParseError::InvalidField {
            field,
            reason: format!("expected string, found {}", type_name(other)),
        }),
    }
}

fn optional_field<T: serde::de::DeserializeOwned>(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<T>, CredentialParseError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| CredentialParseError::InvalidField {
                field,
                reason: e.to_string(),
            }),
    }
}

/// Edges are `{"d": said}` objects; a bare SAID string is accepted too.
fn edge_said(
    root: &Map<String, Value>,
    edge: &'static str,
) -> Result<Option<String>, CredentialParseError> {
    let Some(edges) = root.get("e") else {
        return Ok(None);
    };
    let target = match edges {
        Value::Null => return Ok(None),
        Value::Object(map) => map.get(edge),
        other => {
            return Err(CredentialParseError::InvalidField {
                field: "e",
                reason: format!("expected object, found {}", type_name(other)),
            })
        }
    };
    match target {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        Some(Value::Object(node)) => match node.get("d") {
            Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
            _ => Err(CredentialParseError::InvalidField {
                field: edge,
                reason: "edge has no target SAID".to_string(),
            }),
        },
        Some(_) => Err(CredentialParseError::InvalidField {
            field: edge,
            reason: "edge has no target SAID".to_string(),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reject rule sets in which two rules share a name.
pub fn ensure_unique_rule_names(rules: &[ConstraintRule]) -> Result<(), CredentialParseError> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(CredentialParseError::DuplicateRule(rule.name.clone()));
        }
    }
    Ok(())
}

/// Produces the SAID of a freshly assembled credential.
///
/// Production deployments issue and anchor the credential and return its
/// real SAID; [`ContentSaid`] is the deterministic default.
pub trait SaidFactory: Send + Sync {
    /// SAID for `credential` (whose `d` fields are still empty).
    fn said_for(&self, credential: &Value) -> String;
}

/// SHA-256 content SAID over the canonical credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSaid;

impl SaidFactory for ContentSaid {
    fn said_for(&self, credential: &Value) -> String {
        content_said(credential)
    }
}

impl<F> SaidFactory for F
where
    F: Fn(&Value) -> String + Send + Sync,
{
    fn said_for(&self, credential: &Value) -> String {
        self(credential)
    }
}

/// Unissued framework content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameworkDraft {
    /// Display name.
    pub name: String,
    /// Semantic version.
    pub version: String,
    /// Issuing steward.
    pub steward: Option<String>,
    /// Rules.
    pub rules: Vec<ConstraintRule>,
    /// Credential matrix.
    pub credential_matrix: Vec<CredentialMatrixEntry>,
    /// Role authorities.
    pub authorities: Authorities,
    /// Prior version.
    pub supersedes: Option<String>,
    /// Ratification credential authorizing this version.
    pub ratification: Option<String>,
    /// Evolution mode label recorded in the attributes.
    pub evolution_mode: Option<String>,
}

impl FrameworkDraft {
    /// Empty draft.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Set the steward.
    pub fn with_steward(mut self, steward: impl Into<String>) -> Self {
        self.steward = Some(steward.into());
        self
    }

    /// Set the rules.
    pub fn with_rules(mut self, rules: Vec<ConstraintRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Set the credential matrix.
    pub fn with_matrix(mut self, matrix: Vec<CredentialMatrixEntry>) -> Self {
        self.credential_matrix = matrix;
        self
    }

    /// Set the authorities.
    pub fn with_authorities(mut self, authorities: Authorities) -> Self {
        self.authorities = authorities;
        self
    }

    /// Declare the prior version.
    pub fn superseding(mut self, prior_said: impl Into<String>) -> Self {
        self.supersedes = Some(prior_said.into());
        self
    }

    /// Assemble the credential with empty `d` fields.
    pub fn to_credential(&self) -> Value {
        let mut attributes = json!({
            "d": "",
            "name": self.name,
            "version": self.version,
            "rules": self.rules,
            "credential_matrix": self.credential_matrix,
            "authorities": self.authorities,
        });
        if let Some(mode) = &self.evolution_mode {
            attributes["evolution_mode"] = json!(mode);
        }

        let mut edges = Map::new();
        if let Some(prior) = &self.supersedes {
            edges.insert("supersedes".to_string(), json!({ "d": prior }));
        }
        if let Some(ratification) = &self.ratification {
            edges.insert("ratification".to_string(), json!({ "d": ratification }));
        }

        let mut credential = json!({
            "v": CREDENTIAL_VERSION,
            "d": "",
            "i": self.steward.clone().unwrap_or_default(),
            "s": FRAMEWORK_SCHEMA,
            "a": attributes,
        });
        if !edges.is_empty() {
            credential["e"] = Value::Object(edges);
        }
        credential
    }

    /// Assign a SAID and produce the immutable framework.
    pub fn issue(self, factory: &dyn SaidFactory) -> GovernanceFramework {
        let mut credential = self.to_credential();
        let said = factory.said_for(&credential);
        credential["d"] = json!(said);
        credential["a"]["d"] = json!(said);

        GovernanceFramework {
            said: said.clone(),
            name: self.name,
            version_info: FrameworkVersion {
                said: said.clone(),
                version: self.version,
                supersedes_said: self.supersedes.clone(),
                steward_aid: self.steward.clone(),
            },
            steward: self.steward,
            rules: self.rules,
            credential_matrix: self.credential_matrix,
            authorities: self.authorities,
            supersedes: self.supersedes,
            raw: credential,
        }
    }
}
