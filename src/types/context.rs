//! Edge evaluation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::algebra::EdgeOperator;
use super::attributes::{AttrValue, AttributeLookup, Attributes};

/// Variable namespace an expression path may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Attributes of the issuing node.
    Issuer,
    /// Attributes of the subject node.
    Subject,
    /// The evaluation instant (`$now.timestamp`) plus caller extras.
    Now,
    /// Proposed state, for transition rules.
    New,
    /// Present state, for transition rules.
    Current,
}

impl Namespace {
    /// Parse a bare namespace name (without `$`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "issuer" => Some(Self::Issuer),
            "subject" => Some(Self::Subject),
            "now" => Some(Self::Now),
            "new" => Some(Self::New),
            "current" => Some(Self::Current),
            _ => None,
        }
    }

    /// Bare namespace name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Subject => "subject",
            Self::Now => "now",
            Self::New => "new",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

/// Field name under `$now` that always resolves to the evaluation instant.
pub const NOW_TIMESTAMP_FIELD: &str = "timestamp";

/// Everything a checker needs to know about one issuer→subject edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeContext {
    /// Edge type, matched exactly against `ConstraintRule::applies_to`.
    pub edge_type: String,
    /// Operator declared on the edge.
    pub operator: EdgeOperator,
    /// Issuer attributes.
    #[serde(default)]
    pub issuer: Attributes,
    /// Subject attributes.
    #[serde(default)]
    pub subject: Attributes,
    /// Proposed-state attributes.
    #[serde(default)]
    pub new: Attributes,
    /// Present-state attributes.
    #[serde(default)]
    pub current: Attributes,
    /// Evaluation instant.
    pub now: DateTime<Utc>,
    /// Extra attributes exposed under `$now`.
    #[serde(default)]
    pub now_extras: Attributes,
    /// Length of the delegation chain behind this edge, when known.
    #[serde(default)]
    pub delegation_depth: Option<u32>,
}

impl EdgeContext {
    /// Context for `edge_type` with the given operator, evaluated now.
    pub fn new(edge_type: impl Into<String>, operator: EdgeOperator) -> Self {
        Self {
            edge_type: edge_type.into(),
            operator,
            issuer: Attributes::new(),
            subject: Attributes::new(),
            new: Attributes::new(),
            current: Attributes::new(),
            now: Utc::now(),
            now_extras: Attributes::new(),
            delegation_depth: None,
        }
    }

    /// Set issuer attributes.
    pub fn with_issuer(mut self, issuer: Attributes) -> Self {
        self.issuer = issuer;
        self
    }

    /// Set subject attributes.
    pub fn with_subject(mut self, subject: Attributes) -> Self {
        self.subject = subject;
        self
    }

    /// Set proposed-state attributes.
    pub fn with_new(mut self, new: Attributes) -> Self {
        self.new = new;
        self
    }

    /// Set present-state attributes.
    pub fn with_current(mut self, current: Attributes) -> Self {
        self.current = current;
        self
    }

    /// Pin the evaluation instant.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Set the delegation chain depth.
    pub fn with_delegation_depth(mut self, depth: u32) -> Self {
        self.delegation_depth = Some(depth);
        self
    }

    /// Resolve `$namespace.path`.
    pub fn resolve(&self, namespace: Namespace, path: &[String]) -> Option<AttrValue> {
        match namespace {
            Namespace::Issuer => self.issuer.lookup(path),
            Namespace::Subject => self.subject.lookup(path),
            Namespace::New => self.new.lookup(path),
            Namespace::Current => self.current.lookup(path),
            Namespace::Now => match path {
                [field] if field == NOW_TIMESTAMP_FIELD => Some(AttrValue::Time(self.now)),
                _ => self.now_extras.lookup(path),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_namespace_names() {
        for ns in [
            Namespace::Issuer,
            Namespace::Subject,
            Namespace::Now,
            Namespace::New,
            Namespace::Current,
        ] {
            assert_eq!(Namespace::from_name(ns.name()), Some(ns));
        }
        assert_eq!(Namespace::from_name("holder"), None);
        assert_eq!(Namespace::Issuer.to_string(), "$issuer");
    }

    #[test]
    fn test_resolve_now_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let ctx = EdgeContext::new("iss", EdgeOperator::I2i).at(at);
        let value = ctx.resolve(Namespace::Now, &["timestamp".to_string()]);
        assert_eq!(value, Some(AttrValue::Time(at)));
        assert_eq!(ctx.resolve(Namespace::Now, &["epoch".to_string()]), None);
    }

    #[test]
    fn test_resolve_issuer_and_subject() {
        let ctx = EdgeContext::new("iss", EdgeOperator::Di2i)
            .with_issuer(Attributes::from_value(json!({"jurisdiction": "US"})))
            .with_subject(Attributes::new().with("country", "DE"));
        assert_eq!(
            ctx.resolve(Namespace::Issuer, &["jurisdiction".to_string()]),
            Some(AttrValue::Str("US".into()))
        );
        assert_eq!(
            ctx.resolve(Namespace::Subject, &["country".to_string()]),
            Some(AttrValue::Str("DE".into()))
        );
        assert_eq!(ctx.resolve(Namespace::New, &["version".to_string()]), None);
    }
}
