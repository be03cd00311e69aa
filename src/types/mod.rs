//! Core types for the governance engine.

pub mod algebra;
pub mod rule;
pub mod attributes;
pub mod context;
pub mod framework;

pub use algebra::{
    operator_name, operator_satisfies, strength_name, strength_satisfies, EdgeOperator,
    ParseEnumError, StrengthLevel,
};
pub use rule::{ConstraintRule, CredentialMatrixEntry, RuleEnforcement};
pub use attributes::{AttrValue, AttributeLookup, Attributes};
pub use context::{EdgeContext, Namespace, NOW_TIMESTAMP_FIELD};
pub use framework::{
    ensure_unique_rule_names, Authorities, ContentSaid, CredentialParseError, FrameworkDraft,
    FrameworkVersion, GovernanceFramework, SaidFactory,
};
