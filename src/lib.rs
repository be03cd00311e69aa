//! # keri-governance
//!
//! Governance engine for KERI credential graphs.
//!
//! The engine answers two questions:
//!
//! > Does this issuer→subject edge satisfy the rules of governance framework F?
//!
//! > Does this lifecycle operation on an artifact meet its minimum verification strength?
//!
//! ## Architecture
//!
//! ```text
//! framework SAID → FrameworkResolver → GovernanceFramework → ConstraintCompiler
//!                        ↑                                          ↓
//!                 CredentialSource      EdgeContext → ConstraintChecker → CheckResult
//!                        ↑
//!               GovernanceEvolution (Mode A / Mode B supersession)
//! ```
//!
//! ## Guarantees
//!
//! - Frameworks are immutable and content-addressed; caches never go stale
//! - Compiled and raw evaluation of the same rules yield identical results
//! - Missing attributes fail closed; ungoverned edge types are allowed
//! - Chain walks terminate on cyclic or corrupted supersession graphs
//! - Nothing in the engine panics or returns an error for policy outcomes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod compiler;
pub mod checker;
pub mod store;
pub mod resolver;
pub mod evolution;
pub mod cardinal;
pub mod patterns;
pub mod config;
pub mod engine;

// Re-exports
pub use types::{
    operator_name, operator_satisfies, strength_name, strength_satisfies, AttrValue,
    AttributeLookup, Attributes, Authorities, ConstraintRule, ContentSaid, CredentialMatrixEntry,
    CredentialParseError, EdgeContext, EdgeOperator, FrameworkDraft, FrameworkVersion,
    GovernanceFramework, Namespace, ParseEnumError, RuleEnforcement, SaidFactory, StrengthLevel,
};
pub use canonical::{canonical_hash, canonical_hash_hex, content_said, to_canonical_bytes};
pub use compiler::{
    compile_field_expression, evaluate_expression, CacheStats, CompileError,
    CompiledFieldConstraint, CompiledFramework, CompiledRule, ConstraintCompiler, FieldOutcome,
};
pub use checker::{
    AuthorizationCheck, CheckResult, ConstraintChecker, ConstraintViolation, RuleSource,
    ViolationKind,
};
pub use store::{CredentialSource, InMemoryCredentialStore, SourceError};
pub use resolver::{FrameworkResolver, VersionChain};
pub use evolution::{
    bump_minor_version, EvolutionFailure, EvolutionMode, EvolutionResult, GovernanceEvolution,
    SupersedeRequest,
};
pub use cardinal::{
    default_cardinal_rules, ArtifactType, CardinalCheckResult, CardinalChecker, CardinalRule,
    CardinalRuleSet, Operation,
};
pub use config::{CacheConfig, ConfigError, GovernanceConfig, ResolverConfig};
pub use engine::GovernanceEngine;

/// Schema version of the framework credential layout.
/// Increment on breaking changes to any serialized type.
pub const GOVERNANCE_SCHEMA_VERSION: &str = "1.0.0";
