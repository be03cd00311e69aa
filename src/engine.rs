//! Governance engine facade.
//!
//! ```text
//! framework SAID ─→ FrameworkResolver ─→ active GovernanceFramework
//!                                              │
//!                        ConstraintCompiler ←──┘ (cached per SAID)
//!                                │
//! EdgeContext ───────→ ConstraintChecker ─→ CheckResult
//!
//! (type, op, strength) ─→ CardinalChecker ─→ CardinalCheckResult
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::cardinal::{ArtifactType, CardinalCheckResult, CardinalChecker, CardinalRuleSet, Operation};
use crate::checker::{AuthorizationCheck, CheckResult, ConstraintChecker, ConstraintViolation};
use crate::compiler::{CompiledFramework, ConstraintCompiler};
use crate::config::GovernanceConfig;
use crate::evolution::{EvolutionResult, GovernanceEvolution, SupersedeRequest};
use crate::resolver::FrameworkResolver;
use crate::store::CredentialSource;
use crate::types::algebra::{EdgeOperator, StrengthLevel};
use crate::types::context::EdgeContext;
use crate::types::framework::{GovernanceFramework, SaidFactory};

/// Resolver, compiler, checkers and evolution wired together.
#[derive(Debug)]
pub struct GovernanceEngine {
    resolver: Arc<FrameworkResolver>,
    compiler: ConstraintCompiler,
    checker: ConstraintChecker,
    cardinal: CardinalChecker,
    evolution: GovernanceEvolution,
}

impl GovernanceEngine {
    /// Engine over a credential source.
    pub fn new(source: Arc<dyn CredentialSource>, config: GovernanceConfig) -> Self {
        let resolver = FrameworkResolver::with_source(source).with_config(config.resolver.clone());
        Self::from_resolver(Arc::new(resolver), config)
    }

    /// Engine over an existing resolver.
    pub fn from_resolver(resolver: Arc<FrameworkResolver>, config: GovernanceConfig) -> Self {
        Self {
            compiler: ConstraintCompiler::new(config.cache),
            checker: ConstraintChecker::new(),
            cardinal: CardinalChecker::default(),
            evolution: GovernanceEvolution::new(Arc::clone(&resolver)),
            resolver,
        }
    }

    /// Replace the cardinal rule table.
    pub fn with_cardinal_rules(mut self, ruleset: CardinalRuleSet) -> Self {
        self.cardinal = CardinalChecker::new(ruleset);
        self
    }

    /// Address evolved frameworks with `factory`.
    pub fn with_said_factory(mut self, factory: impl SaidFactory + 'static) -> Self {
        self.evolution = self.evolution.with_factory(factory);
        self
    }

    /// The framework resolver.
    pub fn resolver(&self) -> &Arc<FrameworkResolver> {
        &self.resolver
    }

    /// The constraint compiler.
    pub fn compiler(&self) -> &ConstraintCompiler {
        &self.compiler
    }

    /// The evolution engine.
    pub fn evolution(&self) -> &GovernanceEvolution {
        &self.evolution
    }

    /// Add a framework without a fetch.
    pub fn register(&self, framework: GovernanceFramework) -> Arc<GovernanceFramework> {
        self.resolver.register(framework)
    }

    /// Compiled rules of exactly `framework_said`.
    pub fn compile(&self, framework_said: &str) -> Option<Arc<CompiledFramework>> {
        self.resolver
            .resolve(framework_said)
            .map(|framework| self.compiler.compile(&framework))
    }

    /// Check `ctx` against the active version of the lineage containing
    /// `framework_said`.
    ///
    /// An unresolvable framework denies the edge.
    pub fn check_edge(&self, framework_said: &str, ctx: &EdgeContext) -> CheckResult {
        match self.resolver.resolve_active(framework_said) {
            Some(framework) => {
                debug!(requested = framework_said, active = %framework.said, "checking against active framework");
                self.check_against(&framework, ctx)
            }
            None => Self::not_found(framework_said, ctx),
        }
    }

    /// Check `ctx` against exactly `framework_said`, ignoring successors.
    pub fn check_edge_pinned(&self, framework_said: &str, ctx: &EdgeContext) -> CheckResult {
        match self.resolver.resolve(framework_said) {
            Some(framework) => self.check_against(&framework, ctx),
            None => Self::not_found(framework_said, ctx),
        }
    }

    fn check_against(&self, framework: &GovernanceFramework, ctx: &EdgeContext) -> CheckResult {
        let compiled = self.compiler.compile(framework);
        self.checker.check(ctx, &compiled)
    }

    fn not_found(framework_said: &str, ctx: &EdgeContext) -> CheckResult {
        CheckResult::from_violations(
            ctx.edge_type.clone(),
            0,
            vec![ConstraintViolation::framework_not_found(framework_said)],
        )
    }

    /// Matrix check of `(role, action)` against the active framework.
    pub fn check_authorization(
        &self,
        framework_said: &str,
        role: &str,
        action: &str,
        operator: EdgeOperator,
    ) -> AuthorizationCheck {
        match self.resolver.resolve_active(framework_said) {
            Some(framework) => self
                .checker
                .check_authorization(&framework, role, action, operator),
            None => AuthorizationCheck {
                allowed: false,
                role: role.to_string(),
                action: action.to_string(),
                entry: None,
                reason: format!("Governance framework {} not found", framework_said),
            },
        }
    }

    /// Cardinal check of an artifact operation.
    pub fn check_artifact(
        &self,
        artifact_type: ArtifactType,
        operation: Operation,
        strength: StrengthLevel,
    ) -> CardinalCheckResult {
        self.cardinal.check(artifact_type, operation, strength)
    }

    /// Mode A evolution.
    pub fn supersede(&self, request: SupersedeRequest) -> EvolutionResult {
        self.evolution.supersede(request)
    }

    /// Mode B evolution.
    pub fn evolve_from_ratification(
        &self,
        current_said: &str,
        ratification_said: &str,
        ratification_data: &serde_json::Value,
    ) -> EvolutionResult {
        self.evolution
            .evolve_from_ratification(current_said, ratification_said, ratification_data)
    }
}
