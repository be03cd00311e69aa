//! Constraint checker.
//!
//! Evaluates the rules governing one edge type against a concrete
//! [`EdgeContext`]. Each rule is checked in declaration order:
//!
//! 1. declared operator satisfies `required_operator`
//! 2. delegation depth within `max_delegation_depth` (when set)
//! 3. every field constraint holds
//!
//! Every failed check yields one [`ConstraintViolation`]. Strict violations
//! deny the edge; advisory ones are reported only. An edge type with no
//! applicable rule is allowed.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::compiler::{evaluate_expression, CompileError, CompiledFramework, CompiledRule, FieldOutcome};
use crate::types::algebra::{operator_satisfies, EdgeOperator};
use crate::types::context::EdgeContext;
use crate::types::framework::GovernanceFramework;
use crate::types::rule::{ConstraintRule, CredentialMatrixEntry, RuleEnforcement};

/// Rule name carried by violations that are not tied to a rule.
pub const FRAMEWORK_RULE_NAME: &str = "framework";

/// Rules to check an edge against.
#[derive(Debug, Clone, Copy)]
pub enum RuleSource<'a> {
    /// Pre-compiled rules.
    Compiled(&'a CompiledFramework),
    /// Source rules, compiled on the fly.
    Raw(&'a [ConstraintRule]),
}

impl<'a> From<&'a CompiledFramework> for RuleSource<'a> {
    fn from(compiled: &'a CompiledFramework) -> Self {
        Self::Compiled(compiled)
    }
}

impl<'a> From<&'a std::sync::Arc<CompiledFramework>> for RuleSource<'a> {
    fn from(compiled: &'a std::sync::Arc<CompiledFramework>) -> Self {
        Self::Compiled(compiled.as_ref())
    }
}

impl<'a> From<&'a [ConstraintRule]> for RuleSource<'a> {
    fn from(rules: &'a [ConstraintRule]) -> Self {
        Self::Raw(rules)
    }
}

impl<'a> From<&'a Vec<ConstraintRule>> for RuleSource<'a> {
    fn from(rules: &'a Vec<ConstraintRule>) -> Self {
        Self::Raw(rules.as_slice())
    }
}

impl<'a> From<&'a GovernanceFramework> for RuleSource<'a> {
    fn from(framework: &'a GovernanceFramework) -> Self {
        Self::Raw(framework.rules.as_slice())
    }
}

/// What a violation is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Declared operator is weaker than required.
    Operator {
        /// Minimum required.
        required: EdgeOperator,
        /// Declared on the edge.
        actual: EdgeOperator,
    },
    /// Delegation chain too deep, or depth not supplied.
    DelegationDepth {
        /// Maximum allowed.
        max: u32,
        /// Supplied depth.
        actual: Option<u32>,
    },
    /// A field constraint did not hold.
    FieldConstraint {
        /// Constraint label.
        label: String,
        /// Expression source.
        expression: String,
        /// Why it failed.
        detail: String,
    },
    /// A field constraint could not be compiled.
    InvalidExpression {
        /// Constraint label.
        label: String,
        /// Compiler error.
        error: String,
    },
    /// The governing framework could not be resolved.
    FrameworkNotFound {
        /// Requested SAID.
        said: String,
    },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator { required, actual } => {
                write!(f, "requires operator {} but edge declares {}", required, actual)
            }
            Self::DelegationDepth { max, actual: Some(actual) } => {
                write!(f, "delegation depth {} exceeds maximum {}", actual, max)
            }
            Self::DelegationDepth { max, actual: None } => {
                write!(f, "delegation depth unknown (maximum {})", max)
            }
            Self::FieldConstraint { label, expression, detail } => {
                write!(f, "constraint '{}' failed: {} ({})", label, expression, detail)
            }
            Self::InvalidExpression { label, error } => {
                write!(f, "constraint '{}' is invalid: {}", label, error)
            }
            Self::FrameworkNotFound { said } => write!(f, "framework {} not found", said),
        }
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintViolation {
    /// Name of the failing rule.
    pub rule_name: String,
    /// Enforcement of the failing rule.
    pub enforcement: RuleEnforcement,
    /// What failed.
    pub kind: ViolationKind,
    /// Human-readable explanation.
    pub message: String,
}

impl ConstraintViolation {
    fn new(rule: &ConstraintRule, kind: ViolationKind) -> Self {
        Self {
            message: format!("Rule '{}' {}", rule.name, kind),
            rule_name: rule.name.clone(),
            enforcement: rule.enforcement,
            kind,
        }
    }

    /// Strict violation for an unresolvable framework.
    pub fn framework_not_found(said: &str) -> Self {
        let kind = ViolationKind::FrameworkNotFound {
            said: said.to_string(),
        };
        Self {
            message: format!("Governance {}", kind),
            rule_name: FRAMEWORK_RULE_NAME.to_string(),
            enforcement: RuleEnforcement::Strict,
            kind,
        }
    }

    /// Whether this violation denies the edge.
    pub fn is_strict(&self) -> bool {
        self.enforcement == RuleEnforcement::Strict
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.enforcement, self.message)
    }
}

/// Outcome of checking one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    /// Whether the edge is allowed.
    pub allowed: bool,
    /// Checked edge type.
    pub edge_type: String,
    /// Whether any rule applied.
    pub governed: bool,
    /// Number of rules evaluated.
    pub rules_evaluated: usize,
    /// Violations in rule order (empty on full pass).
    pub violations: Vec<ConstraintViolation>,
}

impl CheckResult {
    /// Build a result from violations; denied iff any is strict.
    pub fn from_violations(
        edge_type: impl Into<String>,
        rules_evaluated: usize,
        violations: Vec<ConstraintViolation>,
    ) -> Self {
        Self {
            allowed: !violations.iter().any(ConstraintViolation::is_strict),
            edge_type: edge_type.into(),
            governed: rules_evaluated > 0,
            rules_evaluated,
            violations,
        }
    }

    /// Strict violations.
    pub fn strict_violations(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter().filter(|v| v.is_strict())
    }

    /// Advisory violations.
    pub fn advisory_violations(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations.iter().filter(|v| !v.is_strict())
    }

    /// Names of failing rules, first occurrence order.
    pub fn failed_rules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for v in &self.violations {
            if !names.contains(&v.rule_name.as_str()) {
                names.push(&v.rule_name);
            }
        }
        names
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let verdict = if self.allowed { "allowed" } else { "denied" };
        if self.violations.is_empty() {
            format!("{}: {} ({} rules)", self.edge_type, verdict, self.rules_evaluated)
        } else {
            let messages: Vec<&str> = self.violations.iter().map(|v| v.message.as_str()).collect();
            format!("{}: {}: {}", self.edge_type, verdict, messages.join("; "))
        }
    }
}

/// Outcome of a credential-matrix check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizationCheck {
    /// Whether the role may perform the action with the declared operator.
    pub allowed: bool,
    /// Role checked.
    pub role: String,
    /// Action checked.
    pub action: String,
    /// Matching matrix cell, if any.
    pub entry: Option<CredentialMatrixEntry>,
    /// Explanation.
    pub reason: String,
}

/// Stateless edge checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// Create a checker.
    pub fn new() -> Self {
        Self
    }

    /// Check `ctx` against compiled or raw rules.
    pub fn check<'a>(&self, ctx: &EdgeContext, rules: impl Into<RuleSource<'a>>) -> CheckResult {
        let mut violations = Vec::new();
        let mut evaluated = 0;

        match rules.into() {
            RuleSource::Compiled(compiled) => {
                for rule in compiled.rules_for(&ctx.edge_type) {
                    evaluated += 1;
                    check_compiled_rule(rule, ctx, &mut violations);
                }
            }
            RuleSource::Raw(rules) => {
                for rule in rules.iter().filter(|r| r.applies(&ctx.edge_type)) {
                    evaluated += 1;
                    check_raw_rule(rule, ctx, &mut violations);
                }
            }
        }

        let result = CheckResult::from_violations(ctx.edge_type.clone(), evaluated, violations);
        if result.allowed {
            debug!(
                edge_type = %result.edge_type,
                rules = evaluated,
                advisory = result.violations.len(),
                "edge allowed"
            );
        } else {
            info!(
                edge_type = %result.edge_type,
                rules = evaluated,
                failed = ?result.failed_rules(),
                "edge denied by strict rule"
            );
        }
        result
    }

    /// Check a role/action pair against the framework's credential matrix.
    ///
    /// A pair with no matrix cell is ungoverned and allowed.
    pub fn check_authorization(
        &self,
        framework: &GovernanceFramework,
        role: &str,
        action: &str,
        operator: EdgeOperator,
    ) -> AuthorizationCheck {
        let entry = framework.matrix_entry(action, role).cloned();
        let (allowed, reason) = match &entry {
            None => (true, format!("No matrix entry for {} by {}", action, role)),
            Some(e) if !e.allowed => (false, format!("{} may not {}", role, action)),
            Some(e) if !operator_satisfies(operator, e.required_operator) => (
                false,
                format!(
                    "{} by {} requires {} but has {}",
                    action, role, e.required_operator, operator
                ),
            ),
            Some(e) => (
                true,
                format!("{} by {}: {} meets {}", action, role, operator, e.required_operator),
            ),
        };
        debug!(role, action, allowed, "matrix authorization");
        AuthorizationCheck {
            allowed,
            role: role.to_string(),
            action: action.to_string(),
            entry,
            reason,
        }
    }
}

fn check_structural(rule: &ConstraintRule, ctx: &EdgeContext, violations: &mut Vec<ConstraintViolation>) {
    if !operator_satisfies(ctx.operator, rule.required_operator) {
        violations.push(ConstraintViolation::new(
            rule,
            ViolationKind::Operator {
                required: rule.required_operator,
                actual: ctx.operator,
            },
        ));
    }

    if let Some(max) = rule.max_delegation_depth {
        let within = ctx.delegation_depth.is_some_and(|depth| depth <= max);
        if !within {
            violations.push(ConstraintViolation::new(
                rule,
                ViolationKind::DelegationDepth {
                    max,
                    actual: ctx.delegation_depth,
                },
            ));
        }
    }
}

fn record_field(
    rule: &ConstraintRule,
    label: &str,
    expression: &str,
    outcome: Result<FieldOutcome, &CompileError>,
    violations: &mut Vec<ConstraintViolation>,
) {
    let kind = match outcome {
        Ok(outcome) if outcome.holds() => return,
        Ok(outcome) => ViolationKind::FieldConstraint {
            label: label.to_string(),
            expression: expression.to_string(),
            detail: outcome.detail(),
        },
        Err(error) => ViolationKind::InvalidExpression {
            label: label.to_string(),
            error: error.to_string(),
        },
    };
    violations.push(ConstraintViolation::new(rule, kind));
}

fn check_compiled_rule(compiled: &CompiledRule, ctx: &EdgeContext, violations: &mut Vec<ConstraintViolation>) {
    let rule = &compiled.rule;
    check_structural(rule, ctx, violations);

    for (label, expression) in &rule.field_constraints {
        let outcome = match compiled.constraints.iter().find(|c| &c.label == label) {
            Some(constraint) => Ok(constraint.evaluate(ctx)),
            None => match compiled.errors.iter().find(|(l, _)| l == label) {
                Some((_, error)) => Err(error),
                None => continue,
            },
        };
        record_field(rule, label, expression, outcome, violations);
    }
}

fn check_raw_rule(rule: &ConstraintRule, ctx: &EdgeContext, violations: &mut Vec<ConstraintViolation>) {
    check_structural(rule, ctx, violations);

    for (label, expression) in &rule.field_constraints {
        let outcome = evaluate_expression(expression, ctx);
        record_field(rule, label, expression, outcome.as_ref().cloned(), violations);
    }
}
