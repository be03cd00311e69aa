//! Field-constraint expression language.
//!
//! One expression is one binary comparison:
//!
//! ```text
//! expr     := path op (path | literal)
//! path     := '$' namespace ('.' segment)+        segment := [A-Za-z0-9_-]+
//! op       := '==' | '!=' | '>=' | '<=' | '>' | '<'
//! literal  := "..." | '...' | -?digits[.digits] | true | false
//! ```
//!
//! Evaluation never errors. A missing operand, or an ordering between
//! values with no common numeric, semantic-version or chronological form,
//! makes the predicate false.

use regex_lite::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use crate::types::attributes::AttrValue;
use crate::types::context::{EdgeContext, Namespace};

/// Error compiling an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Blank source.
    #[error("Empty expression")]
    Empty,
    /// Source does not match the grammar.
    #[error("Malformed expression '{expression}': {reason}")]
    Malformed {
        /// Offending source.
        expression: String,
        /// What was wrong.
        reason: String,
    },
    /// Path names a namespace other than issuer/subject/now/new/current.
    #[error("Unknown namespace '${namespace}' in '{expression}'")]
    UnknownNamespace {
        /// The namespace as written (without `$`).
        namespace: String,
        /// Offending source.
        expression: String,
    },
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl Comparator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `$namespace.field[.field...]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    /// Namespace.
    pub namespace: Namespace,
    /// Field segments, at least one.
    pub segments: Vec<String>,
}

impl FieldPath {
    /// Resolve against a context.
    pub fn resolve(&self, ctx: &EdgeContext) -> Option<AttrValue> {
        ctx.resolve(self.namespace, &self.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.segments.join("."))
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute reference.
    Path(FieldPath),
    /// Constant.
    Literal(AttrValue),
}

impl Operand {
    fn resolve(&self, ctx: &EdgeContext) -> Option<AttrValue> {
        match self {
            Self::Path(path) => path.resolve(ctx),
            Self::Literal(value) => Some(value.clone()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path),
            Self::Literal(value) => write!(f, "{}", value),
        }
    }
}

/// Result of evaluating one compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// The comparison holds.
    Satisfied,
    /// Both operands resolved and the comparison does not hold.
    Unsatisfied {
        /// Resolved left operand.
        lhs: AttrValue,
        /// Resolved right operand.
        rhs: AttrValue,
    },
    /// An operand path did not resolve.
    Missing(String),
    /// Ordering requested between values with no common order.
    Incomparable {
        /// Resolved left operand.
        lhs: AttrValue,
        /// Resolved right operand.
        rhs: AttrValue,
    },
}

impl FieldOutcome {
    /// Whether the predicate is true.
    pub fn holds(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// Explanation for a failed predicate.
    pub fn detail(&self) -> String {
        match self {
            Self::Satisfied => "satisfied".to_string(),
            Self::Unsatisfied { lhs, rhs } => format!("{} vs {}", lhs, rhs),
            Self::Missing(path) => format!("missing field {}", path),
            Self::Incomparable { lhs, rhs } => format!("cannot order {} and {}", lhs, rhs),
        }
    }
}

/// A parsed field constraint, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFieldConstraint {
    /// Label from the rule's `field_constraints`.
    pub label: String,
    /// Original source text.
    pub expression: String,
    /// Left operand.
    pub lhs: FieldPath,
    /// Operator.
    pub comparator: Comparator,
    /// Right operand.
    pub rhs: Operand,
}

impl CompiledFieldConstraint {
    /// Evaluate against `ctx`.
    pub fn evaluate(&self, ctx: &EdgeContext) -> FieldOutcome {
        let Some(lhs) = self.lhs.resolve(ctx) else {
            return FieldOutcome::Missing(self.lhs.to_string());
        };
        let Some(rhs) = self.rhs.resolve(ctx) else {
            return FieldOutcome::Missing(self.rhs.to_string());
        };
        match compare(&lhs, self.comparator, &rhs) {
            Some(true) => FieldOutcome::Satisfied,
            Some(false) => FieldOutcome::Unsatisfied { lhs, rhs },
            None => FieldOutcome::Incomparable { lhs, rhs },
        }
    }

    /// Whether the predicate is true for `ctx`.
    pub fn holds(&self, ctx: &EdgeContext) -> bool {
        self.evaluate(ctx).holds()
    }
}

fn expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_-]+)*)\s*(==|!=|>=|<=|>|<)\s*(.+)$")
            .expect("expression grammar is a valid regex")
    })
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_-]+)*)$")
            .expect("path grammar is a valid regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?$").expect("number grammar is a valid regex"))
}

/// Compile `expression` under `label`.
pub fn compile_field_expression(
    label: &str,
    expression: &str,
) -> Result<CompiledFieldConstraint, CompileError> {
    let source = expression.trim();
    if source.is_empty() {
        return Err(CompileError::Empty);
    }
    let malformed = |reason: &str| CompileError::Malformed {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    let caps = expression_re()
        .captures(source)
        .ok_or_else(|| malformed("expected '$namespace.field <op> <path|literal>'"))?;

    let lhs = build_path(expression, &caps[1], &caps[2])?;
    let comparator = Comparator::from_symbol(&caps[3]).ok_or_else(|| malformed("unknown operator"))?;
    let rhs = parse_operand(expression, caps[4].trim())?;

    Ok(CompiledFieldConstraint {
        label: label.to_string(),
        expression: expression.to_string(),
        lhs,
        comparator,
        rhs,
    })
}

/// Compile and evaluate in one step, without caching.
pub fn evaluate_expression(expression: &str, ctx: &EdgeContext) -> Result<FieldOutcome, CompileError> {
    compile_field_expression("", expression).map(|compiled| compiled.evaluate(ctx))
}

fn build_path(expression: &str, namespace: &str, dotted: &str) -> Result<FieldPath, CompileError> {
    let namespace_kind = Namespace::from_name(namespace).ok_or_else(|| CompileError::UnknownNamespace {
        namespace: namespace.to_string(),
        expression: expression.to_string(),
    })?;
    let segments: Vec<String> = dotted
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(CompileError::Malformed {
            expression: expression.to_string(),
            reason: format!("'${}' needs at least one field", namespace),
        });
    }
    Ok(FieldPath {
        namespace: namespace_kind,
        segments,
    })
}

fn parse_operand(expression: &str, token: &str) -> Result<Operand, CompileError> {
    if token.starts_with('$') {
        let caps = path_re().captures(token).ok_or_else(|| CompileError::Malformed {
            expression: expression.to_string(),
            reason: format!("invalid path '{}'", token),
        })?;
        return build_path(expression, &caps[1], &caps[2]).map(Operand::Path);
    }
    parse_literal(token)
        .map(Operand::Literal)
        .ok_or_else(|| CompileError::Malformed {
            expression: expression.to_string(),
            reason: format!("invalid literal '{}'", token),
        })
}

fn parse_literal(token: &str) -> Option<AttrValue> {
    match token {
        "true" => return Some(AttrValue::Bool(true)),
        "false" => return Some(AttrValue::Bool(false)),
        _ => {}
    }
    if number_re().is_match(token) {
        return token.parse::<f64>().ok().map(AttrValue::Num);
    }
    let quote = token.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    unquote(&token[1..], quote).map(AttrValue::Str)
}

/// Unescape the body of a quoted literal; the closing quote must end the token.
fn unquote(body: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            c if c == quote => return chars.next().is_none().then_some(out),
            c => out.push(c),
        }
    }
    None
}

/// `Some(result)` when the values are comparable under `op`, `None` otherwise.
fn compare(lhs: &AttrValue, op: Comparator, rhs: &AttrValue) -> Option<bool> {
    match op {
        Comparator::Eq => Some(values_equal(lhs, rhs)),
        Comparator::Ne => Some(!values_equal(lhs, rhs)),
        _ => order(lhs, rhs).map(|ordering| op.accepts(ordering)),
    }
}

fn values_equal(lhs: &AttrValue, rhs: &AttrValue) -> bool {
    use AttrValue::*;
    match (lhs, rhs) {
        (Str(a), Str(b)) => a == b,
        (Bool(a), Bool(b)) => a == b,
        (Num(a), Num(b)) => a == b,
        (Num(_), Str(_)) | (Str(_), Num(_)) => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Time(_), _) | (_, Time(_)) => match (lhs.as_timestamp(), rhs.as_timestamp()) {
            (Some(a), Some(b)) => a == b,
            _ => lhs.canonical_string() == rhs.canonical_string(),
        },
        _ => lhs.canonical_string() == rhs.canonical_string(),
    }
}

fn order(lhs: &AttrValue, rhs: &AttrValue) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (as_version(lhs), as_version(rhs)) {
        return Some(a.cmp(&b));
    }
    match (lhs.as_timestamp(), rhs.as_timestamp()) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

/// `MAJOR.MINOR.PATCH` strings, ordered by semver precedence.
fn as_version(value: &AttrValue) -> Option<Version> {
    match value {
        AttrValue::Str(s) => Version::parse(s.trim()).ok(),
        _ => None,
    }
}
