//! Constraint compiler.
//!
//! Parses every field-constraint expression of a framework once and keeps
//! the result in a bounded LRU cache keyed by framework SAID. Frameworks are
//! immutable once addressed, so a cached entry never goes stale.
//!
//! An expression that fails to compile does not abort compilation: the
//! error is kept on its [`CompiledRule`] and the checker reports it as a
//! violation whenever the rule applies.

pub mod expression;

use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::canonical::canonical_hash_hex;
use crate::config::CacheConfig;
use crate::types::framework::GovernanceFramework;
use crate::types::rule::ConstraintRule;

pub use expression::{
    compile_field_expression, evaluate_expression, Comparator, CompileError,
    CompiledFieldConstraint, FieldOutcome, FieldPath, Operand,
};

/// One rule with its expressions parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// Source rule.
    pub rule: ConstraintRule,
    /// Compiled expressions, in label order.
    pub constraints: Vec<CompiledFieldConstraint>,
    /// Expressions that failed to compile, by label.
    pub errors: Vec<(String, CompileError)>,
}

impl CompiledRule {
    /// Compile every expression of `rule`.
    pub fn compile(rule: &ConstraintRule) -> Self {
        let mut constraints = Vec::with_capacity(rule.field_constraints.len());
        let mut errors = Vec::new();
        for (label, source) in &rule.field_constraints {
            match compile_field_expression(label, source) {
                Ok(compiled) => constraints.push(compiled),
                Err(e) => {
                    warn!(rule = %rule.name, label = %label, error = %e, "field constraint failed to compile");
                    errors.push((label.clone(), e));
                }
            }
        }
        Self {
            rule: rule.clone(),
            constraints,
            errors,
        }
    }

    /// Whether every expression compiled.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// All rules of one framework, compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFramework {
    /// SAID of the source framework.
    pub framework_said: String,
    /// xxh64 fingerprint of the source rules.
    pub rules_fingerprint: String,
    /// Compiled rules in declaration order.
    pub rules: Vec<CompiledRule>,
}

impl CompiledFramework {
    /// Compiled rules governing `edge_type`, in declaration order.
    pub fn rules_for<'a>(&'a self, edge_type: &'a str) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules.iter().filter(move |r| r.rule.applies(edge_type))
    }

    /// `(rule name, label, error)` for every expression that failed to compile.
    pub fn compile_errors(&self) -> impl Iterator<Item = (&str, &str, &CompileError)> {
        self.rules.iter().flat_map(|r| {
            r.errors
                .iter()
                .map(move |(label, e)| (r.rule.name.as_str(), label.as_str(), e))
        })
    }

    /// Whether every expression of every rule compiled.
    pub fn is_fully_compiled(&self) -> bool {
        self.rules.iter().all(CompiledRule::is_valid)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the framework has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compiles frameworks, caching the result per SAID.
pub struct ConstraintCompiler {
    cache: Option<Arc<RwLock<LruCache<String, Arc<CompiledFramework>>>>>,
}

impl Default for ConstraintCompiler {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ConstraintCompiler {
    /// Create a compiler with the given cache configuration.
    pub fn new(config: CacheConfig) -> Self {
        let cache = NonZeroUsize::new(config.max_entries)
            .filter(|_| config.enabled)
            .map(|size| Arc::new(RwLock::new(LruCache::new(size))));
        Self { cache }
    }

    /// Compiler without a cache.
    pub fn uncached() -> Self {
        Self::new(CacheConfig::disabled())
    }

    /// Compile `framework`, reusing a cached result for its SAID.
    pub fn compile(&self, framework: &GovernanceFramework) -> Arc<CompiledFramework> {
        let Some(cache) = &self.cache else {
            return Arc::new(Self::compile_rules(&framework.said, &framework.rules));
        };

        if let Some(hit) = cache.write().get(&framework.said) {
            debug!(said = %framework.said, "compiled framework cache hit");
            return Arc::clone(hit);
        }

        let compiled = Arc::new(Self::compile_rules(&framework.said, &framework.rules));
        let mut guard = cache.write();
        // Another caller may have compiled the same SAID meanwhile; keep theirs.
        if let Some(existing) = guard.get(&framework.said) {
            return Arc::clone(existing);
        }
        guard.put(framework.said.clone(), Arc::clone(&compiled));
        compiled
    }

    /// Compile a rule list without touching the cache.
    pub fn compile_rules(framework_said: &str, rules: &[ConstraintRule]) -> CompiledFramework {
        let compiled = CompiledFramework {
            framework_said: framework_said.to_string(),
            rules_fingerprint: canonical_hash_hex(&rules),
            rules: rules.iter().map(CompiledRule::compile).collect(),
        };
        debug!(
            said = %framework_said,
            rules = compiled.rules.len(),
            fully_compiled = compiled.is_fully_compiled(),
            "compiled framework"
        );
        compiled
    }

    /// Whether a compiled form of `said` is cached.
    pub fn is_cached(&self, said: &str) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.read().contains(said))
    }

    /// Get cache statistics.
    ///
    /// Returns `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    /// Clear the compiled-framework cache.
    ///
    /// Does nothing if caching is disabled.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

impl std::fmt::Debug for ConstraintCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintCompiler")
            .field("cache", &self.cache_stats())
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}
