//! Governance evolution.
//!
//! A framework never changes in place. Every evolution issues a new
//! credential carrying a `supersedes` edge to the version it replaces, then
//! registers it with the resolver.
//!
//! - **Mode A** (steward supersession): the steward recorded on the current
//!   version authorizes the change.
//! - **Mode B** (emergent deliberation): a ratification credential
//!   authorizes the change; the proposer becomes the new steward.
//!
//! Evolutions of one lineage are serialized by a lock keyed on the lineage's
//! root SAID, and a version that already has a successor cannot be
//! superseded again. Failed attempts register nothing.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::resolver::FrameworkResolver;
use crate::types::framework::{
    ensure_unique_rule_names, Authorities, ContentSaid, FrameworkDraft, GovernanceFramework,
    SaidFactory,
};
use crate::types::rule::{ConstraintRule, CredentialMatrixEntry};

/// Version used when the current version string cannot be bumped.
pub const FALLBACK_BUMPED_VERSION: &str = "1.1.0";

/// Characters of an identifier shown in reasons.
const ABBREVIATION: usize = 16;

/// Authorization model of an evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvolutionMode {
    /// Steward supersession.
    A,
    /// Emergent deliberation.
    B,
}

impl fmt::Display for EvolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Why an evolution was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvolutionFailure {
    /// The current framework did not resolve.
    NotFound,
    /// The caller may not evolve this framework.
    Unauthorized,
    /// Required input missing or ill-formed.
    MalformedInput,
    /// The current framework already has a successor.
    AlreadySuperseded,
}

/// Outcome of one evolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionResult {
    /// Whether a new version was produced.
    pub success: bool,
    /// The new version, on success.
    pub new_framework: Option<Arc<GovernanceFramework>>,
    /// SAID of the version being replaced, once it resolved.
    pub prior_said: Option<String>,
    /// Authorization model used.
    pub mode: EvolutionMode,
    /// Failure explanation or audit note.
    pub reason: String,
    /// Failure classification.
    pub failure: Option<EvolutionFailure>,
}

impl EvolutionResult {
    fn succeeded(
        mode: EvolutionMode,
        framework: Arc<GovernanceFramework>,
        prior_said: &str,
        reason: String,
    ) -> Self {
        Self {
            success: true,
            new_framework: Some(framework),
            prior_said: Some(prior_said.to_string()),
            mode,
            reason,
            failure: None,
        }
    }

    fn failed(
        mode: EvolutionMode,
        failure: EvolutionFailure,
        prior_said: Option<&str>,
        reason: String,
    ) -> Self {
        warn!(mode = %mode, failure = ?failure, reason = %reason, "evolution refused");
        Self {
            success: false,
            new_framework: None,
            prior_said: prior_said.map(str::to_string),
            mode,
            reason,
            failure: Some(failure),
        }
    }

    /// SAID of the new version.
    pub fn new_said(&self) -> Option<&str> {
        self.new_framework.as_ref().map(|f| f.said.as_str())
    }
}

/// Mode A input. Unset fields inherit from the current version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupersedeRequest {
    /// SAID of the version to replace.
    pub current_said: String,
    /// AID requesting the change.
    pub steward_aid: String,
    /// New name.
    pub name: Option<String>,
    /// New version; defaults to a minor bump.
    pub version: Option<String>,
    /// New rules.
    pub rules: Option<Vec<ConstraintRule>>,
    /// New credential matrix.
    pub matrix: Option<Vec<CredentialMatrixEntry>>,
    /// New authorities.
    pub authorities: Option<Authorities>,
    /// Audit note returned on success.
    pub reason: String,
}

impl SupersedeRequest {
    /// Request by `steward_aid` to replace `current_said`.
    pub fn new(current_said: impl Into<String>, steward_aid: impl Into<String>) -> Self {
        Self {
            current_said: current_said.into(),
            steward_aid: steward_aid.into(),
            ..Self::default()
        }
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Replace the rules.
    pub fn with_rules(mut self, rules: Vec<ConstraintRule>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Replace the credential matrix.
    pub fn with_matrix(mut self, matrix: Vec<CredentialMatrixEntry>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Replace the authorities.
    pub fn with_authorities(mut self, authorities: Authorities) -> Self {
        self.authorities = Some(authorities);
        self
    }

    /// Set the audit note.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Proposal content carried by a ratification.
#[derive(Debug, Clone, PartialEq)]
struct RatifiedProposal {
    proposer_aid: String,
    name: Option<String>,
    version: Option<String>,
    rules: Option<Vec<ConstraintRule>>,
    matrix: Option<Vec<CredentialMatrixEntry>>,
    authorities: Option<Authorities>,
}

impl RatifiedProposal {
    fn parse(data: &Value) -> Result<Self, String> {
        let Some(map) = data.as_object() else {
            return Err("Ratification data must be an object".to_string());
        };
        let proposer_aid = map
            .get("proposer_aid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Ratification data missing 'proposer_aid'".to_string())?
            .to_string();

        fn field<T: serde::de::DeserializeOwned>(
            map: &serde_json::Map<String, Value>,
            key: &str,
        ) -> Result<Option<T>, String> {
            match map.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => serde_json::from_value(value.clone())
                    .map(Some)
                    .map_err(|e| format!("Invalid '{}': {}", key, e)),
            }
        }

        Ok(Self {
            proposer_aid,
            name: field(map, "proposed_name")?,
            version: field(map, "proposed_version")?,
            rules: field(map, "proposed_rules")?,
            matrix: field(map, "proposed_matrix")?,
            authorities: field(map, "proposed_authorities")?,
        })
    }
}

/// Produces new framework versions and registers them.
pub struct GovernanceEvolution {
    resolver: Arc<FrameworkResolver>,
    factory: Arc<dyn SaidFactory>,
    lineage_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GovernanceEvolution {
    /// Evolution over `resolver` with content-derived SAIDs.
    pub fn new(resolver: Arc<FrameworkResolver>) -> Self {
        Self {
            resolver,
            factory: Arc::new(ContentSaid),
            lineage_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Use `factory` to address new credentials.
    pub fn with_factory(mut self, factory: impl SaidFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// The resolver new versions are registered with.
    pub fn resolver(&self) -> &Arc<FrameworkResolver> {
        &self.resolver
    }

    /// Mode A: steward supersession.
    pub fn supersede(&self, request: SupersedeRequest) -> EvolutionResult {
        let mode = EvolutionMode::A;
        let current_said = request.current_said.as_str();

        let Some(current) = self.resolver.resolve(current_said) else {
            return EvolutionResult::failed(
                mode,
                EvolutionFailure::NotFound,
                None,
                format!("Current framework {} not found", current_said),
            );
        };

        if let Some(steward) = current.steward.as_deref() {
            if steward != request.steward_aid {
                return EvolutionResult::failed(
                    mode,
                    EvolutionFailure::Unauthorized,
                    Some(current_said),
                    format!(
                        "Steward {}... is not authorized. Framework steward is {}...",
                        abbreviate(&request.steward_aid),
                        abbreviate(steward)
                    ),
                );
            }
        }

        if let Some(rules) = &request.rules {
            if let Err(e) = ensure_unique_rule_names(rules) {
                return EvolutionResult::failed(mode, EvolutionFailure::MalformedInput, Some(current_said), e.to_string());
            }
        }

        let draft = FrameworkDraft {
            name: request.name.unwrap_or_else(|| current.name.clone()),
            version: request
                .version
                .unwrap_or_else(|| bump_minor_version(current.version())),
            steward: Some(request.steward_aid),
            rules: request.rules.unwrap_or_else(|| current.rules.clone()),
            credential_matrix: request
                .matrix
                .unwrap_or_else(|| current.credential_matrix.clone()),
            authorities: request
                .authorities
                .unwrap_or_else(|| current.authorities.clone()),
            supersedes: Some(current.said.clone()),
            ratification: None,
            evolution_mode: None,
        };

        self.commit(mode, &current, draft, request.reason)
    }

    /// Mode B: evolution authorized by a ratified deliberation.
    ///
    /// `ratification_data` must carry `proposer_aid` and may carry
    /// `proposed_name`, `proposed_version`, `proposed_rules`,
    /// `proposed_matrix` and `proposed_authorities`.
    pub fn evolve_from_ratification(
        &self,
        current_said: &str,
        ratification_said: &str,
        ratification_data: &Value,
    ) -> EvolutionResult {
        let mode = EvolutionMode::B;

        let Some(current) = self.resolver.resolve(current_said) else {
            return EvolutionResult::failed(
                mode,
                EvolutionFailure::NotFound,
                None,
                format!("Current framework {} not found", current_said),
            );
        };

        if ratification_said.is_empty() {
            return EvolutionResult::failed(
                mode,
                EvolutionFailure::MalformedInput,
                Some(current_said),
                "Ratification SAID is empty".to_string(),
            );
        }

        let proposal = match RatifiedProposal::parse(ratification_data) {
            Ok(proposal) => proposal,
            Err(reason) => {
                return EvolutionResult::failed(mode, EvolutionFailure::MalformedInput, Some(current_said), reason)
            }
        };

        if let Some(rules) = &proposal.rules {
            if let Err(e) = ensure_unique_rule_names(rules) {
                return EvolutionResult::failed(mode, EvolutionFailure::MalformedInput, Some(current_said), e.to_string());
            }
        }

        let draft = FrameworkDraft {
            name: proposal.name.unwrap_or_else(|| current.name.clone()),
            version: proposal
                .version
                .unwrap_or_else(|| bump_minor_version(current.version())),
            steward: Some(proposal.proposer_aid),
            rules: proposal.rules.unwrap_or_else(|| current.rules.clone()),
            credential_matrix: proposal
                .matrix
                .unwrap_or_else(|| current.credential_matrix.clone()),
            authorities: proposal
                .authorities
                .unwrap_or_else(|| current.authorities.clone()),
            supersedes: Some(current.said.clone()),
            ratification: Some(ratification_said.to_string()),
            evolution_mode: Some(mode.to_string()),
        };

        let reason = format!("Ratified via {}...", abbreviate(ratification_said));
        self.commit(mode, &current, draft, reason)
    }

    /// Issue and register `draft` under the lineage lock of `current`.
    fn commit(
        &self,
        mode: EvolutionMode,
        current: &GovernanceFramework,
        draft: FrameworkDraft,
        reason: String,
    ) -> EvolutionResult {
        let (root, lock) = self.lineage_lock(&current.said);
        let result = {
            let _guard = lock.lock();
            self.commit_locked(mode, current, draft, reason)
        };
        self.release_lineage_lock(&root, lock);
        result
    }

    fn commit_locked(
        &self,
        mode: EvolutionMode,
        current: &GovernanceFramework,
        draft: FrameworkDraft,
        reason: String,
    ) -> EvolutionResult {
        if let Some(successor) = self.resolver.superseded_by(&current.said) {
            return EvolutionResult::failed(
                mode,
                EvolutionFailure::AlreadySuperseded,
                Some(current.said.as_str()),
                format!(
                    "Framework {}... is already superseded by {}...",
                    abbreviate(&current.said),
                    abbreviate(&successor)
                ),
            );
        }

        let issued = draft.issue(self.factory.as_ref());
        let framework = self.resolver.register(issued);
        self.resolver.register_supersession(&framework.said, &current.said);

        info!(
            mode = %mode,
            prior = %current.said,
            new = %framework.said,
            version = %framework.version(),
            "framework evolved"
        );
        EvolutionResult::succeeded(mode, framework, &current.said, reason)
    }

    /// Lock shared by every version of the lineage containing `said`, keyed
    /// by the lineage root.
    fn lineage_lock(&self, said: &str) -> (String, Arc<Mutex<()>>) {
        let chain = self.resolver.resolve_chain(said);
        let root = chain
            .root()
            .map(|f| f.said.clone())
            .unwrap_or_else(|| said.to_string());
        let lock = Arc::clone(self.lineage_locks.lock().entry(root.clone()).or_default());
        (root, lock)
    }

    /// Drop the map entry for `root` once no other commit holds its lock.
    ///
    /// Clones are only taken under the map lock, so a count of two (map and
    /// `lock`) means no commit is waiting on this lineage.
    fn release_lineage_lock(&self, root: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.lineage_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(root);
        }
    }
}

impl fmt::Debug for GovernanceEvolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GovernanceEvolution")
            .field("resolver", &self.resolver)
            .field("lineages", &self.lineage_locks.lock().len())
            .finish()
    }
}

/// `MAJOR.MINOR.PATCH` → `MAJOR.(MINOR+1).0`; anything else → `1.1.0`.
pub fn bump_minor_version(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return FALLBACK_BUMPED_VERSION.to_string();
    };
    match (major.parse::<u64>(), minor.parse::<u64>(), patch.parse::<u64>()) {
        (Ok(major), Ok(minor), Ok(_)) => format!("{}.{}.0", major, minor.saturating_add(1)),
        _ => FALLBACK_BUMPED_VERSION.to_string(),
    }
}

fn abbreviate(id: &str) -> String {
    id.chars().take(ABBREVIATION).collect()
}
