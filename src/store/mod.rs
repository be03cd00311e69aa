//! Credential source boundary.
//!
//! The resolver consumes exactly one external capability: fetch a raw
//! credential by SAID. Any ledger client, registry or test double can stand
//! behind [`CredentialSource`]; plain closures work too.

pub mod memory;

use serde_json::Value;

/// Error reported by a credential source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backend could not be reached.
    #[error("Credential source unavailable: {0}")]
    Unavailable(String),
    /// The backend failed while fetching one SAID.
    #[error("Failed to fetch {said}: {message}")]
    Backend {
        /// Requested SAID.
        said: String,
        /// Backend message.
        message: String,
    },
}

/// Fetch raw credentials by SAID.
///
/// Implementations must be deterministic per SAID: content addressing means
/// a SAID never maps to two different credentials.
pub trait CredentialSource: Send + Sync {
    /// Fetch the credential addressed by `said`; `Ok(None)` when unknown.
    fn fetch(&self, said: &str) -> Result<Option<Value>, SourceError>;
}

impl<F> CredentialSource for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync,
{
    fn fetch(&self, said: &str) -> Result<Option<Value>, SourceError> {
        Ok(self(said))
    }
}

pub use memory::InMemoryCredentialStore;
