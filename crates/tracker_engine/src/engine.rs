//! Engine facade: owns the store and the computation backend handle and
//! opens per-request agent sessions. Handles are explicit — there is no
//! process-wide database singleton to reach for.

use std::path::Path;

use tracker_common::{AgentIdentity, ResolvedAgent};

use crate::backend::{ComputationBackend, SqlBackend};
use crate::error::EngineError;
use crate::identity;
use crate::session::AgentSession;
use crate::store::StatStore;

pub struct StatEngine {
    store: StatStore,
    backend: Box<dyn ComputationBackend>,
}

impl StatEngine {
    pub fn new(store: StatStore, backend: Box<dyn ComputationBackend>) -> Self {
        Self { store, backend }
    }

    /// Open the store and a SQL computation backend over the same
    /// database file.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let store = StatStore::open_at(path.as_ref())?;
        let backend = SqlBackend::open_at(path.as_ref())?;
        Ok(Self::new(store, Box::new(backend)))
    }

    pub fn store(&self) -> &StatStore {
        &self.store
    }

    pub fn backend(&self) -> &dyn ComputationBackend {
        self.backend.as_ref()
    }

    /// Resolve an access-token secret to an agent, or the invalid
    /// sentinel.
    pub fn resolve_by_credential(&self, secret: &str) -> Result<ResolvedAgent, EngineError> {
        identity::resolve_by_credential(&self.store, secret)
    }

    /// Resolve a registered email to an agent, or the invalid sentinel.
    pub fn resolve_by_principal(&self, email: &str) -> Result<ResolvedAgent, EngineError> {
        identity::resolve_by_principal(&self.store, email)
    }

    /// Open a request-scoped session for a resolved identity. The
    /// session starts with empty caches.
    pub fn session(&self, identity: AgentIdentity) -> AgentSession<'_> {
        AgentSession::new(self, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracker_common::Faction;

    #[test]
    fn open_at_resolves_and_opens_sessions() {
        let dir = tempdir().unwrap();
        let engine = StatEngine::open_at(dir.path().join("tracker.db")).unwrap();
        engine
            .store()
            .add_agent("Scout", Faction::Enlightened, "scout@example.com")
            .unwrap();
        engine
            .store()
            .insert_token("Scout", "WEBAPP", "secret-1")
            .unwrap();

        let resolved = engine.resolve_by_credential("secret-1").unwrap();
        let identity = resolved.into_agent().expect("valid agent");
        let mut session = engine.session(identity);
        assert_eq!(session.name(), "Scout");
        assert!(!session.has_submitted(false).unwrap());
    }

    #[test]
    fn unknown_credential_resolves_invalid() {
        let dir = tempdir().unwrap();
        let engine = StatEngine::open_at(dir.path().join("tracker.db")).unwrap();
        assert!(!engine.resolve_by_credential("nope").unwrap().is_valid());
    }
}
