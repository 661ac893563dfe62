//! Identity resolution: an opaque credential or a registered email in, a
//! valid agent or the invalid sentinel out. Never an error for "not
//! found" — callers check validity instead of catching.

use tracing::warn;

use tracker_common::{AgentIdentity, ResolvedAgent};

use crate::error::EngineError;
use crate::store::StatStore;
use crate::tokens::WEB_TOKEN;

/// Resolve by access-token secret. A successful resolution stamps the
/// token's last-used time; that stamp is best-effort and a failure to
/// write it does not fail the resolution.
pub fn resolve_by_credential(
    store: &StatStore,
    secret: &str,
) -> Result<ResolvedAgent, EngineError> {
    if secret.is_empty() {
        return Ok(ResolvedAgent::Invalid);
    }
    let Some((name, faction)) = store.agent_by_token(secret)? else {
        return Ok(ResolvedAgent::Invalid);
    };
    if let Err(err) = store.touch_token(secret) {
        warn!(agent = %name, %err, "failed to stamp token last_used");
    }
    Ok(match AgentIdentity::new(name, faction, secret) {
        Some(agent) => ResolvedAgent::Valid(agent),
        None => ResolvedAgent::Invalid,
    })
}

/// Resolve by registered email. An agent without a live web-session token
/// has no usable credential and resolves invalid.
pub fn resolve_by_principal(store: &StatStore, email: &str) -> Result<ResolvedAgent, EngineError> {
    if email.is_empty() {
        return Ok(ResolvedAgent::Invalid);
    }
    let Some((name, faction)) = store.agent_by_email(email)? else {
        return Ok(ResolvedAgent::Invalid);
    };
    let Some(secret) = store.live_token(&name, WEB_TOKEN)? else {
        return Ok(ResolvedAgent::Invalid);
    };
    Ok(match AgentIdentity::new(name, faction, secret) {
        Some(agent) => ResolvedAgent::Valid(agent),
        None => ResolvedAgent::Invalid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_common::Faction;

    fn seeded_store() -> StatStore {
        let store = StatStore::open_in_memory().unwrap();
        store
            .add_agent("Scout", Faction::Resistance, "scout@example.com")
            .unwrap();
        store.insert_token("Scout", WEB_TOKEN, "secret-1").unwrap();
        store
    }

    #[test]
    fn empty_credential_is_invalid() {
        let store = seeded_store();
        assert_eq!(
            resolve_by_credential(&store, "").unwrap(),
            ResolvedAgent::Invalid
        );
        assert_eq!(
            resolve_by_principal(&store, "").unwrap(),
            ResolvedAgent::Invalid
        );
    }

    #[test]
    fn unknown_credential_is_invalid_not_an_error() {
        let store = seeded_store();
        assert_eq!(
            resolve_by_credential(&store, "not-a-token").unwrap(),
            ResolvedAgent::Invalid
        );
        assert_eq!(
            resolve_by_principal(&store, "ghost@example.com").unwrap(),
            ResolvedAgent::Invalid
        );
    }

    #[test]
    fn credential_resolution_carries_identity() {
        let store = seeded_store();
        let resolved = resolve_by_credential(&store, "secret-1").unwrap();
        let agent = resolved.agent().expect("valid agent");
        assert_eq!(agent.name(), "Scout");
        assert_eq!(agent.faction(), Faction::Resistance);
        assert_eq!(agent.token(), "secret-1");
    }

    #[test]
    fn credential_resolution_touches_last_used() {
        let store = seeded_store();
        let _ = resolve_by_credential(&store, "secret-1").unwrap();
        let last_used: Option<String> = store
            .connection_for_tests()
            .query_row(
                "SELECT last_used FROM tokens WHERE token = 'secret-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(last_used.is_some());
    }

    #[test]
    fn email_without_live_web_token_is_invalid() {
        let store = seeded_store();
        store
            .revoke_token_row("Scout", WEB_TOKEN, 1700000000)
            .unwrap();
        assert_eq!(
            resolve_by_principal(&store, "scout@example.com").unwrap(),
            ResolvedAgent::Invalid
        );
    }

    #[test]
    fn email_resolution_uses_the_web_token() {
        let store = seeded_store();
        let resolved = resolve_by_principal(&store, "scout@example.com").unwrap();
        let agent = resolved.agent().expect("valid agent");
        assert_eq!(agent.token(), "secret-1");
    }
}
