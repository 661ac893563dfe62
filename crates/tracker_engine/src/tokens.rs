//! Access-token lifecycle. Labels are stored upper-cased; at most one
//! live token exists per (agent, label), enforced by the store's partial
//! unique index as well as the create check here.

use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::StatStore;

/// Reserved label for the web session token.
pub const WEB_TOKEN: &str = "WEBAPP";

/// Create a token under the given purpose label. The secret is returned
/// exactly once, here; it cannot be read back later. Returns `None` when
/// a live token with that label already exists.
pub fn create_token(
    store: &StatStore,
    agent: &str,
    label: &str,
) -> Result<Option<String>, EngineError> {
    let label = label.to_uppercase();
    if store.live_token(agent, &label)?.is_some() {
        return Ok(None);
    }
    let secret = generate_secret(agent, &label);
    store.insert_token(agent, &label, &secret)?;
    debug!(agent, label = %label, "issued access token");
    Ok(Some(secret))
}

/// Revoke the live token with the given label. The row's label is
/// rewritten with a timestamp suffix so the label frees up immediately.
/// Revoking the web-session token issues a replacement on the spot, so
/// exactly one live web token exists afterwards. Returns whether a live
/// token was found.
pub fn revoke_token(store: &StatStore, agent: &str, label: &str) -> Result<bool, EngineError> {
    let label = label.to_uppercase();
    if !store.revoke_token_row(agent, &label, Utc::now().timestamp())? {
        return Ok(false);
    }
    debug!(agent, label = %label, "revoked access token");
    if label == WEB_TOKEN {
        create_token(store, agent, WEB_TOKEN)?;
    }
    Ok(true)
}

fn generate_secret(agent: &str, label: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut hasher = Sha256::new();
    hasher.update(agent.as_bytes());
    hasher.update(label.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(salt);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_common::Faction;

    fn seeded_store() -> StatStore {
        let store = StatStore::open_in_memory().unwrap();
        store
            .add_agent("Scout", Faction::Enlightened, "scout@example.com")
            .unwrap();
        store
    }

    #[test]
    fn secret_is_returned_only_at_creation() {
        let store = seeded_store();
        let secret = create_token(&store, "Scout", "upload").unwrap().unwrap();
        assert_eq!(secret.len(), 64);
        // a second create under the same label is refused
        assert!(create_token(&store, "Scout", "upload").unwrap().is_none());
        assert!(create_token(&store, "Scout", "UPLOAD").unwrap().is_none());
    }

    #[test]
    fn labels_are_stored_uppercased() {
        let store = seeded_store();
        create_token(&store, "Scout", "upload").unwrap().unwrap();
        assert_eq!(store.token_labels("Scout").unwrap(), vec!["UPLOAD"]);
    }

    #[test]
    fn secrets_differ_between_tokens() {
        let store = seeded_store();
        let a = create_token(&store, "Scout", "one").unwrap().unwrap();
        let b = create_token(&store, "Scout", "two").unwrap().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn revoking_unknown_label_reports_false() {
        let store = seeded_store();
        assert!(!revoke_token(&store, "Scout", "nope").unwrap());
    }

    #[test]
    fn revoking_web_token_reissues_exactly_one() {
        let store = seeded_store();
        let first = create_token(&store, "Scout", WEB_TOKEN).unwrap().unwrap();
        assert!(revoke_token(&store, "Scout", WEB_TOKEN).unwrap());

        let replacement = store.live_token("Scout", WEB_TOKEN).unwrap().unwrap();
        assert_ne!(replacement, first);

        let web_labels: Vec<String> = store
            .token_labels("Scout")
            .unwrap()
            .into_iter()
            .filter(|l| l == WEB_TOKEN)
            .collect();
        assert_eq!(web_labels.len(), 1);
    }

    #[test]
    fn revoking_ordinary_label_does_not_reissue() {
        let store = seeded_store();
        create_token(&store, "Scout", "upload").unwrap().unwrap();
        assert!(revoke_token(&store, "Scout", "upload").unwrap());
        assert!(store.live_token("Scout", "UPLOAD").unwrap().is_none());
        assert!(store.token_labels("Scout").unwrap().is_empty());
    }
}
