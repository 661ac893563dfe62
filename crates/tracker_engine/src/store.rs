//! SQLite-backed stat store: agents, access tokens, the stat catalog, and
//! the per-day data points every derived view is computed from.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use tracker_common::{Faction, StatDef};

use crate::error::EngineError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    agent TEXT PRIMARY KEY,
    faction TEXT NOT NULL CHECK (faction IN ('E', 'R')),
    email TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS tokens (
    agent TEXT NOT NULL REFERENCES agents(agent),
    name TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    revoked INTEGER NOT NULL DEFAULT 0,
    created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_used TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_live
    ON tokens(agent, name) WHERE revoked = 0;

CREATE TABLE IF NOT EXISTS stats (
    stat TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    nickname TEXT NOT NULL,
    unit TEXT NOT NULL,
    badge TEXT
);

CREATE TABLE IF NOT EXISTS data (
    agent TEXT NOT NULL REFERENCES agents(agent),
    date TEXT NOT NULL,
    timepoint INTEGER NOT NULL,
    stat TEXT NOT NULL,
    value INTEGER NOT NULL,
    updated TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (agent, date, stat)
);

CREATE INDEX IF NOT EXISTS idx_data_agent_updated ON data(agent, updated DESC);
"#;

static DEFAULT_CATALOG: Lazy<Vec<StatDef>> = Lazy::new(|| {
    fn def(stat: &str, name: &str, nickname: &str, unit: &str, badge: Option<&str>) -> StatDef {
        StatDef {
            stat: stat.to_string(),
            name: name.to_string(),
            nickname: nickname.to_string(),
            unit: unit.to_string(),
            badge: badge.map(str::to_string),
        }
    }
    vec![
        def("ap", "Lifetime AP", "AP", "AP", None),
        def("explorer", "Unique Portals Visited", "Explorer", "portals", Some("Explorer")),
        def("hacker", "Hacks", "Hacker", "hacks", Some("Hacker")),
        def("builder", "Resonators Deployed", "Builder", "resonators", Some("Builder")),
        def("connector", "Links Created", "Connector", "links", Some("Connector")),
        def(
            "mind_controller",
            "Control Fields Created",
            "Mind Controller",
            "fields",
            Some("Mind Controller"),
        ),
        def("liberator", "Portals Captured", "Liberator", "portals", Some("Liberator")),
        def("purifier", "Resonators Destroyed", "Purifier", "resonators", Some("Purifier")),
        def("trekker", "Distance Walked", "Trekker", "km", Some("Trekker")),
        def("recharger", "XM Recharged", "Recharger", "XM", Some("Recharger")),
    ]
});

/// Durable store behind the engine. One connection, opened per process;
/// the engine receives the handle explicitly instead of reaching for a
/// process-wide singleton.
pub struct StatStore {
    conn: Connection,
}

impl StatStore {
    /// Open or create the store at the given path.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, EngineError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        let store = Self { conn };
        store.seed_catalog()?;
        Ok(store)
    }

    /// Seed the stat catalog when the table is empty.
    fn seed_catalog(&self) -> Result<(), EngineError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }
        for def in DEFAULT_CATALOG.iter() {
            self.conn.execute(
                "INSERT INTO stats (stat, name, nickname, unit, badge) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![def.stat, def.name, def.nickname, def.unit, def.badge],
            )?;
        }
        debug!(entries = DEFAULT_CATALOG.len(), "seeded stat catalog");
        Ok(())
    }

    /// Begin an immediate-mode transaction, taking the write lock up
    /// front so the read-then-write monotonicity check cannot interleave
    /// with another writer.
    pub(crate) fn begin_submit(&self) -> Result<Transaction<'_>, EngineError> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    #[cfg(test)]
    pub(crate) fn connection_for_tests(&self) -> &Connection {
        &self.conn
    }

    // --- agents ---

    /// Register an agent. The name is case-preserving and unique.
    pub fn add_agent(&self, name: &str, faction: Faction, email: &str) -> Result<(), EngineError> {
        self.conn.execute(
            "INSERT INTO agents (agent, faction, email) VALUES (?1, ?2, ?3)",
            params![name, faction.letter(), email],
        )?;
        Ok(())
    }

    /// Agent behind a non-revoked token secret, if any.
    pub fn agent_by_token(&self, secret: &str) -> Result<Option<(String, Faction)>, EngineError> {
        let row = self
            .conn
            .query_row(
                "SELECT a.agent, a.faction FROM agents a
                 JOIN tokens t ON t.agent = a.agent
                 WHERE t.token = ?1 AND t.revoked = 0",
                params![secret],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(name, letter)| Faction::from_letter(&letter).map(|f| (name, f))))
    }

    /// Agent registered under the given email, if any.
    pub fn agent_by_email(&self, email: &str) -> Result<Option<(String, Faction)>, EngineError> {
        let row = self
            .conn
            .query_row(
                "SELECT agent, faction FROM agents WHERE email = ?1",
                params![email],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(name, letter)| Faction::from_letter(&letter).map(|f| (name, f))))
    }

    // --- tokens ---

    /// Stamp a token's last-used time.
    pub fn touch_token(&self, secret: &str) -> Result<(), EngineError> {
        self.conn.execute(
            "UPDATE tokens SET last_used = CURRENT_TIMESTAMP WHERE token = ?1",
            params![secret],
        )?;
        Ok(())
    }

    /// Secret of the live (non-revoked) token with the given label.
    pub fn live_token(&self, agent: &str, label: &str) -> Result<Option<String>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT token FROM tokens WHERE agent = ?1 AND name = ?2 AND revoked = 0",
                params![agent, label],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Labels of all live tokens for the agent.
    pub fn token_labels(&self, agent: &str) -> Result<Vec<String>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM tokens WHERE agent = ?1 AND revoked = 0 ORDER BY name")?;
        let rows = stmt.query_map(params![agent], |row| row.get(0))?;
        let mut labels = Vec::new();
        for label in rows {
            labels.push(label?);
        }
        Ok(labels)
    }

    pub fn insert_token(&self, agent: &str, label: &str, secret: &str) -> Result<(), EngineError> {
        self.conn.execute(
            "INSERT INTO tokens (agent, name, token) VALUES (?1, ?2, ?3)",
            params![agent, label, secret],
        )?;
        Ok(())
    }

    /// Revoke the live token with the given label, rewriting its label to
    /// a timestamp-suffixed value so the label can be reused. Returns
    /// whether a live token existed.
    pub fn revoke_token_row(
        &self,
        agent: &str,
        label: &str,
        unix_ts: i64,
    ) -> Result<bool, EngineError> {
        let changed = self.conn.execute(
            "UPDATE tokens SET revoked = 1, name = name || '-' || ?3
             WHERE agent = ?1 AND name = ?2 AND revoked = 0",
            params![agent, label, unix_ts],
        )?;
        Ok(changed > 0)
    }

    // --- stat catalog ---

    pub fn stat_catalog(&self) -> Result<Vec<StatDef>, EngineError> {
        let mut stmt = self
            .conn
            .prepare("SELECT stat, name, nickname, unit, badge FROM stats ORDER BY stat")?;
        let rows = stmt.query_map([], |row| {
            Ok(StatDef {
                stat: row.get(0)?,
                name: row.get(1)?,
                nickname: row.get(2)?,
                unit: row.get(3)?,
                badge: row.get(4)?,
            })
        })?;
        let mut defs = Vec::new();
        for def in rows {
            defs.push(def?);
        }
        Ok(defs)
    }

    // --- data points ---

    /// Earliest submission date for the agent; today when none exist.
    pub fn anchor_date(&self, agent: &str) -> Result<NaiveDate, EngineError> {
        let today = Utc::now().date_naive();
        let min: Option<NaiveDate> = self.conn.query_row(
            "SELECT MIN(date) FROM data WHERE agent = ?1",
            params![agent],
            |row| row.get(0),
        )?;
        Ok(min.unwrap_or(today))
    }

    /// Committed value for one (agent, date, stat) key.
    pub fn current_value(
        &self,
        agent: &str,
        date: NaiveDate,
        stat: &str,
    ) -> Result<Option<i64>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM data WHERE agent = ?1 AND date = ?2 AND stat = ?3",
                params![agent, date, stat],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Whether the agent has ever submitted (an `ap` data point exists).
    pub fn has_submitted(&self, agent: &str) -> Result<bool, EngineError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(stat) FROM data WHERE stat = 'ap' AND agent = ?1",
            params![agent],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Unix timestamp of the most recent update, overall or for one day.
    pub fn update_timestamp(
        &self,
        agent: &str,
        date: Option<NaiveDate>,
    ) -> Result<Option<i64>, EngineError> {
        let ts: Option<i64> = match date {
            None => self.conn.query_row(
                "SELECT CAST(strftime('%s', MAX(updated)) AS INTEGER) FROM data WHERE agent = ?1",
                params![agent],
                |row| row.get(0),
            )?,
            Some(date) => self.conn.query_row(
                "SELECT CAST(strftime('%s', MAX(updated)) AS INTEGER)
                 FROM data WHERE agent = ?1 AND date = ?2",
                params![agent, date],
                |row| row.get(0),
            )?,
        };
        Ok(ts)
    }

    /// Date of the most recently updated submission, if any.
    pub fn latest_submission_date(&self, agent: &str) -> Result<Option<NaiveDate>, EngineError> {
        Ok(self
            .conn
            .query_row(
                "SELECT date FROM data WHERE agent = ?1 ORDER BY updated DESC LIMIT 1",
                params![agent],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All stat values for one day, with `ap` defaulted to 0. `None`
    /// yields the baseline map alone.
    pub fn stats_snapshot(
        &self,
        agent: &str,
        date: Option<NaiveDate>,
    ) -> Result<BTreeMap<String, i64>, EngineError> {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("ap".to_string(), 0);
        let Some(date) = date else {
            return Ok(snapshot);
        };
        let mut stmt = self.conn.prepare(
            "SELECT stat, value FROM data WHERE agent = ?1 AND date = ?2 ORDER BY stat ASC",
        )?;
        let rows = stmt.query_map(params![agent, date], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (stat, value) = row?;
            snapshot.insert(stat, value);
        }
        Ok(snapshot)
    }
}
