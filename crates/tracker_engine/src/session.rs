//! Request-scoped agent session.
//!
//! A session is created per resolved identity and owns that agent's view
//! cache. Sessions are never shared between requests; a fresh resolution
//! means fresh, empty caches.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};

use tracker_common::{
    AgentIdentity, BadgeSet, BreakdownView, Faction, GraphView, Prediction, RatioPair,
    SubmitBatch, TrendPeriod, TrendView, UpcomingBadge,
};

use crate::cache::{ViewCache, ViewKind};
use crate::engine::StatEngine;
use crate::error::EngineError;
use crate::{tokens, update, views};

/// Default number of upcoming badges to report.
pub const DEFAULT_UPCOMING_LIMIT: usize = 4;

pub struct AgentSession<'e> {
    engine: &'e StatEngine,
    identity: AgentIdentity,
    cache: ViewCache,
}

impl<'e> AgentSession<'e> {
    pub(crate) fn new(engine: &'e StatEngine, identity: AgentIdentity) -> Self {
        Self {
            engine,
            identity,
            cache: ViewCache::default(),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn faction(&self) -> Faction {
        self.identity.faction()
    }

    /// Current level; 0 for an agent with no data.
    pub fn level(&mut self, refresh: bool) -> Result<i64, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .level
            .get_or_load(refresh, || {
                views::level(engine.store(), engine.backend(), name, None)
            })
            .copied()
    }

    /// Stat values for a day: the given date when it is today or past,
    /// otherwise the latest submission. `ap` is always present.
    pub fn stats(
        &mut self,
        when: Option<NaiveDate>,
        refresh: bool,
    ) -> Result<BTreeMap<String, i64>, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .stats
            .get_or_load(refresh, || {
                let today = Utc::now().date_naive();
                let effective = match when {
                    Some(date) if date <= today => Some(date),
                    _ => engine.store().latest_submission_date(name)?,
                };
                engine.store().stats_snapshot(name, effective)
            })
            .cloned()
    }

    /// One stat's latest value; 0 when the agent never submitted it.
    pub fn stat(&mut self, stat: &str, refresh: bool) -> Result<i64, EngineError> {
        Ok(self.stats(None, refresh)?.get(stat).copied().unwrap_or(0))
    }

    /// Badges earned as of `date` (today when absent), with the same-day
    /// fallback to the latest submission.
    pub fn badges(
        &mut self,
        date: Option<NaiveDate>,
        refresh: bool,
    ) -> Result<BadgeSet, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .badges
            .get_or_load(refresh, || {
                views::badges(engine.store(), engine.backend(), name, date)
            })
            .cloned()
    }

    /// Unix timestamp of the most recent update, overall when `date` is
    /// absent or in the future.
    pub fn update_timestamp(
        &mut self,
        date: Option<NaiveDate>,
        refresh: bool,
    ) -> Result<Option<i64>, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .update_time
            .get_or_load(refresh, || {
                let today = Utc::now().date_naive();
                let effective = date.filter(|d| *d <= today);
                engine.store().update_timestamp(name, effective)
            })
            .copied()
    }

    pub fn latest_submission_date(&self) -> Result<Option<NaiveDate>, EngineError> {
        self.engine
            .store()
            .latest_submission_date(self.identity.name())
    }

    pub fn has_submitted(&mut self, refresh: bool) -> Result<bool, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .has_submitted
            .get_or_load(refresh, || engine.store().has_submitted(name))
            .copied()
    }

    /// Labels of the agent's live access tokens.
    pub fn token_labels(&mut self, refresh: bool) -> Result<Vec<String>, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .tokens
            .get_or_load(refresh, || engine.store().token_labels(name))
            .cloned()
    }

    /// Create an access token; the secret is only returned here. `None`
    /// when a live token with that label already exists.
    pub fn create_token(&mut self, label: &str) -> Result<Option<String>, EngineError> {
        let secret = tokens::create_token(self.engine.store(), self.identity.name(), label)?;
        self.cache.invalidate(ViewKind::Tokens);
        Ok(secret)
    }

    /// Revoke an access token by label. Returns whether one existed.
    pub fn revoke_token(&mut self, label: &str) -> Result<bool, EngineError> {
        let revoked = tokens::revoke_token(self.engine.store(), self.identity.name(), label)?;
        self.cache.invalidate(ViewKind::Tokens);
        Ok(revoked)
    }

    pub fn ratios(&mut self, refresh: bool) -> Result<Vec<RatioPair>, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .ratios
            .get_or_load(refresh, || views::ratios(engine.backend(), name))
            .cloned()
    }

    pub fn upcoming_badges(
        &mut self,
        limit: usize,
        refresh: bool,
    ) -> Result<Vec<UpcomingBadge>, EngineError> {
        let engine = self.engine;
        let name = self.identity.name();
        self.cache
            .upcoming
            .get_or_load(refresh, || {
                views::upcoming_badges(engine.backend(), name, limit)
            })
            .cloned()
    }

    pub fn breakdown(&self) -> Result<BreakdownView, EngineError> {
        views::breakdown(
            self.engine.backend(),
            self.identity.name(),
            self.identity.faction(),
        )
    }

    pub fn prediction(&self, stat: &str) -> Result<Prediction, EngineError> {
        views::prediction(
            self.engine.store(),
            self.engine.backend(),
            self.identity.name(),
            stat,
        )
    }

    pub fn graph(&self, stat: &str) -> Result<GraphView, EngineError> {
        views::graph(
            self.engine.store(),
            self.engine.backend(),
            self.identity.name(),
            stat,
        )
    }

    pub fn trend(&self, stat: &str, period: TrendPeriod) -> Result<TrendView, EngineError> {
        views::trend(self.engine.backend(), self.identity.name(), stat, period)
    }

    /// Commit a batch of stat submissions, then drop every cached view
    /// the write can have changed.
    pub fn submit(&mut self, batch: &SubmitBatch, allow_lower: bool) -> Result<(), EngineError> {
        update::submit(self.engine.store(), self.identity.name(), batch, allow_lower)?;
        self.cache.invalidate_derived();
        Ok(())
    }
}
