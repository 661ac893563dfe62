//! Per-session memoization of derived views.
//!
//! Every view kind has its own slot, tagged loaded or not, so a refresh of
//! one kind never disturbs another. The cache lives inside a session and
//! dies with it; nothing here persists across resolutions.

use std::collections::BTreeMap;

use tracker_common::{BadgeSet, RatioPair, UpcomingBadge};

/// One cached value with an explicit loaded tag. `get_or_load` is the
/// only load path, so a half-updated value is never observable: the slot
/// either still holds the old value or already holds the whole new one.
#[derive(Debug)]
pub struct CacheSlot<T> {
    loaded: bool,
    value: Option<T>,
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self {
            loaded: false,
            value: None,
        }
    }
}

impl<T> CacheSlot<T> {
    /// Return the cached value, loading it first when the slot is empty
    /// or a refresh was requested. The loaded value fully replaces any
    /// prior one.
    pub fn get_or_load<E, F>(&mut self, refresh: bool, load: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.loaded || refresh || self.value.is_none() {
            let value = load()?;
            self.loaded = true;
            return Ok(self.value.insert(value));
        }
        Ok(self.value.as_ref().expect("loaded slot holds a value"))
    }

    pub fn invalidate(&mut self) {
        self.loaded = false;
        self.value = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// The independently cached view kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Level,
    Stats,
    Badges,
    Tokens,
    UpdateTime,
    HasSubmitted,
    Ratios,
    UpcomingBadges,
}

/// Request-scoped container of all cached views for one agent.
#[derive(Debug, Default)]
pub struct ViewCache {
    pub level: CacheSlot<i64>,
    pub stats: CacheSlot<BTreeMap<String, i64>>,
    pub badges: CacheSlot<BadgeSet>,
    pub tokens: CacheSlot<Vec<String>>,
    pub update_time: CacheSlot<Option<i64>>,
    pub has_submitted: CacheSlot<bool>,
    pub ratios: CacheSlot<Vec<RatioPair>>,
    pub upcoming: CacheSlot<Vec<UpcomingBadge>>,
}

impl ViewCache {
    pub fn invalidate(&mut self, kind: ViewKind) {
        match kind {
            ViewKind::Level => self.level.invalidate(),
            ViewKind::Stats => self.stats.invalidate(),
            ViewKind::Badges => self.badges.invalidate(),
            ViewKind::Tokens => self.tokens.invalidate(),
            ViewKind::UpdateTime => self.update_time.invalidate(),
            ViewKind::HasSubmitted => self.has_submitted.invalidate(),
            ViewKind::Ratios => self.ratios.invalidate(),
            ViewKind::UpcomingBadges => self.upcoming.invalidate(),
        }
    }

    /// Drop everything a stat submission can change. Token labels do not
    /// derive from data points and survive.
    pub fn invalidate_derived(&mut self) {
        self.level.invalidate();
        self.stats.invalidate();
        self.badges.invalidate();
        self.update_time.invalidate();
        self.has_submitted.invalidate();
        self.ratios.invalidate();
        self.upcoming.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_loads_once_until_refreshed() {
        let mut slot: CacheSlot<i64> = CacheSlot::default();
        let mut calls = 0;

        assert!(!slot.is_loaded());
        let v = *slot
            .get_or_load(false, || -> Result<i64, ()> {
                calls += 1;
                Ok(1)
            })
            .unwrap();
        assert_eq!(v, 1);
        assert!(slot.is_loaded());

        // second read must not call the loader
        let v = *slot
            .get_or_load(false, || -> Result<i64, ()> {
                calls += 1;
                Ok(2)
            })
            .unwrap();
        assert_eq!(v, 1);
        assert_eq!(calls, 1);

        // refresh replaces the value wholesale
        let v = *slot
            .get_or_load(true, || -> Result<i64, ()> {
                calls += 1;
                Ok(3)
            })
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(calls, 2);
    }

    #[test]
    fn invalidation_is_per_kind() {
        let mut cache = ViewCache::default();
        let _ = cache.level.get_or_load(false, || -> Result<i64, ()> { Ok(8) });
        let _ = cache
            .tokens
            .get_or_load(false, || -> Result<Vec<String>, ()> { Ok(vec![]) });

        cache.invalidate(ViewKind::Level);
        assert!(!cache.level.is_loaded());
        assert!(cache.tokens.is_loaded());
    }

    #[test]
    fn derived_sweep_spares_tokens() {
        let mut cache = ViewCache::default();
        let _ = cache.level.get_or_load(false, || -> Result<i64, ()> { Ok(8) });
        let _ = cache
            .has_submitted
            .get_or_load(false, || -> Result<bool, ()> { Ok(true) });
        let _ = cache
            .tokens
            .get_or_load(false, || -> Result<Vec<String>, ()> { Ok(vec![]) });

        cache.invalidate_derived();
        assert!(!cache.level.is_loaded());
        assert!(!cache.has_submitted.is_loaded());
        assert!(cache.tokens.is_loaded());
    }
}
