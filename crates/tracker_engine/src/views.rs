//! Derived-view requester: turns backend rows into typed view values.
//!
//! An agent who has never submitted gets zeroed/empty views; a backend
//! that drops an expected row for an agent who *has* data is a
//! reportable fault.

use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate, Utc};

use tracker_common::{
    locale_date, BadgeSet, BreakdownView, Faction, GraphSeries, GraphView, Prediction, RatioPair,
    RatioSide, Remaining, TrendPeriod, TrendView, UpcomingBadge, NEUTRAL_GRAY,
};

use crate::backend::{ComputationBackend, PredictionRow, UpcomingRow};
use crate::error::EngineError;
use crate::store::StatStore;

/// Stable badge identifier: spaces to underscores, lower-cased.
pub fn normalize_badge(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

/// Badges earned as of `date` (today when absent). A same-day lookup
/// with no rows falls back to the agent's latest submission date, once,
/// to cover agents who have not submitted today. No submissions at all
/// yields an empty set.
pub fn badges(
    store: &StatStore,
    backend: &dyn ComputationBackend,
    agent: &str,
    date: Option<NaiveDate>,
) -> Result<BadgeSet, EngineError> {
    let requested = date.unwrap_or_else(|| Utc::now().date_naive());
    let mut rows = backend.badges(agent, requested)?;
    if rows.is_empty() && date.is_none() {
        if let Some(latest) = store.latest_submission_date(agent)? {
            if latest != requested {
                rows = backend.badges(agent, latest)?;
            }
        }
    }
    Ok(rows
        .into_iter()
        .map(|row| (normalize_badge(&row.badge), row.level.to_lowercase()))
        .collect())
}

/// Current level as of `date` (today when absent). Zero for an agent
/// with no data.
pub fn level(
    store: &StatStore,
    backend: &dyn ComputationBackend,
    agent: &str,
    date: Option<NaiveDate>,
) -> Result<i64, EngineError> {
    if !store.has_submitted(agent)? {
        return Ok(0);
    }
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let rows = backend.level(agent, date)?;
    match rows.first() {
        Some(row) => Ok(row.level),
        None => Err(EngineError::MissingRow { operation: "level" }),
    }
}

/// Milestone projection for one stat.
pub fn prediction(
    store: &StatStore,
    backend: &dyn ComputationBackend,
    agent: &str,
    stat: &str,
) -> Result<Prediction, EngineError> {
    if !store.has_submitted(agent)? {
        return Ok(Prediction::empty(stat));
    }
    let row = backend
        .prediction(agent, stat)?
        .into_iter()
        .next()
        .ok_or(EngineError::MissingRow {
            operation: "prediction",
        })?;
    Ok(shape_prediction(row, Utc::now().date_naive()))
}

fn shape_prediction(row: PredictionRow, today: NaiveDate) -> Prediction {
    let target_date = today + Duration::days(row.days.round() as i64);
    let remaining = if row.stat == "level" {
        Remaining::LevelTiers {
            silver_remaining: row.silver_remaining.unwrap_or(0.0),
            gold_remaining: row.gold_remaining.unwrap_or(0.0),
            platinum_remaining: row.platinum_remaining.unwrap_or(0.0),
            onyx_remaining: row.onyx_remaining.unwrap_or(0.0),
        }
    } else {
        Remaining::Single {
            amount_remaining: row.remaining.unwrap_or(0.0),
        }
    };
    Prediction {
        stat: row.stat,
        name: row.name,
        unit: row.unit,
        badge: row.badge,
        current: row.current,
        next: row.next,
        rate: row.rate,
        progress: row.progress,
        days_remaining: row.days,
        target_date,
        target_date_local: locale_date(target_date, row.days >= 365.0),
        remaining,
    }
}

/// AP earned per stat with faction-relative slice colors. Group 1 is the
/// opposing faction's work, group 3 the agent's own, everything else
/// neutral.
pub fn breakdown(
    backend: &dyn ComputationBackend,
    agent: &str,
    faction: Faction,
) -> Result<BreakdownView, EngineError> {
    let mut rows = backend.breakdown(agent)?;
    rows.sort_by_key(|row| (row.grouping, row.sequence));

    let mut view = BreakdownView::default();
    for row in rows {
        let color = match row.grouping {
            1 => faction.opposing().color(),
            3 => faction.color(),
            _ => NEUTRAL_GRAY,
        };
        view.data.push((row.name, row.ap_gained));
        view.slice_colors.push(color.to_string());
    }
    Ok(view)
}

/// Cross-stat ratios. Rows missing either badge carry nothing worth
/// displaying and are dropped.
pub fn ratios(
    backend: &dyn ComputationBackend,
    agent: &str,
) -> Result<Vec<RatioPair>, EngineError> {
    let rows = backend.ratios(agent)?;
    let mut pairs = Vec::new();
    for row in rows {
        let (Some(badge_1), Some(badge_2)) = (row.badge_1, row.badge_2) else {
            continue;
        };
        pairs.push(RatioPair {
            stat1: RatioSide {
                stat: row.stat_1,
                badge: normalize_badge(&badge_1),
                level: row.badge_1_level.unwrap_or_default().to_lowercase(),
                name: row.stat_1_name,
                nickname: row.stat_1_nickname,
                unit: row.stat_1_unit,
            },
            stat2: RatioSide {
                stat: row.stat_2,
                badge: normalize_badge(&badge_2),
                level: row.badge_2_level.unwrap_or_default().to_lowercase(),
                name: row.stat_2_name,
                nickname: row.stat_2_nickname,
                unit: row.stat_2_unit,
            },
            ratio: row.ratio,
            step: row.factor,
        });
    }
    Ok(pairs)
}

/// The next badges the agent will earn, soonest first.
pub fn upcoming_badges(
    backend: &dyn ComputationBackend,
    agent: &str,
    limit: usize,
) -> Result<Vec<UpcomingBadge>, EngineError> {
    let mut rows = backend.upcoming_badges(agent)?;
    rows.sort_by(|a, b| {
        a.days_remaining
            .partial_cmp(&b.days_remaining)
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(limit);
    let today = Utc::now().date_naive();
    Ok(rows
        .into_iter()
        .map(|row| shape_upcoming(row, today))
        .collect())
}

fn shape_upcoming(row: UpcomingRow, today: NaiveDate) -> UpcomingBadge {
    let target_date = today + Duration::days(row.days_remaining.round() as i64);
    UpcomingBadge {
        name: row.badge,
        level: ucfirst(&row.next),
        progress: row.progress,
        days_remaining: row.days_remaining,
        target_date,
        target_date_local: locale_date(target_date, false),
    }
}

/// Graph payload: one named series per backend column, rows in order as
/// the time axis, plus the prediction for the same stat.
pub fn graph(
    store: &StatStore,
    backend: &dyn ComputationBackend,
    agent: &str,
    stat: &str,
) -> Result<GraphView, EngineError> {
    let raw = backend.graph(agent, stat)?;
    let mut series: Vec<GraphSeries> = raw
        .columns
        .into_iter()
        .map(|name| GraphSeries {
            name,
            data: Vec::with_capacity(raw.rows.len()),
        })
        .collect();
    for row in raw.rows {
        for (column, cell) in series.iter_mut().zip(row) {
            column.data.push(cell);
        }
    }
    Ok(GraphView {
        data: series,
        prediction: prediction(store, backend, agent, stat)?,
    })
}

/// Daily values against target for one calendar week.
pub fn trend(
    backend: &dyn ComputationBackend,
    agent: &str,
    stat: &str,
    period: TrendPeriod,
) -> Result<TrendView, EngineError> {
    let (start, end) = week_bounds(Utc::now().date_naive(), period);
    let rows = backend.daily_trend(agent, stat, start, end)?;
    let mut view = TrendView::default();
    for row in rows {
        view.dates.push(row.date);
        view.target.push(row.target);
        view.value.push(row.value);
    }
    Ok(view)
}

/// Monday-through-Sunday bounds of the requested week, relative to
/// `today`.
pub fn week_bounds(today: NaiveDate, period: TrendPeriod) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    match period {
        TrendPeriod::ThisWeek => (monday, monday + Duration::days(6)),
        TrendPeriod::LastWeek => (monday - Duration::days(7), monday - Duration::days(1)),
    }
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
