//! Derived-view value types. Each one is a read-only, point-in-time
//! projection of an agent's data points; a refresh replaces the whole
//! value, never merges into it.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Earned badges: normalized badge id (`mind_controller`) to lowercased
/// tier (`gold`).
pub type BadgeSet = BTreeMap<String, String>;

/// AP earned per stat, with one slice color per entry. Colors are
/// faction-relative: the agent's own group and the opposing group swap
/// palette colors depending on who is asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakdownView {
    pub data: Vec<(String, i64)>,
    pub slice_colors: Vec<String>,
}

/// Amount left to the next milestone. Ordinary stats report a single
/// figure; the `level` stat reports one per badge tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Remaining {
    Single {
        amount_remaining: f64,
    },
    LevelTiers {
        silver_remaining: f64,
        gold_remaining: f64,
        platinum_remaining: f64,
        onyx_remaining: f64,
    },
}

/// Forward projection of when a stat crosses its next badge threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub stat: String,
    pub name: String,
    pub unit: String,
    pub badge: String,
    pub current: String,
    pub next: String,
    pub rate: f64,
    pub progress: f64,
    pub days_remaining: f64,
    pub target_date: NaiveDate,
    pub target_date_local: String,
    #[serde(flatten)]
    pub remaining: Remaining,
}

impl Prediction {
    /// Zeroed projection for an agent with no data. Distinct from a
    /// backend fault, which is reported as an error instead.
    pub fn empty(stat: &str) -> Self {
        let today = Utc::now().date_naive();
        let remaining = if stat == "level" {
            Remaining::LevelTiers {
                silver_remaining: 0.0,
                gold_remaining: 0.0,
                platinum_remaining: 0.0,
                onyx_remaining: 0.0,
            }
        } else {
            Remaining::Single {
                amount_remaining: 0.0,
            }
        };
        Self {
            stat: stat.to_string(),
            name: String::new(),
            unit: String::new(),
            badge: String::new(),
            current: String::new(),
            next: String::new(),
            rate: 0.0,
            progress: 0.0,
            days_remaining: 0.0,
            target_date: today,
            target_date_local: locale_date(today, false),
            remaining,
        }
    }
}

/// One side of a cross-stat ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSide {
    pub stat: String,
    pub badge: String,
    pub level: String,
    pub name: String,
    pub nickname: String,
    pub unit: String,
}

/// A pair of stats with their current ratio and stepping factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioPair {
    pub stat1: RatioSide,
    pub stat2: RatioSide,
    pub ratio: f64,
    pub step: f64,
}

/// A badge the agent is approaching, with the projected arrival date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingBadge {
    pub name: String,
    pub level: String,
    pub progress: f64,
    pub days_remaining: f64,
    pub target_date: NaiveDate,
    pub target_date_local: String,
}

/// Per-day values against target for one calendar week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendView {
    pub dates: Vec<NaiveDate>,
    pub target: Vec<f64>,
    pub value: Vec<f64>,
}

/// One named series of a stat graph; row order is the time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSeries {
    pub name: String,
    pub data: Vec<serde_json::Value>,
}

/// Graph payload: every series the backend produced plus the prediction
/// for the same stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub data: Vec<GraphSeries>,
    pub prediction: Prediction,
}

/// Which calendar week (Monday through Sunday) a trend covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendPeriod {
    ThisWeek,
    LastWeek,
}

impl TrendPeriod {
    /// Anything that is not `last-week` means the current week.
    pub fn parse(s: &str) -> Self {
        match s {
            "last-week" => TrendPeriod::LastWeek,
            _ => TrendPeriod::ThisWeek,
        }
    }
}

/// Locale-style date: month and day, with the year appended for dates far
/// enough out that the year matters.
pub fn locale_date(date: NaiveDate, with_year: bool) -> String {
    if with_year {
        date.format("%B %-d, %Y").to_string()
    } else {
        date.format("%B %-d").to_string()
    }
}
