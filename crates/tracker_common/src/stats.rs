//! Stat catalog entries and the submission batch type.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One entry of the stat catalog: the database key plus the display
/// metadata the views and failure messages need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDef {
    /// Database key, e.g. `ap` or `mind_controller`.
    pub stat: String,
    /// Full display name, e.g. "Control Fields Created".
    pub name: String,
    /// Short display name, usually the badge name.
    pub nickname: String,
    /// Unit label, e.g. "hacks" or "km".
    pub unit: String,
    /// Badge awarded for this stat, if any.
    pub badge: Option<String>,
}

/// A batch of raw stat values submitted for a single day. Values are kept
/// as the client sent them; sanitation happens at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBatch {
    /// Target date; today when absent.
    pub date: Option<NaiveDate>,
    /// Stat key to raw submitted value.
    pub values: BTreeMap<String, String>,
}

impl SubmitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, stat: impl Into<String>, raw: impl Into<String>) -> &mut Self {
        self.values.insert(stat.into(), raw.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Coerces a raw client value to a non-negative integer. ASCII digits are
/// kept (so `12,345` reads as 12345), anything unparsable becomes 0.
pub fn sanitize_value(raw: &str) -> i64 {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_digits_only() {
        assert_eq!(sanitize_value("12345"), 12345);
        assert_eq!(sanitize_value("12,345"), 12345);
        assert_eq!(sanitize_value(" 1 024 "), 1024);
        assert_eq!(sanitize_value("abc"), 0);
        assert_eq!(sanitize_value(""), 0);
        assert_eq!(sanitize_value("-17"), 17);
    }

    #[test]
    fn batch_collects_values() {
        let mut batch = SubmitBatch::new();
        batch.set("ap", "100").set("hacker", "5");
        assert_eq!(batch.values.len(), 2);
        assert!(batch.date.is_none());
        assert!(!batch.is_empty());
        assert!(SubmitBatch::new().is_empty());
    }
}
