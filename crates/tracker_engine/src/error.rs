//! Engine error taxonomy.

use std::fmt;

use thiserror::Error;

/// A stat in a submitted batch was lower than its committed value. The
/// whole batch rolls back; nothing from it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonotonicityViolation {
    /// Stat key that failed the check.
    pub stat: String,
    /// Display name of the stat, for the user-facing message.
    pub stat_name: String,
    /// Value the caller submitted.
    pub submitted: i64,
    /// Value currently committed for the same (agent, date, stat).
    pub current: i64,
}

impl fmt::Display for MonotonicityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats cannot be updated. {} is lower than {} for {}.",
            format_number(self.submitted),
            format_number(self.current),
            self.stat_name
        )
    }
}

impl std::error::Error for MonotonicityViolation {}

#[derive(Error, Debug)]
pub enum EngineError {
    /// Actionable by the caller; the stored data is untouched.
    #[error(transparent)]
    Monotonicity(#[from] MonotonicityViolation),

    /// The backend returned no row for an operation that must produce
    /// exactly one. Not the same as "agent has no data", which views
    /// report as zeroed/empty values instead.
    #[error("computation backend returned no row for {operation}")]
    MissingRow { operation: &'static str },

    /// A backend row lacks a column the mapping requires. Raised at the
    /// mapping boundary so a renamed column fails loudly instead of
    /// producing a null field.
    #[error("computation backend row for {operation} is missing column '{column}'")]
    MissingColumn {
        operation: &'static str,
        column: &'static str,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Thousands-separated rendering for human-facing numbers.
pub(crate) fn format_number(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_group_by_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-4200), "-4,200");
    }

    #[test]
    fn violation_message_matches_display_format() {
        let violation = MonotonicityViolation {
            stat: "hacker".to_string(),
            stat_name: "Hacks".to_string(),
            submitted: 100,
            current: 2500,
        };
        assert_eq!(
            violation.to_string(),
            "Stats cannot be updated. 100 is lower than 2,500 for Hacks."
        );
    }
}
