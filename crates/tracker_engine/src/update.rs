//! Batch stat submission.
//!
//! A batch commits atomically: either every stat in it lands, or none
//! does. Unless the caller explicitly allows lower values, a stat that
//! would decrease aborts the whole batch and reports which stat failed
//! with both values.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

use tracker_common::{sanitize_value, SubmitBatch};

use crate::error::{EngineError, MonotonicityViolation};
use crate::store::StatStore;

pub fn submit(
    store: &StatStore,
    agent: &str,
    batch: &SubmitBatch,
    allow_lower: bool,
) -> Result<(), EngineError> {
    let today = Utc::now().date_naive();
    let target = batch.date.unwrap_or(today);

    // The transaction takes the write lock immediately, so the
    // read-then-conditionally-write sequence below cannot interleave
    // with a concurrent submitter on the same store.
    let tx = store.begin_submit()?;

    let anchor: Option<chrono::NaiveDate> = tx.query_row(
        "SELECT MIN(date) FROM data WHERE agent = ?1",
        params![agent],
        |row| row.get(0),
    )?;
    let anchor = anchor.unwrap_or(today);
    let timepoint = (target - anchor).num_days() + 1;

    for (stat, raw) in &batch.values {
        let value = sanitize_value(raw);

        if !allow_lower {
            let current: Option<i64> = tx
                .query_row(
                    "SELECT value FROM data WHERE agent = ?1 AND date = ?2 AND stat = ?3",
                    params![agent, target, stat],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(current) = current {
                if value < current {
                    let stat_name = display_name(&tx, stat)?;
                    // dropping the transaction rolls the batch back
                    return Err(MonotonicityViolation {
                        stat: stat.clone(),
                        stat_name,
                        submitted: value,
                        current,
                    }
                    .into());
                }
            }
        }

        tx.execute(
            "INSERT INTO data (agent, date, timepoint, stat, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(agent, date, stat)
             DO UPDATE SET value = excluded.value, updated = CURRENT_TIMESTAMP",
            params![agent, target, timepoint, stat, value],
        )?;
    }

    tx.commit()?;
    debug!(agent, date = %target, stats = batch.values.len(), "committed submission");
    Ok(())
}

/// Display name for the failure message; the key itself when the stat is
/// not in the catalog.
fn display_name(tx: &Transaction<'_>, stat: &str) -> Result<String, EngineError> {
    let name: Option<String> = tx
        .query_row(
            "SELECT name FROM stats WHERE stat = ?1",
            params![stat],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name.unwrap_or_else(|| stat.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use tracker_common::Faction;

    fn seeded_store() -> StatStore {
        let store = StatStore::open_in_memory().unwrap();
        store
            .add_agent("Scout", Faction::Resistance, "scout@example.com")
            .unwrap();
        store
    }

    fn batch(date: Option<NaiveDate>, values: &[(&str, &str)]) -> SubmitBatch {
        let mut batch = SubmitBatch {
            date,
            ..Default::default()
        };
        for (stat, raw) in values {
            batch.set(*stat, *raw);
        }
        batch
    }

    #[test]
    fn empty_batch_commits_as_a_no_op() {
        let store = seeded_store();
        submit(&store, "Scout", &SubmitBatch::new(), false).unwrap();
        assert!(!store.has_submitted("Scout").unwrap());
    }

    #[test]
    fn first_submission_has_timepoint_one() {
        let store = seeded_store();
        let today = Utc::now().date_naive();
        submit(&store, "Scout", &batch(None, &[("ap", "1000")]), false).unwrap();

        let timepoint: i64 = store
            .connection_for_tests()
            .query_row(
                "SELECT timepoint FROM data WHERE agent = 'Scout' AND stat = 'ap' AND date = ?1",
                params![today],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(timepoint, 1);
        assert_eq!(store.current_value("Scout", today, "ap").unwrap(), Some(1000));
    }

    #[test]
    fn timepoint_counts_days_from_the_anchor() {
        let store = seeded_store();
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let later = start + Duration::days(10);
        submit(&store, "Scout", &batch(Some(start), &[("ap", "100")]), false).unwrap();
        submit(&store, "Scout", &batch(Some(later), &[("ap", "200")]), false).unwrap();

        let timepoint: i64 = store
            .connection_for_tests()
            .query_row(
                "SELECT timepoint FROM data WHERE agent = 'Scout' AND date = ?1",
                params![later],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(timepoint, 11);
    }

    #[test]
    fn values_never_decrease_across_submissions() {
        let store = seeded_store();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        submit(&store, "Scout", &batch(Some(date), &[("ap", "200")]), false).unwrap();

        let err = submit(&store, "Scout", &batch(Some(date), &[("ap", "100")]), false)
            .unwrap_err();
        match err {
            EngineError::Monotonicity(v) => {
                assert_eq!(v.stat, "ap");
                assert_eq!(v.stat_name, "Lifetime AP");
                assert_eq!(v.submitted, 100);
                assert_eq!(v.current, 200);
            }
            other => panic!("expected monotonicity failure, got {other:?}"),
        }
        assert_eq!(store.current_value("Scout", date, "ap").unwrap(), Some(200));

        // equal and higher values pass
        submit(&store, "Scout", &batch(Some(date), &[("ap", "200")]), false).unwrap();
        submit(&store, "Scout", &batch(Some(date), &[("ap", "300")]), false).unwrap();
        assert_eq!(store.current_value("Scout", date, "ap").unwrap(), Some(300));
    }

    #[test]
    fn violation_rolls_back_the_whole_batch() {
        let store = seeded_store();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        submit(
            &store,
            "Scout",
            &batch(Some(date), &[("ap", "200"), ("hacker", "3")]),
            false,
        )
        .unwrap();

        // ap would decrease; hacker alone would pass, but nothing commits
        let err = submit(
            &store,
            "Scout",
            &batch(Some(date), &[("ap", "100"), ("hacker", "5")]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Monotonicity(_)));
        assert_eq!(store.current_value("Scout", date, "ap").unwrap(), Some(200));
        assert_eq!(
            store.current_value("Scout", date, "hacker").unwrap(),
            Some(3)
        );
    }

    #[test]
    fn allow_lower_overwrites_unconditionally() {
        let store = seeded_store();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        submit(&store, "Scout", &batch(Some(date), &[("ap", "200")]), false).unwrap();
        submit(&store, "Scout", &batch(Some(date), &[("ap", "50")]), true).unwrap();
        assert_eq!(store.current_value("Scout", date, "ap").unwrap(), Some(50));
    }

    #[test]
    fn non_numeric_values_coerce_to_zero() {
        let store = seeded_store();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        submit(
            &store,
            "Scout",
            &batch(Some(date), &[("hacker", "garbage")]),
            false,
        )
        .unwrap();
        assert_eq!(
            store.current_value("Scout", date, "hacker").unwrap(),
            Some(0)
        );
    }

    #[test]
    fn unknown_stat_uses_its_key_in_the_message() {
        let store = seeded_store();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        submit(&store, "Scout", &batch(Some(date), &[("mystery", "9")]), false).unwrap();
        let err = submit(&store, "Scout", &batch(Some(date), &[("mystery", "4")]), false)
            .unwrap_err();
        match err {
            EngineError::Monotonicity(v) => assert_eq!(v.stat_name, "mystery"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
