//! Contract to the external computation backend.
//!
//! The backend owns the statistical derivation (level thresholds, badge
//! detection, rate fitting, ratios); the engine only calls its named
//! aggregation operations and maps the returned rows into typed structs.
//! Mapping is by column name, so a missing or renamed backend column
//! fails at this boundary instead of leaking a null field downstream.

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row, Statement};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub name: String,
    pub ap_gained: i64,
    pub grouping: i64,
    pub sequence: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRow {
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BadgeRow {
    pub badge: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub stat: String,
    pub name: String,
    pub unit: String,
    pub badge: String,
    pub current: String,
    pub next: String,
    pub rate: f64,
    pub progress: f64,
    pub days: f64,
    pub remaining: Option<f64>,
    pub silver_remaining: Option<f64>,
    pub gold_remaining: Option<f64>,
    pub platinum_remaining: Option<f64>,
    pub onyx_remaining: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioRow {
    pub stat_1: String,
    pub stat_1_name: String,
    pub stat_1_nickname: String,
    pub stat_1_unit: String,
    pub badge_1: Option<String>,
    pub badge_1_level: Option<String>,
    pub stat_2: String,
    pub stat_2_name: String,
    pub stat_2_nickname: String,
    pub stat_2_unit: String,
    pub badge_2: Option<String>,
    pub badge_2_level: Option<String>,
    pub ratio: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingRow {
    pub badge: String,
    pub next: String,
    pub progress: f64,
    pub days_remaining: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub date: NaiveDate,
    pub target: f64,
    pub value: f64,
}

/// Raw graph result: the first row's columns define the series, every
/// further row extends them in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// The named aggregation operations the engine consumes.
pub trait ComputationBackend {
    fn breakdown(&self, agent: &str) -> Result<Vec<BreakdownRow>, EngineError>;
    fn level(&self, agent: &str, date: NaiveDate) -> Result<Vec<LevelRow>, EngineError>;
    fn badges(&self, agent: &str, date: NaiveDate) -> Result<Vec<BadgeRow>, EngineError>;
    fn prediction(&self, agent: &str, stat: &str) -> Result<Vec<PredictionRow>, EngineError>;
    fn ratios(&self, agent: &str) -> Result<Vec<RatioRow>, EngineError>;
    fn upcoming_badges(&self, agent: &str) -> Result<Vec<UpcomingRow>, EngineError>;
    fn daily_trend(
        &self,
        agent: &str,
        stat: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TrendRow>, EngineError>;
    fn graph(&self, agent: &str, stat: &str) -> Result<GraphRows, EngineError>;
}

/// SQL text for each aggregation operation. The statistical logic lives
/// in deployment-provided SQL; these defaults target conventional
/// relation names so a deployment can ship plain tables or views.
#[derive(Debug, Clone)]
pub struct BackendQueries {
    /// ?1 = agent
    pub breakdown: String,
    /// ?1 = agent, ?2 = date
    pub level: String,
    /// ?1 = agent, ?2 = date
    pub badges: String,
    /// ?1 = agent, ?2 = stat
    pub prediction: String,
    /// ?1 = agent
    pub ratios: String,
    /// ?1 = agent
    pub upcoming_badges: String,
    /// ?1 = agent, ?2 = stat, ?3 = start, ?4 = end
    pub daily_trend: String,
    /// ?1 = agent, ?2 = stat
    pub graph: String,
}

impl Default for BackendQueries {
    fn default() -> Self {
        Self {
            breakdown: "SELECT name, ap_gained, grouping, sequence FROM ap_breakdown \
                        WHERE agent = ?1 ORDER BY grouping, sequence ASC"
                .to_string(),
            level: "SELECT level FROM agent_level WHERE agent = ?1 AND date = ?2".to_string(),
            badges: "SELECT badge, level FROM agent_badges WHERE agent = ?1 AND date = ?2"
                .to_string(),
            prediction: "SELECT * FROM badge_prediction WHERE agent = ?1 AND stat = ?2"
                .to_string(),
            ratios: "SELECT * FROM agent_ratios WHERE agent = ?1".to_string(),
            upcoming_badges: "SELECT badge, next, progress, days_remaining FROM upcoming_badges \
                              WHERE agent = ?1 ORDER BY days_remaining ASC"
                .to_string(),
            daily_trend: "SELECT date, target, value FROM daily_trend \
                          WHERE agent = ?1 AND stat = ?2 AND date BETWEEN ?3 AND ?4 \
                          ORDER BY date ASC"
                .to_string(),
            graph: "SELECT date, value FROM stat_graph WHERE agent = ?1 AND stat = ?2 \
                    ORDER BY date ASC"
                .to_string(),
        }
    }
}

/// Computation backend over a relational store, one SQL statement per
/// operation.
pub struct SqlBackend {
    conn: Connection,
    queries: BackendQueries,
}

impl SqlBackend {
    pub fn open_at<P: AsRef<std::path::Path>>(path: P) -> Result<Self, EngineError> {
        Ok(Self::from_connection(Connection::open(path.as_ref())?))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            queries: BackendQueries::default(),
        }
    }

    /// Replace the default statements with deployment-specific SQL.
    pub fn with_queries(mut self, queries: BackendQueries) -> Self {
        self.queries = queries;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Index of a required column, reported as a mapping fault when absent.
fn required(
    stmt: &Statement<'_>,
    operation: &'static str,
    column: &'static str,
) -> Result<usize, EngineError> {
    stmt.column_index(column)
        .map_err(|_| EngineError::MissingColumn { operation, column })
}

/// Index of a column that may legitimately be absent from the row set.
fn optional(stmt: &Statement<'_>, column: &str) -> Option<usize> {
    stmt.column_index(column).ok()
}

fn opt_f64(row: &Row<'_>, idx: Option<usize>) -> Result<Option<f64>, rusqlite::Error> {
    match idx {
        Some(idx) => row.get(idx),
        None => Ok(None),
    }
}

/// Milestone labels arrive as text or numbers depending on the stat;
/// both read as strings.
fn text_cell(row: &Row<'_>, idx: usize) -> Result<String, rusqlite::Error> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(x) => x.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => hex::encode(b),
    })
}

fn json_cell(row: &Row<'_>, idx: usize) -> Result<serde_json::Value, rusqlite::Error> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(n) => serde_json::Value::from(n),
        ValueRef::Real(x) => serde_json::Value::from(x),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::from(hex::encode(b)),
    })
}

impl ComputationBackend for SqlBackend {
    fn breakdown(&self, agent: &str) -> Result<Vec<BreakdownRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.breakdown)?;
        let name = required(&stmt, "breakdown", "name")?;
        let ap_gained = required(&stmt, "breakdown", "ap_gained")?;
        let grouping = required(&stmt, "breakdown", "grouping")?;
        let sequence = required(&stmt, "breakdown", "sequence")?;
        let rows = stmt.query_map(params![agent], |row| {
            Ok(BreakdownRow {
                name: row.get(name)?,
                ap_gained: row.get(ap_gained)?,
                grouping: row.get(grouping)?,
                sequence: row.get(sequence)?,
            })
        })?;
        collect(rows)
    }

    fn level(&self, agent: &str, date: NaiveDate) -> Result<Vec<LevelRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.level)?;
        let level = required(&stmt, "level", "level")?;
        let rows = stmt.query_map(params![agent, date], |row| {
            Ok(LevelRow {
                level: row.get(level)?,
            })
        })?;
        collect(rows)
    }

    fn badges(&self, agent: &str, date: NaiveDate) -> Result<Vec<BadgeRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.badges)?;
        let badge = required(&stmt, "badges", "badge")?;
        let level = required(&stmt, "badges", "level")?;
        let rows = stmt.query_map(params![agent, date], |row| {
            Ok(BadgeRow {
                badge: row.get(badge)?,
                level: row.get(level)?,
            })
        })?;
        collect(rows)
    }

    fn prediction(&self, agent: &str, stat: &str) -> Result<Vec<PredictionRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.prediction)?;
        let stat_idx = required(&stmt, "prediction", "stat")?;
        let name = required(&stmt, "prediction", "name")?;
        let unit = required(&stmt, "prediction", "unit")?;
        let badge = required(&stmt, "prediction", "badge")?;
        let current = required(&stmt, "prediction", "current")?;
        let next = required(&stmt, "prediction", "next")?;
        let rate = required(&stmt, "prediction", "rate")?;
        let progress = required(&stmt, "prediction", "progress")?;
        let days = required(&stmt, "prediction", "days")?;
        let remaining = optional(&stmt, "remaining");
        let silver = optional(&stmt, "silver_remaining");
        let gold = optional(&stmt, "gold_remaining");
        let platinum = optional(&stmt, "platinum_remaining");
        let onyx = optional(&stmt, "onyx_remaining");
        let rows = stmt.query_map(params![agent, stat], |row| {
            Ok(PredictionRow {
                stat: row.get(stat_idx)?,
                name: row.get(name)?,
                unit: row.get(unit)?,
                badge: text_cell(row, badge)?,
                current: text_cell(row, current)?,
                next: text_cell(row, next)?,
                rate: row.get(rate)?,
                progress: row.get(progress)?,
                days: row.get(days)?,
                remaining: opt_f64(row, remaining)?,
                silver_remaining: opt_f64(row, silver)?,
                gold_remaining: opt_f64(row, gold)?,
                platinum_remaining: opt_f64(row, platinum)?,
                onyx_remaining: opt_f64(row, onyx)?,
            })
        })?;
        collect(rows)
    }

    fn ratios(&self, agent: &str) -> Result<Vec<RatioRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.ratios)?;
        let stat_1 = required(&stmt, "ratios", "stat_1")?;
        let stat_1_name = required(&stmt, "ratios", "stat_1_name")?;
        let stat_1_nickname = required(&stmt, "ratios", "stat_1_nickname")?;
        let stat_1_unit = required(&stmt, "ratios", "stat_1_unit")?;
        let badge_1 = required(&stmt, "ratios", "badge_1")?;
        let badge_1_level = required(&stmt, "ratios", "badge_1_level")?;
        let stat_2 = required(&stmt, "ratios", "stat_2")?;
        let stat_2_name = required(&stmt, "ratios", "stat_2_name")?;
        let stat_2_nickname = required(&stmt, "ratios", "stat_2_nickname")?;
        let stat_2_unit = required(&stmt, "ratios", "stat_2_unit")?;
        let badge_2 = required(&stmt, "ratios", "badge_2")?;
        let badge_2_level = required(&stmt, "ratios", "badge_2_level")?;
        let ratio = required(&stmt, "ratios", "ratio")?;
        let factor = required(&stmt, "ratios", "factor")?;
        let rows = stmt.query_map(params![agent], |row| {
            Ok(RatioRow {
                stat_1: row.get(stat_1)?,
                stat_1_name: row.get(stat_1_name)?,
                stat_1_nickname: row.get(stat_1_nickname)?,
                stat_1_unit: row.get(stat_1_unit)?,
                badge_1: row.get(badge_1)?,
                badge_1_level: row.get(badge_1_level)?,
                stat_2: row.get(stat_2)?,
                stat_2_name: row.get(stat_2_name)?,
                stat_2_nickname: row.get(stat_2_nickname)?,
                stat_2_unit: row.get(stat_2_unit)?,
                badge_2: row.get(badge_2)?,
                badge_2_level: row.get(badge_2_level)?,
                ratio: row.get(ratio)?,
                factor: row.get(factor)?,
            })
        })?;
        collect(rows)
    }

    fn upcoming_badges(&self, agent: &str) -> Result<Vec<UpcomingRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.upcoming_badges)?;
        let badge = required(&stmt, "upcoming_badges", "badge")?;
        let next = required(&stmt, "upcoming_badges", "next")?;
        let progress = required(&stmt, "upcoming_badges", "progress")?;
        let days_remaining = required(&stmt, "upcoming_badges", "days_remaining")?;
        let rows = stmt.query_map(params![agent], |row| {
            Ok(UpcomingRow {
                badge: row.get(badge)?,
                next: row.get(next)?,
                progress: row.get(progress)?,
                days_remaining: row.get(days_remaining)?,
            })
        })?;
        collect(rows)
    }

    fn daily_trend(
        &self,
        agent: &str,
        stat: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TrendRow>, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.daily_trend)?;
        let date = required(&stmt, "daily_trend", "date")?;
        let target = required(&stmt, "daily_trend", "target")?;
        let value = required(&stmt, "daily_trend", "value")?;
        let rows = stmt.query_map(params![agent, stat, start, end], |row| {
            Ok(TrendRow {
                date: row.get(date)?,
                target: row.get(target)?,
                value: row.get(value)?,
            })
        })?;
        collect(rows)
    }

    fn graph(&self, agent: &str, stat: &str) -> Result<GraphRows, EngineError> {
        let mut stmt = self.conn.prepare(&self.queries.graph)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = stmt.query_map(params![agent, stat], |row| {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                cells.push(json_cell(row, idx)?);
            }
            Ok(cells)
        })?;
        Ok(GraphRows {
            columns,
            rows: collect(rows)?,
        })
    }
}

fn collect<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> Result<Vec<T>, EngineError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_backend() -> SqlBackend {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE agent_level (agent TEXT, date TEXT, level INTEGER);
            INSERT INTO agent_level VALUES ('Scout', '2026-08-08', 9);

            CREATE TABLE agent_badges (agent TEXT, date TEXT, badge TEXT, level TEXT);
            INSERT INTO agent_badges VALUES ('Scout', '2026-08-08', 'Mind Controller', 'Gold');
            INSERT INTO agent_badges VALUES ('Scout', '2026-08-08', 'Hacker', 'Silver');

            CREATE TABLE badge_prediction (
                agent TEXT, stat TEXT, name TEXT, unit TEXT, badge TEXT,
                current TEXT, next TEXT, rate REAL, progress REAL, days REAL,
                remaining REAL
            );
            INSERT INTO badge_prediction VALUES
                ('Scout', 'hacker', 'Hacks', 'hacks', 'Hacker',
                 'silver', 'gold', 12.5, 40.0, 8.0, 100.0);

            CREATE TABLE stat_graph (agent TEXT, stat TEXT, date TEXT, value INTEGER);
            INSERT INTO stat_graph VALUES ('Scout', 'ap', '2026-08-01', 100);
            INSERT INTO stat_graph VALUES ('Scout', 'ap', '2026-08-02', 250);
            "#,
        )
        .unwrap();
        SqlBackend::from_connection(conn)
    }

    #[test]
    fn level_rows_map_by_column_name() {
        let backend = fixture_backend();
        let date = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        let rows = backend.level("Scout", date).unwrap();
        assert_eq!(rows, vec![LevelRow { level: 9 }]);
        assert!(backend.level("Nobody", date).unwrap().is_empty());
    }

    #[test]
    fn prediction_reads_optional_remaining_columns() {
        let backend = fixture_backend();
        let rows = backend.prediction("Scout", "hacker").unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.current, "silver");
        assert_eq!(row.remaining, Some(100.0));
        assert_eq!(row.silver_remaining, None);
    }

    #[test]
    fn missing_column_fails_at_the_mapping_boundary() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE agent_level (agent TEXT, date TEXT, lvl INTEGER);",
        )
        .unwrap();
        let backend = SqlBackend::from_connection(conn);
        let date = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        match backend.level("Scout", date) {
            Err(EngineError::MissingColumn { operation, column }) => {
                assert_eq!(operation, "level");
                assert_eq!(column, "level");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn graph_preserves_column_order_and_rows() {
        let backend = fixture_backend();
        let graph = backend.graph("Scout", "ap").unwrap();
        assert_eq!(graph.columns, vec!["date", "value"]);
        assert_eq!(graph.rows.len(), 2);
        assert_eq!(graph.rows[0][1], serde_json::Value::from(100));
    }
}
