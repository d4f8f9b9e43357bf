//! Log repository
//!
//! The logs table is the queue: intake is a single-transaction batch insert,
//! retrieval is keyed on the DB-assigned id so callers can hold a
//! monotonically increasing watermark.

use chrono::{DateTime, Utc};
use sqlx::mysql::MySql;
use sqlx::{MySqlPool, QueryBuilder};

use crate::error::Result;
use crate::models::{LogLevel, LogLine};

const LOG_COLUMNS: &str = "id, source, timestamp, level, message";

/// A validated log line ready for insertion
#[derive(Debug, Clone)]
pub struct NewLogLine {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Filters shared by the paged query and the since-id tail
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Exact source; None means all sources.
    pub source: Option<String>,
    /// Subset of levels; None means all levels.
    pub levels: Option<Vec<LogLevel>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Retrieval order for the paged query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrder {
    NewestFirst,
    OldestFirst,
}

#[derive(Clone)]
pub struct LogRepository {
    pool: MySqlPool,
}

fn push_log_filters(qb: &mut QueryBuilder<'_, MySql>, filter: &LogFilter) {
    if let Some(ref source) = filter.source {
        qb.push(" AND source = ").push_bind(source.clone());
    }
    if let Some(ref levels) = filter.levels {
        // An explicitly empty set matches nothing.
        if levels.is_empty() {
            qb.push(" AND 1=0");
        } else {
            qb.push(" AND level IN (");
            let mut separated = qb.separated(", ");
            for level in levels {
                separated.push_bind(level.as_str());
            }
            separated.push_unseparated(")");
        }
    }
    if let Some(start) = filter.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
}

impl LogRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of log lines atomically. A single multi-row INSERT
    /// keeps the assigned ids contiguous even under concurrent writers, so
    /// the response can report the range as `first..=first + n - 1`.
    pub async fn insert_batch(&self, lines: &[NewLogLine]) -> Result<(i64, i64)> {
        if lines.is_empty() {
            return Err(crate::error::Error::Internal(
                "insert_batch called with an empty batch".to_string(),
            ));
        }

        let mut qb = QueryBuilder::<MySql>::new(
            "INSERT INTO logs (source, timestamp, level, message) ",
        );
        qb.push_values(lines, |mut row, line| {
            row.push_bind(line.source.clone())
                .push_bind(line.timestamp)
                .push_bind(line.level.as_str())
                .push_bind(line.message.clone());
        });

        let result = qb.build().execute(&self.pool).await?;

        // MySQL reports the first id of a multi-row insert.
        let first_id = result.last_insert_id() as i64;
        let last_id = first_id + lines.len() as i64 - 1;

        Ok((first_id, last_id))
    }

    /// Paged retrieval with a stable order: the requested direction on
    /// timestamp with id as tiebreaker, so pages do not shift under
    /// concurrent inserts.
    pub async fn query(
        &self,
        filter: &LogFilter,
        order: LogOrder,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LogLine>, i64)> {
        let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM logs WHERE 1=1");
        push_log_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb =
            QueryBuilder::<MySql>::new(format!("SELECT {} FROM logs WHERE 1=1", LOG_COLUMNS));
        push_log_filters(&mut qb, filter);
        match order {
            LogOrder::NewestFirst => qb.push(" ORDER BY timestamp DESC, id DESC"),
            LogOrder::OldestFirst => qb.push(" ORDER BY timestamp ASC, id ASC"),
        };
        qb.push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let logs = qb.build_query_as::<LogLine>().fetch_all(&self.pool).await?;

        Ok((logs, total))
    }

    /// Tail query: rows with id strictly greater than the watermark, in
    /// ascending id order so the caller can advance its watermark.
    pub async fn since(
        &self,
        watermark: i64,
        filter: &LogFilter,
        limit: i64,
    ) -> Result<Vec<LogLine>> {
        let mut qb =
            QueryBuilder::<MySql>::new(format!("SELECT {} FROM logs WHERE id > ", LOG_COLUMNS));
        qb.push_bind(watermark);
        push_log_filters(&mut qb, filter);
        qb.push(" ORDER BY id ASC LIMIT ").push_bind(limit);

        let logs = qb.build_query_as::<LogLine>().fetch_all(&self.pool).await?;

        Ok(logs)
    }

    /// Retention: drop rows older than the horizon.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM logs WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql_level_set() {
        let filter = LogFilter {
            levels: Some(vec![LogLevel::Warning, LogLevel::Error]),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM logs WHERE 1=1");
        push_log_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("level IN (?, ?)"));
    }

    #[test]
    fn test_filter_sql_empty_level_set_matches_nothing() {
        let filter = LogFilter {
            levels: Some(vec![]),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM logs WHERE 1=1");
        push_log_filters(&mut qb, &filter);
        assert!(qb.sql().contains("1=0"));
    }

    #[test]
    fn test_filter_sql_source_and_range() {
        let filter = LogFilter {
            source: Some("camera_1".into()),
            start: Some(Utc::now()),
            end: Some(Utc::now()),
            levels: None,
        };
        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM logs WHERE 1=1");
        push_log_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("source ="));
        assert!(sql.contains("timestamp >="));
        assert!(sql.contains("timestamp <="));
        assert!(!sql.contains("level IN"));
    }
}
