//! The durable, indexed, full-text-searchable log store.
//!
//! A single `tokio::sync::Mutex` guard serializes every operation,
//! including subscriber notification, so the visible ordering contract
//! ("subscriber callbacks fire ... before the insert call returns",
//! "queries observe operations in serialization order") holds without
//! needing per-row locking.

mod fts;
mod query;
mod schema;

use crate::errors::StoreError;
use crate::model::{Filter, LogRecord, SessionSummary, Severity, Stats};
use crate::sink::SinkHandle;
use query::{push_predicates, ORDER_BY};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// A registered post-insert callback. May fail; failures are diagnosed and
/// swallowed, never allowed to abort the insert.
pub type Subscriber = Box<dyn Fn(&LogRecord) -> anyhow::Result<()> + Send + Sync>;

pub struct Store {
    pool: SqlitePool,
    guard: Mutex<()>,
    subscribers: parking_lot::Mutex<Vec<Subscriber>>,
    sink: SinkHandle,
}

struct RecordRow {
    id: i64,
    source: String,
    category: String,
    severity: i64,
    message: String,
    emit_time: f64,
    receive_time: f64,
    frame: Option<i64>,
    file: Option<String>,
    line: Option<i64>,
    session_id: String,
    instance_id: String,
}

impl RecordRow {
    fn into_record(self) -> LogRecord {
        LogRecord {
            id: self.id,
            source: self.source,
            category: self.category,
            severity: Severity::from_ordinal(self.severity).unwrap_or(Severity::Log),
            message: self.message,
            emit_time: self.emit_time,
            receive_time: self.receive_time,
            frame: self.frame,
            file: self.file,
            line: self.line,
            session_id: self.session_id,
            instance_id: self.instance_id,
        }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            category: row.try_get("category")?,
            severity: row.try_get("severity")?,
            message: row.try_get("message")?,
            emit_time: row.try_get("emit_time")?,
            receive_time: row.try_get("receive_time")?,
            frame: row.try_get("frame")?,
            file: row.try_get("file")?,
            line: row.try_get("line")?,
            session_id: row.try_get("session_id")?,
            instance_id: row.try_get("instance_id")?,
        })
    }
}

const RECORD_COLUMNS: &str =
    "id, source, category, severity, message, emit_time, receive_time, frame, file, line, session_id, instance_id";

impl Store {
    /// Opens (creating if necessary) the durable store at `path`.
    pub async fn open(path: &str, sink: SinkHandle) -> Result<Self, StoreError> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new().max_connections(8).connect(&url).await?;
        schema::migrate(&pool).await?;
        Ok(Self {
            pool,
            guard: Mutex::new(()),
            subscribers: parking_lot::Mutex::new(Vec::new()),
            sink,
        })
    }

    /// In-memory store, for tests.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        schema::migrate(&pool).await?;
        Ok(Self {
            pool,
            guard: Mutex::new(()),
            subscribers: parking_lot::Mutex::new(Vec::new()),
            sink: SinkHandle::default(),
        })
    }

    pub fn subscribe(&self, callback: Subscriber) {
        self.subscribers.lock().push(callback);
    }

    /// Assigns `id`/`receive_time`, persists, and notifies subscribers in
    /// registration order before returning.
    pub async fn insert(&self, mut record: LogRecord) -> Result<i64, StoreError> {
        let _guard = self.guard.lock().await;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO records (source, category, severity, message, emit_time, receive_time, frame, file, line, session_id, instance_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&record.source)
        .bind(&record.category)
        .bind(record.severity.ordinal())
        .bind(&record.message)
        .bind(record.emit_time)
        .bind(record.receive_time)
        .bind(record.frame)
        .bind(&record.file)
        .bind(record.line)
        .bind(&record.session_id)
        .bind(&record.instance_id)
        .fetch_one(&self.pool)
        .await?;

        record.id = id;

        for subscriber in self.subscribers.lock().iter() {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(&record)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.sink.error("store", format!("subscriber failed: {e}"));
                }
                Err(_) => {
                    self.sink.error("store", "subscriber panicked");
                    warn!("log store subscriber panicked");
                }
            }
        }

        Ok(id)
    }

    pub async fn query(&self, filter: &Filter) -> Result<Vec<LogRecord>, StoreError> {
        let _guard = self.guard.lock().await;
        self.query_locked(filter).await
    }

    async fn query_locked(&self, filter: &Filter) -> Result<Vec<LogRecord>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM records"));
        push_predicates(&mut qb, filter, "", false);
        qb.push(ORDER_BY);
        qb.push(" LIMIT ");
        qb.push_bind(filter.limit_or_default());
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset_or_default());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| RecordRow::from_row(r).map(RecordRow::into_record))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    pub async fn search(
        &self,
        fts_query: &str,
        filter: &Filter,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let translated = fts::translate(fts_query)?;
        let _guard = self.guard.lock().await;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.id, r.source, r.category, r.severity, r.message, r.emit_time, \
             r.receive_time, r.frame, r.file, r.line, r.session_id, r.instance_id \
             FROM records r JOIN records_fts ON records_fts.rowid = r.id WHERE records_fts MATCH ",
        );
        qb.push_bind(translated);
        push_predicates(&mut qb, filter, "r.", true);
        qb.push(" ORDER BY r.emit_time DESC, r.id DESC");
        qb.push(" LIMIT ");
        qb.push_bind(filter.limit_or_default());
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset_or_default());

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| RecordRow::from_row(r).map(RecordRow::into_record))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    pub async fn stats(&self, source: Option<&str>, since: Option<f64>) -> Result<Stats, StoreError> {
        let _guard = self.guard.lock().await;

        let mut base: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM records");
        Self::push_stats_predicates(&mut base, source, since);
        let total: i64 = base.build_query_scalar().fetch_one(&self.pool).await?;

        let mut per_source_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT source, COUNT(*) as c FROM records");
        Self::push_stats_predicates(&mut per_source_qb, source, since);
        per_source_qb.push(" GROUP BY source");
        let per_source: Vec<(String, i64)> = per_source_qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let mut err_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM records");
        Self::push_stats_predicates(&mut err_qb, source, since);
        err_qb.push(if source.is_some() || since.is_some() {
            " AND severity <= "
        } else {
            " WHERE severity <= "
        });
        err_qb.push_bind(Severity::Error.ordinal());
        let error_count: i64 = err_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut warn_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM records");
        Self::push_stats_predicates(&mut warn_qb, source, since);
        warn_qb.push(if source.is_some() || since.is_some() {
            " AND severity = "
        } else {
            " WHERE severity = "
        });
        warn_qb.push_bind(Severity::Warning.ordinal());
        let warning_count: i64 = warn_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut cat_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT category, COUNT(*) as c FROM records");
        Self::push_stats_predicates(&mut cat_qb, source, since);
        cat_qb.push(" GROUP BY category ORDER BY c DESC LIMIT 20");
        let top_categories: Vec<(String, i64)> =
            cat_qb.build_query_as().fetch_all(&self.pool).await?;

        let mut session_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(DISTINCT session_id) FROM records");
        Self::push_stats_predicates(&mut session_qb, source, since);
        let distinct_session_count: i64 =
            session_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut instance_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(DISTINCT instance_id) FROM records");
        Self::push_stats_predicates(&mut instance_qb, source, since);
        let distinct_instance_count: i64 =
            instance_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let current_session = self.latest_session_locked(source).await?;

        Ok(Stats {
            total,
            per_source,
            error_count,
            warning_count,
            top_categories,
            distinct_session_count,
            distinct_instance_count,
            current_session,
        })
    }

    fn push_stats_predicates(qb: &mut QueryBuilder<Sqlite>, source: Option<&str>, since: Option<f64>) {
        let mut first = true;
        if let Some(source) = source {
            qb.push(" WHERE source = ");
            qb.push_bind(source.to_string());
            first = false;
        }
        if let Some(since) = since {
            qb.push(if first { " WHERE emit_time >= " } else { " AND emit_time >= " });
            qb.push_bind(since);
        }
    }

    pub async fn categories(&self, source: Option<&str>) -> Result<Vec<String>, StoreError> {
        let _guard = self.guard.lock().await;
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT DISTINCT category FROM records");
        if let Some(source) = source {
            qb.push(" WHERE source = ");
            qb.push_bind(source.to_string());
        }
        qb.push(" ORDER BY category ASC");
        let cats: Vec<(String,)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(cats.into_iter().map(|(c,)| c).collect())
    }

    pub async fn sessions(&self, source: Option<&str>) -> Result<Vec<SessionSummary>, StoreError> {
        let _guard = self.guard.lock().await;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT session_id, MIN(receive_time) as first_seen, MAX(receive_time) as last_seen, COUNT(*) as log_count \
             FROM records",
        );
        if let Some(source) = source {
            qb.push(" WHERE source = ");
            qb.push_bind(source.to_string());
        }
        qb.push(" GROUP BY session_id ORDER BY last_seen DESC");

        #[derive(sqlx::FromRow)]
        struct SessionRow {
            session_id: String,
            first_seen: f64,
            last_seen: f64,
            log_count: i64,
        }

        let rows: Vec<SessionRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let mut instance_qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT DISTINCT instance_id FROM records WHERE session_id = ",
            );
            instance_qb.push_bind(row.session_id.clone());
            if let Some(source) = source {
                instance_qb.push(" AND source = ");
                instance_qb.push_bind(source.to_string());
            }
            instance_qb.push(" ORDER BY instance_id ASC");
            let instances: Vec<(String,)> =
                instance_qb.build_query_as().fetch_all(&self.pool).await?;

            summaries.push(SessionSummary {
                session_id: row.session_id,
                first_seen: row.first_seen,
                last_seen: row.last_seen,
                log_count: row.log_count,
                instances: instances.into_iter().map(|(i,)| i).collect(),
            });
        }
        Ok(summaries)
    }

    pub async fn latest_session(&self, source: Option<&str>) -> Result<String, StoreError> {
        let _guard = self.guard.lock().await;
        self.latest_session_locked(source).await
    }

    async fn latest_session_locked(&self, source: Option<&str>) -> Result<String, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT session_id FROM records");
        if let Some(source) = source {
            qb.push(" WHERE source = ");
            qb.push_bind(source.to_string());
        }
        qb.push(" ORDER BY receive_time DESC, id DESC LIMIT 1");
        let row: Option<(String,)> = qb.build_query_as().fetch_optional(&self.pool).await?;
        Ok(row.map(|(s,)| s).unwrap_or_default())
    }

    pub async fn clear(&self, source: Option<&str>, before_emit_time: Option<f64>) -> Result<u64, StoreError> {
        let _guard = self.guard.lock().await;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM records");
        let mut first = true;
        if let Some(source) = source {
            qb.push(" WHERE source = ");
            qb.push_bind(source.to_string());
            first = false;
        }
        if let Some(before) = before_emit_time {
            qb.push(if first { " WHERE emit_time < " } else { " AND emit_time < " });
            qb.push_bind(before);
        }
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let _guard = self.guard.lock().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub type SharedStore = Arc<Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use pretty_assertions::assert_eq;

    fn record(session: &str, instance: &str, message: &str, emit_time: f64) -> LogRecord {
        LogRecord {
            id: 0,
            source: "client".to_string(),
            category: "LogTemp".to_string(),
            severity: Severity::Warning,
            message: message.to_string(),
            emit_time,
            receive_time: emit_time,
            frame: None,
            file: None,
            line: None,
            session_id: session.to_string(),
            instance_id: instance.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_query_all_sessions() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert(record("s1", "i1", "Test warning message", 1000.0))
            .await
            .unwrap();

        let filter = Filter {
            all_sessions: true,
            ..Default::default()
        };
        let results = store.query(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "client");
        assert_eq!(results[0].message, "Test warning message");
        assert_eq!(results[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn search_matches_message_tokens() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert(record("s1", "i1", "Player spawned at location", 1.0))
            .await
            .unwrap();
        store
            .insert(record("s1", "i1", "Enemy destroyed", 2.0))
            .await
            .unwrap();

        let filter = Filter {
            all_sessions: true,
            ..Default::default()
        };
        let results = store.search("Player", &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].message.contains("Player"));
    }

    #[tokio::test]
    async fn search_with_default_filter_scopes_to_latest_session() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert(record("old", "i1", "Player spawned at location", 1.0))
            .await
            .unwrap();
        store
            .insert(record("new", "i1", "Player respawned elsewhere", 2.0))
            .await
            .unwrap();

        let results = store.search("Player", &Filter::default()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].session_id, "new");
    }

    #[tokio::test]
    async fn default_filter_scopes_to_latest_session() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert(record("old", "i1", "first", 1.0)).await.unwrap();
        store.insert(record("new", "i1", "second", 2.0)).await.unwrap();

        let latest = store.query(&Filter::default()).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].session_id, "new");

        let all = store
            .query(&Filter {
                all_sessions: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn sessions_reports_log_count_and_instances() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert(record("A", "x", "one", 1.0)).await.unwrap();
        store.insert(record("A", "x", "two", 2.0)).await.unwrap();
        store.insert(record("B", "y", "three", 3.0)).await.unwrap();

        let sessions = store.sessions(None).await.unwrap();
        assert_eq!(sessions.len(), 2);
        let a = sessions.iter().find(|s| s.session_id == "A").unwrap();
        assert_eq!(a.log_count, 2);
        assert_eq!(a.instances, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn clear_by_source_removes_only_matching_rows() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert(record("s1", "i1", "a", 1.0)).await.unwrap();
        let mut other = record("s1", "i1", "b", 2.0);
        other.source = "file-tailer".to_string();
        store.insert(other).await.unwrap();

        let deleted = store.clear(Some("client"), None).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store
            .query(&Filter {
                all_sessions: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source, "file-tailer");

        let again = store.clear(Some("client"), None).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn stats_total_matches_count() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert(record("s1", "i1", "a", 1.0)).await.unwrap();
        store.insert(record("s1", "i1", "b", 2.0)).await.unwrap();

        let stats = store.stats(None, None).await.unwrap();
        let count = store.count().await.unwrap();
        assert_eq!(stats.total, count);
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn subscribers_fire_once_per_insert_in_order() {
        let store = Store::open_in_memory().await.unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        store.subscribe(Box::new(move |record| {
            seen_clone.lock().push(record.id);
            Ok(())
        }));

        store.insert(record("s1", "i1", "a", 1.0)).await.unwrap();
        store.insert(record("s1", "i1", "b", 2.0)).await.unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn minimum_severity_error_admits_fatal_and_error_only() {
        let store = Store::open_in_memory().await.unwrap();
        let mut fatal = record("s1", "i1", "fatal", 1.0);
        fatal.severity = Severity::Fatal;
        let mut error = record("s1", "i1", "error", 2.0);
        error.severity = Severity::Error;
        let mut warning = record("s1", "i1", "warning", 3.0);
        warning.severity = Severity::Warning;

        store.insert(fatal).await.unwrap();
        store.insert(error).await.unwrap();
        store.insert(warning).await.unwrap();

        let filter = Filter {
            min_severity: Some(Severity::Error),
            all_sessions: true,
            ..Default::default()
        };
        let results = store.query(&filter).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.severity <= Severity::Error));
    }
}
