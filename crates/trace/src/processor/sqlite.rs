use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::{TraceProcessor, create_parent_dirs};
use crate::broadcaster::Broadcaster;
use crate::error::TraceError;
use crate::record::{RecordStatus, SpanRecord};
use crate::span::Span;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS spans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    span_id TEXT NOT NULL UNIQUE,
    parent_id TEXT,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    duration_ms REAL,
    status TEXT NOT NULL,
    data TEXT NOT NULL,
    error TEXT
);
CREATE INDEX IF NOT EXISTS spans_trace_id ON spans(trace_id);
CREATE INDEX IF NOT EXISTS spans_parent_id ON spans(parent_id);
";

const SELECT_SPANS: &str = "
SELECT ts, trace_id, span_id, parent_id, name, kind,
       duration_ms, status, data, error
FROM spans";

/// Stores spans in a SQLite database.
///
/// A start event inserts a `running` row, the end event updates it in
/// place. All writes go through one connection guarded by a mutex.
pub struct SqliteProcessor {
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
    broadcaster: Option<Broadcaster>,
}

impl SqliteProcessor {
    /// Opens or creates the database at `path`.
    ///
    /// Every write is published to `broadcaster` when one is given.
    pub fn open<P: AsRef<Path>>(
        path: P,
        broadcaster: Option<Broadcaster>,
    ) -> Result<Self, TraceError> {
        let path = path.as_ref();
        create_parent_dirs(path)?;
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn, Some(path.to_owned()), broadcaster)
    }

    /// Creates a private in-memory database.
    pub fn open_in_memory(
        broadcaster: Option<Broadcaster>,
    ) -> Result<Self, TraceError> {
        Self::with_connection(Connection::open_in_memory()?, None, broadcaster)
    }

    fn with_connection(
        conn: Connection,
        path: Option<PathBuf>,
        broadcaster: Option<Broadcaster>,
    ) -> Result<Self, TraceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
            broadcaster,
        })
    }

    /// Returns the database path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, TraceError>,
    ) -> Result<T, TraceError> {
        let conn = self.conn.lock();
        let conn = conn.as_ref().ok_or(TraceError::Closed)?;
        f(conn)
    }

    fn publish(&self, record: &SpanRecord) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.publish(record);
        }
    }

    /// Reads back the row of `span_id`.
    pub fn span(&self, span_id: &str) -> Result<Option<SpanRecord>, TraceError> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_SPANS} WHERE span_id = ?1");
            conn.query_row(&sql, [span_id], read_row)
                .optional()?
                .transpose()
        })
    }

    /// Reads back every row, oldest first.
    pub fn spans(&self) -> Result<Vec<SpanRecord>, TraceError> {
        self.with_conn(query_all)
    }
}

impl TraceProcessor for SqliteProcessor {
    fn on_span_start(&self, span: &Span) -> Result<(), TraceError> {
        let record = SpanRecord::started(span);
        let data = serde_json::to_string(&record.data)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO spans (ts, trace_id, span_id, parent_id, name,
                                    kind, duration_ms, status, data, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.ts,
                    record.trace_id,
                    record.span_id,
                    record.parent_id,
                    record.name,
                    record.kind.as_str(),
                    record.duration_ms,
                    record.status.as_str(),
                    data,
                    record.error,
                ],
            )?;
            Ok(())
        })?;
        self.publish(&record);
        Ok(())
    }

    fn on_span_end(&self, span: &Span) -> Result<(), TraceError> {
        let record = SpanRecord::finished(span);
        let data = serde_json::to_string(&record.data)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE spans
                 SET duration_ms = ?1, status = ?2, data = ?3, error = ?4
                 WHERE span_id = ?5",
                params![
                    record.duration_ms,
                    record.status.as_str(),
                    data,
                    record.error,
                    record.span_id,
                ],
            )?;
            Ok(())
        })?;
        self.publish(&record);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TraceError> {
        let conn = self.conn.lock().take().ok_or(TraceError::Closed)?;
        conn.close().map_err(|(_, err)| TraceError::Sqlite(err))
    }

    fn supports_sse(&self) -> bool {
        self.broadcaster.is_some()
    }
}

/// Reads every span stored at `path`, oldest first.
///
/// A missing database yields no spans.
pub fn load_spans<P: AsRef<Path>>(path: P) -> Result<Vec<SpanRecord>, TraceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(vec![]);
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    query_all(&conn)
}

fn query_all(conn: &Connection) -> Result<Vec<SpanRecord>, TraceError> {
    let mut stmt = conn.prepare(&format!("{SELECT_SPANS} ORDER BY ts ASC, id ASC"))?;
    let rows = stmt.query_map([], read_row)?;
    let mut records = vec![];
    for row in rows {
        records.push(row??);
    }
    Ok(records)
}

// Decoding failures of the JSON columns are reported separately from
// SQLite errors, hence the nested result.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<SpanRecord, TraceError>> {
    let kind: String = row.get(5)?;
    let status: String = row.get(7)?;
    let data: String = row.get(8)?;
    let decoded = (|| -> Result<SpanRecord, TraceError> {
        Ok(SpanRecord {
            ts: row.get(0)?,
            trace_id: row.get(1)?,
            span_id: row.get(2)?,
            parent_id: row.get(3)?,
            name: row.get(4)?,
            kind: serde_json::from_value(kind.into())?,
            duration_ms: row.get(6)?,
            status: serde_json::from_value::<RecordStatus>(status.into())?,
            data: serde_json::from_str(&data)?,
            error: row.get(9)?,
        })
    })();
    Ok(decoded)
}
