//! On-disk schema: the durable table, its secondary indexes, and the FTS5
//! virtual table kept in sync via triggers.

use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            category TEXT NOT NULL,
            severity INTEGER NOT NULL,
            message TEXT NOT NULL,
            emit_time REAL NOT NULL,
            receive_time REAL NOT NULL,
            frame INTEGER,
            file TEXT,
            line INTEGER,
            session_id TEXT NOT NULL,
            instance_id TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    for (name, cols) in [
        ("idx_records_source", "source"),
        ("idx_records_severity", "severity"),
        ("idx_records_emit_time", "emit_time"),
        ("idx_records_category", "category"),
        ("idx_records_receive_time", "receive_time"),
        ("idx_records_session_id", "session_id"),
        ("idx_records_instance_id", "instance_id"),
        ("idx_records_session_instance", "session_id, instance_id"),
    ] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {name} ON records({cols})"
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r"
        CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
            message, content='records', content_rowid='id'
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TRIGGER IF NOT EXISTS records_ai AFTER INSERT ON records BEGIN
            INSERT INTO records_fts(rowid, message) VALUES (new.id, new.message);
        END
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TRIGGER IF NOT EXISTS records_ad AFTER DELETE ON records BEGIN
            INSERT INTO records_fts(records_fts, rowid, message) VALUES('delete', old.id, old.message);
        END
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TRIGGER IF NOT EXISTS records_au AFTER UPDATE ON records BEGIN
            INSERT INTO records_fts(records_fts, rowid, message) VALUES('delete', old.id, old.message);
            INSERT INTO records_fts(rowid, message) VALUES (new.id, new.message);
        END
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}
