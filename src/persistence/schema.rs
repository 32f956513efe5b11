//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS program_session (
    id              TEXT PRIMARY KEY NOT NULL,
    session_name    TEXT NOT NULL,
    script_name     TEXT NOT NULL,
    country         TEXT NOT NULL,
    operator        TEXT NOT NULL,
    lifecycle       TEXT NOT NULL CHECK(lifecycle IN ('running','stopped')),
    last_action     TEXT CHECK(last_action IN ('started','stopped','restarted')),
    created_by      TEXT NOT NULL,
    updated_by      TEXT,
    start_time      TEXT,
    end_time        TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_program_session_lifecycle ON program_session(lifecycle);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
