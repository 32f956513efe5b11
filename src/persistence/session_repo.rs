//! Program session repository for `SQLite` persistence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::session::{
    LastAction, Lifecycle, ProgramSession, SessionFilter, StatusUpdate,
};
use crate::orchestrator::SessionStore;
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for program session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    session_name: String,
    script_name: String,
    country: String,
    operator: String,
    lifecycle: String,
    last_action: Option<String>,
    created_by: String,
    updated_by: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<ProgramSession> {
        let lifecycle = Lifecycle::parse(&self.lifecycle)
            .map_err(|e| AppError::Db(format!("corrupt row {}: {e}", self.id)))?;
        let last_action = self
            .last_action
            .as_deref()
            .map(LastAction::parse)
            .transpose()
            .map_err(|e| AppError::Db(format!("corrupt row {}: {e}", self.id)))?;

        Ok(ProgramSession {
            lifecycle,
            last_action,
            start_time: parse_optional_ts("start_time", self.start_time.as_deref())?,
            end_time: parse_optional_ts("end_time", self.end_time.as_deref())?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            id: self.id,
            session_name: self.session_name,
            script_name: self.script_name,
            country: self.country,
            operator: self.operator,
            created_by: self.created_by,
            updated_by: self.updated_by,
        })
    }
}

fn parse_ts(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

fn parse_optional_ts(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(field, s)).transpose()
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, session: &ProgramSession) -> Result<ProgramSession> {
        sqlx::query(
            "INSERT INTO program_session (id, session_name, script_name, country, operator,
             lifecycle, last_action, created_by, updated_by, start_time, end_time,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&session.id)
        .bind(&session.session_name)
        .bind(&session.script_name)
        .bind(&session.country)
        .bind(&session.operator)
        .bind(session.lifecycle.as_str())
        .bind(session.last_action.map(LastAction::as_str))
        .bind(&session.created_by)
        .bind(&session.updated_by)
        .bind(session.start_time.map(|t| t.to_rfc3339()))
        .bind(session.end_time.map(|t| t.to_rfc3339()))
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(session.clone())
    }

    /// Retrieve a session by identifier.
    ///
    /// Returns `Ok(None)` if the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ProgramSession>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM program_session WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Write a lifecycle transition and return the updated record.
    ///
    /// `start_time` is stamped when the session becomes running and
    /// `end_time` when it becomes stopped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the session does not exist, or
    /// `AppError::Db` if the update fails.
    pub async fn update_status(&self, id: &str, update: &StatusUpdate) -> Result<ProgramSession> {
        let now = Utc::now().to_rfc3339();
        let sql = match update.lifecycle {
            Lifecycle::Running => {
                "UPDATE program_session SET lifecycle = ?1, last_action = ?2, updated_by = ?3, \
                 start_time = ?4, updated_at = ?4 WHERE id = ?5"
            }
            Lifecycle::Stopped => {
                "UPDATE program_session SET lifecycle = ?1, last_action = ?2, updated_by = ?3, \
                 end_time = ?4, updated_at = ?4 WHERE id = ?5"
            }
        };

        let result = sqlx::query(sql)
            .bind(update.lifecycle.as_str())
            .bind(update.last_action.as_str())
            .bind(&update.updated_by)
            .bind(&now)
            .bind(id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id} not found")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::Db(format!("session {id} vanished during update")))
    }

    /// List sessions matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<ProgramSession>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM program_session WHERE 1 = 1");
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND lifecycle = ").push_bind(lifecycle.as_str());
        }
        if let Some(action) = filter.last_action {
            query.push(" AND last_action = ").push_bind(action.as_str());
        }
        if let Some(user) = &filter.created_by {
            query.push(" AND created_by = ").push_bind(user.clone());
        }
        if let Some(user) = &filter.updated_by {
            query.push(" AND updated_by = ").push_bind(user.clone());
        }
        query.push(" ORDER BY created_at DESC");

        let rows: Vec<SessionRow> = query.build_query_as().fetch_all(self.db.as_ref()).await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Delete a session record.
    ///
    /// Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM program_session WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl SessionStore for SessionRepo {
    fn get_details<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProgramSession>>> + Send + 'a>> {
        Box::pin(self.get_by_id(session_id))
    }

    fn update_status<'a>(
        &'a self,
        session_id: &'a str,
        update: &'a StatusUpdate,
    ) -> Pin<Box<dyn Future<Output = Result<ProgramSession>> + Send + 'a>> {
        Box::pin(SessionRepo::update_status(self, session_id, update))
    }

    fn list_running(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ProgramSession>>> + Send + '_>> {
        Box::pin(async move { self.list(&SessionFilter::lifecycle(Lifecycle::Running)).await })
    }

    fn delete<'a>(
        &'a self,
        session_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(SessionRepo::delete(self, session_id))
    }
}
