// SQLite complaint store for multi-process deployments.
//
// Status changes are a version-checked UPDATE inside a transaction together
// with the history insert, so concurrent writers in different processes
// cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::DatabaseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::info;

use super::{ComplaintStore, StoreError};
use crate::workflow::types::{
    AttachmentId, AttachmentRef, Complaint, ComplaintFilter, ComplaintId, HistoryEntry,
    NewComplaint,
};

pub struct SqliteComplaintStore {
    pool: SqlitePool,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db) if is_lock_contention(db.as_ref()) => {
                StoreError::Unavailable(format!("database is locked: {db}"))
            }
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}

/// SQLITE_BUSY or SQLITE_LOCKED, including their extended codes.
fn is_lock_contention(err: &dyn DatabaseError) -> bool {
    err.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unavailable(format!("migration failed: {err}"))
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_field<T: std::str::FromStr>(raw: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| StoreError::Corrupt(e.to_string()))
}

fn row_id(id: &ComplaintId) -> Result<i64, StoreError> {
    id.sequence()
        .and_then(|seq| i64::try_from(seq).ok())
        .ok_or_else(|| StoreError::NotFound(id.clone()))
}

impl SqliteComplaintStore {
    /// Open (and create, if needed) the database and run migrations.
    pub async fn connect(database_url: &str, auto_migrate: bool) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(database_url).await? {
            info!("Creating complaint database at {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        Self::connect_with(SqliteConnectOptions::from_str(database_url)?, auto_migrate).await
    }

    pub async fn connect_with(
        options: SqliteConnectOptions,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect_with(options).await?;

        if auto_migrate {
            info!("Running complaint database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        info!("Closing complaint database connections");
        self.pool.close().await;
    }

    async fn load(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<Complaint>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, status, reporter_id, category_id, title, description, location,
                   created_at, version
            FROM complaints
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let history = sqlx::query(
            r#"
            SELECT status, actor_id, actor_role, recorded_at
            FROM complaint_history
            WHERE complaint_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let attachments = sqlx::query(
            r#"
            SELECT id, file_ref, attached_by, attached_at
            FROM complaint_attachments
            WHERE complaint_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(complaint_from_rows(row, history, attachments)?))
    }

    async fn insert_history(
        conn: &mut SqliteConnection,
        id: i64,
        seq: i64,
        entry: &HistoryEntry,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO complaint_history (complaint_id, seq, status, actor_id, actor_role, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id)
        .bind(seq)
        .bind(entry.status.as_str())
        .bind(&entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(entry.timestamp.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

fn complaint_from_rows(
    row: SqliteRow,
    history: Vec<SqliteRow>,
    attachments: Vec<SqliteRow>,
) -> Result<Complaint, StoreError> {
    let id: i64 = row.get("id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let version: i64 = row.get("version");

    let status_history = history
        .into_iter()
        .map(|entry| {
            let status: String = entry.get("status");
            let role: String = entry.get("actor_role");
            let recorded_at: String = entry.get("recorded_at");
            Ok(HistoryEntry {
                status: parse_field(&status)?,
                actor_id: entry.get("actor_id"),
                actor_role: parse_field(&role)?,
                timestamp: parse_time(&recorded_at)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let attachments = attachments
        .into_iter()
        .map(|attachment| {
            let attached_at: String = attachment.get("attached_at");
            Ok(AttachmentRef {
                id: AttachmentId(attachment.get("id")),
                file_ref: attachment.get("file_ref"),
                attached_by: attachment.get("attached_by"),
                attached_at: parse_time(&attached_at)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(Complaint {
        id: ComplaintId::from_sequence(id as u64),
        status: parse_field(&status)?,
        reporter_id: row.get("reporter_id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        attachments,
        created_at: parse_time(&created_at)?,
        status_history,
        version: version as u64,
    })
}

#[async_trait]
impl ComplaintStore for SqliteComplaintStore {
    async fn insert(&self, new: NewComplaint) -> Result<Complaint, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO complaints (status, reporter_id, category_id, title, description, location, created_at, version)
            VALUES ('pending', ?1, ?2, ?3, ?4, ?5, ?6, 0)
            "#,
        )
        .bind(&new.reporter_id)
        .bind(&new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.location)
        .bind(new.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        let complaint = Complaint::from_new(ComplaintId::from_sequence(id as u64), new);
        for (seq, entry) in complaint.status_history.iter().enumerate() {
            Self::insert_history(&mut *tx, id, seq as i64, entry).await?;
        }

        tx.commit().await?;
        Ok(complaint)
    }

    async fn get(&self, id: &ComplaintId) -> Result<Option<Complaint>, StoreError> {
        let Some(seq) = id.sequence().and_then(|seq| i64::try_from(seq).ok()) else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut *conn, seq).await
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<i64> = sqlx::query(
            r#"
            SELECT id FROM complaints
            WHERE (?1 IS NULL OR reporter_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY id ASC
            "#,
        )
        .bind(filter.reporter_id.as_deref())
        .bind(filter.status.map(|status| status.as_str()))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|row| row.get("id"))
        .collect();

        let mut complaints = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(complaint) = Self::load(&mut *conn, id).await? {
                complaints.push(complaint);
            }
        }
        Ok(complaints)
    }

    async fn compare_and_set_status(
        &self,
        id: &ComplaintId,
        expected_version: u64,
        entry: HistoryEntry,
    ) -> Result<Complaint, StoreError> {
        let row = row_id(id)?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE complaints
            SET status = ?1, version = version + 1
            WHERE id = ?2 AND version = ?3
            "#,
        )
        .bind(entry.status.as_str())
        .bind(row)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let found: Option<i64> = sqlx::query("SELECT version FROM complaints WHERE id = ?1")
                .bind(row)
                .fetch_optional(&mut *tx)
                .await?
                .map(|r| r.get("version"));
            tx.rollback().await?;
            return Err(match found {
                None => StoreError::NotFound(id.clone()),
                Some(found) => StoreError::VersionConflict {
                    id: id.clone(),
                    expected: expected_version,
                    found: found as u64,
                },
            });
        }

        let next_seq: i64 = sqlx::query(
            "SELECT COALESCE(MAX(seq), -1) + 1 AS next_seq FROM complaint_history WHERE complaint_id = ?1",
        )
        .bind(row)
        .fetch_one(&mut *tx)
        .await?
        .get("next_seq");
        Self::insert_history(&mut *tx, row, next_seq, &entry).await?;

        let complaint = Self::load(&mut *tx, row)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        tx.commit().await?;
        Ok(complaint)
    }

    async fn append_attachment(
        &self,
        id: &ComplaintId,
        attachment: AttachmentRef,
    ) -> Result<Complaint, StoreError> {
        let row = row_id(id)?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE complaints SET version = version + 1 WHERE id = ?1")
            .bind(row)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO complaint_attachments (id, complaint_id, seq, file_ref, attached_by, attached_at)
            VALUES (?1, ?2, (SELECT COUNT(*) FROM complaint_attachments WHERE complaint_id = ?2), ?3, ?4, ?5)
            "#,
        )
        .bind(&attachment.id.0)
        .bind(row)
        .bind(&attachment.file_ref)
        .bind(&attachment.attached_by)
        .bind(attachment.attached_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let complaint = Self::load(&mut *tx, row)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        tx.commit().await?;
        Ok(complaint)
    }
}
