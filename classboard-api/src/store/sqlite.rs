//! SQLite-backed store
//!
//! Mirrors the hosted tables and keeps bucket files as blobs, so the whole
//! service runs against one local database file. The test-suite uses it
//! with `sqlite::memory:`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use classboard_common::models::{
    ClassKey, ClassRecord, NewClass, NewNoteUpload, NewReminder, NewScheduleUpload, NoteUpload,
    Reminder, ScheduleUpload,
};
use classboard_common::OwnerId;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};

use super::{join_path, Bucket, NoteFilter, ObjectStore, Store, StoreError, StoreResult};

/// Prefix of the URLs handed out for stored files; served by the notes API
pub const LOCAL_FILE_ROUTE: &str = "/api/files";

const CLASS_COLUMNS: &str = "id, user_id, class_code, class_name, location, days_of_week, \
     start_time, end_time, remind_before_minutes, active, created_at";
const NOTE_COLUMNS: &str = "id, user_id, class_code, class_name, class_date, file_name, \
     size_bytes, mime_type, storage_path, created_at";
const REMINDER_COLUMNS: &str = "id, user_id, class_id, message, remind_date, resolved, created_at";
const UPLOAD_COLUMNS: &str = "id, user_id, file_path, ocr_text, parsed_json, status, created_at";

/// Tables and buckets in one SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the tables if they don't exist
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn init_tables(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            class_code TEXT NOT NULL,
            class_name TEXT,
            location TEXT,
            days_of_week TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            remind_before_minutes INTEGER,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes_uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            class_code TEXT,
            class_name TEXT,
            class_date TEXT NOT NULL,
            file_name TEXT NOT NULL,
            size_bytes INTEGER,
            mime_type TEXT,
            storage_path TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reminders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            class_id INTEGER,
            message TEXT NOT NULL,
            remind_date TEXT,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schedule_uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            file_path TEXT,
            ocr_text TEXT,
            parsed_json TEXT,
            status TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage_objects (
            bucket TEXT NOT NULL,
            path TEXT NOT NULL,
            content_type TEXT NOT NULL,
            data BLOB NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (bucket, path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database tables initialized (classes, notes_uploads, reminders, schedule_uploads, storage_objects)");

    Ok(())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn parse_owner(row: &SqliteRow) -> StoreResult<OwnerId> {
    let raw: String = row.try_get("user_id")?;
    raw.parse()
        .map_err(|e| StoreError::Parse(format!("user_id: {}", e)))
}

fn parse_timestamp(row: &SqliteRow) -> StoreResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get("created_at")?;
    raw.map(|s| DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map(|dt| dt.map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| StoreError::Parse(format!("created_at: {}", e)))
}

fn parse_date(raw: &str, column: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| StoreError::Parse(format!("{}: {}", column, e)))
}

fn class_from_row(row: &SqliteRow) -> StoreResult<ClassRecord> {
    Ok(ClassRecord {
        id: row.try_get("id")?,
        user_id: parse_owner(row)?,
        class_code: row.try_get("class_code")?,
        class_name: row.try_get("class_name")?,
        location: row.try_get("location")?,
        days_of_week: row.try_get("days_of_week")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        remind_before_minutes: row.try_get("remind_before_minutes")?,
        active: row.try_get("active")?,
        created_at: parse_timestamp(row)?,
    })
}

fn note_from_row(row: &SqliteRow) -> StoreResult<NoteUpload> {
    let class_date: String = row.try_get("class_date")?;
    Ok(NoteUpload {
        id: row.try_get("id")?,
        user_id: parse_owner(row)?,
        class_code: row.try_get("class_code")?,
        class_name: row.try_get("class_name")?,
        class_date: parse_date(&class_date, "class_date")?,
        file_name: row.try_get("file_name")?,
        size_bytes: row.try_get("size_bytes")?,
        mime_type: row.try_get("mime_type")?,
        storage_path: row.try_get("storage_path")?,
        created_at: parse_timestamp(row)?,
    })
}

fn reminder_from_row(row: &SqliteRow) -> StoreResult<Reminder> {
    let remind_date: Option<String> = row.try_get("remind_date")?;
    Ok(Reminder {
        id: row.try_get("id")?,
        user_id: parse_owner(row)?,
        class_id: row.try_get("class_id")?,
        message: row.try_get("message")?,
        remind_date: remind_date
            .map(|raw| parse_date(&raw, "remind_date"))
            .transpose()?,
        resolved: row.try_get("resolved")?,
        created_at: parse_timestamp(row)?,
    })
}

fn schedule_upload_from_row(row: &SqliteRow) -> StoreResult<ScheduleUpload> {
    let parsed_json: Option<String> = row.try_get("parsed_json")?;
    let parsed_json = parsed_json
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| StoreError::Parse(format!("parsed_json: {}", e)))?;

    Ok(ScheduleUpload {
        id: row.try_get("id")?,
        user_id: parse_owner(row)?,
        file_path: row.try_get("file_path")?,
        ocr_text: row.try_get("ocr_text")?,
        parsed_json,
        status: row.try_get("status")?,
        created_at: parse_timestamp(row)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_classes(&self, owner: OwnerId) -> StoreResult<Vec<ClassRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM classes WHERE user_id = ? ORDER BY id",
            CLASS_COLUMNS
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(class_from_row).collect()
    }

    async fn find_class(&self, key: &ClassKey) -> StoreResult<Option<ClassRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM classes WHERE user_id = ? AND class_code = ? \
             AND days_of_week = ? AND start_time = ? LIMIT 1",
            CLASS_COLUMNS
        ))
        .bind(key.owner.to_string())
        .bind(&key.class_code)
        .bind(&key.days_of_week)
        .bind(&key.start_time)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(class_from_row).transpose()
    }

    async fn find_class_by_code(
        &self,
        owner: OwnerId,
        class_code: &str,
    ) -> StoreResult<Option<ClassRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM classes WHERE user_id = ? AND class_code = ? ORDER BY id LIMIT 1",
            CLASS_COLUMNS
        ))
        .bind(owner.to_string())
        .bind(class_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(class_from_row).transpose()
    }

    async fn insert_classes(&self, rows: &[NewClass]) -> StoreResult<Vec<ClassRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let created_at = Utc::now();
            let id = sqlx::query(
                r#"
                INSERT INTO classes (user_id, class_code, class_name, location, days_of_week,
                                     start_time, end_time, remind_before_minutes, active, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.user_id.to_string())
            .bind(&row.class_code)
            .bind(&row.class_name)
            .bind(&row.location)
            .bind(&row.days_of_week)
            .bind(&row.start_time)
            .bind(&row.end_time)
            .bind(row.remind_before_minutes)
            .bind(row.active)
            .bind(created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            inserted.push(ClassRecord {
                id,
                user_id: row.user_id,
                class_code: row.class_code.clone(),
                class_name: row.class_name.clone(),
                location: row.location.clone(),
                days_of_week: row.days_of_week.clone(),
                start_time: row.start_time.clone(),
                end_time: row.end_time.clone(),
                remind_before_minutes: Some(row.remind_before_minutes),
                active: row.active,
                created_at: Some(created_at),
            });
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete_classes(&self, owner: OwnerId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM classes WHERE user_id = ?")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_note_uploads(
        &self,
        owner: OwnerId,
        filter: &NoteFilter,
    ) -> StoreResult<Vec<NoteUpload>> {
        let mut sql = format!("SELECT {} FROM notes_uploads WHERE user_id = ?", NOTE_COLUMNS);
        if filter.class_date.is_some() {
            sql.push_str(" AND class_date = ?");
        }
        if filter.class_code.is_some() {
            sql.push_str(" AND class_code = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query(&sql).bind(owner.to_string());
        if let Some(date) = filter.class_date {
            query = query.bind(date.format("%Y-%m-%d").to_string());
        }
        if let Some(code) = &filter.class_code {
            query = query.bind(code.clone());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(note_from_row).collect()
    }

    async fn insert_note_upload(&self, row: &NewNoteUpload) -> StoreResult<NoteUpload> {
        let created_at = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO notes_uploads (user_id, class_code, class_name, class_date, file_name,
                                       size_bytes, mime_type, storage_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id.to_string())
        .bind(&row.class_code)
        .bind(&row.class_name)
        .bind(row.class_date.format("%Y-%m-%d").to_string())
        .bind(&row.file_name)
        .bind(row.size_bytes)
        .bind(&row.mime_type)
        .bind(&row.storage_path)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(NoteUpload {
            id,
            user_id: row.user_id,
            class_code: Some(row.class_code.clone()),
            class_name: row.class_name.clone(),
            class_date: row.class_date,
            file_name: row.file_name.clone(),
            size_bytes: Some(row.size_bytes),
            mime_type: row.mime_type.clone(),
            storage_path: row.storage_path.clone(),
            created_at: Some(created_at),
        })
    }

    async fn delete_note_uploads(&self, owner: OwnerId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM notes_uploads WHERE user_id = ?")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_reminders(
        &self,
        owner: OwnerId,
        unresolved_only: bool,
    ) -> StoreResult<Vec<Reminder>> {
        let mut sql = format!("SELECT {} FROM reminders WHERE user_id = ?", REMINDER_COLUMNS);
        if unresolved_only {
            sql.push_str(" AND resolved = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(reminder_from_row).collect()
    }

    async fn insert_reminder(&self, row: &NewReminder) -> StoreResult<Reminder> {
        let created_at = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO reminders (user_id, class_id, message, remind_date, resolved, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id.to_string())
        .bind(row.class_id)
        .bind(&row.message)
        .bind(row.remind_date.format("%Y-%m-%d").to_string())
        .bind(row.resolved)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Reminder {
            id,
            user_id: row.user_id,
            class_id: row.class_id,
            message: row.message.clone(),
            remind_date: Some(row.remind_date),
            resolved: row.resolved,
            created_at: Some(created_at),
        })
    }

    async fn resolve_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<Reminder> {
        let result = sqlx::query("UPDATE reminders SET resolved = 1 WHERE user_id = ? AND id = ?")
            .bind(owner.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Reminder {}", id)));
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM reminders WHERE user_id = ? AND id = ?",
            REMINDER_COLUMNS
        ))
        .bind(owner.to_string())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        reminder_from_row(&row)
    }

    async fn delete_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE user_id = ? AND id = ?")
            .bind(owner.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Reminder {}", id)));
        }
        Ok(())
    }

    async fn delete_reminders(&self, owner: OwnerId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM reminders WHERE user_id = ?")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_schedule_upload(
        &self,
        row: &NewScheduleUpload,
    ) -> StoreResult<ScheduleUpload> {
        let created_at = Utc::now();
        let parsed_json = row
            .parsed_json
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Parse(format!("parsed_json: {}", e)))?;

        let id = sqlx::query(
            r#"
            INSERT INTO schedule_uploads (user_id, file_path, ocr_text, parsed_json, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.user_id.to_string())
        .bind(&row.file_path)
        .bind(&row.ocr_text)
        .bind(parsed_json)
        .bind(row.status.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(ScheduleUpload {
            id,
            user_id: row.user_id,
            file_path: Some(row.file_path.clone()),
            ocr_text: row.ocr_text.clone(),
            parsed_json: row.parsed_json.clone(),
            status: Some(row.status.as_str().to_string()),
            created_at: Some(created_at),
        })
    }

    async fn list_schedule_uploads(&self, owner: OwnerId) -> StoreResult<Vec<ScheduleUpload>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM schedule_uploads WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            UPLOAD_COLUMNS
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(schedule_upload_from_row).collect()
    }

    async fn delete_schedule_uploads(&self, owner: OwnerId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM schedule_uploads WHERE user_id = ?")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ObjectStore for SqliteStore {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO storage_objects (bucket, path, content_type, data, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(bucket, path) DO UPDATE SET
                content_type = excluded.content_type,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(bucket.as_str())
        .bind(path)
        .bind(content_type)
        .bind(bytes)
        .bind(timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Vec<u8>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM storage_objects WHERE bucket = ? AND path = ?")
                .bind(bucket.as_str())
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(data,)| data)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", bucket.as_str(), path)))
    }

    async fn list(&self, bucket: Bucket, folder: &str) -> StoreResult<Vec<String>> {
        let prefix = join_path(folder, "");
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT path FROM storage_objects WHERE bucket = ? AND substr(path, 1, length(?)) = ? ORDER BY path",
        )
        .bind(bucket.as_str())
        .bind(&prefix)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(path,)| path)
            .filter(|path| !path[prefix.len()..].contains('/'))
            .collect())
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for path in paths {
            sqlx::query("DELETE FROM storage_objects WHERE bucket = ? AND path = ?")
                .bind(bucket.as_str())
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/{}/{}", LOCAL_FILE_ROUTE, bucket.as_str(), path)
    }
}
