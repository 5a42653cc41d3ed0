use crate::db::models::StoredClip;
use crate::db::schema::SQLITE_INIT;
use crate::error::CompyleError;
use crate::types::clip::Clip;
use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type SqlitePool = Pool<Sqlite>;

const CLIPS_TABLE: &str = "clips";
const CONNECT_ATTEMPTS: usize = 30;
const CONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct ClipStorage {
    pool: SqlitePool,
}

impl ClipStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open `database_url`, retrying while the database is unreachable, and
    /// create the schema.
    pub async fn connect(database_url: &str) -> Result<Self, CompyleError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory database sees its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = (|| async {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options.clone())
                .await
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(CONNECT_DELAY)
                .with_max_times(CONNECT_ATTEMPTS),
        )
        .notify(|err: &sqlx::Error, dur: Duration| {
            warn!("Database connection failed: {}, retrying in {:?}", err, dur);
        })
        .await?;
        info!(database_url = %database_url, "Database connected");

        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), CompyleError> {
        // sqlx::query runs a single statement
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a new version of `clip`. Returns the row id.
    pub async fn insert_clip(&self, clip: &Clip) -> Result<i64, CompyleError> {
        debug!(table = CLIPS_TABLE, clip = %clip.id, "inserting clip");
        let now = timestamp(Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO clips (
                clip_id, broadcaster_name, view_count, created_at, payload,
                inserted_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&clip.id)
        .bind(&clip.broadcaster_name)
        .bind(view_count(clip))
        .bind(timestamp(clip.created_at))
        .bind(serde_json::to_string(clip)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        let row_id = result.last_insert_rowid();
        debug!(table = CLIPS_TABLE, clip = %clip.id, row_id, "clip inserted");
        Ok(row_id)
    }

    /// Batch insert using a single transaction. Returns ids in the same order.
    pub async fn insert_clips(&self, clips: &[Clip]) -> Result<Vec<i64>, CompyleError> {
        debug!(table = CLIPS_TABLE, count = clips.len(), "inserting clips");
        let now = timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(clips.len());

        for clip in clips {
            let result = sqlx::query(
                r#"
                INSERT INTO clips (
                    clip_id, broadcaster_name, view_count, created_at, payload,
                    inserted_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&clip.id)
            .bind(&clip.broadcaster_name)
            .bind(view_count(clip))
            .bind(timestamp(clip.created_at))
            .bind(serde_json::to_string(clip)?)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        debug!(table = CLIPS_TABLE, count = ids.len(), "clips inserted");
        Ok(ids)
    }

    /// Replace the stored version `row_id`, keeping its insertion date.
    /// Returns whether the row existed.
    pub async fn update_clip(&self, row_id: i64, clip: &Clip) -> Result<bool, CompyleError> {
        debug!(table = CLIPS_TABLE, row_id, "updating clip");
        let result = sqlx::query(
            r#"UPDATE clips SET
                clip_id = ?,
                broadcaster_name = ?,
                view_count = ?,
                created_at = ?,
                payload = ?,
                updated_at = ?
              WHERE row_id = ?"#,
        )
        .bind(&clip.id)
        .bind(&clip.broadcaster_name)
        .bind(view_count(clip))
        .bind(timestamp(clip.created_at))
        .bind(serde_json::to_string(clip)?)
        .bind(timestamp(Utc::now()))
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_clip(&self, row_id: i64) -> Result<bool, CompyleError> {
        debug!(table = CLIPS_TABLE, row_id, "deleting clip");
        let result = sqlx::query("DELETE FROM clips WHERE row_id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_clip(&self, row_id: i64) -> Result<Option<StoredClip>, CompyleError> {
        let row = sqlx::query(
            r#"SELECT row_id, payload, inserted_at, updated_at
               FROM clips WHERE row_id = ?"#,
        )
        .bind(row_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// The most viewed stored version of every clip, by view count then
    /// creation date, descending. `None` returns every clip.
    pub async fn list_latest_clips(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<StoredClip>, CompyleError> {
        // SQLite treats a negative LIMIT as no limit
        let limit = limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1);
        let rows = sqlx::query(
            r#"SELECT c.row_id, c.payload, c.inserted_at, c.updated_at
               FROM clips c
               WHERE c.row_id = (
                   SELECT v.row_id FROM clips v
                   WHERE v.clip_id = c.clip_id
                   ORDER BY v.view_count DESC, v.updated_at DESC, v.row_id DESC
                   LIMIT 1
               )
               ORDER BY c.view_count DESC, c.created_at DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        debug!(table = CLIPS_TABLE, count = rows.len(), "latest clips loaded");
        rows.into_iter().map(Self::row_to_model).collect()
    }

    fn row_to_model(row: SqliteRow) -> Result<StoredClip, CompyleError> {
        let row_id: i64 = row.try_get("row_id")?;
        let payload: String = row.try_get("payload")?;
        let inserted_at: String = row.try_get("inserted_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(StoredClip {
            row_id,
            clip: serde_json::from_str(&payload)?,
            inserted_at: parse_timestamp(&inserted_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CompyleError> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

fn view_count(clip: &Clip) -> i64 {
    i64::try_from(clip.view_count).unwrap_or(i64::MAX)
}
