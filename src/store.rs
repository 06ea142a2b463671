use crate::selector::SightingCandidate;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use std::path::Path;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS nextbike (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        bike_id TEXT NOT NULL,
        latitude REAL,
        longitude REAL,
        seen_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
    )
"#;

const CREATE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_bike_id_seen_at
    ON nextbike (bike_id, seen_at)
"#;

/// A stored row of the `nextbike` table
#[derive(Debug, Clone, FromRow)]
pub struct Sighting {
    pub id: i64,
    pub bike_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Local wall-clock time of the insert
    pub seen_at: NaiveDateTime,
}

/// Open (creating if needed) the SQLite file at `path`.
///
/// The tracker is the only writer, so the pool holds a single connection
/// that is reused for every poll cycle.
pub async fn connect<P: AsRef<Path>>(path: P) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path.as_ref())
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Create the table and its index unless they already exist
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
    sqlx::query(CREATE_INDEX).execute(&mut *tx).await?;
    tx.commit().await
}

/// Append one row per candidate inside a single transaction.
///
/// An empty slice still opens and commits a transaction. If any insert
/// fails the transaction is dropped uncommitted and rolled back.
pub async fn insert_sightings(
    pool: &SqlitePool,
    candidates: &[SightingCandidate],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let inserted = insert_all(&mut tx, candidates).await?;
    tx.commit().await?;
    Ok(inserted)
}

async fn insert_all(
    tx: &mut Transaction<'_, Sqlite>,
    candidates: &[SightingCandidate],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;

    for candidate in candidates {
        let result =
            sqlx::query("INSERT INTO nextbike (bike_id, latitude, longitude) VALUES (?, ?, ?)")
                .bind(&candidate.bike_id)
                .bind(candidate.latitude)
                .bind(candidate.longitude)
                .execute(&mut **tx)
                .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

pub async fn count_sightings(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nextbike")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// All sightings of one bike, oldest first
pub async fn sightings_for_bike(
    pool: &SqlitePool,
    bike_id: &str,
) -> Result<Vec<Sighting>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, bike_id, latitude, longitude, seen_at
        FROM nextbike
        WHERE bike_id = ?
        ORDER BY seen_at, id
        "#,
    )
    .bind(bike_id)
    .fetch_all(pool)
    .await
}
