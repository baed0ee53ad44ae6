//! Review outcome (match) queries

use sqlx::{Row, SqliteConnection};

use crate::error::{Error, Result};
use crate::models::MATCH_BACKEND_VERSION;

/// Fields for one new review outcome row
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub reviewer_id: i64,
    pub session_id: i64,
    pub service_id: i64,
    pub match_index_id: i64,
    pub not_enough_info: bool,
    pub used_search: bool,
    pub search_string: String,
    pub time_spent_secs: i64,
    pub created_at: i64,
}

/// True if this reviewer already has an outcome for this record.
pub async fn exists_for(
    conn: &mut SqliteConnection,
    service_id: i64,
    reviewer_id: i64,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM matches WHERE service_id = ? AND reviewer_id = ?)",
    )
    .bind(service_id)
    .bind(reviewer_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Number of completed outcomes for a record.
pub async fn count_for(conn: &mut SqliteConnection, service_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE service_id = ?")
        .bind(service_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Insert a review outcome. The schema's UNIQUE(service_id, reviewer_id)
/// turns a concurrent duplicate into a `DuplicateReview` rejection.
pub async fn insert(conn: &mut SqliteConnection, new: &NewMatch) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO matches (reviewer_id, session_id, service_id, match_index_id,
                             created_at, not_enough_info, used_search, search_string,
                             time_spent_secs, backend_version)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(new.reviewer_id)
    .bind(new.session_id)
    .bind(new.service_id)
    .bind(new.match_index_id)
    .bind(new.created_at)
    .bind(new.not_enough_info)
    .bind(new.used_search)
    .bind(&new.search_string)
    .bind(new.time_spent_secs)
    .bind(MATCH_BACKEND_VERSION)
    .fetch_one(&mut *conn)
    .await;

    match result {
        Ok(row) => Ok(row.get("id")),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(Error::DuplicateReview {
                reviewer_id: new.reviewer_id,
                record_key: new.service_id.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Record the candidates a reviewer saw and rejected for one outcome.
pub async fn insert_rejections(
    conn: &mut SqliteConnection,
    match_id: i64,
    index_element_ids: &[i64],
) -> Result<()> {
    for &element_id in index_element_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO match_rejections (match_id, index_element_id) VALUES (?, ?)",
        )
        .bind(match_id)
        .bind(element_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
