//! Review session metrics
//!
//! A session row tracks a reviewer's continuous working stretch. It is
//! reused while the reviewer's last activity falls inside the rolling
//! window (one hour by default), otherwise a fresh row is opened.

use sqlx::{Row, SqliteConnection};

use crate::error::Result;

/// Reuse-or-open the reviewer's current session, advance its end time to
/// `now` and bump its completed-review counter. Returns the session id.
pub async fn touch_session(
    conn: &mut SqliteConnection,
    reviewer_id: i64,
    now: i64,
    window_secs: i64,
) -> Result<i64> {
    let current: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM sessions
        WHERE reviewer_id = ? AND end_time > ?
        ORDER BY end_time DESC
        LIMIT 1
        "#,
    )
    .bind(reviewer_id)
    .bind(now - window_secs)
    .fetch_optional(&mut *conn)
    .await?;

    let session_id = match current {
        Some(id) => id,
        None => {
            let row = sqlx::query(
                "INSERT INTO sessions (reviewer_id, start_time, end_time) VALUES (?, ?, ?) RETURNING id",
            )
            .bind(reviewer_id)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;
            row.get("id")
        }
    };

    sqlx::query("UPDATE sessions SET end_time = ?, match_counter = match_counter + 1 WHERE id = ?")
        .bind(now)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;

    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_reused_within_window() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = touch_session(&mut conn, 7, 10_000, 3600).await.unwrap();
        let second = touch_session(&mut conn, 7, 10_500, 3600).await.unwrap();
        assert_eq!(first, second);

        let counter: i64 = sqlx::query_scalar("SELECT match_counter FROM sessions WHERE id = ?")
            .bind(first)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(counter, 2);
    }

    #[tokio::test]
    async fn test_new_session_after_window() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let first = touch_session(&mut conn, 7, 10_000, 3600).await.unwrap();
        let second = touch_session(&mut conn, 7, 10_000 + 3601, 3600).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_sessions_are_per_reviewer() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let a = touch_session(&mut conn, 7, 10_000, 3600).await.unwrap();
        let b = touch_session(&mut conn, 8, 10_000, 3600).await.unwrap();
        assert_ne!(a, b);
    }
}
