//! Reviewer profiles: lifetime completed-review counters

use sqlx::SqliteConnection;

use crate::error::Result;

/// Bump the reviewer's lifetime counter, creating the row on first use.
pub async fn increment(conn: &mut SqliteConnection, reviewer_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reviewer_profiles (reviewer_id, general_counter)
        VALUES (?, 1)
        ON CONFLICT(reviewer_id) DO UPDATE SET general_counter = general_counter + 1
        "#,
    )
    .bind(reviewer_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Lifetime completed-review count; zero for unknown reviewers.
pub async fn lifetime_count(conn: &mut SqliteConnection, reviewer_id: i64) -> Result<i64> {
    let count: Option<i64> =
        sqlx::query_scalar("SELECT general_counter FROM reviewer_profiles WHERE reviewer_id = ?")
            .bind(reviewer_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(count.unwrap_or(0))
}
