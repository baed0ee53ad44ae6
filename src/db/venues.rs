//! Venue queries

use sqlx::{Row, SqliteConnection};

use crate::error::Result;
use crate::models::VenueFields;

/// Locate a venue by its external key, creating it if missing.
/// Returns the venue row id.
pub async fn get_or_create(conn: &mut SqliteConnection, venue: &VenueFields) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM venues WHERE wh_key = ?")
        .bind(&venue.key)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let row = sqlx::query(
        r#"
        INSERT INTO venues (wh_key, name, category_name, category_id, is_chain)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&venue.key)
    .bind(&venue.name)
    .bind(&venue.category_name)
    .bind(&venue.category_id)
    .bind(venue.is_chain)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}

/// Load venue fields by row id.
pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<VenueFields> {
    let row = sqlx::query(
        "SELECT wh_key, name, category_name, category_id, is_chain FROM venues WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(VenueFields {
        key: row.get("wh_key"),
        name: row.get("name"),
        category_name: row.get("category_name"),
        category_id: row.get("category_id"),
        is_chain: row.get("is_chain"),
    })
}
