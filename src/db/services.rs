//! Service record queries, including the atomic lease allocation
//!
//! `allocate_for_review` is the one query in the system with a strict
//! concurrency contract: selecting eligible records and advancing their
//! leases happens in a single UPDATE inside one transaction, so two
//! concurrent allocations can never hand out overlapping records.

use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::{ReviewState, SearchData, ServiceFields, VenueFields};
use crate::wizard::WizardCode;

/// A service row as stored, minus the reviewer-facing text formatting
#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub id: i64,
    pub venue_id: i64,
    pub state: ReviewState,
    pub resolved_wizard: Option<WizardCode>,
}

/// One record handed out by the tier-1 allocator
#[derive(Debug, Clone)]
pub struct AllocatedRecord {
    pub service_id: i64,
    pub service: ServiceFields,
    pub venue: VenueFields,
    /// The first reviewer's chosen code, the record's initial candidate
    pub first_wizard: WizardCode,
}

/// Select up to `batch_size` records awaiting their second review and
/// advance each one's lease to `now + lease_window_secs`, atomically.
///
/// Eligibility: country matches, optional level1 filter matches, the record
/// is in `awaiting_second_review`, its lease has expired, and `reviewer_id`
/// has no prior outcome for it. Order is deterministic (by row id); callers
/// get fewer rows when the tier runs short.
pub async fn allocate_for_review(
    pool: &SqlitePool,
    reviewer_id: i64,
    country: &str,
    level1_id: &str,
    batch_size: u32,
    now: i64,
    lease_window_secs: i64,
) -> Result<Vec<AllocatedRecord>> {
    let mut tx = pool.begin().await?;

    // Selection and lease extension in one statement: SQLite's single-writer
    // transaction makes the whole allocation indivisible.
    let leased = sqlx::query(
        r#"
        UPDATE services
        SET lease_expiry = ?
        WHERE id IN (
            SELECT s.id
            FROM services s
            WHERE s.search_country = ?
              AND (? = '' OR s.search_level1_id = ?)
              AND s.state = 'awaiting_second_review'
              AND s.lease_expiry <= ?
              AND NOT EXISTS (
                  SELECT 1 FROM matches m
                  WHERE m.service_id = s.id AND m.reviewer_id = ?
              )
            ORDER BY s.id
            LIMIT ?
        )
        RETURNING id
        "#,
    )
    .bind(now + lease_window_secs)
    .bind(country)
    .bind(level1_id)
    .bind(level1_id)
    .bind(now)
    .bind(reviewer_id)
    .bind(batch_size)
    .fetch_all(&mut *tx)
    .await?;

    let mut records = Vec::with_capacity(leased.len());
    for row in &leased {
        let id: i64 = row.get("id");
        let detail = sqlx::query(
            r#"
            SELECT s.id, s.wh_key, s.description, s.category,
                   v.wh_key AS venue_key, v.name AS venue_name,
                   v.category_name AS venue_category_name,
                   v.category_id AS venue_category_id, v.is_chain,
                   (SELECT ie.wizard
                    FROM matches m
                    JOIN index_elements ie ON ie.id = m.match_index_id
                    WHERE m.service_id = s.id
                    ORDER BY m.id
                    LIMIT 1) AS first_wizard
            FROM services s
            JOIN venues v ON v.id = s.venue_id
            WHERE s.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        // An awaiting record always has exactly one prior outcome; a missing
        // one would mean the state machine was bypassed.
        let first_wizard: Option<String> = detail.get("first_wizard");
        let first_wizard = first_wizard.ok_or_else(|| {
            crate::error::Error::InvalidInput(format!(
                "record {} awaits a second review but has no first outcome",
                id
            ))
        })?;
        records.push(AllocatedRecord {
            service_id: id,
            service: ServiceFields {
                key: detail.get("wh_key"),
                description: detail.get("description"),
                category: detail.get("category"),
            },
            venue: VenueFields {
                key: detail.get("venue_key"),
                name: detail.get("venue_name"),
                category_name: detail.get("venue_category_name"),
                category_id: detail.get("venue_category_id"),
                is_chain: detail.get("is_chain"),
            },
            first_wizard: WizardCode::parse(&first_wizard)?,
        });
    }

    tx.commit().await?;
    Ok(records)
}

/// Look up a service row by external key.
pub async fn get_by_key(conn: &mut SqliteConnection, key: &str) -> Result<Option<ServiceRow>> {
    let row = sqlx::query("SELECT id, venue_id, state, resolved_wizard FROM services WHERE wh_key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let state: String = row.get("state");
            let resolved: Option<String> = row.get("resolved_wizard");
            Ok(Some(ServiceRow {
                id: row.get("id"),
                venue_id: row.get("venue_id"),
                state: ReviewState::from_str(&state)?,
                resolved_wizard: resolved.as_deref().map(WizardCode::parse).transpose()?,
            }))
        }
        None => Ok(None),
    }
}

/// Create a service record in the `unreviewed` state with an expired lease.
pub async fn create(
    conn: &mut SqliteConnection,
    venue_id: i64,
    service: &ServiceFields,
    search_data: &SearchData,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO services (venue_id, wh_key, description, category,
                              search_level1_id, search_level1, search_city, search_country,
                              state, lease_expiry)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'unreviewed', 0)
        RETURNING id
        "#,
    )
    .bind(venue_id)
    .bind(&service.key)
    .bind(&service.description)
    .bind(&service.category)
    .bind(&search_data.level1_id)
    .bind(&search_data.level1)
    .bind(&search_data.city)
    .bind(&search_data.country)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}

/// Advance the per-record state machine. `resolved` is recorded for
/// terminal transitions carrying a merged code.
pub async fn set_state(
    conn: &mut SqliteConnection,
    service_id: i64,
    state: ReviewState,
    resolved: Option<&WizardCode>,
) -> Result<()> {
    sqlx::query("UPDATE services SET state = ?, resolved_wizard = ? WHERE id = ?")
        .bind(state.as_str())
        .bind(resolved.map(WizardCode::as_str))
        .bind(service_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// The first recorded outcome's wizard for a record, if any.
pub async fn first_match_wizard(
    conn: &mut SqliteConnection,
    service_id: i64,
) -> Result<Option<WizardCode>> {
    let wizard: Option<String> = sqlx::query_scalar(
        r#"
        SELECT ie.wizard
        FROM matches m
        JOIN index_elements ie ON ie.id = m.match_index_id
        WHERE m.service_id = ?
        ORDER BY m.id
        LIMIT 1
        "#,
    )
    .bind(service_id)
    .fetch_optional(&mut *conn)
    .await?;

    wizard.as_deref().map(WizardCode::parse).transpose()
}
