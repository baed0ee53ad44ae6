//! Tier-1 lease allocation
//!
//! Thin layer over `db::services::allocate_for_review` that stamps the
//! current time, applies the configured lease window and formats the rows
//! for reviewers.

use sqlx::SqlitePool;
use tracing::debug;

use crate::config::LeaseConfig;
use crate::db::services;
use crate::error::Result;
use crate::models::{FetchedService, SearchData, Tier};

/// Allocate up to `batch_size` second-review records to `reviewer_id`,
/// extending each returned record's lease atomically with the selection.
pub async fn allocate(
    pool: &SqlitePool,
    lease: &LeaseConfig,
    reviewer_id: i64,
    search_data: &SearchData,
    batch_size: u32,
) -> Result<Vec<FetchedService>> {
    let now = chrono::Utc::now().timestamp();
    let records = services::allocate_for_review(
        pool,
        reviewer_id,
        &search_data.country,
        &search_data.level1_id,
        batch_size,
        now,
        lease.window_secs,
    )
    .await?;

    debug!(
        reviewer_id,
        count = records.len(),
        "Tier-1 allocation leased records"
    );

    Ok(records
        .into_iter()
        .map(|record| FetchedService {
            service: record.service,
            venue: record.venue,
            origin: Tier::Queue,
            first_wizard: Some(record.first_wizard),
            candidates: Vec::new(),
        })
        .collect())
}
