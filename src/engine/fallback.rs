//! Tiered record sourcing: second-review queue first, warehouse top-up
//!
//! Tier 1 is the relational second-review queue behind the lease
//! allocator. When it comes up short, the shortfall is requested from the
//! warehouse pool (tier 2): never-reviewed records the warehouse
//! short-locks on its own read path. Warehouse unavailability costs only
//! the top-up: the fetch still returns whatever tier 1 produced.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::MatcherConfig;
use crate::error::Result;
use crate::inventory::InventoryService;
use crate::mappings;
use crate::models::{FetchedService, SearchData, Tier};

use super::allocator;

/// Fetch up to `batch_size` records for a reviewer across both tiers.
pub async fn fetch_batch(
    pool: &SqlitePool,
    inventory: &dyn InventoryService,
    config: &MatcherConfig,
    reviewer_id: i64,
    search_data: &SearchData,
    batch_size: u32,
) -> Result<Vec<FetchedService>> {
    let mut records =
        allocator::allocate(pool, &config.lease, reviewer_id, search_data, batch_size).await?;

    if (records.len() as u32) < batch_size {
        let shortfall = batch_size - records.len() as u32;
        let category_ids = mappings::warehouse_categories_for(&search_data.level1_id);

        match inventory
            .fetch_unreviewed(
                &search_data.country,
                &search_data.city,
                category_ids,
                shortfall,
            )
            .await
        {
            Ok(fresh) => {
                info!(
                    reviewer_id,
                    tier1 = records.len(),
                    tier2 = fresh.len(),
                    "Topped up batch from warehouse"
                );
                records.extend(fresh.into_iter().map(|record| FetchedService {
                    service: record.service,
                    venue: record.venue,
                    origin: Tier::Inventory,
                    first_wizard: None,
                    candidates: Vec::new(),
                }));
            }
            Err(e) => {
                // Availability problems never fail a fetch; the shortfall
                // simply goes unfilled.
                warn!(reviewer_id, error = %e, "Warehouse top-up unavailable");
            }
        }
    }

    if records.is_empty() {
        info!(
            reviewer_id,
            country = %search_data.country,
            level1_id = %search_data.level1_id,
            "No records available in either tier"
        );
    }

    Ok(records)
}
