//! The allocation-and-consensus engine
//!
//! `MatcherEngine` is the public surface: topic availability counts, batch
//! fetch with candidate shortlists, reviewer-facing taxonomy search, and
//! outcome submission. It owns the relational pool and talks to the search
//! and inventory backends through trait objects, so tests and alternative
//! deployments can swap either backend out.

pub mod allocator;
pub mod consensus;
pub mod fallback;
pub mod ranker;
pub mod recorder;

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::warn;

use crate::config::MatcherConfig;
use crate::db::taxonomy;
use crate::error::{Error, Result};
use crate::inventory::InventoryService;
use crate::mappings;
use crate::models::{
    FetchedService, IndexElement, SearchData, SubmissionOutcome, SubmitRequest, Tier, TopicCount,
};
use crate::search::SearchIndex;

/// Parameters for one batch fetch
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub reviewer_id: i64,
    pub search_data: SearchData,
    pub batch_size: u32,
}

pub struct MatcherEngine {
    db: SqlitePool,
    search: Arc<dyn SearchIndex>,
    inventory: Arc<dyn InventoryService>,
    config: MatcherConfig,
}

impl MatcherEngine {
    pub fn new(
        db: SqlitePool,
        search: Arc<dyn SearchIndex>,
        inventory: Arc<dyn InventoryService>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            db,
            search,
            inventory,
            config,
        }
    }

    /// Unreviewed-record counts per topic for a city, with a trailing
    /// "All" total row.
    ///
    /// Topics whose count query fails carry the -1 sentinel and contribute
    /// nothing to the total; the call itself never fails on backend
    /// availability.
    pub async fn count_available_by_topic(&self, city: &str) -> Vec<TopicCount> {
        let mut counts = Vec::with_capacity(mappings::TOPICS.len() + 1);
        let mut total: i64 = 0;

        for topic in mappings::TOPICS {
            let count = match self
                .inventory
                .count_unreviewed(city, topic.warehouse_category_ids)
                .await
            {
                Ok(n) => {
                    total += n as i64;
                    n as i64
                }
                Err(e) => {
                    warn!(topic = topic.level1_id, error = %e, "Topic count unavailable");
                    -1
                }
            };
            counts.push(TopicCount {
                level1_id: topic.level1_id.to_string(),
                level1: topic.level1.to_string(),
                count,
            });
        }

        counts.push(TopicCount {
            level1_id: String::new(),
            level1: "All".to_string(),
            count: total,
        });
        counts
    }

    /// Fetch a batch of records for a reviewer and attach a candidate
    /// shortlist to each.
    pub async fn fetch_batch(&self, req: &FetchRequest) -> Result<Vec<FetchedService>> {
        if mappings::topic_by_level1_id(&req.search_data.level1_id).is_none() {
            return Err(Error::InvalidInput(format!(
                "unknown topic: {:?}",
                req.search_data.level1_id
            )));
        }

        let mut records = fallback::fetch_batch(
            &self.db,
            self.inventory.as_ref(),
            &self.config,
            req.reviewer_id,
            &req.search_data,
            req.batch_size,
        )
        .await?;

        for record in &mut records {
            let first_node = match record.origin {
                Tier::Queue => self.first_reviewer_node(record).await?,
                Tier::Inventory => None,
            };
            record.candidates = ranker::shortlist(
                self.search.as_ref(),
                &req.search_data.country,
                &req.search_data.level1_id,
                &record.service,
                &record.venue,
                first_node,
                self.config.ranking.candidate_limit,
            )
            .await;
        }

        Ok(records)
    }

    /// Reviewer-facing free-text taxonomy search. Degrades to an empty
    /// page when the search backend is unavailable.
    pub async fn search_candidates(
        &self,
        country: &str,
        search_string: &str,
        level1_id: &str,
        size: usize,
        skip: usize,
    ) -> Vec<IndexElement> {
        match self
            .search
            .autocomplete(country, search_string, level1_id, size, skip)
            .await
        {
            Ok(elements) => elements,
            Err(e) => {
                warn!(error = %e, "Taxonomy search unavailable");
                Vec::new()
            }
        }
    }

    /// Record a reviewer's outcome and replicate it to the projections.
    ///
    /// The relational commit is authoritative; replication runs on a
    /// separate task afterwards so the committed outcome survives even if
    /// this request's future is dropped mid-replication.
    pub async fn submit_outcome(&self, req: &SubmitRequest) -> Result<SubmissionOutcome> {
        let (mut outcome, plan) = recorder::record(&self.db, &self.config, req).await?;

        let search = Arc::clone(&self.search);
        let inventory = Arc::clone(&self.inventory);
        let handle = tokio::spawn(async move {
            recorder::replicate(search.as_ref(), inventory.as_ref(), &plan).await
        });

        match handle.await {
            Ok((search_ok, inventory_ok)) => {
                outcome.search_replicated = search_ok;
                outcome.inventory_notified = inventory_ok;
            }
            Err(e) => {
                warn!(record_key = %outcome.record_key, error = %e, "Replication task failed");
            }
        }

        Ok(outcome)
    }

    /// Load the first reviewer's node from the authoritative taxonomy, so
    /// the shortlist guarantee holds even with the search backend down.
    async fn first_reviewer_node(&self, record: &FetchedService) -> Result<Option<IndexElement>> {
        let Some(wizard) = &record.first_wizard else {
            return Ok(None);
        };
        let mut conn = self.db.acquire().await?;
        let row = taxonomy::get_by_wizard(&mut conn, wizard).await?;
        if row.is_none() {
            warn!(
                record_key = %record.service.key,
                wizard = %wizard,
                "First outcome references a wizard missing from the taxonomy"
            );
        }
        Ok(row.map(|r| r.element))
    }
}
