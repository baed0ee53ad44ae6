//! Remote inventory (warehouse) capability
//!
//! The warehouse is the low-freshness pool of never-reviewed records: tier 2
//! of allocation. It time-limits its own read locks on the fetch path; this
//! engine's duty is limited to telling it what happened on submission:
//! lock after a first review, push the merged code after a second, or mark
//! the record as lacking information.

pub mod client;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ConsensusKind, ServiceFields, VenueFields};
use crate::wizard::WizardCode;

pub use client::WarehouseClient;

/// A never-reviewed record fetched from the warehouse pool
#[derive(Debug, Clone)]
pub struct InventoryRecord {
    pub service: ServiceFields,
    pub venue: VenueFields,
}

/// Submission outcome pushed back to the warehouse
#[derive(Debug, Clone)]
pub enum OutcomeNotice {
    /// First review done: lock the record so the warehouse stops
    /// re-surfacing it independently.
    Lock { record_key: String },
    /// Second review done: push the consensus code.
    Resolved {
        record_key: String,
        venue_key: String,
        wizard: WizardCode,
        consensus: ConsensusKind,
        reviewer_ref: String,
    },
    /// A reviewer flagged the record; push the coarse category default
    /// with an insufficient-information marker instead of a real code.
    Flagged {
        record_key: String,
        venue_key: String,
        default_wizard: WizardCode,
        reviewer_ref: String,
    },
}

/// Abstract remote inventory service consumed by the engine.
///
/// Implementations map transport failures, timeouts and non-success
/// statuses to `Error::InventoryUnavailable`; the engine logs those and
/// degrades rather than failing the caller.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Count unreviewed records for a city across warehouse categories.
    async fn count_unreviewed(&self, city: &str, category_ids: &[u32]) -> Result<u64>;

    /// Fetch and short-lock a batch of unreviewed records.
    async fn fetch_unreviewed(
        &self,
        country: &str,
        city: &str,
        category_ids: &[u32],
        size: u32,
    ) -> Result<Vec<InventoryRecord>>;

    /// Report a submission outcome back to the warehouse.
    async fn notify(&self, notice: &OutcomeNotice) -> Result<()>;
}
