//! Search backend capability
//!
//! The search index holds a denormalized projection: one parent document
//! per taxonomy node (id = wizard code) and one child document per review
//! event, split into three child types: accepted, rejected and
//! free-text-searched outcomes. It is consulted for candidate ranking and
//! written to best-effort on submission; it is never the source of truth.

pub mod client;
pub mod queries;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexElement, ServiceFields, VenueFields};
use crate::wizard::WizardCode;

pub use client::ElasticSearchIndex;

/// Parent document type: one per taxonomy node
pub const PARENT_DOC_TYPE: &str = "taxonomy_node";
/// Child document per accepted outcome
pub const ACCEPTED_DOC_TYPE: &str = "accepted_outcome";
/// Child document per rejected candidate
pub const REJECTED_DOC_TYPE: &str = "rejected_outcome";
/// Child document per outcome that used the free-text search box
pub const SEARCHED_DOC_TYPE: &str = "searched_outcome";

/// Which review event a replicated child document records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeDocKind {
    Accepted,
    Rejected,
    Searched,
}

impl OutcomeDocKind {
    pub fn doc_type(&self) -> &'static str {
        match self {
            OutcomeDocKind::Accepted => ACCEPTED_DOC_TYPE,
            OutcomeDocKind::Rejected => REJECTED_DOC_TYPE,
            OutcomeDocKind::Searched => SEARCHED_DOC_TYPE,
        }
    }
}

/// A denormalized review-event document, routed under its parent node
#[derive(Debug, Clone)]
pub struct OutcomeDocument {
    pub kind: OutcomeDocKind,
    /// Parent taxonomy node (document id and routing key)
    pub parent_wizard: WizardCode,
    pub reviewer_id: i64,
    pub record_key: String,
    pub venue_key: String,
    pub product_description: String,
    pub product_category: String,
    pub venue_name: String,
    pub venue_category: String,
    pub venue_category_id: String,
    pub time_spent_secs: i64,
}

/// Abstract search backend consumed by the engine.
///
/// Implementations must map transport and status failures to
/// `Error::SearchUnavailable`; the engine degrades on those instead of
/// failing the caller.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Weighted multi-field candidate query for one record.
    async fn top_candidates(
        &self,
        country: &str,
        service: &ServiceFields,
        venue: &VenueFields,
        level1_id: &str,
        limit: usize,
    ) -> Result<Vec<IndexElement>>;

    /// Reviewer-facing free-text taxonomy search, paged.
    async fn autocomplete(
        &self,
        country: &str,
        search_string: &str,
        level1_id: &str,
        size: usize,
        skip: usize,
    ) -> Result<Vec<IndexElement>>;

    /// Append one review-event child document under its parent node.
    async fn index_outcome(&self, country: &str, doc: &OutcomeDocument) -> Result<()>;
}
