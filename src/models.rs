//! Domain types shared across the engine, database and backend clients

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wizard::WizardCode;

/// Schema version stamped onto every recorded review outcome
pub const MATCH_BACKEND_VERSION: i64 = 2;

/// Text fields of a business-service record, as handed to reviewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFields {
    /// External record key (unique in the warehouse)
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// Venue the service belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueFields {
    /// External venue key
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category_name: String,
    /// Warehouse venue-category id, e.g. "1085"
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub is_chain: Option<i64>,
}

/// A taxonomy node: a wizard code plus its five human-readable level names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexElement {
    pub wizard: WizardCode,
    pub level1_id: String,
    pub level1: String,
    pub level2: String,
    pub level3: String,
    pub level4: String,
    pub level5: String,
}

/// Per-record review state machine.
///
/// `Resolved` and `Flagged` are terminal: the record is excluded from all
/// future allocation once it reaches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Unreviewed,
    AwaitingSecondReview,
    Resolved,
    Flagged,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Unreviewed => "unreviewed",
            ReviewState::AwaitingSecondReview => "awaiting_second_review",
            ReviewState::Resolved => "resolved",
            ReviewState::Flagged => "flagged",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "unreviewed" => Ok(ReviewState::Unreviewed),
            "awaiting_second_review" => Ok(ReviewState::AwaitingSecondReview),
            "resolved" => Ok(ReviewState::Resolved),
            "flagged" => Ok(ReviewState::Flagged),
            other => Err(Error::InvalidInput(format!(
                "unknown review state: {:?}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Resolved | ReviewState::Flagged)
    }
}

/// Which tier a fetched record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Tier 1: already ingested, awaiting its second review
    Queue,
    /// Tier 2: fresh from the remote inventory service, never reviewed
    Inventory,
}

/// Topic (level1) selection accompanying fetch and submit requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchData {
    pub country: String,
    pub city: String,
    pub level1: String,
    pub level1_id: String,
}

/// One record handed to a reviewer, with its candidate shortlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedService {
    pub service: ServiceFields,
    pub venue: VenueFields,
    pub origin: Tier,
    /// First reviewer's chosen code; present iff this is a second review
    pub first_wizard: Option<WizardCode>,
    pub candidates: Vec<IndexElement>,
}

/// Reviewer's decision payload for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchData {
    /// Chosen code; ignored when `not_enough_info` is set
    pub wizard: Option<WizardCode>,
    /// Candidates the reviewer saw and rejected
    #[serde(default)]
    pub rejected: Vec<WizardCode>,
    #[serde(default)]
    pub used_search: bool,
    #[serde(default)]
    pub search_string: String,
    #[serde(default)]
    pub not_enough_info: bool,
    pub time_spent_secs: i64,
}

/// A complete submission: already validated and authenticated by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub reviewer_id: i64,
    pub service: ServiceFields,
    pub venue: VenueFields,
    pub search_data: SearchData,
    pub match_data: MatchData,
}

/// How the two reviewers' codes related when a record was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusKind {
    Agreement,
    Disagreement,
}

/// Result of a submission after the authoritative commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub record_key: String,
    pub state: ReviewState,
    /// Final merged code; present once the record is `Resolved`
    pub resolved_wizard: Option<WizardCode>,
    pub consensus: Option<ConsensusKind>,
    /// Best-effort replication results; false means logged-and-skipped
    pub search_replicated: bool,
    pub inventory_notified: bool,
}

/// Per-topic availability row for `count_available_by_topic`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCount {
    pub level1_id: String,
    pub level1: String,
    /// -1 when the inventory service could not be reached for this topic
    pub count: i64,
}
