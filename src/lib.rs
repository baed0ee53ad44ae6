//! Double-blind review allocation and consensus engine for business-service
//! taxonomy matching.
//!
//! Records flow through two independent reviews. The engine allocates
//! records across two tiers (the local second-review queue, then the remote
//! warehouse pool), proposes candidate taxonomy nodes from a weighted
//! search index, and on the second review merges the two answers into one
//! resolved code. SQLite is the system of record; the search index and the
//! warehouse receive best-effort projections after each commit.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod mappings;
pub mod models;
pub mod search;
pub mod wizard;

pub use config::MatcherConfig;
pub use engine::{FetchRequest, MatcherEngine};
pub use error::{Error, Result};
pub use models::{
    ConsensusKind, FetchedService, MatchData, ReviewState, SearchData, SubmissionOutcome,
    SubmitRequest, Tier, TopicCount,
};
pub use wizard::WizardCode;
