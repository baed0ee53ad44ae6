//! End-to-end engine tests over mock search and inventory backends.
//!
//! The relational store is real (SQLite); only the two remote backends are
//! replaced, so these tests exercise the full allocation, consensus and
//! replication paths.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use service_matcher::config::{DatabaseConfig, MatcherConfig};
use service_matcher::db;
use service_matcher::engine::{FetchRequest, MatcherEngine};
use service_matcher::error::{Error, Result};
use service_matcher::inventory::{InventoryRecord, InventoryService, OutcomeNotice};
use service_matcher::models::{
    ConsensusKind, IndexElement, MatchData, ReviewState, SearchData, ServiceFields, SubmitRequest,
    Tier, VenueFields,
};
use service_matcher::search::{OutcomeDocKind, OutcomeDocument, SearchIndex};
use service_matcher::WizardCode;

const NODE_A: &str = "01000_00100_01000_00100_00800";
const NODE_B: &str = "01000_00200_00000_00000_00000";
const NODE_C: &str = "01000_00100_01000_00100_00900";

/// Search backend stub: fixed candidate hits, recorded outcome documents.
struct MockSearch {
    hits: Mutex<Vec<IndexElement>>,
    indexed: Mutex<Vec<OutcomeDocument>>,
    fail_indexing: Mutex<bool>,
}

impl MockSearch {
    fn new(hits: Vec<IndexElement>) -> Self {
        Self {
            hits: Mutex::new(hits),
            indexed: Mutex::new(Vec::new()),
            fail_indexing: Mutex::new(false),
        }
    }

    fn indexed_kinds(&self) -> Vec<OutcomeDocKind> {
        self.indexed.lock().unwrap().iter().map(|d| d.kind).collect()
    }
}

#[async_trait]
impl SearchIndex for MockSearch {
    async fn top_candidates(
        &self,
        _country: &str,
        _service: &ServiceFields,
        _venue: &VenueFields,
        _level1_id: &str,
        _limit: usize,
    ) -> Result<Vec<IndexElement>> {
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn autocomplete(
        &self,
        _country: &str,
        _search_string: &str,
        _level1_id: &str,
        _size: usize,
        _skip: usize,
    ) -> Result<Vec<IndexElement>> {
        Ok(self.hits.lock().unwrap().clone())
    }

    async fn index_outcome(&self, _country: &str, doc: &OutcomeDocument) -> Result<()> {
        if *self.fail_indexing.lock().unwrap() {
            return Err(Error::SearchUnavailable("mock down".to_string()));
        }
        self.indexed.lock().unwrap().push(doc.clone());
        Ok(())
    }
}

/// Warehouse stub: a drainable pool of unreviewed records, recorded notices.
struct MockInventory {
    pool: Mutex<Vec<InventoryRecord>>,
    notices: Mutex<Vec<OutcomeNotice>>,
    count: Mutex<Result<u64>>,
    fail_notify: Mutex<bool>,
}

impl MockInventory {
    fn new(pool: Vec<InventoryRecord>) -> Self {
        Self {
            pool: Mutex::new(pool),
            notices: Mutex::new(Vec::new()),
            count: Mutex::new(Ok(0)),
            fail_notify: Mutex::new(false),
        }
    }

    fn notices(&self) -> Vec<OutcomeNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryService for MockInventory {
    async fn count_unreviewed(&self, _city: &str, _category_ids: &[u32]) -> Result<u64> {
        match &*self.count.lock().unwrap() {
            Ok(n) => Ok(*n),
            Err(_) => Err(Error::InventoryUnavailable("mock down".to_string())),
        }
    }

    async fn fetch_unreviewed(
        &self,
        _country: &str,
        _city: &str,
        _category_ids: &[u32],
        size: u32,
    ) -> Result<Vec<InventoryRecord>> {
        let mut pool = self.pool.lock().unwrap();
        let take = (size as usize).min(pool.len());
        Ok(pool.drain(..take).collect())
    }

    async fn notify(&self, notice: &OutcomeNotice) -> Result<()> {
        if *self.fail_notify.lock().unwrap() {
            return Err(Error::InventoryUnavailable("mock down".to_string()));
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

fn node(wizard: &str, level5: &str) -> IndexElement {
    IndexElement {
        wizard: WizardCode::parse(wizard).unwrap(),
        level1_id: wizard[..5].to_string(),
        level1: "Hair & Beauty".to_string(),
        level2: String::new(),
        level3: String::new(),
        level4: String::new(),
        level5: level5.to_string(),
    }
}

fn search_data() -> SearchData {
    SearchData {
        country: "gb".to_string(),
        city: "London".to_string(),
        level1: "Hair & Beauty".to_string(),
        level1_id: "01000".to_string(),
    }
}

fn service(key: &str) -> ServiceFields {
    ServiceFields {
        key: key.to_string(),
        description: "Blue or Purple Ombre lashes".to_string(),
        category: "Eyelash extensions".to_string(),
    }
}

fn venue(key: &str) -> VenueFields {
    VenueFields {
        key: key.to_string(),
        name: "Lash Studio".to_string(),
        category_name: "Tanning".to_string(),
        category_id: "1085".to_string(),
        is_chain: None,
    }
}

fn inventory_record(service_key: &str, venue_key: &str) -> InventoryRecord {
    InventoryRecord {
        service: service(service_key),
        venue: venue(venue_key),
    }
}

fn submit(reviewer_id: i64, service_key: &str, wizard: Option<&str>) -> SubmitRequest {
    SubmitRequest {
        reviewer_id,
        service: service(service_key),
        venue: venue("ven-1"),
        search_data: search_data(),
        match_data: MatchData {
            wizard: wizard.map(|w| WizardCode::parse(w).unwrap()),
            rejected: Vec::new(),
            used_search: false,
            search_string: String::new(),
            not_enough_info: wizard.is_none(),
            time_spent_secs: 30,
        },
    }
}

async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::create_schema(&pool).await.unwrap();
    pool
}

async fn seed_taxonomy(pool: &SqlitePool) {
    let mut conn = pool.acquire().await.unwrap();
    for (wizard, level5) in [
        (NODE_A, "Ombre lashes"),
        (NODE_B, "Lash lift"),
        (NODE_C, "Classic lashes"),
        ("01000_00000_00000_00000_00000", ""),
    ] {
        db::taxonomy::insert(&mut conn, &node(wizard, level5))
            .await
            .unwrap();
    }
}

struct Harness {
    engine: MatcherEngine,
    search: Arc<MockSearch>,
    inventory: Arc<MockInventory>,
}

async fn harness(pool: SqlitePool, hits: Vec<IndexElement>, warehouse: Vec<InventoryRecord>) -> Harness {
    seed_taxonomy(&pool).await;
    let search = Arc::new(MockSearch::new(hits));
    let inventory = Arc::new(MockInventory::new(warehouse));
    let engine = MatcherEngine::new(
        pool,
        search.clone() as Arc<dyn SearchIndex>,
        inventory.clone() as Arc<dyn InventoryService>,
        MatcherConfig::default(),
    );
    Harness {
        engine,
        search,
        inventory,
    }
}

fn fetch_request(reviewer_id: i64, batch_size: u32) -> FetchRequest {
    FetchRequest {
        reviewer_id,
        search_data: search_data(),
        batch_size,
    }
}

#[tokio::test]
async fn test_two_reviewer_agreement_lifecycle() {
    let pool = memory_pool().await;
    let h = harness(
        pool,
        vec![node(NODE_A, "Ombre lashes"), node(NODE_B, "Lash lift")],
        vec![inventory_record("svc-1", "ven-1")],
    )
    .await;

    // Reviewer A: nothing awaits a second review yet, so the batch comes
    // from the warehouse pool with no prior code attached.
    let batch = h.engine.fetch_batch(&fetch_request(1, 5)).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].origin, Tier::Inventory);
    assert!(batch[0].first_wizard.is_none());
    assert!(!batch[0].candidates.is_empty());

    let outcome = h
        .engine
        .submit_outcome(&submit(1, "svc-1", Some(NODE_A)))
        .await
        .unwrap();
    assert_eq!(outcome.state, ReviewState::AwaitingSecondReview);
    assert!(outcome.resolved_wizard.is_none());
    assert!(outcome.search_replicated);
    assert!(outcome.inventory_notified);
    assert!(matches!(
        h.inventory.notices().as_slice(),
        [OutcomeNotice::Lock { record_key }] if record_key == "svc-1"
    ));

    // Reviewer B: the record now comes from the second-review queue with
    // A's code guaranteed on the shortlist.
    let batch = h.engine.fetch_batch(&fetch_request(2, 5)).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].origin, Tier::Queue);
    assert_eq!(batch[0].first_wizard.as_ref().unwrap().as_str(), NODE_A);
    assert!(batch[0]
        .candidates
        .iter()
        .any(|c| c.wizard.as_str() == NODE_A));

    let outcome = h
        .engine
        .submit_outcome(&submit(2, "svc-1", Some(NODE_A)))
        .await
        .unwrap();
    assert_eq!(outcome.state, ReviewState::Resolved);
    assert_eq!(outcome.resolved_wizard.unwrap().as_str(), NODE_A);
    assert_eq!(outcome.consensus, Some(ConsensusKind::Agreement));
    assert!(matches!(
        h.inventory.notices().last().unwrap(),
        OutcomeNotice::Resolved { record_key, wizard, consensus: ConsensusKind::Agreement, .. }
            if record_key == "svc-1" && wizard.as_str() == NODE_A
    ));

    // Reviewer C: the record is terminal and the warehouse pool is drained.
    let batch = h.engine.fetch_batch(&fetch_request(3, 5)).await.unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_disagreement_resolves_to_common_prefix() {
    let pool = memory_pool().await;
    let h = harness(pool, vec![], vec![inventory_record("svc-1", "ven-1")]).await;

    h.engine
        .submit_outcome(&submit(1, "svc-1", Some(NODE_A)))
        .await
        .unwrap();
    // NODE_C differs from NODE_A only in the fifth segment.
    let outcome = h
        .engine
        .submit_outcome(&submit(2, "svc-1", Some(NODE_C)))
        .await
        .unwrap();

    assert_eq!(outcome.state, ReviewState::Resolved);
    assert_eq!(outcome.consensus, Some(ConsensusKind::Disagreement));
    assert_eq!(
        outcome.resolved_wizard.unwrap().as_str(),
        "01000_00100_01000_00100_00000"
    );
}

#[tokio::test]
async fn test_flag_terminates_record_and_notifies_default() {
    let pool = memory_pool().await;
    let h = harness(pool, vec![], vec![inventory_record("svc-1", "ven-1")]).await;

    let outcome = h
        .engine
        .submit_outcome(&submit(1, "svc-1", None))
        .await
        .unwrap();
    assert_eq!(outcome.state, ReviewState::Flagged);
    assert!(outcome.resolved_wizard.is_none());

    // The warehouse gets the venue-category default, not the sentinel.
    assert!(matches!(
        h.inventory.notices().as_slice(),
        [OutcomeNotice::Flagged { default_wizard, .. }]
            if default_wizard.as_str() == "01000_00000_00000_00000_00000"
    ));

    // A flagged record accepts no further outcomes.
    let err = h
        .engine
        .submit_outcome(&submit(2, "svc-1", Some(NODE_A)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecordClosed(_)));
}

#[tokio::test]
async fn test_duplicate_review_rejected_without_side_effects() {
    let pool = memory_pool().await;
    let h = harness(pool.clone(), vec![], vec![inventory_record("svc-1", "ven-1")]).await;

    h.engine
        .submit_outcome(&submit(1, "svc-1", Some(NODE_A)))
        .await
        .unwrap();
    let err = h
        .engine
        .submit_outcome(&submit(1, "svc-1", Some(NODE_B)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateReview { reviewer_id: 1, .. }));

    // Exactly one outcome row and one warehouse notice
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(h.inventory.notices().len(), 1);
}

#[tokio::test]
async fn test_unknown_wizard_rejected_with_nothing_committed() {
    let pool = memory_pool().await;
    let h = harness(pool.clone(), vec![], vec![]).await;

    let err = h
        .engine
        .submit_outcome(&submit(1, "svc-1", Some("09999_00000_00000_00000_00000")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownWizard(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(h.inventory.notices().is_empty());
}

#[tokio::test]
async fn test_replication_failure_degrades_but_commits() {
    let pool = memory_pool().await;
    // Empty warehouse so the follow-up fetch is served by the queue alone.
    let h = harness(pool, vec![], vec![]).await;
    *h.search.fail_indexing.lock().unwrap() = true;
    *h.inventory.fail_notify.lock().unwrap() = true;

    let outcome = h
        .engine
        .submit_outcome(&submit(1, "svc-1", Some(NODE_A)))
        .await
        .unwrap();

    // The authoritative commit stands; only the projections are behind.
    assert_eq!(outcome.state, ReviewState::AwaitingSecondReview);
    assert!(!outcome.search_replicated);
    assert!(!outcome.inventory_notified);

    // The record is still allocatable to a second reviewer.
    let batch = h.engine.fetch_batch(&fetch_request(2, 5)).await.unwrap();
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn test_outcome_documents_per_kind() {
    let pool = memory_pool().await;
    let h = harness(pool, vec![], vec![inventory_record("svc-1", "ven-1")]).await;

    let mut req = submit(1, "svc-1", Some(NODE_A));
    req.match_data.rejected = vec![WizardCode::parse(NODE_B).unwrap()];
    req.match_data.used_search = true;
    req.match_data.search_string = "ombre".to_string();
    h.engine.submit_outcome(&req).await.unwrap();

    let kinds = h.search.indexed_kinds();
    assert_eq!(kinds.len(), 3);
    assert!(kinds.contains(&OutcomeDocKind::Accepted));
    assert!(kinds.contains(&OutcomeDocKind::Rejected));
    assert!(kinds.contains(&OutcomeDocKind::Searched));

    let docs = h.search.indexed.lock().unwrap();
    let rejected = docs
        .iter()
        .find(|d| d.kind == OutcomeDocKind::Rejected)
        .unwrap();
    assert_eq!(rejected.parent_wizard.as_str(), NODE_B);
}

#[tokio::test]
async fn test_count_available_by_topic_sentinel_and_total() {
    let pool = memory_pool().await;
    let h = harness(pool, vec![], vec![]).await;

    *h.inventory.count.lock().unwrap() = Ok(7);
    let counts = h.engine.count_available_by_topic("London").await;
    // One row per topic plus the trailing total
    assert_eq!(counts.len(), 6);
    assert!(counts[..5].iter().all(|c| c.count == 7));
    let all = counts.last().unwrap();
    assert_eq!(all.level1, "All");
    assert_eq!(all.count, 35);

    *h.inventory.count.lock().unwrap() =
        Err(Error::InventoryUnavailable("down".to_string()));
    let counts = h.engine.count_available_by_topic("London").await;
    assert!(counts[..5].iter().all(|c| c.count == -1));
    assert_eq!(counts.last().unwrap().count, 0);
}

#[tokio::test]
async fn test_fetch_rejects_unknown_topic() {
    let pool = memory_pool().await;
    let h = harness(pool, vec![], vec![]).await;

    let mut req = fetch_request(1, 5);
    req.search_data.level1_id = "99999".to_string();
    let err = h.engine.fetch_batch(&req).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_are_disjoint() {
    // File-backed database so multiple connections see one store.
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}/matcher.db", dir.path().display()),
        max_connections: 5,
    };
    let pool = db::connect(&config).await.unwrap();
    db::create_schema(&pool).await.unwrap();

    // Empty warehouse pool: the queue alone must satisfy every fetch.
    let h = Arc::new(harness(pool, vec![], vec![]).await);

    // First reviews: fill the second-review queue with 20 records.
    for i in 0..20 {
        h.engine
            .submit_outcome(&submit(1, &format!("svc-{}", i), Some(NODE_A)))
            .await
            .unwrap();
    }

    // Four reviewers allocate concurrently; leases must keep the batches
    // pairwise disjoint.
    let mut tasks = Vec::new();
    for reviewer_id in 2..6 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            h.engine
                .fetch_batch(&fetch_request(reviewer_id, 5))
                .await
                .unwrap()
        }));
    }

    let mut seen = std::collections::HashSet::new();
    let mut total = 0;
    for task in tasks {
        for record in task.await.unwrap() {
            assert!(seen.insert(record.service.key.clone()), "record allocated twice");
            total += 1;
        }
    }
    assert_eq!(total, 20);
}
