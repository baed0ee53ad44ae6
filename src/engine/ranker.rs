//! Candidate shortlist construction
//!
//! Proposes up to three taxonomy nodes per record. On a second review the
//! first reviewer's node is prepended unconditionally, loaded from the
//! relational taxonomy, so the guarantee holds even when the search
//! backend is down. Deduplication runs over the full merged list before
//! truncation, and the final order is randomized so list position cannot
//! bias the reviewer.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use tracing::warn;

use crate::models::{IndexElement, ServiceFields, VenueFields};
use crate::search::SearchIndex;

/// Build the candidate shortlist for one fetched record.
pub async fn shortlist(
    search: &dyn SearchIndex,
    country: &str,
    level1_id: &str,
    service: &ServiceFields,
    venue: &VenueFields,
    first_node: Option<IndexElement>,
    limit: usize,
) -> Vec<IndexElement> {
    let mut candidates = Vec::new();
    if let Some(node) = first_node {
        candidates.push(node);
    }

    match search
        .top_candidates(country, service, venue, level1_id, limit)
        .await
    {
        Ok(found) => candidates.extend(found),
        Err(e) => {
            // Degrade to the prepended node (or nothing on a first
            // review); the batch fetch must not fail for this.
            warn!(record_key = %service.key, error = %e, "Candidate search unavailable");
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|element| seen.insert(element.wizard.clone()));
    candidates.truncate(limit);
    candidates.shuffle(&mut rand::thread_rng());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::wizard::WizardCode;
    use async_trait::async_trait;

    fn node(wizard: &str) -> IndexElement {
        IndexElement {
            wizard: WizardCode::parse(wizard).unwrap(),
            level1_id: wizard[..5].to_string(),
            level1: String::new(),
            level2: String::new(),
            level3: String::new(),
            level4: String::new(),
            level5: String::new(),
        }
    }

    fn service() -> ServiceFields {
        ServiceFields {
            key: "svc-1".to_string(),
            description: "Ombre lashes".to_string(),
            category: "Eyelash extensions".to_string(),
        }
    }

    fn venue() -> VenueFields {
        VenueFields {
            key: "ven-1".to_string(),
            name: String::new(),
            category_name: "Tanning".to_string(),
            category_id: "1085".to_string(),
            is_chain: None,
        }
    }

    /// Search stub returning a fixed hit list, or an error when `fail`.
    struct StubSearch {
        hits: Vec<IndexElement>,
        fail: bool,
    }

    #[async_trait]
    impl SearchIndex for StubSearch {
        async fn top_candidates(
            &self,
            _country: &str,
            _service: &ServiceFields,
            _venue: &VenueFields,
            _level1_id: &str,
            _limit: usize,
        ) -> Result<Vec<IndexElement>> {
            if self.fail {
                Err(Error::SearchUnavailable("stub down".to_string()))
            } else {
                Ok(self.hits.clone())
            }
        }

        async fn autocomplete(
            &self,
            _country: &str,
            _search_string: &str,
            _level1_id: &str,
            _size: usize,
            _skip: usize,
        ) -> Result<Vec<IndexElement>> {
            Ok(Vec::new())
        }

        async fn index_outcome(
            &self,
            _country: &str,
            _doc: &crate::search::OutcomeDocument,
        ) -> Result<()> {
            Ok(())
        }
    }

    const FIRST: &str = "01000_00100_01000_00100_00800";

    fn wizards(list: &[IndexElement]) -> Vec<&str> {
        list.iter().map(|e| e.wizard.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_node_always_included() {
        let search = StubSearch {
            hits: vec![
                node("01000_00200_00000_00000_00000"),
                node("01000_00300_00000_00000_00000"),
                node("01000_00400_00000_00000_00000"),
            ],
            fail: false,
        };

        let result = shortlist(
            &search,
            "gb",
            "01000",
            &service(),
            &venue(),
            Some(node(FIRST)),
            3,
        )
        .await;

        assert_eq!(result.len(), 3);
        assert!(wizards(&result).contains(&FIRST));
    }

    #[tokio::test]
    async fn test_duplicate_of_first_node_removed_before_truncation() {
        // The duplicate sits at the end of the search results; full-list
        // dedup must still catch it and let a distinct node in.
        let search = StubSearch {
            hits: vec![
                node("01000_00200_00000_00000_00000"),
                node("01000_00300_00000_00000_00000"),
                node(FIRST),
            ],
            fail: false,
        };

        let result = shortlist(
            &search,
            "gb",
            "01000",
            &service(),
            &venue(),
            Some(node(FIRST)),
            3,
        )
        .await;

        assert_eq!(result.len(), 3);
        let listed = wizards(&result);
        assert!(listed.contains(&FIRST));
        assert!(listed.contains(&"01000_00200_00000_00000_00000"));
        assert!(listed.contains(&"01000_00300_00000_00000_00000"));
    }

    #[tokio::test]
    async fn test_degrades_to_first_node_on_search_failure() {
        let search = StubSearch {
            hits: Vec::new(),
            fail: true,
        };

        let result = shortlist(
            &search,
            "gb",
            "01000",
            &service(),
            &venue(),
            Some(node(FIRST)),
            3,
        )
        .await;
        assert_eq!(wizards(&result), vec![FIRST]);

        // First review: nothing to fall back to
        let result = shortlist(&search, "gb", "01000", &service(), &venue(), None, 3).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_truncates_to_limit() {
        let search = StubSearch {
            hits: vec![
                node("01000_00200_00000_00000_00000"),
                node("01000_00300_00000_00000_00000"),
                node("01000_00400_00000_00000_00000"),
                node("01000_00500_00000_00000_00000"),
            ],
            fail: false,
        };

        let result = shortlist(&search, "gb", "01000", &service(), &venue(), None, 3).await;
        assert_eq!(result.len(), 3);
    }
}
