//! Query builders for the search backend
//!
//! Candidate ranking scores parents by three priority groups, each pairing
//! a has_child clause (prior outcome text under the node) with a direct
//! match on the node's own text: the record's description first (high
//! boost), combined category/description/venue-category fields second, the
//! venue category alone last. Group weights are tuned constants carried
//! over from production.

use serde_json::{json, Value};

use super::{ACCEPTED_DOC_TYPE, PARENT_DOC_TYPE};

/// Per-group dis_max parameters: (tie_breaker, boost)
const DESCRIPTION_WEIGHTS: (f64, f64) = (0.7, 10.1);
const COMBINED_WEIGHTS: (f64, f64) = (0.2, 1.0);
const VENUE_CATEGORY_WEIGHTS: (f64, f64) = (0.1, 0.5);

/// One priority group: node-text match paired with outcome-child match.
fn scoring_group(text: &str, (tie_breaker, boost): (f64, f64), combined: bool) -> Value {
    let child_query = if combined {
        json!({
            "multi_match": {
                "query": text,
                "fields": ["product_category", "product_description", "venue_category"]
            }
        })
    } else {
        json!({
            "match": { "product_description.search_analyzer": text }
        })
    };
    let parent_field = if combined { "full_wizard" } else { "level5.search_analyzer" };

    json!({
        "dis_max": {
            "tie_breaker": tie_breaker,
            "boost": boost,
            "queries": [
                { "has_child": { "type": ACCEPTED_DOC_TYPE, "query": child_query } },
                { "match": { (parent_field): text } }
            ]
        }
    })
}

/// Candidate query for one record's text fields, optionally narrowed to a
/// level1 topic.
pub fn candidates_query(
    description: &str,
    category: &str,
    venue_category: &str,
    level1_id: &str,
    size: usize,
) -> Value {
    let mut should = Vec::new();
    for text in [description, category] {
        if !text.is_empty() {
            should.push(scoring_group(text, DESCRIPTION_WEIGHTS, false));
            should.push(scoring_group(text, COMBINED_WEIGHTS, true));
        }
    }
    if !venue_category.is_empty() {
        should.push(scoring_group(venue_category, VENUE_CATEGORY_WEIGHTS, false));
        should.push(scoring_group(venue_category, (0.2, 1.0), true));
    }

    let mut filter = vec![json!({ "term": { "doc_relation": PARENT_DOC_TYPE } })];
    if !level1_id.is_empty() {
        filter.push(json!({ "match": { "level1_id": level1_id } }));
    }

    json!({
        "query": {
            "bool": {
                "should": should,
                "filter": filter
            }
        },
        "size": size
    })
}

/// Free-text autocomplete query over node names, paged.
pub fn autocomplete_query(search_string: &str, level1_id: &str, size: usize, skip: usize) -> Value {
    let mut filter = vec![json!({ "term": { "doc_relation": PARENT_DOC_TYPE } })];
    if !level1_id.is_empty() {
        filter.push(json!({ "match": { "level1_id": level1_id } }));
    }

    json!({
        "query": {
            "bool": {
                "should": {
                    "multi_match": {
                        "query": search_string,
                        "type": "best_fields",
                        "tie_breaker": 0.7,
                        "fields": ["level5.search"]
                    }
                },
                "filter": filter
            }
        },
        "from": skip,
        "size": size
    })
}
