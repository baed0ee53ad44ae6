//! Static topic and category translation tables
//!
//! The engine speaks level1 ids ("01000"); the warehouse speaks numeric
//! venue-category ids (1085, ...). These tables translate between the two
//! and supply the per-category default wizard used when two reviewers
//! disagree at the top level. Deployments extend the tables, not the code.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::wizard::WizardCode;

/// A top-level taxonomy topic offered to reviewers
#[derive(Debug, Clone)]
pub struct Topic {
    pub level1_id: &'static str,
    pub level1: &'static str,
    /// Warehouse category ids covered by this topic
    pub warehouse_category_ids: &'static [u32],
}

/// All selectable topics, in display order
pub static TOPICS: &[Topic] = &[
    Topic {
        level1_id: "01000",
        level1: "Hair & Beauty",
        warehouse_category_ids: &[1085, 1086, 1087, 1090],
    },
    Topic {
        level1_id: "01100",
        level1: "Health & Wellness",
        warehouse_category_ids: &[1061, 1062, 1063],
    },
    Topic {
        level1_id: "01400",
        level1: "Fitness & Sports",
        warehouse_category_ids: &[1071, 1072],
    },
    Topic {
        level1_id: "02000",
        level1: "Home Services",
        warehouse_category_ids: &[1077, 1078, 1099],
    },
    Topic {
        level1_id: "10000",
        level1: "Other",
        warehouse_category_ids: &[1000],
    },
];

/// Warehouse venue-category id -> level1-only default wizard.
///
/// Used by the consensus merge when the two reviewers disagree at the top
/// level: neither answer is trusted and the record falls back to the coarse
/// category of its own venue.
static CATEGORY_DEFAULT_WIZARD: Lazy<HashMap<u32, WizardCode>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for topic in TOPICS {
        let wizard = format!(
            "{}_00000_00000_00000_00000",
            topic.level1_id
        );
        let wizard = WizardCode::parse(&wizard).expect("topic table holds valid level1 ids");
        for &category_id in topic.warehouse_category_ids {
            map.insert(category_id, wizard.clone());
        }
    }
    map
});

static TOPIC_BY_LEVEL1_ID: Lazy<HashMap<&'static str, &'static Topic>> =
    Lazy::new(|| TOPICS.iter().map(|t| (t.level1_id, t)).collect());

/// Look up a topic by its level1 id.
pub fn topic_by_level1_id(level1_id: &str) -> Option<&'static Topic> {
    TOPIC_BY_LEVEL1_ID.get(level1_id).copied()
}

/// Warehouse category ids for a level1 id; empty when the topic is unknown.
pub fn warehouse_categories_for(level1_id: &str) -> &'static [u32] {
    topic_by_level1_id(level1_id)
        .map(|t| t.warehouse_category_ids)
        .unwrap_or(&[])
}

/// Default wizard for a warehouse venue-category id.
///
/// Unknown categories map to the all-zero code: the record carries no
/// trustworthy top-level signal at all.
pub fn default_wizard_for_category(category_id: &str) -> WizardCode {
    category_id
        .parse::<u32>()
        .ok()
        .and_then(|id| CATEGORY_DEFAULT_WIZARD.get(&id).cloned())
        .unwrap_or_else(WizardCode::flagged)
}
