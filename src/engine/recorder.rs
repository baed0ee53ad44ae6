//! Submission recording: authoritative transaction plus best-effort replication
//!
//! Everything that must hold together (venue and service rows, session and
//! profile counters, the outcome row, the state transition, the consensus
//! merge) happens in one relational transaction. Replication of the
//! outcome to the search index and the warehouse happens after commit and
//! is best-effort: failures are logged and reported, never raised.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::MatcherConfig;
use crate::db::{matches, profiles, services, sessions, taxonomy, venues};
use crate::error::{Error, Result};
use crate::inventory::{InventoryService, OutcomeNotice};
use crate::mappings;
use crate::models::{ConsensusKind, ReviewState, SubmissionOutcome, SubmitRequest};
use crate::search::{OutcomeDocKind, OutcomeDocument, SearchIndex};
use crate::wizard::WizardCode;

use super::consensus;

/// What remains to be pushed to the projections after the commit
#[derive(Debug)]
pub struct ReplicationPlan {
    pub country: String,
    pub documents: Vec<OutcomeDocument>,
    pub notice: OutcomeNotice,
}

/// Run the authoritative submission transaction.
///
/// Returns the committed outcome (replication flags unset) and the plan
/// for the post-commit replication pass. Integrity violations roll the
/// whole transaction back.
pub async fn record(
    pool: &SqlitePool,
    config: &MatcherConfig,
    req: &SubmitRequest,
) -> Result<(SubmissionOutcome, ReplicationPlan)> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let venue_id = venues::get_or_create(&mut tx, &req.venue).await?;

    // Locate-or-create the record. A record first seen here (tier-2 origin)
    // starts unreviewed; a known record awaiting its second review carries
    // its first outcome.
    let (service_id, prior_wizard) = match services::get_by_key(&mut tx, &req.service.key).await? {
        Some(row) if row.state.is_terminal() => {
            return Err(Error::RecordClosed(req.service.key.clone()));
        }
        Some(row) => {
            let prior = services::first_match_wizard(&mut tx, row.id).await?;
            (row.id, prior)
        }
        None => {
            let id = services::create(&mut tx, venue_id, &req.service, &req.search_data).await?;
            (id, None)
        }
    };

    if matches::exists_for(&mut tx, service_id, req.reviewer_id).await? {
        return Err(Error::DuplicateReview {
            reviewer_id: req.reviewer_id,
            record_key: req.service.key.clone(),
        });
    }

    // Resolve the chosen code against the authoritative taxonomy.
    let chosen = if req.match_data.not_enough_info {
        WizardCode::flagged()
    } else {
        req.match_data
            .wizard
            .clone()
            .ok_or_else(|| Error::InvalidInput("submission carries no wizard code".to_string()))?
    };
    let chosen_row = taxonomy::get_by_wizard(&mut tx, &chosen)
        .await?
        .ok_or_else(|| Error::UnknownWizard(chosen.to_string()))?;

    let mut rejected_ids = Vec::with_capacity(req.match_data.rejected.len());
    for wizard in &req.match_data.rejected {
        let row = taxonomy::get_by_wizard(&mut tx, wizard)
            .await?
            .ok_or_else(|| Error::UnknownWizard(wizard.to_string()))?;
        rejected_ids.push(row.id);
    }

    let session_id =
        sessions::touch_session(&mut tx, req.reviewer_id, now, config.session.window_secs).await?;
    profiles::increment(&mut tx, req.reviewer_id).await?;

    let match_id = matches::insert(
        &mut tx,
        &matches::NewMatch {
            reviewer_id: req.reviewer_id,
            session_id,
            service_id,
            match_index_id: chosen_row.id,
            not_enough_info: req.match_data.not_enough_info,
            used_search: req.match_data.used_search,
            search_string: req.match_data.search_string.clone(),
            time_spent_secs: req.match_data.time_spent_secs,
            created_at: now,
        },
    )
    .await?;
    matches::insert_rejections(&mut tx, match_id, &rejected_ids).await?;

    // Advance the state machine. The second outcome always terminates the
    // record, either by consensus or by flag.
    let (state, resolved, kind) = if req.match_data.not_enough_info {
        (ReviewState::Flagged, None, None)
    } else if let Some(first) = &prior_wizard {
        let default = mappings::default_wizard_for_category(&req.venue.category_id);
        let merged = consensus::merge(&default, first, &chosen);
        let kind = if *first == chosen {
            ConsensusKind::Agreement
        } else {
            ConsensusKind::Disagreement
        };
        (ReviewState::Resolved, Some(merged), Some(kind))
    } else {
        (ReviewState::AwaitingSecondReview, None, None)
    };
    services::set_state(&mut tx, service_id, state, resolved.as_ref()).await?;

    tx.commit().await?;
    info!(
        reviewer_id = req.reviewer_id,
        record_key = %req.service.key,
        state = state.as_str(),
        "Recorded review outcome"
    );

    let plan = build_replication_plan(req, &chosen, state, resolved.as_ref(), kind);
    let outcome = SubmissionOutcome {
        record_key: req.service.key.clone(),
        state,
        resolved_wizard: resolved,
        consensus: kind,
        search_replicated: false,
        inventory_notified: false,
    };
    Ok((outcome, plan))
}

fn build_replication_plan(
    req: &SubmitRequest,
    chosen: &WizardCode,
    state: ReviewState,
    resolved: Option<&WizardCode>,
    kind: Option<ConsensusKind>,
) -> ReplicationPlan {
    let doc = |kind: OutcomeDocKind, parent: &WizardCode| OutcomeDocument {
        kind,
        parent_wizard: parent.clone(),
        reviewer_id: req.reviewer_id,
        record_key: req.service.key.clone(),
        venue_key: req.venue.key.clone(),
        product_description: req.service.description.clone(),
        product_category: req.service.category.clone(),
        venue_name: req.venue.name.clone(),
        venue_category: req.venue.category_name.clone(),
        venue_category_id: req.venue.category_id.clone(),
        time_spent_secs: req.match_data.time_spent_secs,
    };

    let mut documents = Vec::new();
    for rejected in &req.match_data.rejected {
        documents.push(doc(OutcomeDocKind::Rejected, rejected));
    }
    if req.match_data.used_search {
        documents.push(doc(OutcomeDocKind::Searched, chosen));
    }
    if !req.match_data.not_enough_info {
        documents.push(doc(OutcomeDocKind::Accepted, chosen));
    }

    let reviewer_ref = req.reviewer_id.to_string();
    let notice = match (state, resolved, kind) {
        (ReviewState::Flagged, _, _) => OutcomeNotice::Flagged {
            record_key: req.service.key.clone(),
            venue_key: req.venue.key.clone(),
            default_wizard: mappings::default_wizard_for_category(&req.venue.category_id),
            reviewer_ref,
        },
        (ReviewState::Resolved, Some(merged), Some(kind)) => OutcomeNotice::Resolved {
            record_key: req.service.key.clone(),
            venue_key: req.venue.key.clone(),
            wizard: merged.clone(),
            consensus: kind,
            reviewer_ref,
        },
        // First review: stop the warehouse re-surfacing the record
        _ => OutcomeNotice::Lock {
            record_key: req.service.key.clone(),
        },
    };

    ReplicationPlan {
        country: req.search_data.country.clone(),
        documents,
        notice,
    }
}

/// Push the plan to the projections. Each target is independently
/// best-effort; the relational store already holds the truth.
pub async fn replicate(
    search: &dyn SearchIndex,
    inventory: &dyn InventoryService,
    plan: &ReplicationPlan,
) -> (bool, bool) {
    let mut search_ok = true;
    for doc in &plan.documents {
        if let Err(e) = search.index_outcome(&plan.country, doc).await {
            warn!(record_key = %doc.record_key, error = %e, "Outcome replication to search index failed");
            search_ok = false;
        }
    }

    let inventory_ok = match inventory.notify(&plan.notice).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Outcome notification to warehouse failed");
            false
        }
    };

    (search_ok, inventory_ok)
}
