//! HTTP client for the warehouse inventory service

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::InventoryConfig;
use crate::error::{Error, Result};
use crate::models::{ConsensusKind, ServiceFields, VenueFields};

use super::{InventoryRecord, InventoryService, OutcomeNotice};

const COUNT_PATH: &str = "unmatched_venue_count";
const FETCH_PATH: &str = "unmatched_services";
const LOCK_PATH: &str = "lock_service";
const UPLOAD_PATH: &str = "upload";

/// Token header for outcome uploads
const TOKEN_HEADER: &str = "X-Matcher-Token";

/// Reqwest-backed warehouse client with per-call bounded timeouts: short
/// for counts, longer for batch fetch and writes.
pub struct WarehouseClient {
    http_client: reqwest::Client,
    config: InventoryConfig,
}

/// Wire shape of one warehouse record
#[derive(Debug, Deserialize)]
struct WarehouseRecord {
    key: String,
    /// Venue key
    subdomain: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    venue_name: String,
    #[serde(default)]
    venue_category: String,
    #[serde(default)]
    venue_category_id: Option<String>,
}

impl WarehouseClient {
    pub fn new(config: InventoryConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn csv(category_ids: &[u32]) -> String {
        category_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn record_from_wire(raw: WarehouseRecord) -> InventoryRecord {
    // Records missing a venue category fall back to the catch-all bucket.
    let category_id = raw
        .venue_category_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "1000".to_string());

    InventoryRecord {
        service: ServiceFields {
            key: raw.key,
            description: raw.description,
            category: raw.category,
        },
        venue: VenueFields {
            key: raw.subdomain,
            name: raw.venue_name,
            category_name: raw.venue_category,
            category_id,
            is_chain: None,
        },
    }
}

#[async_trait]
impl InventoryService for WarehouseClient {
    async fn count_unreviewed(&self, city: &str, category_ids: &[u32]) -> Result<u64> {
        let response = self
            .http_client
            .get(self.url(COUNT_PATH))
            .timeout(Duration::from_millis(self.config.count_timeout_ms))
            .query(&[
                ("token", self.config.token.as_str()),
                ("major_city", city),
                ("category_id", &Self::csv(category_ids)),
                ("limit", "100"),
                ("model", "protodomain"),
            ])
            .send()
            .await
            .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InventoryUnavailable(format!(
                "count returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;
        body.trim()
            .parse::<u64>()
            .map_err(|_| Error::InventoryUnavailable(format!("bad count body: {:?}", body)))
    }

    async fn fetch_unreviewed(
        &self,
        _country: &str,
        city: &str,
        category_ids: &[u32],
        size: u32,
    ) -> Result<Vec<InventoryRecord>> {
        let mut params = vec![
            ("token", self.config.token.clone()),
            ("major_city", city.to_string()),
            ("batch_size", size.to_string()),
            ("model", "protodomain".to_string()),
        ];
        if !category_ids.is_empty() {
            params.push(("category_id", Self::csv(category_ids)));
        }
        // Shortened warehouse read lock for test deployments
        if let Some(secs) = self.config.short_lock_secs {
            params.push(("time_limit", secs.to_string()));
        }

        let response = self
            .http_client
            .get(self.url(FETCH_PATH))
            .timeout(Duration::from_secs(self.config.fetch_timeout_secs))
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InventoryUnavailable(format!(
                "fetch returned {}",
                response.status()
            )));
        }

        let raw: Vec<WarehouseRecord> = response
            .json()
            .await
            .map_err(|e| Error::InventoryUnavailable(format!("bad fetch body: {}", e)))?;

        debug!(count = raw.len(), city = %city, "Fetched warehouse batch");
        Ok(raw.into_iter().map(record_from_wire).collect())
    }

    async fn notify(&self, notice: &OutcomeNotice) -> Result<()> {
        match notice {
            OutcomeNotice::Lock { record_key } => {
                let response = self
                    .http_client
                    .get(self.url(LOCK_PATH))
                    .timeout(Duration::from_secs(self.config.write_timeout_secs))
                    .query(&[
                        ("token", self.config.token.as_str()),
                        ("product_key", record_key),
                    ])
                    .send()
                    .await
                    .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(Error::InventoryUnavailable(format!(
                        "lock of {} returned {}",
                        record_key,
                        response.status()
                    )));
                }
                info!(record_key = %record_key, "Locked record in warehouse");
                Ok(())
            }
            OutcomeNotice::Resolved {
                record_key,
                venue_key,
                wizard,
                consensus,
                reviewer_ref,
            } => {
                // Agreement between the two reviewers is a stronger signal;
                // the warehouse distinguishes the two sources downstream.
                let source = match consensus {
                    ConsensusKind::Agreement => "matcher_qc",
                    ConsensusKind::Disagreement => "matcher",
                };
                let data = json!({ "wizard_index": wizard.as_str() });
                self.upload(record_key, venue_key, reviewer_ref, source, data)
                    .await
            }
            OutcomeNotice::Flagged {
                record_key,
                venue_key,
                default_wizard,
                reviewer_ref,
            } => {
                let data = json!({
                    "matcher_flags": ["not_enough_info"],
                    "wizard_index": default_wizard.as_str()
                });
                self.upload(record_key, venue_key, reviewer_ref, "matcher", data)
                    .await
            }
        }
    }
}

impl WarehouseClient {
    async fn upload(
        &self,
        record_key: &str,
        venue_key: &str,
        reviewer_ref: &str,
        source: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let datasource = json!([{
            "source": source,
            "source_ref": reviewer_ref,
            "data": data,
            "informs": [record_key, venue_key],
            "data_kind": "service"
        }]);

        let response = self
            .http_client
            .put(self.url(UPLOAD_PATH))
            .timeout(Duration::from_secs(self.config.write_timeout_secs))
            .header(TOKEN_HEADER, &self.config.token)
            .query(&[("priority", "1")])
            .json(&datasource)
            .send()
            .await
            .map_err(|e| Error::InventoryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InventoryUnavailable(format!(
                "upload for {} returned {}",
                record_key,
                response.status()
            )));
        }

        info!(record_key = %record_key, source = %source, "Pushed outcome to warehouse");
        Ok(())
    }
}
