//! Elasticsearch implementation of the search backend capability

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::models::{IndexElement, ServiceFields, VenueFields};
use crate::wizard::WizardCode;

use super::{queries, OutcomeDocument, SearchIndex};

/// Reqwest-backed search client. One instance is constructed at process
/// start and shared by reference across requests.
pub struct ElasticSearchIndex {
    http_client: reqwest::Client,
    config: SearchConfig,
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source")]
    source: EsNodeSource,
}

#[derive(Debug, Deserialize)]
struct EsNodeSource {
    wizard: String,
    #[serde(default)]
    level1_id: String,
    #[serde(default)]
    level1: String,
    #[serde(default)]
    level2: String,
    #[serde(default)]
    level3: String,
    #[serde(default)]
    level4: String,
    #[serde(default)]
    level5: String,
}

impl ElasticSearchIndex {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::SearchUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.http_client.request(method, url);
        if let Some(username) = &self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_deref());
        }
        builder
    }

    async fn search(&self, country: &str, body: serde_json::Value) -> Result<Vec<IndexElement>> {
        let index = self.config.index_for(country);
        let url = format!("{}/{}/_search", self.config.base_url, index);
        debug!(index = %index, "Querying search backend");

        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SearchUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::SearchUnavailable(format!(
                "search returned {}: {}",
                status, text
            )));
        }

        let parsed: EsSearchResponse = response
            .json()
            .await
            .map_err(|e| Error::SearchUnavailable(format!("bad search response: {}", e)))?;

        // The index is a projection; a malformed hit is dropped, not fatal.
        let mut elements = Vec::with_capacity(parsed.hits.hits.len());
        for hit in parsed.hits.hits {
            match WizardCode::parse(&hit.source.wizard) {
                Ok(wizard) => elements.push(IndexElement {
                    wizard,
                    level1_id: hit.source.level1_id,
                    level1: hit.source.level1,
                    level2: hit.source.level2,
                    level3: hit.source.level3,
                    level4: hit.source.level4,
                    level5: hit.source.level5,
                }),
                Err(_) => {
                    warn!(wizard = %hit.source.wizard, "Dropping search hit with malformed wizard");
                }
            }
        }
        Ok(elements)
    }
}

#[async_trait]
impl SearchIndex for ElasticSearchIndex {
    async fn top_candidates(
        &self,
        country: &str,
        service: &ServiceFields,
        venue: &VenueFields,
        level1_id: &str,
        limit: usize,
    ) -> Result<Vec<IndexElement>> {
        let body = queries::candidates_query(
            &service.description,
            &service.category,
            &venue.category_name,
            level1_id,
            limit,
        );
        self.search(country, body).await
    }

    async fn autocomplete(
        &self,
        country: &str,
        search_string: &str,
        level1_id: &str,
        size: usize,
        skip: usize,
    ) -> Result<Vec<IndexElement>> {
        let body = queries::autocomplete_query(search_string, level1_id, size, skip);
        self.search(country, body).await
    }

    async fn index_outcome(&self, country: &str, doc: &OutcomeDocument) -> Result<()> {
        let index = self.config.index_for(country);
        // Child documents are routed by their parent node id so parent and
        // children land on the same shard.
        let url = format!(
            "{}/{}/_doc?routing={}",
            self.config.base_url,
            index,
            doc.parent_wizard.as_str()
        );

        let body = json!({
            "reviewer_id": doc.reviewer_id,
            "product_key": doc.record_key,
            "subdomain_key": doc.venue_key,
            "product_description": doc.product_description,
            "product_category": doc.product_category,
            "venue_name": doc.venue_name,
            "venue_category": doc.venue_category,
            "venue_category_id": doc.venue_category_id,
            "time_spent_secs": doc.time_spent_secs,
            "doc_relation": {
                "name": doc.kind.doc_type(),
                "parent": doc.parent_wizard.as_str()
            }
        });

        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SearchUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::SearchUnavailable(format!(
                "indexing returned {}: {}",
                status, text
            )));
        }

        debug!(
            doc_type = doc.kind.doc_type(),
            parent = %doc.parent_wizard,
            "Indexed outcome document"
        );
        Ok(())
    }
}
