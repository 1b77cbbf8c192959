//! HttpGateway: REST client for the dataset API.
//!
//! Endpoints (paginated responses are `{count, next, previous, results}`):
//!
//! | Operation | Request |
//! |-----------|---------|
//! | sample, empty predicate | `GET  /api/datasets/?page_size=K` |
//! | sample | `POST /api/datasets/filter/?page_size=K`, predicate as `text/plain` |
//! | facet values (plain text) | `POST /api/datasets/facet/?column=F&page_size=G`, predicate as `text/plain` |
//! | facet values (json) | `POST /api/datasets/facet/?page_size=G`, `{"facet": F, "query": P}` |
//!
//! The facet endpoint only reports distinct values, so [`HttpGateway::group_by`]
//! assembles a [`GroupResult`] from three concurrent requests: the facet
//! values, the total count under the predicate, and a sample of the items
//! with no value for the facet.

use std::time::Duration;

use async_trait::async_trait;
use facet_types::{query, FacetGroup, GroupResult, ItemId, ItemRef, Predicate, SampleResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DatasetGateway, GatewayError, Result};

const DATASETS_PATH: &str = "/api/datasets/";
const FILTER_PATH: &str = "/api/datasets/filter/";
const FACET_PATH: &str = "/api/datasets/facet/";

/// Request body shape used for the facet endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Predicate as a `text/plain` body, facet in the `column` query argument
    #[default]
    PlainText,
    /// JSON body with named `facet` and `query` fields
    Json,
}

impl std::str::FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain_text" | "plain-text" | "text" => Ok(Self::PlainText),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown wire format: {}", other)),
        }
    }
}

/// Connection settings for [`HttpGateway`]
#[derive(Debug, Clone)]
pub struct HttpGatewayOptions {
    pub base_url: String,
    pub wire_format: WireFormat,
    /// Page size K for item samples
    pub sample_size: usize,
    /// Maximum number of facet groups requested per branch
    pub group_page_size: usize,
    pub timeout: Duration,
}

impl Default for HttpGatewayOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            wire_format: WireFormat::PlainText,
            sample_size: 25,
            group_page_size: 25,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    count: u64,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DatasetRow {
    id: ItemId,
    path: String,
}

#[derive(Debug, Deserialize)]
struct FacetRow {
    facet: Option<serde_json::Value>,
    count: u64,
}

#[derive(Debug, Serialize)]
struct FacetRequest<'a> {
    facet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
}

impl FacetRow {
    /// Null values are dropped; those items arrive through the leaf sample.
    fn into_group(self) -> Option<FacetGroup> {
        let value = match self.facet? {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        (self.count > 0).then(|| FacetGroup::new(value, self.count))
    }
}

pub struct HttpGateway {
    client: Client,
    options: HttpGatewayOptions,
}

impl HttpGateway {
    pub fn new(options: HttpGatewayOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &HttpGatewayOptions {
        &self.options
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!("HTTP {}: {}", status, text)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn fetch_sample(&self, predicate: &Predicate, page_size: usize) -> Result<SampleResult> {
        let request = if predicate.is_empty() {
            self.client
                .get(self.url(DATASETS_PATH))
                .query(&[("page_size", page_size)])
        } else {
            self.client
                .post(self.url(FILTER_PATH))
                .query(&[("page_size", page_size)])
                .header(CONTENT_TYPE, "text/plain")
                .body(predicate.as_str().to_string())
        };

        tracing::debug!(predicate = %predicate, page_size, "requesting sample");
        let page: Page<DatasetRow> = self.send(request).await?;
        Ok(SampleResult::new(
            page.count,
            page.results
                .into_iter()
                .map(|row| ItemRef::new(row.id, row.path))
                .collect(),
        ))
    }

    async fn fetch_facet_values(&self, predicate: &Predicate, facet: &str) -> Result<Vec<FacetGroup>> {
        let page_size = self.options.group_page_size.to_string();
        let request = match self.options.wire_format {
            WireFormat::PlainText => self
                .client
                .post(self.url(FACET_PATH))
                .query(&[("column", facet), ("page_size", page_size.as_str())])
                .header(CONTENT_TYPE, "text/plain")
                .body(predicate.as_str().to_string()),
            WireFormat::Json => self
                .client
                .post(self.url(FACET_PATH))
                .query(&[("page_size", page_size.as_str())])
                .json(&FacetRequest {
                    facet,
                    query: (!predicate.is_empty()).then(|| predicate.as_str()),
                }),
        };

        tracing::debug!(predicate = %predicate, facet, "requesting facet values");
        let page: Page<FacetRow> = self.send(request).await?;
        Ok(page
            .results
            .into_iter()
            .filter_map(FacetRow::into_group)
            .collect())
    }
}

#[async_trait]
impl DatasetGateway for HttpGateway {
    async fn group_by(&self, predicate: &Predicate, facet: &str) -> Result<GroupResult> {
        let absent = query::extend(predicate, &query::absence_clause(facet));

        let (groups, total, leaf_sample) = futures::try_join!(
            self.fetch_facet_values(predicate, facet),
            self.fetch_sample(predicate, 1),
            self.fetch_sample(&absent, self.options.sample_size),
        )?;

        let result = GroupResult {
            count: total.count,
            groups,
            leaf_sample,
        };
        result
            .remaining()
            .map_err(|e| GatewayError::Decode(format!("facet {}: {}", facet, e)))?;
        Ok(result)
    }

    async fn count_and_sample(&self, predicate: &Predicate) -> Result<SampleResult> {
        self.fetch_sample(predicate, self.options.sample_size).await
    }
}
