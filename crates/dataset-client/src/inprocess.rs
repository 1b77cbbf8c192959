//! InProcessGateway: serves dataset records held in memory.
//!
//! Evaluates predicates with [`crate::filter`] and reproduces the grouping
//! and sampling behaviour of the dataset service, so the facet tree can be
//! exercised without a running server.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use facet_types::{query, FacetGroup, GroupResult, ItemId, ItemRef, Predicate, SampleResult};
use serde::{Deserialize, Deserializer};

use crate::filter::{parse_filter, Filter};
use crate::{DatasetGateway, GatewayError, Result};

/// Default number of items returned by a sample
pub const DEFAULT_SAMPLE_SIZE: usize = 25;

/// Default number of facet groups returned by a grouping
pub const DEFAULT_GROUP_PAGE_SIZE: usize = 25;

/// A dataset as stored by the in-process gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetRecord {
    pub id: ItemId,
    pub path: String,
    /// Attribute values; a missing key (or JSON `null`) means "no value"
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: BTreeMap<String, String>,
}

impl DatasetRecord {
    pub fn new(id: impl Into<ItemId>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn to_item(&self) -> ItemRef {
        ItemRef::new(self.id.clone(), self.path.clone())
    }
}

/// Scalars are stringified; nulls are dropped.
fn deserialize_attributes<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((name, s)),
            other => Some((name, other.to_string())),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct InProcessGateway {
    records: Vec<DatasetRecord>,
    sample_size: usize,
    group_page_size: usize,
}

impl InProcessGateway {
    pub fn new(records: Vec<DatasetRecord>) -> Self {
        Self {
            records,
            sample_size: DEFAULT_SAMPLE_SIZE,
            group_page_size: DEFAULT_GROUP_PAGE_SIZE,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_group_page_size(mut self, group_page_size: usize) -> Self {
        self.group_page_size = group_page_size;
        self
    }

    /// Load records from a JSON array file
    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, GatewayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Transport(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Load records from a JSON array string
    pub fn from_json(content: &str) -> std::result::Result<Self, GatewayError> {
        let records: Vec<DatasetRecord> =
            serde_json::from_str(content).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    fn select(&self, predicate: &Predicate) -> Result<Vec<&DatasetRecord>> {
        let filter: Filter = parse_filter(predicate.as_str()).map_err(|e| {
            GatewayError::Transport(format!("query rejected: {}", e.trim_end()))
        })?;
        Ok(self
            .records
            .iter()
            .filter(|r| filter.matches(&r.attributes))
            .collect())
    }

    fn sample(&self, matches: &[&DatasetRecord]) -> SampleResult {
        SampleResult::new(
            matches.len() as u64,
            matches
                .iter()
                .take(self.sample_size)
                .map(|r| r.to_item())
                .collect(),
        )
    }
}

#[async_trait]
impl DatasetGateway for InProcessGateway {
    async fn group_by(&self, predicate: &Predicate, facet: &str) -> Result<GroupResult> {
        let matches = self.select(predicate)?;

        // Keyed like the equality filter matches, so each record lands in
        // exactly one group; the first spelling seen labels the group
        let mut counts: BTreeMap<String, (&str, u64)> = BTreeMap::new();
        for record in &matches {
            if let Some(value) = record.attributes.get(facet) {
                counts
                    .entry(value.to_lowercase())
                    .or_insert((value.as_str(), 0))
                    .1 += 1;
            }
        }

        let mut groups: Vec<FacetGroup> = counts
            .into_values()
            .map(|(value, count)| FacetGroup::new(value, count))
            .collect();
        // Most populated first; BTreeMap order breaks ties by value
        groups.sort_by(|a, b| b.count.cmp(&a.count));
        groups.truncate(self.group_page_size);

        let absent = self.select(&query::extend(predicate, &query::absence_clause(facet)))?;

        tracing::trace!(
            predicate = %predicate,
            facet,
            matches = matches.len(),
            groups = groups.len(),
            absent = absent.len(),
            "in-process group_by"
        );

        Ok(GroupResult {
            count: matches.len() as u64,
            groups,
            leaf_sample: self.sample(&absent),
        })
    }

    async fn count_and_sample(&self, predicate: &Predicate) -> Result<SampleResult> {
        let matches = self.select(predicate)?;
        Ok(self.sample(&matches))
    }
}
