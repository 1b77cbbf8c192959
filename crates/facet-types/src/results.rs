//! Fetch results returned by dataset gateways
//!
//! Both result shapes carry an overall `count` next to a bounded sample.
//! The difference between the two is what the tree renders as an elision
//! row ("... + N more"), so the reconciliation here must be exact: an
//! off-by-one either hides items or shows them twice.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Opaque external identifier of a dataset item
///
/// Only used to build an item-detail link. Numeric ids on the wire are
/// accepted and kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemIdVisitor;

        impl Visitor<'_> for ItemIdVisitor {
            type Value = ItemId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer item id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ItemId, E> {
                Ok(ItemId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ItemId, E> {
                Ok(ItemId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ItemId, E> {
                Ok(ItemId(v.to_string()))
            }
        }

        deserializer.deserialize_any(ItemIdVisitor)
    }
}

/// A sampled item as rendered in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
    /// Human-readable path shown as the link text
    pub display_path: String,
}

impl ItemRef {
    pub fn new(id: impl Into<ItemId>, display_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_path: display_path.into(),
        }
    }
}

/// Counts in a result that cannot be reconciled
///
/// Raised when the sampled/grouped part of a result claims more items than
/// the result's total.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("result accounts for {accounted} items but reports a total of {total}")]
pub struct CountMismatch {
    pub total: u64,
    pub accounted: u64,
}

/// Outcome of a leaf fetch: total matches plus up to K items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResult {
    pub count: u64,
    pub items: Vec<ItemRef>,
}

impl SampleResult {
    pub fn new(count: u64, items: Vec<ItemRef>) -> Self {
        Self { count, items }
    }

    /// Matches not present in `items`
    pub fn remaining(&self) -> Result<u64, CountMismatch> {
        let accounted = self.items.len() as u64;
        self.count.checked_sub(accounted).ok_or(CountMismatch {
            total: self.count,
            accounted,
        })
    }
}

/// One distinct facet value under a predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetGroup {
    pub value: String,
    pub count: u64,
}

impl FacetGroup {
    pub fn new(value: impl Into<String>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Outcome of a branch fetch
///
/// `groups` may be a truncated page of the distinct values. `leaf_sample`
/// covers the items that have no value at all for the grouping facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    /// Total items under the predicate
    pub count: u64,
    pub groups: Vec<FacetGroup>,
    pub leaf_sample: SampleResult,
}

impl GroupResult {
    /// Items covered by the returned groups plus the facet-absent items
    ///
    /// `None` when the counts overflow `u64`.
    pub fn accounted(&self) -> Option<u64> {
        self.groups
            .iter()
            .try_fold(self.leaf_sample.count, |sum, g| sum.checked_add(g.count))
    }

    /// `count - sum(group counts) - leaf_sample.count`
    ///
    /// These are the items belonging to groups that were not returned.
    /// Overflowing counts are reported with `accounted` saturated at `u64::MAX`.
    pub fn remaining(&self) -> Result<u64, CountMismatch> {
        let mismatch = |accounted| CountMismatch {
            total: self.count,
            accounted,
        };
        let accounted = self.accounted().ok_or_else(|| mismatch(u64::MAX))?;
        self.count
            .checked_sub(accounted)
            .ok_or_else(|| mismatch(accounted))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.remaining(), Ok(remain) if remain > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn items(n: usize) -> Vec<ItemRef> {
        (0..n as u64)
            .map(|i| ItemRef::new(i, format!("/data/{i}.nwb")))
            .collect()
    }

    #[test]
    fn test_sample_remaining() {
        let sample = SampleResult::new(5, items(3));
        assert_eq!(sample.remaining(), Ok(2));
    }

    #[test]
    fn test_sample_overfull_is_mismatch() {
        let sample = SampleResult::new(1, items(2));
        assert_eq!(
            sample.remaining(),
            Err(CountMismatch {
                total: 1,
                accounted: 2
            })
        );
    }

    #[test]
    fn test_group_remaining_exact() {
        let result = GroupResult {
            count: 5,
            groups: vec![FacetGroup::new("csv", 3), FacetGroup::new("json", 1)],
            leaf_sample: SampleResult::new(1, items(1)),
        };
        assert_eq!(result.remaining(), Ok(0));
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_group_truncated() {
        let result = GroupResult {
            count: 10,
            groups: vec![FacetGroup::new("csv", 3)],
            leaf_sample: SampleResult::new(2, items(2)),
        };
        assert_eq!(result.remaining(), Ok(5));
        assert!(result.is_truncated());
    }

    #[test]
    fn test_group_negative_remain_is_mismatch() {
        let result = GroupResult {
            count: 2,
            groups: vec![FacetGroup::new("csv", 3)],
            leaf_sample: SampleResult::default(),
        };
        assert!(result.remaining().is_err());
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_group_count_overflow_is_mismatch() {
        let result = GroupResult {
            count: 5,
            groups: vec![FacetGroup::new("a", u64::MAX), FacetGroup::new("b", 2)],
            leaf_sample: SampleResult::default(),
        };
        assert_eq!(result.accounted(), None);
        assert_eq!(
            result.remaining(),
            Err(CountMismatch {
                total: 5,
                accounted: u64::MAX
            })
        );
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_leaf_count_overflow_is_mismatch() {
        let result = GroupResult {
            count: u64::MAX,
            groups: vec![FacetGroup::new("a", 1)],
            leaf_sample: SampleResult::new(u64::MAX, Vec::new()),
        };
        assert!(result.remaining().is_err());
    }

    #[test]
    fn test_item_id_accepts_number_or_string() {
        let from_number: ItemId = serde_json::from_str("42").unwrap();
        let from_string: ItemId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(from_number.as_str(), "42");
        assert_eq!(from_string.as_str(), "abc");
    }

    proptest! {
        /// Hidden groups plus shown groups plus absent items add back up to the total.
        #[test]
        fn remaining_reconciles_with_total(
            group_counts in prop::collection::vec(0u64..1_000, 0..8),
            leaf_count in 0u64..1_000,
            hidden in 0u64..1_000,
        ) {
            let total = group_counts.iter().sum::<u64>() + leaf_count + hidden;
            let result = GroupResult {
                count: total,
                groups: group_counts
                    .iter()
                    .enumerate()
                    .map(|(i, c)| FacetGroup::new(format!("v{i}"), *c))
                    .collect(),
                leaf_sample: SampleResult::new(leaf_count, Vec::new()),
            };
            prop_assert_eq!(result.remaining(), Ok(hidden));
            prop_assert_eq!(result.is_truncated(), hidden > 0);
        }
    }
}
