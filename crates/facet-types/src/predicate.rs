//! Filter predicates and the query builder
//!
//! A [`Predicate`] is the accumulated filter text identifying one node's
//! subset of the dataset. It is opaque to the tree: the only operations are
//! the composition functions in [`query`].
//!
//! ```text
//! ""                                   (root)
//!   └── type = 'csv'                   (depth 1)
//!         └── type = 'csv' and lab = 'smith'   (depth 2)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator placed between an ancestor predicate and a new clause
pub const CONJUNCTION: &str = " and ";

/// Literal used for facet-absence clauses
pub const NULL_LITERAL: &str = "null";

/// Immutable filter expression over dataset attributes
///
/// The empty predicate matches every item and is the root's predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(String);

impl Predicate {
    /// The predicate that matches everything
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Wrap predicate text received from elsewhere (fixtures, wire payloads)
    ///
    /// Surrounding whitespace is trimmed so that `"  "` is the empty predicate.
    pub fn from_raw(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.len() == text.len() {
            Self(text)
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Predicate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pure predicate composition
///
/// Values are concatenated verbatim. Quoting inside values is not escaped;
/// the data service owns validation of the resulting text.
pub mod query {
    use super::{Predicate, CONJUNCTION, NULL_LITERAL};

    /// `facet = '<value>'`
    pub fn equality_clause(facet: &str, value: &str) -> Predicate {
        Predicate(format!("{facet} = '{value}'"))
    }

    /// `facet = null`, selecting items that carry no value for `facet`
    pub fn absence_clause(facet: &str) -> Predicate {
        Predicate(format!("{facet} = {NULL_LITERAL}"))
    }

    /// Conjoin `clause` onto `parent`; an empty parent yields the clause itself
    pub fn extend(parent: &Predicate, clause: &Predicate) -> Predicate {
        if parent.is_empty() {
            clause.clone()
        } else if clause.is_empty() {
            parent.clone()
        } else {
            Predicate(format!("{}{CONJUNCTION}{}", parent.0, clause.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::query::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_equality_clause_format() {
        assert_eq!(equality_clause("type", "csv").as_str(), "type = 'csv'");
    }

    #[test]
    fn test_absence_clause_format() {
        assert_eq!(absence_clause("lab").as_str(), "lab = null");
    }

    #[test]
    fn test_extend_nested() {
        let first = extend(&Predicate::empty(), &equality_clause("type", "csv"));
        let second = extend(&first, &absence_clause("lab"));
        assert_eq!(second.as_str(), "type = 'csv' and lab = null");
    }

    #[test]
    fn test_value_taken_verbatim() {
        let clause = equality_clause("lab", "O'Brien");
        assert_eq!(clause.as_str(), "lab = 'O'Brien'");
    }

    #[test]
    fn test_from_raw_trims() {
        assert!(Predicate::from_raw("   ").is_empty());
        assert_eq!(Predicate::from_raw(" a = 'b' ").as_str(), "a = 'b'");
    }

    #[test]
    fn test_serde_transparent() {
        let p = equality_clause("type", "csv");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"type = 'csv'\"");
        let back: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,12}"
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        prop::collection::vec((arb_name(), "[a-zA-Z0-9 ._-]{0,10}"), 0..4).prop_map(|pairs| {
            pairs.iter().fold(Predicate::empty(), |acc, (facet, value)| {
                extend(&acc, &equality_clause(facet, value))
            })
        })
    }

    proptest! {
        #[test]
        fn extend_with_absence_ends_with_null(parent in arb_predicate(), facet in arb_name()) {
            let out = extend(&parent, &absence_clause(&facet));
            let expected_suffix = format!("{facet} = null");
            prop_assert!(out.as_str().ends_with(&expected_suffix));
            prop_assert!(out.as_str().starts_with(parent.as_str()));
        }

        #[test]
        fn extend_with_equality_ends_with_value(
            parent in arb_predicate(),
            facet in arb_name(),
            value in "[a-zA-Z0-9 ._-]{0,10}",
        ) {
            let out = extend(&parent, &equality_clause(&facet, &value));
            let expected_suffix = format!("{facet} = '{value}'");
            prop_assert!(out.as_str().ends_with(&expected_suffix));
        }

        #[test]
        fn empty_parent_is_identity(facet in arb_name(), value in "[a-z]{0,6}") {
            let clause = equality_clause(&facet, &value);
            prop_assert_eq!(extend(&Predicate::empty(), &clause), clause);
            let absent = absence_clause(&facet);
            prop_assert_eq!(extend(&Predicate::empty(), &absent), absent);
        }
    }
}
