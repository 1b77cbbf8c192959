//! Facet catalog: the ordered facet selection and the remaining options
//!
//! Selection order defines the tree: depth `d` groups by `selected()[d]`.
//! The selection only grows. Every successful [`FacetCatalog::select`]
//! bumps [`FacetCatalog::version`], so readers can tell whether the
//! facet list changed since they last looked.

use crate::error::CatalogError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCatalog {
    selected: Vec<String>,
    remaining: Vec<String>,
    version: u64,
}

impl FacetCatalog {
    /// Create a catalog offering `options`, with nothing selected
    ///
    /// Duplicate options are collapsed, keeping the first occurrence.
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut remaining: Vec<String> = Vec::new();
        for option in options {
            let option = option.into();
            if !remaining.contains(&option) {
                remaining.push(option);
            }
        }
        Self {
            selected: Vec::new(),
            remaining,
            version: 0,
        }
    }

    /// Options not yet selected, in their original order
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// Selected facets in selection order
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Append `facet` to the selection
    ///
    /// Returns the depth at which the facet applies. Fails without changing
    /// anything if `facet` is not currently a remaining option.
    pub fn select(&mut self, facet: &str) -> Result<usize, CatalogError> {
        let position = self
            .remaining
            .iter()
            .position(|f| f == facet)
            .ok_or_else(|| CatalogError::InvalidFacet(facet.to_string()))?;

        let facet = self.remaining.remove(position);
        self.selected.push(facet);
        self.version += 1;
        Ok(self.selected.len() - 1)
    }

    /// Depth at which `facet` groups, if selected
    pub fn depth_of(&self, facet: &str) -> Option<usize> {
        self.selected.iter().position(|f| f == facet)
    }

    /// Facet grouping the nodes at `depth`, if any
    pub fn facet_at(&self, depth: usize) -> Option<&str> {
        self.selected.get(depth).map(String::as_str)
    }

    /// Number of selected facets
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// True when no options remain (the facet picker can be retired)
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
