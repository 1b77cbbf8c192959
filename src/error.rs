//! Error types for the facet tree
//!
//! Three families, matching where they surface:
//! - [`CatalogError`]: facet selection rejected (UI out of sync)
//! - [`TreeError`]: an event named something the tree cannot act on
//! - [`ExpansionError`]: a node's fetch failed; stored in the node's `Error` state

use dataset_client::GatewayError;
use facet_types::CountMismatch;
use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The facet is already selected or was never an option
    #[error("invalid facet '{0}': not among the remaining facet options")]
    InvalidFacet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{0} not found")]
    UnknownNode(NodeId),
}

impl TreeError {
    pub fn is_invalid_facet(&self) -> bool {
        matches!(self, Self::Catalog(CatalogError::InvalidFacet(_)))
    }
}

/// Why a node ended up in the terminal `Error` state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("inconsistent counts: {0}")]
    InconsistentCounts(#[from] CountMismatch),
}

pub type TreeResult<T> = Result<T, TreeError>;
