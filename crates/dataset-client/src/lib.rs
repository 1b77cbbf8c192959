//! DatasetGateway trait: the sole boundary between the facet tree and the
//! dataset service. The tree depends on this trait, never on a transport.
//!
//! Two implementations ship with the crate:
//!
//! - [`http::HttpGateway`] talks to the REST dataset API
//! - [`inprocess::InProcessGateway`] evaluates predicates over records held
//!   in memory (fixtures, tests, offline demos)

pub mod filter;
pub mod http;
pub mod inprocess;

use async_trait::async_trait;
use facet_types::{GroupResult, Predicate, SampleResult};
use thiserror::Error;

pub use http::{HttpGateway, HttpGatewayOptions, WireFormat};
pub use inprocess::{DatasetRecord, InProcessGateway};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway failure surfaced while a node is loading
///
/// Payloads are plain strings so the error can be stored in node state and
/// cloned into UI events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network failure, non-success status, or a query the service rejected
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered but the body could not be understood
    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[async_trait]
pub trait DatasetGateway: Send + Sync {
    /// Distinct values of `facet` under `predicate`, each with its count,
    /// plus the overall count and a sample of the facet-absent items.
    async fn group_by(&self, predicate: &Predicate, facet: &str) -> Result<GroupResult>;

    /// Total matches for `predicate` and a bounded sample of them.
    async fn count_and_sample(&self, predicate: &Predicate) -> Result<SampleResult>;

    /// Unfiltered sample used once to seed the root node.
    async fn list_root(&self) -> Result<SampleResult> {
        self.count_and_sample(&Predicate::empty()).await
    }
}
