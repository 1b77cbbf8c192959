//! facet-tree: faceted navigation over a dataset collection
//!
//! The collection is shown as a lazily-expanding tree. Each level groups
//! items by one user-chosen facet; nodes below the last chosen facet list a
//! sample of their items. Adding a facet re-expands every leaf currently in
//! the tree.
//!
//! ```text
//! UiEvent ─► TreeSession ─► TreeController ─► PendingFetch ─► DatasetGateway
//!                 ▲               │                                 │
//!                 │               ▼                                 │
//!          SessionOutput ◄─ NodeStateChanged ◄── FetchOutcome ◄─────┘
//! ```

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod node;
pub mod render;
pub mod session;
pub mod tree;

pub use catalog::FacetCatalog;
pub use config::BrowserConfig;
pub use controller::{
    Completion, FetchOutcome, FetchPlan, FetchResult, NodeStateChanged, PendingFetch,
    TreeController,
};
pub use error::{CatalogError, ExpansionError, TreeError, TreeResult};
pub use node::{Expansion, NodeId, NodeState, NodeStateKind, Row, TransitionError, TreeNode};
pub use render::TextRenderer;
pub use session::{SessionOutput, TreeSession, UiEvent};
pub use tree::Tree;

pub use dataset_client::{DatasetGateway, GatewayError};
pub use facet_types::{query, Predicate};
