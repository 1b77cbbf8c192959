//! Shared types for faceted dataset navigation
//!
//! This crate holds everything that crosses the boundary between the facet
//! tree engine and a dataset gateway:
//!
//! ```text
//! ┌──────────────────┐  Predicate   ┌──────────────────┐
//! │  facet-tree      │ ───────────► │  dataset-client  │
//! │  (controller)    │ ◄─────────── │  (gateways)      │
//! └──────────────────┘ GroupResult  └──────────────────┘
//!                      SampleResult
//! ```
//!
//! ## Rules
//!
//! 1. Predicates are built only through the [`query`] functions
//! 2. Count reconciliation (elision arithmetic) lives on the result types
//! 3. Item ids are opaque strings; numeric ids from the wire are stringified

pub mod predicate;
pub mod results;

pub use predicate::{query, Predicate};
pub use results::{CountMismatch, FacetGroup, GroupResult, ItemId, ItemRef, SampleResult};
