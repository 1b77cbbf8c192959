//! TreeController: owns the facet catalog and the node arena, decides how
//! each node expands, and applies fetch outcomes.
//!
//! State changes happen synchronously through `&mut self`. Anything that
//! needs the gateway comes back as a [`PendingFetch`], which runs without
//! borrowing the controller; its [`FetchOutcome`] is fed back through
//! [`TreeController::complete`]. Many fetches can be in flight at once and
//! land in any order, each touching only its own node.

use std::fmt;
use std::sync::Arc;

use dataset_client::{DatasetGateway, GatewayError};
use facet_types::query::{equality_clause, extend};
use facet_types::{GroupResult, Predicate, SampleResult};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::catalog::FacetCatalog;
use crate::error::{ExpansionError, TreeError, TreeResult};
use crate::node::{Expansion, NodeId, NodeState, NodeStateKind, Row, TransitionError, TreeNode};
use crate::tree::Tree;

/// Which gateway call expands a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Unfiltered root sample, issued once at startup
    Root,
    /// Leaf expansion: count and sample the node's items
    Sample { predicate: Predicate },
    /// Branch expansion: group the node's items by `facet`
    Group { predicate: Predicate, facet: String },
}

impl FetchPlan {
    /// Branch when a facet is selected for the node's depth, leaf otherwise
    pub fn for_node(node: &TreeNode, catalog: &FacetCatalog) -> Self {
        match catalog.facet_at(node.depth()) {
            Some(facet) => FetchPlan::Group {
                predicate: node.predicate().clone(),
                facet: facet.to_string(),
            },
            None => FetchPlan::Sample {
                predicate: node.predicate().clone(),
            },
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, FetchPlan::Group { .. })
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPlan::Root => write!(f, "list_root()"),
            FetchPlan::Sample { predicate } => write!(f, "count_and_sample(\"{}\")", predicate),
            FetchPlan::Group { predicate, facet } => {
                write!(f, "group_by(\"{}\", \"{}\")", predicate, facet)
            }
        }
    }
}

/// What a finished fetch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Branch { facet: String, result: GroupResult },
    Leaf(SampleResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub node: NodeId,
    pub result: Result<FetchResult, GatewayError>,
}

/// A gateway call for one node, detached from the controller
pub struct PendingFetch {
    node: NodeId,
    plan: FetchPlan,
    gateway: Arc<dyn DatasetGateway>,
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("node", &self.node)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl PendingFetch {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn plan(&self) -> &FetchPlan {
        &self.plan
    }

    pub async fn run(self) -> FetchOutcome {
        let result = match self.plan {
            FetchPlan::Root => self.gateway.list_root().await.map(FetchResult::Leaf),
            FetchPlan::Sample { predicate } => self
                .gateway
                .count_and_sample(&predicate)
                .await
                .map(FetchResult::Leaf),
            FetchPlan::Group { predicate, facet } => self
                .gateway
                .group_by(&predicate, &facet)
                .await
                .map(|result| FetchResult::Branch { facet, result }),
        };
        FetchOutcome {
            node: self.node,
            result,
        }
    }
}

/// Snapshot of one node after a state change, enough to render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateChanged {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub label: Option<String>,
    pub predicate: Predicate,
    pub count: Option<u64>,
    pub state: NodeState,
}

impl NodeStateChanged {
    fn of(node: &TreeNode) -> Self {
        Self {
            node: node.id(),
            parent: node.parent(),
            depth: node.depth(),
            label: node.label().map(str::to_string),
            predicate: node.predicate().clone(),
            count: node.count(),
            state: node.state().clone(),
        }
    }

    pub fn kind(&self) -> NodeStateKind {
        self.state.kind()
    }
}

/// Result of applying one outcome
#[derive(Debug, Default)]
pub struct Completion {
    /// Set when the node left `Loading`
    pub changed: Option<NodeStateChanged>,
    /// Replacement fetch for a leaf result that arrived after a facet-add
    pub follow_up: Option<PendingFetch>,
}

pub struct TreeController {
    gateway: Arc<dyn DatasetGateway>,
    catalog: FacetCatalog,
    tree: Tree,
    root_seeded: bool,
}

impl fmt::Debug for TreeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeController")
            .field("catalog", &self.catalog)
            .field("nodes", &self.tree.len())
            .finish_non_exhaustive()
    }
}

impl TreeController {
    /// A controller whose root is already `Loading`; call
    /// [`seed_root`](Self::seed_root) for its fetch.
    pub fn new(gateway: Arc<dyn DatasetGateway>, catalog: FacetCatalog) -> Self {
        Self {
            gateway,
            catalog,
            tree: Tree::new(),
            root_seeded: false,
        }
    }

    pub fn catalog(&self) -> &FacetCatalog {
        &self.catalog
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.tree.get(id)
    }

    pub fn snapshot(&self, id: NodeId) -> Option<NodeStateChanged> {
        self.tree.get(id).map(NodeStateChanged::of)
    }

    /// The root's startup fetch. Returns `Some` exactly once.
    pub fn seed_root(&mut self) -> Option<PendingFetch> {
        if self.root_seeded {
            return None;
        }
        self.root_seeded = true;
        debug!(node = %NodeId::ROOT, "seeding root");
        Some(self.pending(NodeId::ROOT, FetchPlan::Root))
    }

    /// Handle a click on `id`
    ///
    /// Only a `Collapsed` node starts loading; in any other state this is a
    /// no-op returning `Ok(None)`.
    pub fn activate(&mut self, id: NodeId) -> TreeResult<Option<PendingFetch>> {
        let node = self.tree.get_mut(id).ok_or(TreeError::UnknownNode(id))?;
        if let Err(err) = node.begin_load() {
            debug!(node = %id, state = %node.kind(), reason = %err, "activation ignored");
            return Ok(None);
        }
        let plan = FetchPlan::for_node(node, &self.catalog);
        debug!(node = %id, depth = node.depth(), fetch = %plan, "node activated");
        Ok(Some(self.pending(id, plan)))
    }

    /// Append `facet` to the selection and re-expand every `ExpandedLeaf`
    ///
    /// The catalog is updated before any fetch is planned, so every returned
    /// fetch sees the same selection. Fails with `InvalidFacet` and changes
    /// nothing if the facet is not a remaining option.
    pub fn select_facet(&mut self, facet: &str) -> TreeResult<Vec<PendingFetch>> {
        let depth = self.catalog.select(facet).inspect_err(|err| {
            warn!(facet, error = %err, "facet rejected");
        })?;

        let mut fetches = Vec::new();
        for id in self.tree.ids_in_state(NodeStateKind::ExpandedLeaf) {
            let Some(node) = self.tree.get_mut(id) else {
                continue;
            };
            // Leaves deeper than the new facet stay leaves
            if node.depth() >= self.catalog.len() || node.begin_reload().is_err() {
                continue;
            }
            let plan = FetchPlan::for_node(node, &self.catalog);
            debug!(node = %id, fetch = %plan, "re-expanding leaf");
            fetches.push(self.pending(id, plan));
        }

        info!(
            facet,
            depth,
            version = self.catalog.version(),
            reexpanded = fetches.len(),
            "facet selected"
        );
        Ok(fetches)
    }

    /// Apply a finished fetch to its node
    pub fn complete(&mut self, outcome: FetchOutcome) -> Completion {
        let FetchOutcome { node: id, result } = outcome;
        let Some(node) = self.tree.get(id) else {
            warn!(node = %id, "outcome for unknown node dropped");
            return Completion::default();
        };
        if node.kind() != NodeStateKind::Loading {
            warn!(node = %id, state = %node.kind(), "outcome for node not loading dropped");
            return Completion::default();
        }

        match result {
            Err(err) => self.fail(id, err.into()),
            Ok(FetchResult::Branch { facet, result }) => self.apply_group(id, &facet, result),
            Ok(FetchResult::Leaf(sample)) => {
                let depth = node.depth();
                if depth < self.catalog.len() {
                    // A facet was added while the sample was in flight
                    let plan = FetchPlan::for_node(node, &self.catalog);
                    debug!(node = %id, depth, fetch = %plan, "stale leaf result discarded");
                    return Completion {
                        changed: None,
                        follow_up: Some(self.pending(id, plan)),
                    };
                }
                self.apply_sample(id, sample)
            }
        }
    }

    /// Run `fetches` concurrently and apply each outcome as it lands
    ///
    /// Follow-up fetches are run too, so every node named in `fetches` has
    /// left `Loading` on return. Returns the emitted state changes in
    /// completion order.
    pub async fn settle(&mut self, fetches: Vec<PendingFetch>) -> Vec<NodeStateChanged> {
        let mut in_flight: FuturesUnordered<_> =
            fetches.into_iter().map(PendingFetch::run).collect();
        let mut changes = Vec::new();

        while let Some(outcome) = in_flight.next().await {
            let completion = self.complete(outcome);
            changes.extend(completion.changed);
            if let Some(fetch) = completion.follow_up {
                in_flight.push(fetch.run());
            }
        }
        changes
    }

    /// Activate `id` and wait for its expansion
    pub async fn activate_and_settle(&mut self, id: NodeId) -> TreeResult<Vec<NodeStateChanged>> {
        let fetches = self.activate(id)?.into_iter().collect();
        Ok(self.settle(fetches).await)
    }

    /// Select `facet` and wait for every re-expansion
    pub async fn select_and_settle(&mut self, facet: &str) -> TreeResult<Vec<NodeStateChanged>> {
        let fetches = self.select_facet(facet)?;
        Ok(self.settle(fetches).await)
    }

    fn pending(&self, node: NodeId, plan: FetchPlan) -> PendingFetch {
        PendingFetch {
            node,
            plan,
            gateway: Arc::clone(&self.gateway),
        }
    }

    fn apply_group(&mut self, id: NodeId, facet: &str, result: GroupResult) -> Completion {
        // Validate before creating children so a bad result leaves no orphans
        let remain = match result.remaining() {
            Ok(remain) => remain,
            Err(mismatch) => return self.fail(id, mismatch.into()),
        };
        let leaf_remain = match result.leaf_sample.remaining() {
            Ok(remain) => remain,
            Err(mismatch) => return self.fail(id, mismatch.into()),
        };
        let Some(predicate) = self.tree.get(id).map(|n| n.predicate().clone()) else {
            return Completion::default();
        };

        let GroupResult {
            count,
            groups,
            leaf_sample,
        } = result;
        let mut rows = Vec::with_capacity(groups.len() + leaf_sample.items.len() + 2);
        for group in groups {
            let child_predicate = extend(&predicate, &equality_clause(facet, &group.value));
            if let Some(child) = self.tree.add_child(id, group.value, child_predicate, group.count)
            {
                rows.push(Row::Node(child));
            }
        }
        if remain > 0 {
            rows.push(Row::Elision { remaining: remain });
        }
        rows.extend(leaf_sample.items.into_iter().map(Row::Item));
        if leaf_remain > 0 {
            rows.push(Row::Elision {
                remaining: leaf_remain,
            });
        }

        debug!(node = %id, facet, count, remain, rows = rows.len(), "node expanded as branch");
        self.transition(id, |node| node.finish_branch(Expansion { count, rows }))
    }

    fn apply_sample(&mut self, id: NodeId, sample: SampleResult) -> Completion {
        let remain = match sample.remaining() {
            Ok(remain) => remain,
            Err(mismatch) => return self.fail(id, mismatch.into()),
        };
        let count = sample.count;
        let mut rows: Vec<Row> = sample.items.into_iter().map(Row::Item).collect();
        if remain > 0 {
            rows.push(Row::Elision { remaining: remain });
        }

        debug!(node = %id, count, remain, "node expanded as leaf");
        self.transition(id, |node| node.finish_leaf(Expansion { count, rows }))
    }

    fn fail(&mut self, id: NodeId, error: ExpansionError) -> Completion {
        warn!(node = %id, error = %error, "node expansion failed");
        self.transition(id, |node| node.fail(error))
    }

    fn transition<F>(&mut self, id: NodeId, apply: F) -> Completion
    where
        F: FnOnce(&mut TreeNode) -> Result<(), TransitionError>,
    {
        let Some(node) = self.tree.get_mut(id) else {
            return Completion::default();
        };
        match apply(node) {
            Ok(()) => Completion {
                changed: Some(NodeStateChanged::of(node)),
                follow_up: None,
            },
            Err(err) => {
                warn!(node = %id, error = %err, "transition rejected");
                Completion::default()
            }
        }
    }
}
