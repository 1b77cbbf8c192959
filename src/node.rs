//! Tree nodes and their expansion state machine
//!
//! ```text
//!             activate                 group result
//! Collapsed ───────────► Loading ─────────────────────► ExpandedBranch
//!                        │  ▲  │     sample result
//!                        │  │  └──────────────────────► ExpandedLeaf
//!                        │  │                               │
//!                        │  └───────── facet added ─────────┘
//!                        │   fetch failed
//!                        └──────────────────────────────► Error
//! ```
//!
//! A node never returns to `Collapsed`, and `Loading` is entered only from
//! `Collapsed` (activation) or `ExpandedLeaf` (facet added).

use std::fmt;

use facet_types::{ItemRef, Predicate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ExpansionError;

/// Index of a node in the controller's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

/// One rendered row beneath an expanded node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Expandable child node (one facet value)
    Node(NodeId),
    /// Plain link to a dataset item
    Item(ItemRef),
    /// Terminal "... + N more" placeholder
    Elision { remaining: u64 },
}

/// Rows produced by a successful expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Total items under the node's predicate
    pub count: u64,
    pub rows: Vec<Row>,
}

impl Expansion {
    pub fn child_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.rows.iter().filter_map(|row| match row {
            Row::Node(id) => Some(*id),
            _ => None,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemRef> + '_ {
        self.rows.iter().filter_map(|row| match row {
            Row::Item(item) => Some(item),
            _ => None,
        })
    }

    pub fn elisions(&self) -> impl Iterator<Item = u64> + '_ {
        self.rows.iter().filter_map(|row| match row {
            Row::Elision { remaining } => Some(*remaining),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Collapsed,
    Loading,
    ExpandedBranch(Expansion),
    ExpandedLeaf(Expansion),
    Error(ExpansionError),
}

/// Payload-free discriminant of [`NodeState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStateKind {
    Collapsed,
    Loading,
    ExpandedBranch,
    ExpandedLeaf,
    Error,
}

impl fmt::Display for NodeStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStateKind::Collapsed => "collapsed",
            NodeStateKind::Loading => "loading",
            NodeStateKind::ExpandedBranch => "expanded-branch",
            NodeStateKind::ExpandedLeaf => "expanded-leaf",
            NodeStateKind::Error => "error",
        };
        f.write_str(name)
    }
}

impl NodeState {
    pub fn kind(&self) -> NodeStateKind {
        match self {
            NodeState::Collapsed => NodeStateKind::Collapsed,
            NodeState::Loading => NodeStateKind::Loading,
            NodeState::ExpandedBranch(_) => NodeStateKind::ExpandedBranch,
            NodeState::ExpandedLeaf(_) => NodeStateKind::ExpandedLeaf,
            NodeState::Error(_) => NodeStateKind::Error,
        }
    }

    pub fn expansion(&self) -> Option<&Expansion> {
        match self {
            NodeState::ExpandedBranch(expansion) | NodeState::ExpandedLeaf(expansion) => {
                Some(expansion)
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ExpansionError> {
        match self {
            NodeState::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot activate a node that is {0}")]
    NotCollapsed(NodeStateKind),

    #[error("cannot reload a node that is {0}; only expanded leaves reload")]
    NotExpandedLeaf(NodeStateKind),

    #[error("cannot apply a fetch result to a node that is {0}")]
    NotLoading(NodeStateKind),
}

/// One row of the tree
///
/// The predicate is stored, not derived from the parent, so a node's fetches
/// depend only on (predicate, depth, facet selection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    id: NodeId,
    parent: Option<NodeId>,
    /// Facet value this node groups on; `None` for the root
    label: Option<String>,
    predicate: Predicate,
    depth: usize,
    /// Item count reported by the parent's grouping
    group_count: Option<u64>,
    state: NodeState,
}

impl TreeNode {
    /// The root starts loading immediately, with the empty predicate
    pub(crate) fn root() -> Self {
        Self {
            id: NodeId::ROOT,
            parent: None,
            label: None,
            predicate: Predicate::empty(),
            depth: 0,
            group_count: None,
            state: NodeState::Loading,
        }
    }

    pub(crate) fn child(
        id: NodeId,
        parent: &TreeNode,
        label: String,
        predicate: Predicate,
        group_count: u64,
    ) -> Self {
        Self {
            id,
            parent: Some(parent.id),
            label: Some(label),
            predicate,
            depth: parent.depth + 1,
            group_count: Some(group_count),
            state: NodeState::Collapsed,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn kind(&self) -> NodeStateKind {
        self.state.kind()
    }

    /// Best known item count: the expansion total, else the parent's group count
    pub fn count(&self) -> Option<u64> {
        self.state
            .expansion()
            .map(|e| e.count)
            .or(self.group_count)
    }

    /// `Collapsed -> Loading`
    pub(crate) fn begin_load(&mut self) -> Result<(), TransitionError> {
        match self.state {
            NodeState::Collapsed => {
                self.state = NodeState::Loading;
                Ok(())
            }
            ref other => Err(TransitionError::NotCollapsed(other.kind())),
        }
    }

    /// `ExpandedLeaf -> Loading`, discarding the leaf rows
    pub(crate) fn begin_reload(&mut self) -> Result<(), TransitionError> {
        match self.state {
            NodeState::ExpandedLeaf(_) => {
                self.state = NodeState::Loading;
                Ok(())
            }
            ref other => Err(TransitionError::NotExpandedLeaf(other.kind())),
        }
    }

    /// `Loading -> ExpandedBranch`
    pub(crate) fn finish_branch(&mut self, expansion: Expansion) -> Result<(), TransitionError> {
        self.finish(NodeState::ExpandedBranch(expansion))
    }

    /// `Loading -> ExpandedLeaf`
    pub(crate) fn finish_leaf(&mut self, expansion: Expansion) -> Result<(), TransitionError> {
        self.finish(NodeState::ExpandedLeaf(expansion))
    }

    /// `Loading -> Error`
    pub(crate) fn fail(&mut self, error: ExpansionError) -> Result<(), TransitionError> {
        self.finish(NodeState::Error(error))
    }

    fn finish(&mut self, next: NodeState) -> Result<(), TransitionError> {
        if self.state != NodeState::Loading {
            return Err(TransitionError::NotLoading(self.kind()));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset_client::GatewayError;
    use facet_types::query::{equality_clause, extend};

    fn leaf_expansion() -> Expansion {
        Expansion {
            count: 2,
            rows: vec![
                Row::Item(ItemRef::new(1u64, "/a")),
                Row::Elision { remaining: 1 },
            ],
        }
    }

    fn collapsed_child() -> TreeNode {
        let root = TreeNode::root();
        TreeNode::child(
            NodeId::from(1),
            &root,
            "csv".into(),
            extend(&root.predicate, &equality_clause("type", "csv")),
            3,
        )
    }

    #[test]
    fn test_root_starts_loading() {
        let root = TreeNode::root();
        assert_eq!(root.kind(), NodeStateKind::Loading);
        assert_eq!(root.depth(), 0);
        assert!(root.predicate().is_empty());
        assert_eq!(root.count(), None);
    }

    #[test]
    fn test_child_starts_collapsed_one_level_down() {
        let child = collapsed_child();
        assert_eq!(child.kind(), NodeStateKind::Collapsed);
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent(), Some(NodeId::ROOT));
        assert_eq!(child.label(), Some("csv"));
        assert_eq!(child.count(), Some(3));
    }

    #[test]
    fn test_activation_only_from_collapsed() {
        let mut node = collapsed_child();
        assert!(node.begin_load().is_ok());
        assert_eq!(
            node.begin_load(),
            Err(TransitionError::NotCollapsed(NodeStateKind::Loading))
        );

        node.finish_leaf(leaf_expansion()).unwrap();
        assert_eq!(
            node.begin_load(),
            Err(TransitionError::NotCollapsed(NodeStateKind::ExpandedLeaf))
        );
    }

    #[test]
    fn test_reload_only_from_leaf() {
        let mut node = collapsed_child();
        assert!(node.begin_reload().is_err());

        node.begin_load().unwrap();
        node.finish_leaf(leaf_expansion()).unwrap();
        node.begin_reload().unwrap();
        assert_eq!(node.kind(), NodeStateKind::Loading);
        // Leaf rows are gone; the group count is still known
        assert_eq!(node.count(), Some(3));

        node.finish_branch(Expansion {
            count: 3,
            rows: vec![],
        })
        .unwrap();
        assert_eq!(
            node.begin_reload(),
            Err(TransitionError::NotExpandedLeaf(NodeStateKind::ExpandedBranch))
        );
    }

    #[test]
    fn test_error_is_terminal() {
        let mut node = collapsed_child();
        node.begin_load().unwrap();
        node.fail(GatewayError::Transport("down".into()).into()).unwrap();
        assert_eq!(node.kind(), NodeStateKind::Error);
        assert!(node.begin_load().is_err());
        assert!(node.begin_reload().is_err());
        assert!(node.state().error().is_some());
    }

    #[test]
    fn test_results_require_loading() {
        let mut node = collapsed_child();
        assert_eq!(
            node.finish_leaf(leaf_expansion()),
            Err(TransitionError::NotLoading(NodeStateKind::Collapsed))
        );
    }

    #[test]
    fn test_expansion_accessors() {
        let expansion = Expansion {
            count: 9,
            rows: vec![
                Row::Node(NodeId::from(4)),
                Row::Elision { remaining: 5 },
                Row::Item(ItemRef::new(2u64, "/b")),
            ],
        };
        assert_eq!(expansion.child_nodes().collect::<Vec<_>>(), vec![NodeId::from(4)]);
        assert_eq!(expansion.items().count(), 1);
        assert_eq!(expansion.elisions().collect::<Vec<_>>(), vec![5]);
    }
}
