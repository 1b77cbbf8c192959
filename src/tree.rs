//! Arena of tree nodes
//!
//! Nodes are addressed by [`NodeId`] and never removed, so an id handed to
//! the UI stays valid for the life of the session.

use facet_types::Predicate;

use crate::node::{NodeId, NodeStateKind, Row, TreeNode};

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// A tree holding only the root, already loading
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::root()],
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[NodeId::ROOT.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.index())
    }

    pub(crate) fn add_child(
        &mut self,
        parent: NodeId,
        label: String,
        predicate: Predicate,
        group_count: u64,
    ) -> Option<NodeId> {
        let id = NodeId::from(self.nodes.len());
        let child = TreeNode::child(id, self.get(parent)?, label, predicate, group_count);
        self.nodes.push(child);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter()
    }

    /// Ids of every node currently in state `kind`, in creation order
    pub fn ids_in_state(&self, kind: NodeStateKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == kind)
            .map(TreeNode::id)
            .collect()
    }

    /// Child nodes listed in `id`'s expansion, in row order
    pub fn children(&self, id: NodeId) -> Vec<&TreeNode> {
        self.get(id)
            .and_then(|n| n.state().expansion())
            .map(|e| e.child_nodes().filter_map(|c| self.get(c)).collect())
            .unwrap_or_default()
    }

    /// Depth-first walk over `id` and its expanded descendants
    ///
    /// Each visited row is paired with its nesting level below `id`.
    pub fn walk(&self, id: NodeId) -> Vec<(usize, &Row)> {
        let mut out = Vec::new();
        self.walk_into(id, 0, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, id: NodeId, level: usize, out: &mut Vec<(usize, &'a Row)>) {
        let Some(expansion) = self.get(id).and_then(|n| n.state().expansion()) else {
            return;
        };
        for row in &expansion.rows {
            out.push((level, row));
            if let Row::Node(child) = row {
                self.walk_into(*child, level + 1, out);
            }
        }
    }
}
