//! Plain-text rendering of the visible tree

use crate::controller::TreeController;
use crate::node::{NodeState, Row, TreeNode};

pub const DEFAULT_ITEM_LINK_TEMPLATE: &str = "/datasets/{id}/";

const INDENT: &str = "  ";

#[derive(Debug, Clone)]
pub struct TextRenderer {
    item_link_template: String,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_LINK_TEMPLATE)
    }
}

impl TextRenderer {
    /// `item_link_template` has `{id}` replaced by each item's id
    pub fn new(item_link_template: impl Into<String>) -> Self {
        Self {
            item_link_template: item_link_template.into(),
        }
    }

    pub fn item_link(&self, id: &str) -> String {
        self.item_link_template.replace("{id}", id)
    }

    /// Facet header followed by the root and every expanded descendant
    pub fn render(&self, controller: &TreeController) -> Vec<String> {
        let selected = controller.catalog().selected();
        let header = if selected.is_empty() {
            "facets: (none)".to_string()
        } else {
            format!("facets: {}", selected.join(" / "))
        };

        let tree = controller.tree();
        let mut lines = vec![header, self.node_line(tree.root(), 0)];
        for (level, row) in tree.walk(tree.root().id()) {
            let depth = level + 1;
            let line = match row {
                Row::Node(id) => match tree.get(*id) {
                    Some(node) => self.node_line(node, depth),
                    None => continue,
                },
                Row::Item(item) => format!(
                    "{}{} <{}>",
                    INDENT.repeat(depth),
                    item.display_path,
                    self.item_link(item.id.as_str())
                ),
                Row::Elision { remaining } => {
                    format!("{}... + {} more", INDENT.repeat(depth), remaining)
                }
            };
            lines.push(line);
        }
        lines
    }

    pub fn render_to_string(&self, controller: &TreeController) -> String {
        let mut out = self.render(controller).join("\n");
        out.push('\n');
        out
    }

    fn node_line(&self, node: &TreeNode, depth: usize) -> String {
        let mut line = format!("{}{}/", INDENT.repeat(depth), node.label().unwrap_or(""));
        if let Some(count) = node.count() {
            line.push_str(&format!(" ({count})"));
        }
        match node.state() {
            NodeState::Loading => line.push_str(" (loading...)"),
            NodeState::Error(err) => line.push_str(&format!(" ! {err}")),
            _ => {}
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_link_substitutes_id() {
        let renderer = TextRenderer::default();
        assert_eq!(renderer.item_link("42"), "/datasets/42/");
        let custom = TextRenderer::new("https://data.example/items/{id}");
        assert_eq!(custom.item_link("a-1"), "https://data.example/items/a-1");
    }
}
