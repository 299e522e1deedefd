//! Materialized syntax trees.
//!
//! [`Parser::parse_to_tree`](crate::parser::Parser::parse_to_tree) unpacks
//! the accepted chart into an indextree arena: one `Node` per production,
//! labeled with its LHS, and one `Leaf` per scanned token. This module
//! holds the node content type and the read-side helpers — pre-order
//! traversal, child listing, leaf-text assembly, and an s-expression
//! rendering used by the tests.

use crate::tokens::Token;
use indextree::{Arena, NodeId};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone)]
pub enum TreeContent {
    Root,
    Node(SmolStr),
    Leaf(Token),
}

impl TreeContent {
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Node(name) => Some(name),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Leaf(tok) => Some(tok),
            _ => None,
        }
    }
}

/// An accepted parse, materialized. Owns its arena.
pub struct SynTree {
    arena: Arena<TreeContent>,
    root: NodeId,
}

impl SynTree {
    pub(crate) fn new(arena: Arena<TreeContent>, root: NodeId) -> Self {
        Self { arena, root }
    }

    pub fn arena(&self) -> &Arena<TreeContent> {
        &self.arena
    }

    /// The synthetic root above the start symbol's node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Pre-order traversal of the whole tree, root's children first.
    pub fn preorder(&self) -> impl Iterator<Item = &TreeContent> {
        self.root
            .descendants(&self.arena)
            .filter_map(move |nid| self.arena.get(nid).map(|n| n.get()))
            .filter(|content| !matches!(content, TreeContent::Root))
    }

    /// Number of production nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.preorder().filter(|c| c.is_node()).count()
    }

    /// Immediate child production nodes of `nid`, as (label, id) pairs.
    pub fn child_nodes(&self, nid: NodeId) -> Vec<(SmolStr, NodeId)> {
        nid.children(&self.arena)
            .filter_map(|child| {
                self.arena.get(child).and_then(|node| match node.get() {
                    TreeContent::Node(name) => Some((name.clone(), child)),
                    _ => None,
                })
            })
            .collect()
    }

    /// Assemble the text under a node from its descendant leaves.
    pub fn text(&self, nid: NodeId) -> String {
        let mut builder = string_builder::Builder::default();
        for descendant in nid.descendants(&self.arena) {
            if let Some(TreeContent::Leaf(tok)) = self.arena.get(descendant).map(|n| n.get()) {
                builder.append(tok.value.as_str());
            }
        }
        builder.string().unwrap_or_default()
    }

    /// Deepest nesting of production nodes.
    pub fn depth(&self) -> usize {
        self.depth_of(self.root)
    }

    fn depth_of(&self, nid: NodeId) -> usize {
        let own = match self.arena.get(nid).map(|n| n.get()) {
            Some(TreeContent::Node(_)) => 1,
            _ => 0,
        };
        own + nid
            .children(&self.arena)
            .map(|child| self.depth_of(child))
            .max()
            .unwrap_or(0)
    }

    fn render(&self, nid: NodeId, builder: &mut string_builder::Builder) {
        match self.arena.get(nid).map(|n| n.get()) {
            Some(TreeContent::Root) => {
                for child in nid.children(&self.arena) {
                    self.render(child, builder);
                }
            }
            Some(TreeContent::Node(name)) => {
                builder.append("(");
                builder.append(name.to_string());
                for child in nid.children(&self.arena) {
                    builder.append(" ");
                    self.render(child, builder);
                }
                builder.append(")");
            }
            Some(TreeContent::Leaf(tok)) => {
                builder.append("'");
                builder.append(tok.value.as_str());
                builder.append("'");
            }
            None => {}
        }
    }
}

impl fmt::Display for SynTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = string_builder::Builder::default();
        self.render(self.root, &mut builder);
        write!(f, "{}", builder.string().unwrap_or_default())
    }
}
