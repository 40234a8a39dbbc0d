//! Arena-backed expression tree
//!
//! Nodes are addressed by [`NodeId`]. Each node records its parent, its
//! ordered children and the `[...]` suffixes applied to its value. A suffix
//! records the insertion point that was current when it opened as its
//! parent, so the closing bracket returns the parser there, but it is
//! evaluated as an index into the value of the node it follows.

use std::sync::Arc;

use super::value::Value;
use crate::error::{ExpressionError, ExpressionResult};
use crate::functions::Function;

/// Index of a node in its [`ExpressionTree`]
pub type NodeId = usize;

/// Node behaviour
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Top-level container
    Root,
    /// Bare `( ... )` sequencing its contents
    Group,
    /// `[ ... ]`: index suffix or list literal
    Array,
    /// Literal number, string or boolean
    Constant(Value),
    /// Variable or property path looked up at evaluation time
    Value(String),
    /// Call of a registered function
    Function(Arc<dyn Function>),
    /// `if(condition, then, else)`
    If,
    /// `each(collection, expression)`
    Each,
    /// `filter(collection, predicate)`
    Filter,
    /// `cache(key, timeout, expression)`
    Cache,
    /// The `null` literal
    Null,
}

impl NodeKind {
    /// Maximum number of children of a special form
    fn max_children(&self) -> Option<(usize, &'static str)> {
        match self {
            Self::If => Some((3, "if")),
            Self::Each => Some((2, "each")),
            Self::Filter => Some((2, "filter")),
            Self::Cache => Some((3, "cache")),
            _ => None,
        }
    }
}

/// A node of the expression tree
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub suffixes: Vec<NodeId>,
}

/// Expression tree with the root at index 0
#[derive(Debug, Clone)]
pub struct ExpressionTree {
    nodes: Vec<Node>,
}

impl ExpressionTree {
    /// Id of the root node
    pub const ROOT: NodeId = 0;

    /// Tree holding only the root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                suffixes: Vec::new(),
            }],
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].children.last().copied()
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[Self::ROOT].children.is_empty()
    }

    /// Append a new child to `parent`
    ///
    /// # Errors
    ///
    /// Special forms reject children beyond their fixed parameter count.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> ExpressionResult<NodeId> {
        if let Some((max, name)) = self.nodes[parent].kind.max_children() {
            if self.nodes[parent].children.len() >= max {
                return Err(ExpressionError::parse_error(format!(
                    "Invalid {name}() expression in builtin function: too many parameters."
                )));
            }
        }

        let id = self.push(kind, parent);
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Append an index suffix to `target`; `parent` is where the closing
    /// bracket returns to
    pub fn add_suffix(&mut self, parent: NodeId, target: NodeId) -> NodeId {
        let id = self.push(NodeKind::Array, parent);
        self.nodes[target].suffixes.push(id);
        id
    }

    fn push(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            suffixes: Vec::new(),
        });
        id
    }
}

impl Default for ExpressionTree {
    fn default() -> Self {
        Self::new()
    }
}
