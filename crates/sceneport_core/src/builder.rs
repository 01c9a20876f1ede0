//! Stack-based assembler for the output scene tree.
//!
//! Every front-end emits nodes through this builder: `open` pushes a node
//! and makes it the parent of whatever follows, `close` pops it back onto
//! its parent. The first node ever opened becomes the root, and the
//! builder never produces a second root; a later top-level node is nested
//! beneath the first instead.

use crate::scene::{Extra, SceneNode};

/// Assembles a single-rooted tree from a sequence of open/close calls.
#[derive(Debug, Default)]
pub struct SceneGraphBuilder {
    stack: Vec<SceneNode>,
    root: Option<SceneNode>,
}

impl SceneGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a node: it becomes the current parent until closed.
    pub fn open(&mut self, node: SceneNode) {
        self.stack.push(node);
    }

    /// Close the current node, attaching it to its parent.
    ///
    /// Closing with nothing open is a no-op, which makes root extraction
    /// safe regardless of builder state.
    pub fn close(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };

        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        } else if let Some(root) = self.root.as_mut() {
            // Single-root invariant: late top-level nodes nest under the
            // first node ever opened.
            root.children.push(node);
        } else {
            self.root = Some(node);
        }
    }

    /// Add a complete node as a child of the current one.
    pub fn add_leaf(&mut self, node: SceneNode) {
        self.open(node);
        self.close();
    }

    /// The node currently open, if any.
    pub fn current_mut(&mut self) -> Option<&mut SceneNode> {
        self.stack.last_mut()
    }

    /// Attach a provenance comment to the current node.
    pub fn annotate_comment(&mut self, comment: impl Into<String>) {
        if let Some(node) = self.current_mut() {
            node.extra.get_or_insert_with(Extra::default).comment = Some(comment.into());
        }
    }

    /// Attach an info tag to the current node.
    pub fn annotate_info(&mut self, info: impl Into<String>) {
        if let Some(node) = self.current_mut() {
            node.info = Some(info.into());
        }
    }

    /// Close any nodes still open and return the root.
    ///
    /// Safe to call mid-build: dangling nodes are closed silently. When
    /// nothing was ever opened, an empty grouping node is returned.
    pub fn into_root(mut self) -> SceneNode {
        while !self.stack.is_empty() {
            self.close();
        }
        self.root.unwrap_or_else(SceneNode::group)
    }
}
