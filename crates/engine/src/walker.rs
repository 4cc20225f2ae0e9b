//! Post-order traversal of a [`PathTree`].
//!
//! Every branch is visited after all of its descendants, and the root is
//! visited last. Visitors may prune the branch they are handed; a parent
//! sees the tree as its children left it, so emptiness cascades upwards
//! within a single walk.

use gc_core::{MetricPath, PathTree, Result};

/// One node handed to a [`TreeVisitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    /// The counted leaves directly under `parent`.
    Leaves { parent: MetricPath, count: u64 },
    /// A branch, visited after everything below it.
    Branch(MetricPath),
}

impl WalkEntry {
    pub fn path(&self) -> &MetricPath {
        match self {
            WalkEntry::Leaves { parent, .. } => parent,
            WalkEntry::Branch(path) => path,
        }
    }
}

/// Callback for [`walk`]. Gets mutable access to the tree so it can prune.
pub trait TreeVisitor {
    fn visit(&mut self, tree: &mut PathTree, entry: &WalkEntry) -> Result<()>;
}

impl<F> TreeVisitor for F
where
    F: FnMut(&mut PathTree, &WalkEntry) -> Result<()>,
{
    fn visit(&mut self, tree: &mut PathTree, entry: &WalkEntry) -> Result<()> {
        self(tree, entry)
    }
}

/// Walks `tree` depth-first in post order, children in segment order.
///
/// The first visitor error aborts the walk.
pub fn walk<V: TreeVisitor + ?Sized>(tree: &mut PathTree, visitor: &mut V) -> Result<()> {
    walk_branch(tree, &MetricPath::root(), visitor)
}

fn walk_branch<V: TreeVisitor + ?Sized>(
    tree: &mut PathTree,
    path: &MetricPath,
    visitor: &mut V,
) -> Result<()> {
    let count = tree.leaf_count(path)?;
    if count > 0 {
        visitor.visit(
            tree,
            &WalkEntry::Leaves {
                parent: path.clone(),
                count,
            },
        )?;
    }

    // Snapshot: the visitor may prune siblings' subtrees while we iterate.
    for child in tree.children(path)? {
        if tree.contains(&child) {
            walk_branch(tree, &child, visitor)?;
        }
    }

    visitor.visit(tree, &WalkEntry::Branch(path.clone()))
}
