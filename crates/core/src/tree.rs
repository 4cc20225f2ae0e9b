//! In-memory index of discovered paths.
//!
//! Branches are arena nodes addressed by path segments. Leaves are not stored
//! one node per series: every leaf inserted under a branch bumps a single
//! leaf-aggregate node owned by that branch, so a branch holding a million
//! series costs one counter.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::path::{MetricPath, PathEntry};

type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
enum Node {
    Branch(Branch),
    Leaves(Leaves),
}

#[derive(Debug, Clone)]
struct Branch {
    name: String,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    leaves: Option<NodeId>,
}

#[derive(Debug, Clone)]
struct Leaves {
    count: u64,
}

/// Hierarchical path index with per-branch leaf counts.
#[derive(Debug, Clone)]
pub struct PathTree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl PathTree {
    /// Creates a tree holding only the root branch.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::Branch(Branch {
                name: String::new(),
                parent: None,
                children: BTreeMap::new(),
                leaves: None,
            }))],
            free: Vec::new(),
        }
    }

    /// Builds a tree from path-store entries.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a PathEntry>,
    {
        let mut tree = Self::new();
        for entry in entries {
            tree.insert(&entry.path, entry.leaf)?;
        }
        Ok(tree)
    }

    /// Indexes `path`, creating intermediate branches as needed.
    ///
    /// A leaf increments the leaf count of its parent branch. Inserting the
    /// same leaf twice counts it twice.
    pub fn insert(&mut self, path: &MetricPath, is_leaf: bool) -> Result<()> {
        let segments = path.segments();
        let branch_segments = if is_leaf {
            match segments.split_last() {
                Some((_, parents)) => parents,
                None => return Err(Error::invalid_path("the root cannot be a leaf")),
            }
        } else {
            segments
        };

        let mut id = ROOT;
        for segment in branch_segments {
            id = self.ensure_child(id, segment);
        }

        if is_leaf {
            self.bump_leaves(id);
        }
        Ok(())
    }

    /// Whether a branch exists at `path`.
    pub fn contains(&self, path: &MetricPath) -> bool {
        self.find(path).is_some()
    }

    /// Immediate child branches of `path`, in segment order.
    pub fn children(&self, path: &MetricPath) -> Result<Vec<MetricPath>> {
        let branch = self.branch_at(path)?;
        Ok(branch
            .children
            .keys()
            .map(|name| path.child(name.clone()))
            .collect())
    }

    /// Number of leaves collapsed directly under the branch at `path`.
    pub fn leaf_count(&self, path: &MetricPath) -> Result<u64> {
        let branch = self.branch_at(path)?;
        Ok(branch.leaves.map_or(0, |id| self.leaves_count(id)))
    }

    /// True iff the branch at `path` holds only counted leaves and no child branches.
    pub fn is_leaf_branch(&self, path: &MetricPath) -> Result<bool> {
        let branch = self.branch_at(path)?;
        Ok(branch.children.is_empty() && branch.leaves.is_some())
    }

    /// True iff the branch at `path` has no child branches and no leaves.
    pub fn is_empty(&self, path: &MetricPath) -> Result<bool> {
        let branch = self.branch_at(path)?;
        Ok(branch.children.is_empty() && branch.leaves.is_none())
    }

    /// Removes the branch at `path` with everything below it and detaches
    /// it from its parent.
    pub fn prune(&mut self, path: &MetricPath) -> Result<()> {
        if path.is_root() {
            return Err(Error::invalid_path("the root cannot be pruned"));
        }

        let id = self
            .find(path)
            .ok_or_else(|| Error::path_not_found(path.to_string()))?;

        let (name, parent) = match &self.nodes[id] {
            Some(Node::Branch(branch)) => (branch.name.clone(), branch.parent),
            _ => return Err(Error::internal(format!("node for '{}' is not a branch", path))),
        };

        if let Some(parent) = parent {
            if let Some(Node::Branch(parent)) = self.nodes[parent].as_mut() {
                parent.children.remove(&name);
            }
        }

        self.release(id);
        Ok(())
    }

    /// Number of branches, excluding the root.
    pub fn branch_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Some(Node::Branch(_))))
            .count()
            - 1
    }

    /// Sum of all leaf counts in the tree.
    pub fn total_leaves(&self) -> u64 {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Some(Node::Leaves(leaves)) => Some(leaves.count),
                _ => None,
            })
            .sum()
    }

    fn find(&self, path: &MetricPath) -> Option<NodeId> {
        let mut id = ROOT;
        for segment in path.segments() {
            match &self.nodes[id] {
                Some(Node::Branch(branch)) => id = *branch.children.get(segment)?,
                _ => return None,
            }
        }
        Some(id)
    }

    fn branch_at(&self, path: &MetricPath) -> Result<&Branch> {
        let id = self
            .find(path)
            .ok_or_else(|| Error::path_not_found(path.to_string()))?;
        match &self.nodes[id] {
            Some(Node::Branch(branch)) => Ok(branch),
            _ => Err(Error::path_not_found(path.to_string())),
        }
    }

    fn leaves_count(&self, id: NodeId) -> u64 {
        match &self.nodes[id] {
            Some(Node::Leaves(leaves)) => leaves.count,
            _ => 0,
        }
    }

    fn ensure_child(&mut self, parent: NodeId, segment: &str) -> NodeId {
        if let Some(Node::Branch(branch)) = &self.nodes[parent] {
            if let Some(&id) = branch.children.get(segment) {
                return id;
            }
        }

        let id = self.alloc(Node::Branch(Branch {
            name: segment.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
            leaves: None,
        }));
        if let Some(Node::Branch(branch)) = self.nodes[parent].as_mut() {
            branch.children.insert(segment.to_string(), id);
        }
        id
    }

    fn bump_leaves(&mut self, branch_id: NodeId) {
        let existing = match &self.nodes[branch_id] {
            Some(Node::Branch(branch)) => branch.leaves,
            _ => return,
        };

        match existing {
            Some(id) => {
                if let Some(Node::Leaves(leaves)) = self.nodes[id].as_mut() {
                    leaves.count += 1;
                }
            }
            None => {
                let id = self.alloc(Node::Leaves(Leaves { count: 1 }));
                if let Some(Node::Branch(branch)) = self.nodes[branch_id].as_mut() {
                    branch.leaves = Some(id);
                }
            }
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(Node::Branch(branch)) = self.nodes[id].take() {
                stack.extend(branch.children.values().copied());
                if let Some(leaves) = branch.leaves {
                    self.nodes[leaves] = None;
                    self.free.push(leaves);
                }
            }
            self.free.push(id);
        }
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}
