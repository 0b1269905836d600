// SCR - Live Code Execution Visualizer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Pinned call hierarchy.
//!
//! Every run contributes the call path of the selected branch as a chain of
//! nodes. The chain is merged into a tree rooted at a `Program` node; nodes the
//! user pinned survive into the next run, all others are dropped before the
//! next merge.
//!
//! Nodes live in an arena and refer to each other by index. Indices are only
//! valid until the next [`CallGraph::remove_unpinned`], which compacts the
//! arena; branch ids are stable.

use itertools::Itertools;
use scr_common::Range;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Index of a node in a [`CallGraph`] arena.
pub type NodeId = usize;

/// Branch id of the root node.
pub const ROOT_BRANCH_ID: i64 = -1;

/// Name of the root node.
pub const ROOT_BRANCH_NAME: &str = "Program";

/// One call on a call path, before it becomes a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSeed {
    /// Label of the call site.
    pub name: String,
    /// Index of the call site in the trace stack.
    pub id: i64,
    /// Range of the call site.
    pub range: Range,
    /// Whether the call runs inside a callback.
    pub is_callback: bool,
}

/// A node of the call hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchNode {
    /// Label of the call site.
    pub name: String,
    /// Branch id; equal ids are the same call site.
    pub id: i64,
    /// Parent node, `None` for the root and for chain heads.
    pub parent: Option<NodeId>,
    /// Child nodes, in insertion order.
    pub children: Vec<NodeId>,
    /// Every distinct range seen for this call site.
    pub ranges: Vec<Range>,
    /// Whether the call runs inside a callback.
    pub is_callback: bool,
    /// Whether the node passes the current name filter.
    pub visible: bool,
    /// Whether the node survives the next run.
    pub pinned: bool,
    /// Pinned by the user, as opposed to pinned for a descendant.
    #[serde(skip)]
    pinned_here: bool,
}

impl BranchNode {
    fn from_seed(seed: &BranchSeed) -> Self {
        Self {
            name: seed.name.clone(),
            id: seed.id,
            parent: None,
            children: Vec::new(),
            ranges: vec![seed.range],
            is_callback: seed.is_callback,
            visible: true,
            pinned: false,
            pinned_here: false,
        }
    }

    fn root() -> Self {
        Self {
            name: ROOT_BRANCH_NAME.to_string(),
            id: ROOT_BRANCH_ID,
            parent: None,
            children: Vec::new(),
            ranges: Vec::new(),
            is_callback: false,
            visible: true,
            pinned: true,
            pinned_here: true,
        }
    }

    /// The seed this node was made from, with its first range.
    pub fn seed(&self) -> BranchSeed {
        BranchSeed {
            name: self.name.clone(),
            id: self.id,
            range: self.ranges.first().copied().unwrap_or_default(),
            is_callback: self.is_callback,
        }
    }
}

/// A call path turned into a parent-to-single-child chain.
///
/// Node `i` is the parent of node `i + 1`; indices are local to the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchChain {
    nodes: Vec<BranchNode>,
}

impl BranchChain {
    /// Nodes from outermost to innermost.
    pub fn nodes(&self) -> &[BranchNode] {
        &self.nodes
    }

    /// Whether the chain has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks from the innermost node up through the parents and returns the
    /// seeds outermost first.
    pub fn flatten(&self) -> Vec<BranchSeed> {
        let mut seeds = Vec::with_capacity(self.nodes.len());
        let mut current = self.nodes.len().checked_sub(1);
        while let Some(index) = current {
            let node = &self.nodes[index];
            seeds.push(node.seed());
            current = node.parent;
        }
        seeds.reverse();
        seeds
    }
}

/// Links a call path into a chain.
pub fn create_branch_hierarchy(branches: &[BranchSeed]) -> BranchChain {
    let last = branches.len().saturating_sub(1);
    let nodes = branches
        .iter()
        .enumerate()
        .map(|(i, seed)| {
            let mut node = BranchNode::from_seed(seed);
            node.parent = i.checked_sub(1);
            if i < last {
                node.children.push(i + 1);
            }
            node
        })
        .collect();
    BranchChain { nodes }
}

/// A serializable view of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTree {
    /// Label of the call site.
    pub name: String,
    /// Branch id.
    pub id: i64,
    /// Every distinct range seen for this call site.
    pub ranges: Vec<Range>,
    /// Whether the call runs inside a callback.
    pub is_callback: bool,
    /// Whether the node passes the current name filter.
    pub visible: bool,
    /// Whether the node survives the next run.
    pub pinned: bool,
    /// Subtrees.
    pub children: Vec<BranchTree>,
}

/// The call hierarchy kept across runs.
#[derive(Debug, Clone)]
pub struct CallGraph {
    /// Node arena; index 0 is the root
    nodes: Vec<BranchNode>,
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CallGraph {
    /// Index of the root node.
    pub const ROOT: NodeId = 0;

    /// A graph holding only the root.
    pub fn new() -> Self {
        Self { nodes: vec![BranchNode::root()] }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root is left.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The root node.
    pub fn root(&self) -> &BranchNode {
        &self.nodes[Self::ROOT]
    }

    /// A node by arena index.
    pub fn node(&self, node: NodeId) -> Option<&BranchNode> {
        self.nodes.get(node)
    }

    /// Finds a node by branch id, in depth-first order.
    pub fn get_branch_by_id(&self, id: i64) -> Option<NodeId> {
        let mut pending = vec![Self::ROOT];
        while let Some(node) = pending.pop() {
            if self.nodes[node].id == id {
                return Some(node);
            }
            pending.extend(self.nodes[node].children.iter().rev());
        }
        None
    }

    /// A node by branch id.
    pub fn branch(&self, id: i64) -> Option<&BranchNode> {
        self.get_branch_by_id(id).map(|node| &self.nodes[node])
    }

    /// Nodes from the root down to `node`, both included.
    pub fn generate_path(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(node).map(|_| node);
        while let Some(index) = current {
            path.push(index);
            current = self.nodes[index].parent;
        }
        path.reverse();
        path
    }

    /// Merges a chain under the root.
    ///
    /// Chain nodes whose id is already a child of the current node are merged
    /// into it (ranges accumulate); the rest of the chain is attached below the
    /// last merged node.
    pub fn add_to_graph(&mut self, chain: BranchChain) {
        let mut current = Self::ROOT;
        for mut incoming in chain.nodes {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].id == incoming.id);

            current = match existing {
                Some(child) => {
                    let node = &mut self.nodes[child];
                    for range in incoming.ranges {
                        if !node.ranges.contains(&range) {
                            node.ranges.push(range);
                        }
                    }
                    node.is_callback |= incoming.is_callback;
                    child
                }
                None => {
                    let index = self.nodes.len();
                    incoming.parent = Some(current);
                    incoming.children.clear();
                    self.nodes.push(incoming);
                    self.nodes[current].children.push(index);
                    index
                }
            };
        }
    }

    /// Drops every unpinned node below the root, with its subtree.
    pub fn remove_unpinned(&mut self) {
        self.remove_unpinned_from(Self::ROOT);
    }

    /// Drops every unpinned node below `node`, with its subtree.
    pub fn remove_unpinned_from(&mut self, node: NodeId) {
        if node >= self.nodes.len() {
            return;
        }
        let mut pending = vec![node];
        while let Some(index) = pending.pop() {
            let children = std::mem::take(&mut self.nodes[index].children);
            let kept: Vec<NodeId> =
                children.into_iter().filter(|&child| self.nodes[child].pinned).collect();
            pending.extend(&kept);
            self.nodes[index].children = kept;
        }
        self.compact();
    }

    /// Rebuilds the arena from the nodes reachable from the root.
    fn compact(&mut self) {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut pending = vec![Self::ROOT];
        while let Some(index) = pending.pop() {
            order.push(index);
            pending.extend(self.nodes[index].children.iter().rev());
        }
        if order.len() == self.nodes.len() {
            return;
        }

        let mut remap = vec![None; self.nodes.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = Some(new);
        }
        let mut nodes = Vec::with_capacity(order.len());
        for &old in &order {
            let mut node = self.nodes[old].clone();
            node.parent = node.parent.and_then(|parent| remap[parent]);
            node.children = node.children.iter().filter_map(|&child| remap[child]).collect();
            nodes.push(node);
        }
        debug!(removed = self.nodes.len() - nodes.len(), "Removed unpinned branches");
        self.nodes = nodes;
    }

    /// Pins or unpins a node.
    ///
    /// Pinning a node pins every ancestor so the path to it survives.
    /// Unpinning releases the node and its subtree; an ancestor stays pinned
    /// only while it is pinned itself or still has another pinned descendant.
    /// The root is always pinned. Returns false for nodes outside the arena.
    ///
    /// Branch ids repeat along recursive call paths, so the node is addressed
    /// by arena index; [`CallGraph::get_branch_by_id`] resolves the first
    /// node carrying an id.
    pub fn toggle_pin_on_branch(&mut self, node: NodeId) -> bool {
        if node >= self.nodes.len() {
            debug!(node, "No branch to pin");
            return false;
        }
        if node == Self::ROOT {
            return true;
        }

        if self.nodes[node].pinned {
            let mut pending = vec![node];
            while let Some(index) = pending.pop() {
                let node = &mut self.nodes[index];
                node.pinned = false;
                node.pinned_here = false;
                pending.extend(node.children.iter().copied());
            }
        } else {
            self.nodes[node].pinned_here = true;
            self.nodes[node].pinned = true;
        }

        let mut current = self.nodes[node].parent;
        while let Some(index) = current {
            let pinned = index == Self::ROOT
                || self.nodes[index].pinned_here
                || self.nodes[index].children.iter().any(|&child| self.nodes[child].pinned);
            self.nodes[index].pinned = pinned;
            current = self.nodes[index].parent;
        }
        true
    }

    /// Marks nodes visible if their name contains `query` or they have a
    /// visible descendant. A blank query makes everything visible.
    pub fn make_query(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.nodes.iter_mut().for_each(|node| node.visible = true);
            return;
        }
        self.apply_query(Self::ROOT, query);
        self.nodes[Self::ROOT].visible = true;
    }

    fn apply_query(&mut self, node: NodeId, query: &str) -> bool {
        let children = self.nodes[node].children.clone();
        let mut visible = self.nodes[node].name.contains(query);
        for child in children {
            visible |= self.apply_query(child, query);
        }
        self.nodes[node].visible = visible;
        visible
    }

    /// Runs the per-run pipeline: drop unpinned nodes, merge the call path,
    /// filter by name. An empty call path leaves the graph untouched.
    pub fn update(&mut self, branches: &[BranchSeed], query: &str) {
        if branches.is_empty() {
            return;
        }
        self.remove_unpinned();
        self.add_to_graph(create_branch_hierarchy(branches));
        self.make_query(query);
        debug!(
            nodes = self.nodes.len(),
            path = %branches.iter().map(|branch| branch.name.as_str()).join(" > "),
            "Updated call graph"
        );
    }

    /// The tree below `node`.
    pub fn subtree(&self, node: NodeId) -> Option<BranchTree> {
        let branch = self.nodes.get(node)?;
        Some(BranchTree {
            name: branch.name.clone(),
            id: branch.id,
            ranges: branch.ranges.clone(),
            is_callback: branch.is_callback,
            visible: branch.visible,
            pinned: branch.pinned,
            children: branch.children.iter().filter_map(|&child| self.subtree(child)).collect(),
        })
    }

    /// The whole tree.
    pub fn tree(&self) -> BranchTree {
        match self.subtree(Self::ROOT) {
            Some(tree) => tree,
            None => BranchTree {
                name: ROOT_BRANCH_NAME.to_string(),
                id: ROOT_BRANCH_ID,
                ranges: Vec::new(),
                is_callback: false,
                visible: true,
                pinned: true,
                children: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(name: &str, id: i64) -> BranchSeed {
        BranchSeed {
            name: name.to_string(),
            id,
            range: Range::from_coords(id as usize, 0, id as usize, 4),
            is_callback: false,
        }
    }

    fn names(graph: &CallGraph, node: NodeId) -> Vec<String> {
        graph.generate_path(node).iter().map(|&n| graph.node(n).unwrap().name.clone()).collect()
    }

    #[test]
    fn test_chain_round_trip() {
        let seeds = vec![seed("main", 0), seed("helper", 1), seed("leaf", 2)];
        let chain = create_branch_hierarchy(&seeds);
        assert_eq!(chain.nodes()[0].parent, None);
        assert_eq!(chain.nodes()[0].children, vec![1]);
        assert!(chain.nodes()[2].children.is_empty());
        assert_eq!(chain.flatten(), seeds);

        assert!(create_branch_hierarchy(&[]).is_empty());
    }

    #[test]
    fn test_merge_shares_common_prefix() {
        let mut graph = CallGraph::new();
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("a", 1)]));
        let mut other = seed("main", 0);
        other.range = Range::from_coords(7, 0, 7, 4);
        graph.add_to_graph(create_branch_hierarchy(&[other, seed("b", 2)]));

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.root().children.len(), 1);
        let main = graph.branch(0).unwrap();
        assert_eq!(main.children.len(), 2);
        assert_eq!(main.ranges.len(), 2);

        let b = graph.get_branch_by_id(2).unwrap();
        assert_eq!(names(&graph, b), vec!["Program", "main", "b"]);
        assert!(graph.get_branch_by_id(42).is_none());
    }

    #[test]
    fn test_remove_unpinned_keeps_pinned_path() {
        let mut graph = CallGraph::new();
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("a", 1)]));
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("b", 2)]));
        graph.add_to_graph(create_branch_hierarchy(&[seed("other", 3)]));

        assert!(graph.toggle_pin_on_branch(graph.get_branch_by_id(1).unwrap()));
        assert!(graph.branch(0).unwrap().pinned);

        graph.remove_unpinned();
        assert_eq!(graph.len(), 3);
        assert!(graph.branch(1).is_some());
        assert!(graph.branch(2).is_none());
        assert!(graph.branch(3).is_none());

        let before = graph.tree();
        graph.remove_unpinned();
        assert_eq!(graph.tree(), before);
    }

    #[test]
    fn test_unpin_releases_ancestors_without_other_pins() {
        let mut graph = CallGraph::new();
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("a", 1)]));
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("b", 2)]));

        graph.toggle_pin_on_branch(graph.get_branch_by_id(1).unwrap());
        graph.toggle_pin_on_branch(graph.get_branch_by_id(2).unwrap());
        graph.toggle_pin_on_branch(graph.get_branch_by_id(1).unwrap());
        assert!(!graph.branch(1).unwrap().pinned);
        assert!(graph.branch(0).unwrap().pinned);

        graph.toggle_pin_on_branch(graph.get_branch_by_id(2).unwrap());
        assert!(!graph.branch(0).unwrap().pinned);
        assert!(graph.root().pinned);

        // a node pinned by the user stays pinned when a descendant is released
        graph.toggle_pin_on_branch(graph.get_branch_by_id(0).unwrap());
        graph.toggle_pin_on_branch(graph.get_branch_by_id(1).unwrap());
        graph.toggle_pin_on_branch(graph.get_branch_by_id(1).unwrap());
        assert!(graph.branch(0).unwrap().pinned);

        assert!(!graph.toggle_pin_on_branch(99));
    }

    #[test]
    fn test_query_shows_matches_and_ancestors() {
        let mut graph = CallGraph::new();
        graph.add_to_graph(create_branch_hierarchy(&[seed("main", 0), seed("fetchData", 1)]));
        graph.add_to_graph(create_branch_hierarchy(&[seed("render", 2)]));

        graph.make_query("fetch");
        assert!(graph.root().visible);
        assert!(graph.branch(0).unwrap().visible);
        assert!(graph.branch(1).unwrap().visible);
        assert!(!graph.branch(2).unwrap().visible);

        graph.make_query("  ");
        assert!(graph.branch(2).unwrap().visible);
    }

    #[test]
    fn test_update_pipeline() {
        let mut graph = CallGraph::new();
        graph.update(&[seed("main", 0), seed("a", 1)], "");
        assert_eq!(graph.len(), 3);

        graph.update(&[], "");
        assert_eq!(graph.len(), 3);

        graph.update(&[seed("other", 5)], "oth");
        assert_eq!(graph.len(), 2);
        assert!(graph.branch(0).is_none());
        assert!(graph.branch(5).unwrap().visible);
    }
}
