//! Guide tree construction by neighbor joining
//!
//! Nodes live in an arena and refer to their children by index. A node is
//! the child of at most one parent and there are no parent links; traversal
//! is top-down for export and bottom-up for the progressive merge.
//!
//! Node ids double as creation order: leaves take `0..n` in input order and
//! each join appends one internal node. Neighbor joining scans candidate
//! pairs in ascending id order and keeps the first pair with the smallest Q,
//! which makes the tree reproducible when Q values tie.

use super::distance::DistanceMatrix;
use super::error::{MsaError, Result};

pub type NodeId = usize;

/// One guide-tree node: a leaf for a single input sequence, or the join of
/// two earlier clusters.
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// Input indices of every sequence under this node, left subtree first.
    leaves: Vec<usize>,
    children: Option<(NodeId, NodeId)>,
}

impl ClusterNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        self.children
    }

    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Input index of the sequence for a leaf node.
    pub fn sequence_index(&self) -> Option<usize> {
        match (self.children, self.leaves.as_slice()) {
            (None, [idx]) => Some(*idx),
            _ => None,
        }
    }
}

/// Strictly binary tree over the input sequences.
#[derive(Debug, Clone)]
pub struct GuideTree {
    nodes: Vec<ClusterNode>,
    root: NodeId,
}

impl GuideTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn internal_count(&self) -> usize {
        self.nodes.len() - self.leaf_count()
    }

    /// Internal node ids in the order they were joined.
    pub fn joins(&self) -> impl Iterator<Item = (NodeId, (NodeId, NodeId))> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.children.map(|c| (id, c)))
    }

    /// Children before parents, left subtree before right, root last.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            match self.nodes[id].children {
                Some((left, right)) if !expanded => {
                    stack.push((id, true));
                    stack.push((right, false));
                    stack.push((left, false));
                }
                _ => order.push(id),
            }
        }
        order
    }

    /// Display label of a node: the names of its sequences joined by `+`.
    pub fn label(&self, id: NodeId, names: &[String]) -> String {
        self.nodes[id]
            .leaves
            .iter()
            .map(|&i| names.get(i).map(String::as_str).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Graphviz description with one parent -> child edge per join.
    pub fn to_dot(&self, names: &[String]) -> String {
        let mut out = String::from("digraph guide_tree {\n    node [shape=box];\n");
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push_str(&format!(
                "    n{} [label=\"{}\"];\n",
                id,
                escape_dot(&self.label(id, names))
            ));
            if let Some((left, right)) = self.nodes[id].children {
                out.push_str(&format!("    n{} -> n{};\n", id, left));
                out.push_str(&format!("    n{} -> n{};\n", id, right));
                stack.push(right);
                stack.push(left);
            }
        }
        out.push_str("}\n");
        out
    }

    /// Topology-only Newick string.
    pub fn to_newick(&self, names: &[String]) -> String {
        let mut rendered: Vec<Option<String>> = vec![None; self.nodes.len()];
        for id in self.post_order() {
            let text = match self.nodes[id].children {
                Some((left, right)) => format!(
                    "({},{})",
                    rendered[left].take().unwrap_or_default(),
                    rendered[right].take().unwrap_or_default()
                ),
                None => newick_name(&self.label(id, names)),
            };
            rendered[id] = Some(text);
        }
        let mut out = rendered[self.root].take().unwrap_or_default();
        out.push(';');
        out
    }
}

fn escape_dot(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn newick_name(name: &str) -> String {
    if name.contains(|c: char| c.is_whitespace() || "(),:;[]'".contains(c)) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

/// Incremental construction of a [`GuideTree`] by explicit joins.
#[derive(Debug, Clone)]
pub struct GuideTreeBuilder {
    nodes: Vec<ClusterNode>,
    /// Joinable clusters, always sorted by id.
    active: Vec<NodeId>,
}

impl GuideTreeBuilder {
    /// Start with one leaf per input sequence.
    pub fn new(leaf_count: usize) -> Result<Self> {
        if leaf_count == 0 {
            return Err(MsaError::Input(
                "cannot build a guide tree over zero sequences".to_string(),
            ));
        }
        let mut nodes = Vec::with_capacity(2 * leaf_count - 1);
        nodes.extend((0..leaf_count).map(|i| ClusterNode {
            leaves: vec![i],
            children: None,
        }));
        Ok(Self {
            nodes,
            active: (0..leaf_count).collect(),
        })
    }

    pub fn active(&self) -> &[NodeId] {
        &self.active
    }

    /// Replace two active clusters by their join; `left` becomes the first child.
    pub fn join(&mut self, left: NodeId, right: NodeId) -> Result<NodeId> {
        if left == right {
            return Err(MsaError::DegenerateInput(format!(
                "cluster {} cannot be joined with itself",
                left
            )));
        }
        for id in [left, right] {
            if !self.active.contains(&id) {
                return Err(MsaError::DegenerateInput(format!(
                    "cluster {} is not active",
                    id
                )));
            }
        }

        let mut leaves = self.nodes[left].leaves.clone();
        leaves.extend_from_slice(&self.nodes[right].leaves);
        let id = self.nodes.len();
        self.nodes.push(ClusterNode {
            leaves,
            children: Some((left, right)),
        });
        self.active.retain(|&c| c != left && c != right);
        self.active.push(id);
        Ok(id)
    }

    pub fn finish(self) -> Result<GuideTree> {
        match self.active.as_slice() {
            [root] => Ok(GuideTree {
                root: *root,
                nodes: self.nodes,
            }),
            rest => Err(MsaError::DegenerateInput(format!(
                "guide tree still has {} unjoined clusters",
                rest.len()
            ))),
        }
    }
}

/// Cluster the sequences of `distances` into a guide tree.
///
/// The input matrix is left untouched; joined-cluster distances live in a
/// working copy sized for every node the tree will ever hold.
pub fn neighbor_joining(distances: &DistanceMatrix) -> Result<GuideTree> {
    let n = distances.len();
    let mut builder = GuideTreeBuilder::new(n)?;

    let capacity = 2 * n - 1;
    let mut d = vec![0.0f64; capacity * capacity];
    for i in 0..n {
        for j in 0..n {
            d[i * capacity + j] = distances.get(i, j);
        }
    }
    let dist = |d: &[f64], a: NodeId, b: NodeId| d[a * capacity + b];

    while builder.active().len() > 1 {
        let active = builder.active().to_vec();
        let k = active.len();
        let u: Vec<f64> = active
            .iter()
            .map(|&a| {
                active
                    .iter()
                    .filter(|&&b| b != a)
                    .map(|&b| dist(&d, a, b))
                    .sum()
            })
            .collect();

        let mut best: Option<(f64, usize, usize)> = None;
        for x in 0..k {
            for y in (x + 1)..k {
                let q = (k as f64 - 2.0) * dist(&d, active[x], active[y]) - u[x] - u[y];
                if best.map_or(true, |(bq, _, _)| q < bq) {
                    best = Some((q, x, y));
                }
            }
        }
        let (q, x, y) = best.ok_or_else(|| {
            MsaError::DegenerateInput("no pair of clusters left to join".to_string())
        })?;
        if !q.is_finite() {
            return Err(MsaError::DegenerateInput(format!(
                "non-finite Q value while joining clusters {} and {}",
                active[x], active[y]
            )));
        }

        let (cx, cy) = (active[x], active[y]);
        let dxy = dist(&d, cx, cy);
        let joined = builder.join(cx, cy)?;
        for &cz in builder.active() {
            if cz == joined {
                continue;
            }
            let v = (dist(&d, cx, cz) + dist(&d, cy, cz) - dxy) / 2.0;
            d[joined * capacity + cz] = v;
            d[cz * capacity + joined] = v;
        }
        log::debug!(
            "joined clusters {} and {} into {} (Q = {:.3})",
            cx,
            cy,
            joined,
            q
        );
    }

    builder.finish()
}
