//! Region adjacency graph: an arena of [`Node`]s linked by index-based [`Edge`]s.
//!
//! Nodes and edges are created once and never removed. The solver only flips
//! [`Edge::broken`] and rewrites [`Node::cluster`], which always equals the
//! index into [`Graph::roots`] of the node's connected component over
//! non-broken edges.

use std::collections::VecDeque;

use glam::IVec2;

use crate::mask::LayerMask;
use crate::raster::Bounds;

/// Index of a node in [`Graph::nodes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position in the node table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an edge in [`Graph::edges`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Position in the edge table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A maximal 8-connected region of texels sharing one [`LayerMask`].
#[derive(Clone, Debug)]
pub struct Node {
    /// Position in the node table.
    pub id: NodeId,
    /// Layer set shared by every texel of the region.
    pub mask: LayerMask,
    /// Bounding box in grid coordinates.
    pub bounds: Bounds,
    /// Texels relative to `bounds.min`, sorted by `(y, x)`.
    pub pixels: Vec<IVec2>,
    /// Incident edges.
    pub edges: Vec<EdgeId>,
    /// Connected component over non-broken edges; `None` until labelled.
    pub cluster: Option<usize>,
}

impl Node {
    /// Number of texels in the region.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Converts a node-local position to grid coordinates.
    pub fn to_grid(&self, local: IVec2) -> IVec2 {
        self.bounds.min + local
    }

    /// Grid coordinates of every texel, in `(y, x)` order.
    pub fn grid_pixels(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.pixels.iter().map(|&p| self.bounds.min + p)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Boundary texels of one side of an edge, in the owning node's local space.
#[derive(Clone, Debug)]
pub struct EdgePoints {
    /// Bounding box of `points`.
    pub bounds: Bounds,
    /// Boundary texels.
    pub points: Vec<IVec2>,
}

impl EdgePoints {
    /// Collects `points` and computes their bounds. Returns `None` if empty.
    pub fn from_points(points: Vec<IVec2>) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Bounds::point(first);
        for &p in &points[1..] {
            bounds.include(p);
        }
        Some(Self { bounds, points })
    }
}

/// Undirected adjacency between two distinct nodes.
#[derive(Clone, Debug)]
pub struct Edge {
    /// First endpoint.
    pub a: NodeId,
    /// Second endpoint.
    pub b: NodeId,
    /// Boundary texels on `a`'s side.
    pub points_a: EdgePoints,
    /// Boundary texels on `b`'s side.
    pub points_b: EdgePoints,
    /// Cut by the solver; broken edges do not connect clusters.
    pub broken: bool,
}

impl Edge {
    /// Larger of the two boundary lengths. Always at least 1.
    pub fn weight(&self) -> u32 {
        self.points_a.points.len().max(self.points_b.points.len()) as u32
    }

    /// The endpoint opposite `from`.
    pub fn target(&self, from: NodeId) -> NodeId {
        debug_assert!(from == self.a || from == self.b, "node is not an endpoint");
        if from == self.a { self.b } else { self.a }
    }
}

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Violations of the cluster labelling invariants.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    /// A root does not carry its own cluster id.
    #[error("root node {node} has cluster {actual:?}, expected {expected}")]
    InvalidRoot {
        /// Root node index.
        node: u32,
        /// Expected cluster id.
        expected: usize,
        /// Actual label.
        actual: Option<usize>,
    },

    /// A node reachable from a root carries a different cluster id.
    #[error("node {node} reachable from cluster {expected} is labelled {actual:?}")]
    Mislabelled {
        /// Node index.
        node: u32,
        /// Cluster of the root it was reached from.
        expected: usize,
        /// Actual label.
        actual: Option<usize>,
    },

    /// A node labelled with a cluster cannot be reached from that cluster's root.
    #[error("node {node} is labelled {cluster} but unreachable from its root")]
    Unreachable {
        /// Node index.
        node: u32,
        /// Cluster id.
        cluster: usize,
    },
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Node table, edge table, and one root per cluster.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    /// All regions, indexed by [`NodeId`].
    pub nodes: Vec<Node>,
    /// All adjacencies, indexed by [`EdgeId`].
    pub edges: Vec<Edge>,
    /// Representative node of each cluster, indexed by cluster id.
    pub roots: Vec<NodeId>,
}

impl Graph {
    /// Wraps segmented nodes into an edgeless, unlabelled graph.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            edges: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Edge by id.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Number of clusters.
    pub fn cluster_count(&self) -> usize {
        self.roots.len()
    }

    /// Links two nodes and returns the new edge's id.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, points_a: EdgePoints, points_b: EdgePoints) -> EdgeId {
        debug_assert_ne!(a, b, "self edges are not allowed");
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            a,
            b,
            points_a,
            points_b,
            broken: false,
        });
        self.nodes[a.index()].edges.push(id);
        self.nodes[b.index()].edges.push(id);
        id
    }

    /// Non-broken edges of `node` with their opposite endpoints.
    pub fn live_neighbors(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.node(node).edges.iter().filter_map(move |&e| {
            let edge = self.edge(e);
            (!edge.broken).then(|| (e, edge.target(node)))
        })
    }

    /// Nodes currently labelled with `cluster`, in id order.
    pub fn cluster_members(&self, cluster: usize) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.cluster == Some(cluster))
            .map(|n| n.id)
            .collect()
    }

    /// Union of the masks of every node in `cluster`.
    pub fn cluster_mask(&self, cluster: usize) -> LayerMask {
        self.nodes
            .iter()
            .filter(|n| n.cluster == Some(cluster))
            .fold(LayerMask::EMPTY, |acc, n| acc | n.mask)
    }

    /// Labels connected components over non-broken edges from scratch.
    ///
    /// Roots are picked in node-id order, so labelling is deterministic.
    pub fn label_clusters(&mut self) {
        for node in &mut self.nodes {
            node.cluster = None;
        }
        self.roots.clear();

        let mut queue = VecDeque::new();
        for start in 0..self.nodes.len() {
            if self.nodes[start].cluster.is_some() {
                continue;
            }

            let cluster = self.roots.len();
            let root = NodeId(start as u32);
            self.roots.push(root);
            self.nodes[start].cluster = Some(cluster);
            queue.push_back(root);

            while let Some(current) = queue.pop_front() {
                let targets: Vec<NodeId> = self.live_neighbors(current).map(|(_, t)| t).collect();
                for target in targets {
                    let node = &mut self.nodes[target.index()];
                    if node.cluster.is_none() {
                        node.cluster = Some(cluster);
                        queue.push_back(target);
                    }
                }
            }
        }
    }

    /// Checks that every root carries its own id, that each cluster is
    /// connected over non-broken edges, and that nothing else reaches into it.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate_clusters(&self) -> Result<(), GraphError> {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();

        for (cluster, &root) in self.roots.iter().enumerate() {
            let actual = self.node(root).cluster;
            if actual != Some(cluster) {
                return Err(GraphError::InvalidRoot {
                    node: root.0,
                    expected: cluster,
                    actual,
                });
            }

            visited.fill(false);
            visited[root.index()] = true;
            queue.clear();
            queue.push_back(root);

            while let Some(current) = queue.pop_front() {
                let actual = self.node(current).cluster;
                if actual != Some(cluster) {
                    return Err(GraphError::Mislabelled {
                        node: current.0,
                        expected: cluster,
                        actual,
                    });
                }
                for (_, target) in self.live_neighbors(current) {
                    if !visited[target.index()] {
                        visited[target.index()] = true;
                        queue.push_back(target);
                    }
                }
            }

            if let Some(node) = self
                .nodes
                .iter()
                .find(|n| n.cluster == Some(cluster) && !visited[n.id.index()])
            {
                return Err(GraphError::Unreachable {
                    node: node.id.0,
                    cluster,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, mask: LayerMask) -> Node {
        Node {
            id: NodeId(id),
            mask,
            bounds: Bounds::point(IVec2::new(id as i32, 0)),
            pixels: vec![IVec2::ZERO],
            edges: Vec::new(),
            cluster: None,
        }
    }

    fn points() -> EdgePoints {
        EdgePoints::from_points(vec![IVec2::ZERO]).unwrap()
    }

    fn chain(len: u32) -> Graph {
        let mut graph = Graph::new((0..len).map(|i| node(i, LayerMask::layer(i))).collect());
        for i in 1..len {
            graph.add_edge(NodeId(i - 1), NodeId(i), points(), points());
        }
        graph
    }

    #[test]
    fn test_label_connected_chain_is_one_cluster() {
        let mut graph = chain(4);
        graph.label_clusters();
        assert_eq!(graph.cluster_count(), 1);
        assert!(graph.nodes.iter().all(|n| n.cluster == Some(0)));
        assert_eq!(graph.cluster_mask(0).count(), 4);
        assert!(graph.validate_clusters().is_ok());
    }

    #[test]
    fn test_broken_edge_splits_cluster() {
        let mut graph = chain(4);
        graph.edges[1].broken = true;
        graph.label_clusters();
        assert_eq!(graph.cluster_count(), 2);
        assert_eq!(graph.cluster_members(0), vec![NodeId(0), NodeId(1)]);
        assert_eq!(graph.cluster_members(1), vec![NodeId(2), NodeId(3)]);
        assert_eq!(graph.roots, vec![NodeId(0), NodeId(2)]);
        assert!(graph.validate_clusters().is_ok());
    }

    #[test]
    fn test_validate_detects_mislabel() {
        let mut graph = chain(3);
        graph.label_clusters();
        graph.nodes[2].cluster = Some(5);
        assert!(matches!(
            graph.validate_clusters(),
            Err(GraphError::Mislabelled { node: 2, .. })
        ));
    }

    #[test]
    fn test_validate_detects_unreachable() {
        let mut graph = chain(3);
        graph.label_clusters();
        graph.edges[1].broken = true;
        assert_eq!(
            graph.validate_clusters(),
            Err(GraphError::Unreachable { node: 2, cluster: 0 })
        );
    }

    #[test]
    fn test_edge_weight_is_larger_side() {
        let a = EdgePoints::from_points(vec![IVec2::ZERO, IVec2::X, IVec2::Y]).unwrap();
        let b = points();
        let mut graph = chain(2);
        let id = graph.add_edge(NodeId(0), NodeId(1), a, b);
        assert_eq!(graph.edge(id).weight(), 3);
        assert_eq!(graph.edge(id).target(NodeId(1)), NodeId(0));
        assert_eq!(graph.edge(id).points_a.bounds.max, IVec2::new(1, 1));
    }
}
