//! Adjacency detection between regions.
//!
//! Exact boundary tests cost O(pixels) per pair, so candidates are first
//! filtered by bounding boxes (broad phase) and only overlapping pairs are
//! rasterized and compared texel by texel (narrow phase).

use glam::IVec2;
use tracing::debug;

use crate::graph::{EdgePoints, Graph, Node, NodeId};
use crate::raster::{Bounds, NEIGHBORS_8};

/// Bounding boxes are grown by this much so diagonal contact is caught.
const OVERLAP: i32 = 1;

/// Pairs of nodes whose expanded bounding boxes overlap.
///
/// Base-only nodes are skipped: they blend with any cluster and never need
/// an explicit edge.
pub fn broad_phase(nodes: &[Node]) -> Vec<(NodeId, NodeId)> {
    let mut pairs = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        if a.mask.is_base_only() {
            continue;
        }
        for b in &nodes[i + 1..] {
            if b.mask.is_base_only() {
                continue;
            }
            if a.bounds.intersects(&b.bounds, OVERLAP) {
                pairs.push((a.id, b.id));
            }
        }
    }
    pairs
}

#[derive(Clone, Copy, Default)]
struct ScratchCell {
    occupied: bool,
    added: bool,
}

/// Reusable rasterization buffers for the narrow phase.
#[derive(Default)]
pub struct NarrowPhase {
    cells_a: Vec<ScratchCell>,
    cells_b: Vec<ScratchCell>,
}

impl NarrowPhase {
    /// Creates empty scratch buffers; they grow on demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the texels of `a` and `b` that touch the other node.
    ///
    /// Returns `None` when the nodes are not 8-adjacent. Otherwise both sides
    /// are non-empty and hold node-local positions without duplicates.
    pub fn shared_boundary(&mut self, a: &Node, b: &Node) -> Option<(EdgePoints, EdgePoints)> {
        let rect = a.bounds.intersection(&b.bounds, OVERLAP)?;
        let (width, height) = (rect.width(), rect.height());
        let len = (width * height) as usize;

        self.cells_a.clear();
        self.cells_a.resize(len, ScratchCell::default());
        self.cells_b.clear();
        self.cells_b.resize(len, ScratchCell::default());

        for p in rect_pixels(a, &rect) {
            self.cells_a[cell_index(p, width)].occupied = true;
        }

        let mut points_b = Vec::new();
        for (local, p) in rect_pixels_local(b, &rect) {
            let addr = cell_index(p, width);
            self.cells_b[addr].occupied = true;
            if touches(&self.cells_a, p, width, height) && !self.cells_b[addr].added {
                self.cells_b[addr].added = true;
                points_b.push(local);
            }
        }

        let mut points_a = Vec::new();
        for (local, p) in rect_pixels_local(a, &rect) {
            let addr = cell_index(p, width);
            if touches(&self.cells_b, p, width, height) && !self.cells_a[addr].added {
                self.cells_a[addr].added = true;
                points_a.push(local);
            }
        }

        debug_assert_eq!(
            points_a.is_empty(),
            points_b.is_empty(),
            "boundary must be symmetric"
        );

        Some((
            EdgePoints::from_points(points_a)?,
            EdgePoints::from_points(points_b)?,
        ))
    }
}

/// Positions of `node` inside `rect`, relative to `rect.min`.
fn rect_pixels<'a>(node: &'a Node, rect: &'a Bounds) -> impl Iterator<Item = IVec2> + 'a {
    rect_pixels_local(node, rect).map(|(_, p)| p)
}

/// `(node-local, rect-relative)` positions of `node` inside `rect`.
fn rect_pixels_local<'a>(node: &'a Node, rect: &'a Bounds) -> impl Iterator<Item = (IVec2, IVec2)> + 'a {
    let offset = node.bounds.min - rect.min;
    let size = IVec2::new(rect.width(), rect.height());
    node.pixels.iter().filter_map(move |&local| {
        let p = local + offset;
        (p.cmpge(IVec2::ZERO).all() && p.cmplt(size).all()).then_some((local, p))
    })
}

fn cell_index(p: IVec2, width: i32) -> usize {
    (p.y * width + p.x) as usize
}

/// Returns `true` if any 8-neighbor of `p` is occupied in `cells`.
fn touches(cells: &[ScratchCell], p: IVec2, width: i32, height: i32) -> bool {
    NEIGHBORS_8.iter().any(|&offset| {
        let nb = p + offset;
        nb.x >= 0 && nb.y >= 0 && nb.x < width && nb.y < height && cells[cell_index(nb, width)].occupied
    })
}

/// Builds the region graph: detects every adjacency, links the edges, and
/// labels the initial clusters.
pub fn build_graph(nodes: Vec<Node>) -> Graph {
    let pairs = broad_phase(&nodes);
    debug!("Input nodes = {}", nodes.len());
    debug!("Approximate colliding pairs = {}", pairs.len());

    let mut graph = Graph::new(nodes);
    let mut narrow = NarrowPhase::new();
    let mut collided = 0usize;

    for (a, b) in pairs {
        if let Some((points_a, points_b)) = narrow.shared_boundary(graph.node(a), graph.node(b)) {
            graph.add_edge(a, b, points_a, points_b);
            collided += 1;
        }
    }
    debug!("Collided pairs = {collided}");

    graph.label_clusters();
    graph
}
