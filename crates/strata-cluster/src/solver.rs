//! Constrained graph partitioning.
//!
//! Every cluster whose combined layer set exceeds the budget is bipartitioned
//! greedily, in the spirit of Kernighan–Lin: starting from a single seed node,
//! set A repeatedly absorbs the neighboring mask with the heaviest total edge
//! weight that still fits the budget, and each step's A↔B cut weight is its
//! error. Several seeds are tried and the lowest-error cut wins. This is a
//! local heuristic without any optimality guarantee.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::graph::{EdgeId, Graph, NodeId};
use crate::mask::LayerMask;

/// Seeds tried from each end of the ordered node list.
pub const MAX_SEED_ITERATIONS: usize = 20;

/// A bipartition of one cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    /// Seed node set A was grown from.
    pub seed: NodeId,
    /// Total weight of the cut edges.
    pub error: u32,
    /// Edges between A and B, to be broken.
    pub cut: Vec<EdgeId>,
    /// Nodes kept in the original cluster (starts with `seed`).
    pub set_a: Vec<NodeId>,
    /// Nodes split off, in id order.
    pub set_b: Vec<NodeId>,
    /// Both halves were single nodes that cannot be merged.
    pub is_final: bool,
}

/// Cheaper alternative to splitting a cluster that is one layer over budget.
///
/// Computed and logged only; the solver always applies the split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDropHint {
    /// Cluster id at the time of the solve.
    pub cluster: usize,
    /// Bit index of the cheapest layer.
    pub layer: u32,
    /// Texels covered by that layer inside the cluster.
    pub removal_cost: u32,
    /// Error of the split that was applied instead.
    pub split_cost: u32,
}

/// Result of solving one cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// Combined mask already within budget.
    WithinBudget,
    /// Best bipartition found, plus an optional drop-layer alternative.
    Split(Solution, Option<LayerDropHint>),
    /// No seed produced a valid bipartition.
    Unsolved,
}

/// Summary of a full [`solve`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Passes over all clusters, including the final one with no change.
    pub passes: usize,
    /// Number of splits applied.
    pub splits: usize,
    /// Sum of the errors of all applied splits.
    pub total_error: u64,
    /// Clusters still over budget.
    pub unsolved: Vec<usize>,
    /// Drop-layer alternatives found along the way.
    pub drop_hints: Vec<LayerDropHint>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Outside,
    A,
    B,
}

/// Best step found while growing A from one seed.
struct Candidate {
    error: u32,
    cut: Vec<EdgeId>,
    /// A only grows, so the step's A is a prefix of the grow order.
    a_len: usize,
    is_final: bool,
}

/// Reusable state for bipartitioning the clusters of one graph.
pub struct ClusterSolver<'g> {
    graph: &'g Graph,
    budget: u32,
    side: Vec<Side>,
    set_a: Vec<NodeId>,
    b_count: usize,
    budget_mask: LayerMask,
    weights: FxHashMap<LayerMask, u32>,
}

impl<'g> ClusterSolver<'g> {
    /// Prepares a solver for clusters of `graph` with `budget` layers.
    pub fn new(graph: &'g Graph, budget: u32) -> Self {
        Self {
            graph,
            budget,
            side: vec![Side::Outside; graph.nodes.len()],
            set_a: Vec::new(),
            b_count: 0,
            budget_mask: LayerMask::EMPTY,
            weights: FxHashMap::default(),
        }
    }

    /// Searches the best bipartition of `cluster`.
    pub fn solve_cluster(&mut self, cluster: usize) -> ClusterOutcome {
        let graph = self.graph;
        let mut members = graph.cluster_members(cluster);

        let mut histogram = [0u32; 64];
        let mut combined = LayerMask::EMPTY;
        for &id in &members {
            let node = graph.node(id);
            for layer in node.mask.layers() {
                histogram[layer as usize] += node.pixel_count() as u32;
            }
            combined |= node.mask;
        }

        let layer_count = combined.count();
        if layer_count <= self.budget {
            return ClusterOutcome::WithinBudget;
        }

        info!(
            "Solve cluster {cluster}. Unique layers count {layer_count}. Vertices {}",
            members.len()
        );

        members.sort_by(|&x, &y| {
            let (x, y) = (graph.node(x), graph.node(y));
            y.edges
                .len()
                .cmp(&x.edges.len())
                .then(y.pixel_count().cmp(&x.pixel_count()))
                .then(x.id.cmp(&y.id))
        });

        let forward = members.len().min(MAX_SEED_ITERATIONS).max(1);
        let reverse = (members.len() - forward).min(MAX_SEED_ITERATIONS).max(1);

        let seeds = members[..forward]
            .iter()
            .chain(members.iter().rev().take(reverse))
            .copied()
            .collect::<Vec<_>>();

        let mut best: Option<Solution> = None;
        for seed in seeds {
            let Some(candidate) = self.grow_from(seed, &members) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| candidate.error < b.error) {
                best = Some(self.materialize(seed, &members, candidate));
            }
        }

        self.reset(&members);

        let Some(best) = best else {
            return ClusterOutcome::Unsolved;
        };
        debug!("Cluster {cluster}, error {}", best.error);

        let hint = (layer_count == self.budget + 1)
            .then(|| cheapest_layer(cluster, combined, &histogram, best.error))
            .flatten();
        if let Some(hint) = &hint {
            warn!(
                "Better solution exists for cluster {cluster}: dropping layer {} costs {} < split error {}",
                hint.layer, hint.removal_cost, hint.split_cost
            );
        }

        ClusterOutcome::Split(best, hint)
    }

    /// Grows A from `seed` until no move fits, keeping the lowest-error step.
    fn grow_from(&mut self, seed: NodeId, members: &[NodeId]) -> Option<Candidate> {
        for &id in members {
            self.side[id.index()] = Side::B;
        }
        self.side[seed.index()] = Side::A;
        self.set_a.clear();
        self.set_a.push(seed);
        self.b_count = members.len() - 1;
        self.budget_mask = self.graph.node(seed).mask;

        let mut best: Option<Candidate> = None;
        while let Some(step) = self.step() {
            let is_final = step.is_final;
            if best.as_ref().is_none_or(|b| step.error < b.error) {
                best = Some(step);
            }
            if is_final {
                break;
            }
        }
        best
    }

    fn step(&mut self) -> Option<Candidate> {
        let graph = self.graph;

        self.weights.clear();
        for &a in &self.set_a {
            for (edge, target) in graph.live_neighbors(a) {
                let mask = graph.node(target).mask;
                if (mask | self.budget_mask).count() > self.budget {
                    continue;
                }
                if self.side[target.index()] == Side::B {
                    *self.weights.entry(mask).or_insert(0) += graph.edge(edge).weight();
                }
            }
        }

        if self.weights.is_empty() {
            if self.set_a.len() == 1 && self.b_count == 1 {
                return Some(self.irreducible_pair());
            }
            return None;
        }

        let (chosen, _) = self
            .weights
            .iter()
            .max_by(|(ma, wa), (mb, wb)| wa.cmp(wb).then(mb.cmp(ma)))
            .map(|(&m, &w)| (m, w))?;

        let grown = self.set_a.len();
        for i in 0..grown {
            let a = self.set_a[i];
            for (_, target) in graph.live_neighbors(a) {
                if graph.node(target).mask == chosen && self.side[target.index()] == Side::B {
                    self.side[target.index()] = Side::A;
                    self.set_a.push(target);
                    self.b_count -= 1;
                }
            }
        }
        self.budget_mask |= chosen;

        let (error, cut) = self.cut();
        Some(Candidate {
            error,
            cut,
            a_len: self.set_a.len(),
            is_final: false,
        })
    }

    /// Two single nodes that cannot share a cluster: cut every edge between them.
    fn irreducible_pair(&self) -> Candidate {
        let graph = self.graph;
        let a = self.set_a[0];
        let mut error = 0;
        let mut cut = Vec::new();
        for (edge, _) in graph.live_neighbors(a) {
            error += graph.edge(edge).weight();
            cut.push(edge);
        }
        Candidate {
            error,
            cut,
            a_len: 1,
            is_final: true,
        }
    }

    fn cut(&self) -> (u32, Vec<EdgeId>) {
        let graph = self.graph;
        let mut error = 0;
        let mut cut = Vec::new();
        for &a in &self.set_a {
            for (edge, target) in graph.live_neighbors(a) {
                if self.side[target.index()] == Side::B {
                    error += graph.edge(edge).weight();
                    cut.push(edge);
                }
            }
        }
        (error, cut)
    }

    fn materialize(&self, seed: NodeId, members: &[NodeId], candidate: Candidate) -> Solution {
        let (set_a, grown_past) = self.set_a.split_at(candidate.a_len);
        let mut set_b: Vec<NodeId> = members
            .iter()
            .copied()
            .filter(|id| self.side[id.index()] == Side::B)
            .chain(grown_past.iter().copied())
            .collect();
        set_b.sort_unstable();
        Solution {
            seed,
            error: candidate.error,
            cut: candidate.cut,
            set_a: set_a.to_vec(),
            set_b,
            is_final: candidate.is_final,
        }
    }

    fn reset(&mut self, members: &[NodeId]) {
        for &id in members {
            self.side[id.index()] = Side::Outside;
        }
        self.set_a.clear();
        self.b_count = 0;
    }
}

/// Lowest-coverage layer of a cluster, if dropping it beats `split_cost`.
fn cheapest_layer(cluster: usize, combined: LayerMask, histogram: &[u32; 64], split_cost: u32) -> Option<LayerDropHint> {
    let mut best: Option<(u32, u32)> = None;
    for layer in combined.layers() {
        let cost = histogram[layer as usize];
        if cost < best.map_or(split_cost, |(_, c)| c) {
            best = Some((layer, cost));
        }
    }
    best.map(|(layer, removal_cost)| LayerDropHint {
        cluster,
        layer,
        removal_cost,
        split_cost,
    })
}

/// Breaks the solution's cut, relabels set B's components with fresh cluster
/// ids, and re-roots `cluster` at the seed. Returns the number of new clusters.
pub fn apply_solution(graph: &mut Graph, cluster: usize, solution: &Solution) -> usize {
    for &edge in &solution.cut {
        graph.edges[edge.index()].broken = true;
    }

    let mut in_b = vec![false; graph.nodes.len()];
    for &id in &solution.set_b {
        in_b[id.index()] = true;
    }

    let first_new = graph.roots.len();
    let mut queue = VecDeque::new();
    for &start in &solution.set_b {
        if !in_b[start.index()] {
            continue;
        }
        let new_cluster = graph.roots.len();
        graph.roots.push(start);
        in_b[start.index()] = false;
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            graph.nodes[current.index()].cluster = Some(new_cluster);
            let targets: Vec<NodeId> = graph.live_neighbors(current).map(|(_, t)| t).collect();
            for target in targets {
                if in_b[target.index()] {
                    in_b[target.index()] = false;
                    queue.push_back(target);
                }
            }
        }
    }

    graph.roots[cluster] = solution.seed;
    graph.roots.len() - first_new
}

/// Splits clusters until each fits `budget` layers or no pass makes progress.
///
/// Clusters that cannot be reduced are reported in [`SolveReport::unsolved`]
/// and left as they are.
pub fn solve(graph: &mut Graph, budget: u32) -> SolveReport {
    let mut report = SolveReport::default();

    loop {
        report.passes += 1;
        let cluster_count = graph.cluster_count();
        debug!("Pass {}, clusters {cluster_count}", report.passes);

        let mut reduced = 0usize;
        for cluster in 0..cluster_count {
            let outcome = ClusterSolver::new(graph, budget).solve_cluster(cluster);
            let ClusterOutcome::Split(solution, hint) = outcome else {
                continue;
            };
            if solution.error == 0 {
                continue;
            }

            report.total_error += u64::from(solution.error);
            report.drop_hints.extend(hint);

            let added = apply_solution(graph, cluster, &solution);
            reduced += 1;
            report.splits += 1;
            info!(
                "{added} cluster(s) added. Clusters count {}",
                graph.cluster_count()
            );

            debug_assert_eq!(graph.validate_clusters(), Ok(()));
        }

        if reduced == 0 {
            break;
        }
    }

    report.unsolved = (0..graph.cluster_count())
        .filter(|&c| graph.cluster_mask(c).count() > budget)
        .collect();
    for &cluster in &report.unsolved {
        error!(
            "Cluster {cluster} can't be reduced: {} layers over a budget of {budget}",
            graph.cluster_mask(cluster).count()
        );
    }

    info!(
        "Solved by {} passes, total error = {}",
        report.passes, report.total_error
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::build_graph;
    use crate::raster::Grid;
    use crate::segment::find_regions;

    /// Each character is a texel; digits map to a combination of layers.
    fn graph_from(rows: &[&str], masks: &[(char, LayerMask)]) -> Graph {
        let mut grid = Grid::new(rows[0].len() as u32, rows.len() as u32, LayerMask::EMPTY);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if let Some(&(_, mask)) = masks.iter().find(|(k, _)| *k == c) {
                    grid.set(x as u32, y as u32, mask);
                }
            }
        }
        build_graph(find_regions(&grid))
    }

    fn layers(bits: &[u32]) -> LayerMask {
        bits.iter().fold(LayerMask::EMPTY, |acc, &b| acc | LayerMask::layer(b))
    }

    fn assert_within_budget(graph: &Graph, budget: u32) {
        for c in 0..graph.cluster_count() {
            assert!(graph.cluster_mask(c).count() <= budget, "cluster {c} over budget");
        }
    }

    #[test]
    fn test_within_budget_cluster_is_untouched() {
        let mut graph = graph_from(&["aabb"], &[('a', layers(&[0, 1])), ('b', layers(&[1, 2]))]);
        let report = solve(&mut graph, 3);
        assert_eq!(report.splits, 0);
        assert_eq!(report.passes, 1);
        assert!(graph.edges.iter().all(|e| !e.broken));
        assert_eq!(graph.cluster_count(), 1);
    }

    #[test]
    fn test_two_incompatible_nodes_are_cut_apart() {
        let mut graph = graph_from(&["aabb", "aabb"], &[('a', layers(&[0, 1])), ('b', layers(&[2, 3]))]);
        let report = solve(&mut graph, 3);
        assert_eq!(report.splits, 1);
        assert_eq!(report.total_error, 2);
        assert!(graph.edges[0].broken);
        assert_eq!(graph.cluster_count(), 2);
        assert!(report.unsolved.is_empty());
        assert_within_budget(&graph, 3);
        graph.validate_clusters().unwrap();
    }

    #[test]
    fn test_chain_keeps_compatible_pair_together() {
        // a+b fit in three layers, c cannot join either of them.
        let rows = ["aaabbbb", "aaabbbb", "aaabbbb", "....bcc"];
        let mut graph = graph_from(
            &rows,
            &[('a', layers(&[0, 1])), ('b', layers(&[1, 2])), ('c', layers(&[3, 4]))],
        );
        let report = solve(&mut graph, 3);
        assert_eq!(report.splits, 1);
        assert_within_budget(&graph, 3);

        let a = graph.nodes.iter().find(|n| n.mask == layers(&[0, 1])).unwrap();
        let b = graph.nodes.iter().find(|n| n.mask == layers(&[1, 2])).unwrap();
        let c = graph.nodes.iter().find(|n| n.mask == layers(&[3, 4])).unwrap();
        assert_eq!(a.cluster, b.cluster);
        assert_ne!(b.cluster, c.cluster);
        graph.validate_clusters().unwrap();
    }

    #[test]
    fn test_isolated_over_budget_region_is_unsolved() {
        let mut graph = graph_from(&["aa", "aa"], &[('a', layers(&[0, 1, 2, 3, 4]))]);
        assert!(graph.edges.is_empty());
        let report = solve(&mut graph, 3);
        assert_eq!(report.unsolved, vec![0]);
        assert_eq!(report.splits, 0);
        assert_eq!(graph.cluster_count(), 1);
    }

    #[test]
    fn test_solution_cut_matches_error() {
        let graph = graph_from(
            &["aabbcc", "aabbcc"],
            &[('a', layers(&[0])), ('b', layers(&[1])), ('c', layers(&[2, 3]))],
        );
        let outcome = ClusterSolver::new(&graph, 3).solve_cluster(0);
        let ClusterOutcome::Split(solution, _) = outcome else {
            panic!("expected a split, got {outcome:?}");
        };
        let cut_weight: u32 = solution.cut.iter().map(|&e| graph.edge(e).weight()).sum();
        assert_eq!(solution.error, cut_weight);
        assert_eq!(solution.set_a.len() + solution.set_b.len(), 3);
        assert_eq!(solution.set_a[0], solution.seed);
    }

    #[test]
    fn test_drop_hint_reported_but_split_applied() {
        // One stray texel of layer 4 touching a big 3-layer region: dropping
        // layer 4 (1 texel) is cheaper than cutting the boundary (3 texels).
        let rows = ["aaaa", "aaaa", "aaaa", "aaab"];
        let mut graph = graph_from(&rows, &[('a', layers(&[0, 1, 2])), ('b', layers(&[2, 4]))]);
        let report = solve(&mut graph, 3);
        assert_eq!(report.splits, 1);
        assert_eq!(report.drop_hints.len(), 1);
        let hint = &report.drop_hints[0];
        assert_eq!(hint.layer, 4);
        assert_eq!(hint.removal_cost, 1);
        assert!(hint.removal_cost < hint.split_cost);
        assert!(graph.edges.iter().any(|e| e.broken));
    }

    #[test]
    fn test_star_graph_keeps_partition_connected() {
        let rows = ["aab", "cxd", "eef"];
        let mut graph = graph_from(
            &rows,
            &[
                ('x', layers(&[0])),
                ('a', layers(&[1])),
                ('b', layers(&[2])),
                ('c', layers(&[3])),
                ('d', layers(&[4])),
                ('e', layers(&[5])),
                ('f', layers(&[6])),
            ],
        );
        let report = solve(&mut graph, 2);
        assert!(report.unsolved.is_empty());
        assert_within_budget(&graph, 2);
        graph.validate_clusters().unwrap();
    }

    #[test]
    fn test_solution_partitions_cluster_members() {
        let rows = ["aabbccdd", "aabbccdd", "eeffgghh"];
        let graph = graph_from(
            &rows,
            &[
                ('a', layers(&[0])),
                ('b', layers(&[1])),
                ('c', layers(&[2])),
                ('d', layers(&[3])),
                ('e', layers(&[0, 4])),
                ('f', layers(&[5])),
                ('g', layers(&[2, 6])),
                ('h', layers(&[7])),
            ],
        );
        let outcome = ClusterSolver::new(&graph, 3).solve_cluster(0);
        let ClusterOutcome::Split(solution, _) = outcome else {
            panic!("expected a split, got {outcome:?}");
        };

        let mut all: Vec<NodeId> = solution.set_a.iter().chain(&solution.set_b).copied().collect();
        all.sort_unstable();
        assert_eq!(all, graph.cluster_members(0));
        assert!(solution.set_b.windows(2).all(|w| w[0] < w[1]));
        assert!(solution.set_a.iter().all(|a| !solution.set_b.contains(a)));
    }
}
