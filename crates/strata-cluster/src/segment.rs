//! Region segmentation: splits a [`LayerMask`] raster into 8-connected [`Node`]s.

use std::collections::VecDeque;

use glam::IVec2;

use crate::graph::{Node, NodeId};
use crate::mask::LayerMask;
use crate::raster::{Bounds, Grid, NEIGHBORS_8};

/// Flood-fills `masks` into regions of identical, non-empty masks.
///
/// Every non-empty texel ends up in exactly one node. Nodes are numbered in
/// raster order of their first texel and their pixel lists are node-local and
/// sorted by `(y, x)`.
pub fn find_regions(masks: &Grid<LayerMask>) -> Vec<Node> {
    let mut visited = Grid::new(masks.width(), masks.height(), false);
    let mut queue = VecDeque::with_capacity(1024);
    let mut regions = Vec::new();

    for y in 0..masks.height() {
        for x in 0..masks.width() {
            if visited.get(x, y) {
                continue;
            }
            let mask = masks.get(x, y);
            if mask.is_empty() {
                visited.set(x, y, true);
                continue;
            }

            let id = NodeId(regions.len() as u32);
            let seed = IVec2::new(x as i32, y as i32);
            regions.push(flood_region(id, seed, mask, masks, &mut visited, &mut queue));
        }
    }

    regions
}

fn flood_region(
    id: NodeId,
    seed: IVec2,
    mask: LayerMask,
    masks: &Grid<LayerMask>,
    visited: &mut Grid<bool>,
    queue: &mut VecDeque<IVec2>,
) -> Node {
    let mut bounds = Bounds::point(seed);
    let mut pixels = Vec::new();

    queue.clear();
    queue.push_back(seed);
    visited.set(seed.x as u32, seed.y as u32, true);

    while let Some(pos) = queue.pop_front() {
        bounds.include(pos);
        pixels.push(pos);

        for offset in NEIGHBORS_8 {
            let nb = pos + offset;
            if visited.get_at(nb) != Some(false) {
                continue;
            }
            if masks.get_at(nb) == Some(mask) {
                visited.set(nb.x as u32, nb.y as u32, true);
                queue.push_back(nb);
            }
        }
    }

    pixels.sort_unstable_by_key(|p| (p.y, p.x));
    for p in &mut pixels {
        *p -= bounds.min;
    }

    Node {
        id,
        mask,
        bounds,
        pixels,
        edges: Vec::new(),
        cluster: None,
    }
}
