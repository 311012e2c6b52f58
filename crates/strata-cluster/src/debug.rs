//! Debug dumps: a Graphviz view of the solved graph and per-mask rasters.

use std::collections::BTreeSet;
use std::fmt;

use image::RgbaImage;

use crate::diagnostics::{BLACK, WHITE};
use crate::graph::Graph;
use crate::mask::LayerMask;
use crate::palette::LocalPalette;
use crate::raster::Grid;

/// A named debug file produced by an encode.
#[derive(Clone, Debug)]
pub enum DebugArtifact {
    /// Text file, e.g. a `.dot` graph.
    Text {
        /// File name.
        name: String,
        /// File contents.
        contents: String,
    },
    /// Raster image.
    Image {
        /// File name.
        name: String,
        /// Image contents.
        image: RgbaImage,
    },
}

impl DebugArtifact {
    /// File name of the artifact.
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::Image { name, .. } => name,
        }
    }
}

/// File-name friendly form of a mask, e.g. `0_3_63`.
pub fn mask_tag(mask: LayerMask) -> String {
    mask.layers()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

/// Graphviz rendering of the clusters: one subgraph each, roots drawn as
/// hexagons, live edges labelled with their weight.
pub struct DotGraph<'a>(pub &'a Graph);

impl fmt::Display for DotGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.0;
        writeln!(f, "# nodes count {}", graph.nodes.len())?;
        writeln!(f, "# clusters count {}", graph.cluster_count())?;
        writeln!(f, "digraph {{")?;
        writeln!(f, "node[fontsize = 10];")?;
        writeln!(f, "edge[fontsize = 8, arrowhead=\"none\"];")?;

        for (cluster, &root) in graph.roots.iter().enumerate() {
            writeln!(f, "subgraph {{")?;
            writeln!(f, "# nodes")?;
            let members = graph.nodes.iter().filter(|n| n.cluster == Some(cluster));
            for node in members.clone() {
                let shape = if node.id == root { ", shape=hexagon" } else { "" };
                writeln!(
                    f,
                    "{} [label=\"m_n{}_src{}\\nids={},a={}\\n{}\", style=filled{shape}]",
                    node.id.0,
                    node.id.0,
                    mask_tag(node.mask),
                    node.mask.count(),
                    node.pixel_count(),
                    node.mask,
                )?;
            }

            writeln!(f, "# links")?;
            for node in members {
                for &e in &node.edges {
                    let edge = graph.edge(e);
                    if edge.broken || edge.a != node.id {
                        continue;
                    }
                    writeln!(f, "{} -> {} [label={}];", edge.a.0, edge.b.0, edge.weight())?;
                }
            }
            writeln!(f, "}}")?;
        }

        writeln!(f, "}}")
    }
}

/// White-on-black raster of the blocks owned by `palette`.
pub fn palette_mask_image(palette: &LocalPalette) -> RgbaImage {
    let membership = &palette.membership;
    RgbaImage::from_fn(membership.width(), membership.height(), |x, y| {
        if membership.get(x, y) { WHITE } else { BLACK }
    })
}

/// One white-on-black raster per distinct non-empty mask in `masks`, in
/// ascending mask order.
pub fn intersection_images(masks: &Grid<LayerMask>) -> Vec<(LayerMask, RgbaImage)> {
    let unique: BTreeSet<LayerMask> = masks.as_slice().iter().copied().filter(|m| !m.is_empty()).collect();
    unique
        .into_iter()
        .map(|mask| {
            let image = RgbaImage::from_fn(masks.width(), masks.height(), |x, y| {
                if masks.get(x, y) == mask { WHITE } else { BLACK }
            });
            (mask, image)
        })
        .collect()
}

/// Every debug artifact of an encode.
pub fn collect_artifacts(masks: &Grid<LayerMask>, graph: &Graph, palettes: &[LocalPalette]) -> Vec<DebugArtifact> {
    let mut artifacts: Vec<DebugArtifact> = intersection_images(masks)
        .into_iter()
        .map(|(mask, image)| DebugArtifact::Image {
            name: format!("s_intersects_{}.tga", mask_tag(mask)),
            image,
        })
        .collect();

    artifacts.push(DebugArtifact::Text {
        name: "clusters.dot".to_string(),
        contents: DotGraph(graph).to_string(),
    });

    artifacts.extend(palettes.iter().enumerate().map(|(i, palette)| DebugArtifact::Image {
        name: format!("palettemask{i}_ids_{}.tga", mask_tag(palette.mask)),
        image: palette_mask_image(palette),
    }));

    artifacts
}
