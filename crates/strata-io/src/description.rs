//! The cluster description document.
//!
//! Lists, per palette in indirection order, the source layer files it blends
//! and the synthesized id of its base layer.

use std::path::{Path, PathBuf};

use image::Rgb;
use serde::{Deserialize, Serialize};
use strata_cluster::LocalPalette;

use crate::IoError;

/// One palette entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterEntry {
    /// `base_RRGGBB` if the palette blends the base layer.
    #[serde(rename = "baseLayer")]
    pub base_layer: Option<String>,
    /// Source layer paths in ascending layer order.
    pub layers: Vec<String>,
}

/// Description of every palette.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterDescription {
    /// Entries in indirection order (entry `i` is palette id `i + 1`).
    pub clusters: Vec<ClusterEntry>,
}

/// Identifier of the base layer for a subset color, e.g. `base_00C800`.
pub fn base_layer_id(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("base_{r:02X}{g:02X}{b:02X}")
}

impl ClusterDescription {
    /// Describes `palettes`, resolving layer indices against `layer_paths`.
    ///
    /// # Errors
    ///
    /// [`IoError::UnknownLayer`] for a layer index without a path and
    /// [`IoError::UnknownBaseColor`] for a base color that is not one of
    /// `subset_colors`.
    pub fn from_palettes(
        palettes: &[LocalPalette],
        subset_colors: &[Rgb<u8>],
        layer_paths: &[PathBuf],
    ) -> Result<Self, IoError> {
        let clusters = palettes
            .iter()
            .map(|palette| {
                let base_layer = if palette.mask.has_base() {
                    if !subset_colors.contains(&palette.base_color) {
                        return Err(IoError::UnknownBaseColor(base_layer_id(palette.base_color)));
                    }
                    Some(base_layer_id(palette.base_color))
                } else {
                    None
                };

                let layers = palette
                    .source_layers()
                    .map(|index| {
                        layer_paths
                            .get(index as usize)
                            .map(|p| p.to_string_lossy().into_owned())
                            .ok_or(IoError::UnknownLayer {
                                index,
                                count: layer_paths.len(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(ClusterEntry { base_layer, layers })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { clusters })
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, IoError> {
        serde_json::to_string_pretty(self).map_err(IoError::Serialize)
    }

    /// Writes the pretty-printed JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<(), IoError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| IoError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_cluster::{Grid, LayerMask};

    const GREEN: Rgb<u8> = Rgb([0, 200, 0]);

    fn palette(mask: LayerMask, base_color: Rgb<u8>) -> LocalPalette {
        LocalPalette {
            mask,
            base_color,
            membership: Grid::new(1, 1, false),
        }
    }

    fn paths() -> Vec<PathBuf> {
        vec![PathBuf::from("moss.tga"), PathBuf::from("dirt.tga"), PathBuf::from("snow.tga")]
    }

    #[test]
    fn test_base_layer_id_is_upper_hex() {
        assert_eq!(base_layer_id(Rgb([0, 200, 10])), "base_00C80A");
    }

    #[test]
    fn test_entries_list_layers_and_base() {
        let palettes = [
            palette(LayerMask::layer(0) | LayerMask::layer(2) | LayerMask::BASE, GREEN),
            palette(LayerMask::layer(1), GREEN),
        ];
        let desc = ClusterDescription::from_palettes(&palettes, &[GREEN], &paths()).unwrap();

        assert_eq!(desc.clusters[0].base_layer.as_deref(), Some("base_00C800"));
        assert_eq!(desc.clusters[0].layers, vec!["moss.tga", "snow.tga"]);
        assert_eq!(desc.clusters[1].base_layer, None);
        assert_eq!(desc.clusters[1].layers, vec!["dirt.tga"]);
    }

    #[test]
    fn test_json_shape() {
        let palettes = [palette(LayerMask::layer(1), GREEN)];
        let desc = ClusterDescription::from_palettes(&palettes, &[GREEN], &paths()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&desc.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"clusters": [{"baseLayer": null, "layers": ["dirt.tga"]}]})
        );
    }

    #[test]
    fn test_unknown_base_color_rejected() {
        let palettes = [palette(LayerMask::BASE, Rgb([1, 2, 3]))];
        assert!(matches!(
            ClusterDescription::from_palettes(&palettes, &[GREEN], &paths()),
            Err(IoError::UnknownBaseColor(id)) if id == "base_010203"
        ));
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let palettes = [palette(LayerMask::layer(7), GREEN)];
        assert!(matches!(
            ClusterDescription::from_palettes(&palettes, &[GREEN], &paths()),
            Err(IoError::UnknownLayer { index: 7, count: 3 })
        ));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/desc.json");
        ClusterDescription::default().write(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"clusters\": []"));
    }
}
