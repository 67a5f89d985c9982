//! JSON tile manifest consumed by `gdsview simulate`.
//!
//! ```json
//! {
//!   "units": { "database": 1e-9, "user": 1e-6 },
//!   "layers": { "1:0": true, "2:0": false },
//!   "items": [
//!     { "id": 0, "bbox": { "min_x": 0, "min_y": 0, "max_x": 100, "max_y": 100 },
//!       "layer": 1, "datatype": 0, "primitive_count": 1200 }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::rc::Rc;

use gdsview_core::{
    BoundingBox, DocumentUnits, DrawableHandle, IndexedItem, ItemId, LayerVisibilityMap,
    VisibilityFlag,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub units: DocumentUnits,
    #[serde(default)]
    pub layers: LayerVisibilityMap,
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestItem {
    pub id: ItemId,
    pub bbox: BoundingBox,
    pub layer: i32,
    #[serde(default)]
    pub datatype: i32,
    pub primitive_count: u64,
}

/// Indexed items plus the flags the core toggles on them.
pub struct LoadedTiles {
    pub items: Vec<IndexedItem>,
    pub flags: Vec<Rc<VisibilityFlag>>,
}

impl LoadedTiles {
    pub fn visible_count(&self) -> usize {
        self.flags.iter().filter(|flag| flag.is_visible()).count()
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        log::debug!(
            "Manifest: {} items, {} layer settings",
            manifest.items.len(),
            manifest.layers.len()
        );
        Ok(manifest)
    }

    pub fn tiles(&self) -> LoadedTiles {
        let mut items = Vec::with_capacity(self.items.len());
        let mut flags = Vec::with_capacity(self.items.len());
        for entry in &self.items {
            let flag = Rc::new(VisibilityFlag::default());
            let drawable: DrawableHandle = flag.clone();
            items.push(IndexedItem::tile(
                entry.id,
                entry.bbox,
                entry.layer,
                entry.datatype,
                entry.primitive_count,
                drawable,
            ));
            flags.push(flag);
        }
        LoadedTiles { items, flags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdsview_core::{LayerKey, LayerVisibility};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "units": { "database": 1e-9, "user": 1e-6 },
        "layers": { "1:0": true, "2:0": false },
        "items": [
            { "id": 7, "bbox": { "min_x": 0, "min_y": 0, "max_x": 10, "max_y": 10 },
              "layer": 2, "primitive_count": 40 }
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.items.len(), 1);
        assert_eq!(manifest.items[0].datatype, 0);
        assert!(!manifest.layers.is_visible(&LayerKey::new(2, 0)));
        assert!(manifest.layers.is_visible(&LayerKey::new(5, 0)));
    }

    #[test]
    fn test_tiles_share_flags_with_items() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        let tiles = manifest.tiles();
        assert_eq!(tiles.items[0].layer_key(), LayerKey::new(2, 0));
        tiles.items[0].drawable.set_visible(true);
        assert_eq!(tiles.visible_count(), 1);
    }

    #[test]
    fn test_missing_units_default_to_gdsii() {
        let manifest = Manifest::from_json(r#"{ "items": [] }"#).unwrap();
        assert_eq!(manifest.units, DocumentUnits::default());
        assert!(manifest.layers.is_empty());
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Manifest::load(file.path()).unwrap_err();
        assert!(format!("{}", err).contains("Invalid manifest"));
    }
}
