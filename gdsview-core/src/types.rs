use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::GeometryError;

pub type ItemId = u64;

/// Axis-aligned box in database units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Build a box from two arbitrary corners, ordering each axis.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let finite = self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite();
        if !finite {
            return Err(GeometryError::NonFinite {
                min_x: self.min_x,
                min_y: self.min_y,
                max_x: self.max_x,
                max_y: self.max_y,
            });
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(GeometryError::Inverted {
                min_x: self.min_x,
                min_y: self.min_y,
                max_x: self.max_x,
                max_y: self.max_y,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Inclusive overlap test. A malformed box intersects nothing.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.min_x + self.width() * 0.5,
            self.min_y + self.height() * 0.5,
        )
    }
}

/// Layer/datatype pair, rendered as `"layer:datatype"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerKey {
    pub layer: i32,
    pub datatype: i32,
}

impl LayerKey {
    pub fn new(layer: i32, datatype: i32) -> Self {
        Self { layer, datatype }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.layer, self.datatype)
    }
}

impl FromStr for LayerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (layer, datatype) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid layer key '{}': expected 'layer:datatype'", s))?;
        let layer = layer
            .trim()
            .parse()
            .map_err(|_| format!("Invalid layer number in '{}'", s))?;
        let datatype = datatype
            .trim()
            .parse()
            .map_err(|_| format!("Invalid datatype number in '{}'", s))?;
        Ok(Self { layer, datatype })
    }
}

impl TryFrom<String> for LayerKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerKey> for String {
    fn from(key: LayerKey) -> Self {
        key.to_string()
    }
}

/// Read-only view of UI-owned layer visibility.
pub trait LayerVisibility {
    /// Explicit setting for `key`, `None` when the UI never mentioned it.
    fn lookup(&self, key: &LayerKey) -> Option<bool>;

    /// Fail-open: layers without an entry are visible.
    fn is_visible(&self, key: &LayerKey) -> bool {
        self.lookup(key).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerVisibilityMap {
    entries: HashMap<LayerKey, bool>,
}

impl LayerVisibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LayerKey) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn set(&mut self, key: LayerKey, visible: bool) {
        self.entries.insert(key, visible);
    }

    pub fn remove(&mut self, key: &LayerKey) -> Option<bool> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerKey, &bool)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(LayerKey, bool)> for LayerVisibilityMap {
    fn from_iter<I: IntoIterator<Item = (LayerKey, bool)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl LayerVisibility for LayerVisibilityMap {
    fn lookup(&self, key: &LayerKey) -> Option<bool> {
        self.get(key)
    }
}

impl<T: LayerVisibility + ?Sized> LayerVisibility for &T {
    fn lookup(&self, key: &LayerKey) -> Option<bool> {
        (**self).lookup(key)
    }
}

impl<T: LayerVisibility + ?Sized> LayerVisibility for Rc<T> {
    fn lookup(&self, key: &LayerKey) -> Option<bool> {
        (**self).lookup(key)
    }
}

// Shared UI state: the core only ever borrows immutably.
impl<T: LayerVisibility> LayerVisibility for RefCell<T> {
    fn lookup(&self, key: &LayerKey) -> Option<bool> {
        self.borrow().lookup(key)
    }
}

/// The single mutation the core performs on externally owned drawables.
pub trait Drawable {
    fn set_visible(&self, visible: bool);
}

pub type DrawableHandle = Rc<dyn Drawable>;

/// Minimal drawable that only remembers its visibility flag.
#[derive(Debug, Default)]
pub struct VisibilityFlag {
    visible: Cell<bool>,
}

impl VisibilityFlag {
    pub fn new(visible: bool) -> Self {
        Self {
            visible: Cell::new(visible),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }
}

impl Drawable for VisibilityFlag {
    fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ItemKind {
    Tile,
}

/// A drawable unit tracked by the spatial index.
#[derive(Clone)]
pub struct IndexedItem {
    pub id: ItemId,
    pub bbox: BoundingBox,
    pub kind: ItemKind,
    pub layer: i32,
    pub datatype: i32,
    pub primitive_count: u64,
    pub drawable: DrawableHandle,
}

impl IndexedItem {
    pub fn tile(
        id: ItemId,
        bbox: BoundingBox,
        layer: i32,
        datatype: i32,
        primitive_count: u64,
        drawable: DrawableHandle,
    ) -> Self {
        Self {
            id,
            bbox,
            kind: ItemKind::Tile,
            layer,
            datatype,
            primitive_count,
            drawable,
        }
    }

    pub fn layer_key(&self) -> LayerKey {
        LayerKey::new(self.layer, self.datatype)
    }
}

impl fmt::Debug for IndexedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedItem")
            .field("id", &self.id)
            .field("bbox", &self.bbox)
            .field("kind", &self.kind)
            .field("layer", &self.layer)
            .field("datatype", &self.datatype)
            .field("primitive_count", &self.primitive_count)
            .finish_non_exhaustive()
    }
}

/// Unit conversion factors from the parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentUnits {
    /// Metres per database unit
    pub database: f64,
    /// Metres per user unit
    pub user: f64,
}

impl Default for DocumentUnits {
    // GDSII default: 1nm database unit, 1µm user unit
    fn default() -> Self {
        Self {
            database: 1e-9,
            user: 1e-6,
        }
    }
}

impl DocumentUnits {
    pub fn database_to_microns(&self, value: f64) -> f64 {
        value * self.database / 1e-6
    }

    pub fn user_units_per_database_unit(&self) -> f64 {
        if self.user == 0.0 {
            0.0
        } else {
            self.database / self.user
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_orders_axes() {
        let bbox = BoundingBox::from_corners((10.0, -5.0), (-2.0, 7.0));
        assert_eq!(bbox, BoundingBox::new(-2.0, -5.0, 10.0, 7.0));
    }

    #[test]
    fn test_intersects_is_inclusive() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let touching = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let apart = BoundingBox::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.intersects(&touching));
        assert!(!a.intersects(&apart));
    }

    #[test]
    fn test_degenerate_box_intersects() {
        let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
        let line = BoundingBox::new(0.0, 5.0, 10.0, 5.0);
        assert!(point.is_valid());
        assert!(point.intersects(&line));
        assert!(point.intersects(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_malformed_boxes_never_intersect() {
        let world = BoundingBox::new(-1e9, -1e9, 1e9, 1e9);
        let nan = BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0);
        let inverted = BoundingBox::new(5.0, 0.0, 3.0, 1.0);
        assert!(!nan.intersects(&world));
        assert!(!world.intersects(&nan));
        assert!(!inverted.intersects(&world));
        assert!(matches!(nan.validate(), Err(GeometryError::NonFinite { .. })));
        assert!(matches!(inverted.validate(), Err(GeometryError::Inverted { .. })));
    }

    #[test]
    fn test_layer_key_parse_and_display() {
        let key: LayerKey = "12:3".parse().unwrap();
        assert_eq!(key, LayerKey::new(12, 3));
        assert_eq!(key.to_string(), "12:3");
        assert!("12".parse::<LayerKey>().is_err());
        assert!("a:b".parse::<LayerKey>().is_err());
    }

    #[test]
    fn test_visibility_map_fails_open() {
        let mut map = LayerVisibilityMap::new();
        map.set(LayerKey::new(1, 0), false);
        assert!(!map.is_visible(&LayerKey::new(1, 0)));
        assert!(map.is_visible(&LayerKey::new(2, 0)));
        assert_eq!(map.lookup(&LayerKey::new(2, 0)), None);
    }

    #[test]
    fn test_shared_visibility_map_sees_updates() {
        let shared = Rc::new(RefCell::new(LayerVisibilityMap::new()));
        let key = LayerKey::new(4, 0);
        assert!(shared.is_visible(&key));
        shared.borrow_mut().set(key, false);
        assert!(!shared.is_visible(&key));
    }

    #[test]
    fn test_visibility_map_serializes_with_string_keys() {
        let map: LayerVisibilityMap = [(LayerKey::new(1, 0), false)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"1:0":false}"#);
        let back: LayerVisibilityMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_document_units_conversion() {
        let units = DocumentUnits::default();
        assert!((units.database_to_microns(1000.0) - 1.0).abs() < 1e-12);
        assert!((units.user_units_per_database_unit() - 1e-3).abs() < 1e-15);
    }
}
