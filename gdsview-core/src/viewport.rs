/*!
# Viewport Culling

Converts the pan/zoom controller's screen transform into a world rectangle and
applies it, together with the UI's per-layer visibility, to the drawable flags
of indexed items.
*/

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::spatial::SpatialIndex;
use crate::types::{BoundingBox, IndexedItem, LayerKey, LayerVisibility, LayerVisibilityMap};

/// Screen-space placement of the document container.
///
/// The document's y axis usually runs opposite to the screen's, so `scale_y`
/// is typically negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenTransform {
    pub screen_width: f64,
    pub screen_height: f64,
    pub container_x: f64,
    pub container_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScreenTransform {
    pub fn screen_to_world(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            (screen_x - self.container_x) / self.scale_x,
            (screen_y - self.container_y) / self.scale_y,
        )
    }

    pub fn world_bounds(&self) -> BoundingBox {
        viewport_bounds(
            self.screen_width,
            self.screen_height,
            self.container_x,
            self.container_y,
            self.scale_x,
            self.scale_y,
        )
    }
}

/// World rectangle covered by the screen. Corners are ordered per axis, so
/// the result is well formed for any sign of either scale. A zero scale gives
/// a non-finite box, which intersects nothing.
pub fn viewport_bounds(
    screen_width: f64,
    screen_height: f64,
    container_x: f64,
    container_y: f64,
    scale_x: f64,
    scale_y: f64,
) -> BoundingBox {
    let to_world = |sx: f64, sy: f64| ((sx - container_x) / scale_x, (sy - container_y) / scale_y);
    BoundingBox::from_corners(to_world(0.0, 0.0), to_world(screen_width, screen_height))
}

/// Counters from one visibility pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityStats {
    /// Sum of primitive counts of items left visible
    pub visible_primitive_count: u64,
    /// Items inside the viewport whose layer is shown
    pub visible_by_layer_count: usize,
    /// Items inside the viewport hidden only because their layer is off
    pub hidden_by_layer_count: usize,
    /// Items examined in this pass
    pub candidate_count: usize,
}

pub struct ViewportManager<V> {
    layer_visibility: V,
    /// Positions in the index of items left visible by the last indexed pass
    shown: HashSet<usize>,
}

impl<V: LayerVisibility> ViewportManager<V> {
    pub fn new(layer_visibility: V) -> Self {
        Self {
            layer_visibility,
            shown: HashSet::new(),
        }
    }

    pub fn layer_visibility(&self) -> &V {
        &self.layer_visibility
    }

    /// Set the visibility flag of every item in `items` and count the outcome.
    pub fn update_visibility<'a, I>(&self, viewport: &BoundingBox, items: I) -> VisibilityStats
    where
        I: IntoIterator<Item = &'a IndexedItem>,
    {
        let mut stats = VisibilityStats::default();
        for item in items {
            self.apply(viewport, item, &mut stats);
        }
        stats
    }

    /// Query `index` for candidates and update them. Items left visible by the
    /// previous indexed pass that fell out of the viewport are hidden too.
    pub fn update_visibility_indexed(
        &mut self,
        viewport: &BoundingBox,
        index: &SpatialIndex,
    ) -> VisibilityStats {
        let candidates = index.query_positions(viewport);
        let mut stats = VisibilityStats::default();
        let mut shown = HashSet::with_capacity(candidates.len());

        for position in candidates {
            if self.apply(viewport, &index.items()[position], &mut stats) {
                shown.insert(position);
            }
        }

        let mut hidden_stale = 0usize;
        for &position in self.shown.difference(&shown) {
            if let Some(item) = index.items().get(position) {
                item.drawable.set_visible(false);
                hidden_stale += 1;
            }
        }
        if hidden_stale > 0 {
            log::debug!("Hid {} item(s) that left the viewport", hidden_stale);
        }

        self.shown = shown;
        stats
    }

    /// Drop the memory of shown items. Required whenever the index is rebuilt,
    /// since it is keyed by position in the previous build.
    pub fn forget_shown(&mut self) {
        self.shown.clear();
    }

    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    fn apply(&self, viewport: &BoundingBox, item: &IndexedItem, stats: &mut VisibilityStats) -> bool {
        stats.candidate_count += 1;
        let in_view = item.bbox.intersects(viewport);
        let layer_allowed = self.layer_visibility.is_visible(&item.layer_key());
        let visible = in_view && layer_allowed;

        item.drawable.set_visible(visible);

        if visible {
            stats.visible_primitive_count =
                stats.visible_primitive_count.saturating_add(item.primitive_count);
            stats.visible_by_layer_count += 1;
        } else if in_view {
            stats.hidden_by_layer_count += 1;
        }
        visible
    }
}

/// Layers switched on since `previous` that have no generated geometry yet.
///
/// A key is newly visible when `new` holds it as `true`, `previous` held it
/// explicitly as `false`, and no item in `existing` belongs to it. A key that
/// `previous` never mentioned counts as previously visible. The result is
/// sorted.
pub fn detect_newly_visible_layers<'a, I>(
    new: &LayerVisibilityMap,
    previous: &LayerVisibilityMap,
    existing: I,
) -> Vec<LayerKey>
where
    I: IntoIterator<Item = &'a IndexedItem>,
{
    let switched_on: Vec<LayerKey> = new
        .iter()
        .filter(|(key, visible)| **visible && previous.get(key) == Some(false))
        .map(|(key, _)| *key)
        .collect();
    if switched_on.is_empty() {
        return switched_on;
    }

    let mut populated: HashMap<LayerKey, usize> = HashMap::new();
    for item in existing {
        *populated.entry(item.layer_key()).or_insert(0) += 1;
    }

    let mut missing: Vec<LayerKey> = switched_on
        .into_iter()
        .filter(|key| populated.get(key).copied().unwrap_or(0) == 0)
        .collect();
    missing.sort();
    missing
}
