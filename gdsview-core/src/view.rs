//! Per-renderer wiring of index, viewport culling and LOD policy.

use serde::Serialize;

use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::lod::{LodDecision, LodHost, LodManager};
use crate::spatial::{BuildReport, SpatialIndex};
use crate::types::{BoundingBox, DocumentUnits, IndexedItem, LayerKey, LayerVisibility, LayerVisibilityMap};
use crate::viewport::{detect_newly_visible_layers, ScreenTransform, ViewportManager, VisibilityStats};
use crate::zoom;

/// Outcome of one transform update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameReport {
    pub bounds: BoundingBox,
    pub scale: f64,
    pub stats: VisibilityStats,
    pub depth: u8,
    pub rerender: bool,
}

pub struct LayoutView<V, H, C = MonotonicClock> {
    index: SpatialIndex,
    viewport: ViewportManager<V>,
    lod: LodManager<H, C>,
    units: DocumentUnits,
    last_decision: Option<LodDecision>,
    last_stats: VisibilityStats,
}

impl<V: LayerVisibility, H: LodHost> LayoutView<V, H, MonotonicClock> {
    pub fn new(config: &EngineConfig, layer_visibility: V, host: H) -> Result<Self> {
        Self::with_clock(config, layer_visibility, host, MonotonicClock::new())
    }
}

impl<V: LayerVisibility, H: LodHost, C: Clock> LayoutView<V, H, C> {
    pub fn with_clock(config: &EngineConfig, layer_visibility: V, host: H, clock: C) -> Result<Self> {
        config.index.validate()?;
        Ok(Self {
            index: SpatialIndex::new(config.index.clone()),
            viewport: ViewportManager::new(layer_visibility),
            lod: LodManager::with_clock(config.lod.clone(), host, clock)?,
            units: DocumentUnits::default(),
            last_decision: None,
            last_stats: VisibilityStats::default(),
        })
    }

    /// A new document: rebuild the index and start the LOD policy over.
    pub fn load_document(&mut self, items: Vec<IndexedItem>, units: DocumentUnits) -> BuildReport {
        self.units = units;
        self.lod.reset();
        self.last_decision = None;
        self.rebuild(items)
    }

    /// Tiles regenerated at a new detail tier. LOD state is kept.
    pub fn replace_items(&mut self, items: Vec<IndexedItem>) -> BuildReport {
        self.rebuild(items)
    }

    /// Apply a pan/zoom transform: run the LOD policy for its scale, then
    /// update visibility flags inside the new bounds.
    ///
    /// The first transform after a load anchors the hysteresis band.
    pub fn on_transform(&mut self, transform: &ScreenTransform, is_rerendering: bool) -> FrameReport {
        let bounds = transform.world_bounds();
        let scale = transform.scale_x.abs();

        if self.lod.zoom_thresholds().is_none() {
            self.lod.update_zoom_thresholds(scale);
        }

        let decision = self.lod.evaluate(scale, is_rerendering);
        if decision.is_rerender() {
            self.lod.update_zoom_thresholds(scale);
        }
        self.last_decision = Some(decision);

        let stats = self.viewport.update_visibility_indexed(&bounds, &self.index);
        self.last_stats = stats;

        FrameReport {
            bounds,
            scale,
            stats,
            depth: self.lod.current_depth(),
            rerender: decision.is_rerender(),
        }
    }

    /// Re-anchor the hysteresis band once the view stops moving.
    pub fn settle(&mut self, scale: f64) {
        self.lod.update_zoom_thresholds(scale.abs());
    }

    pub fn clamp_zoom(&self, requested: f64, transform: &ScreenTransform) -> f64 {
        zoom::clamp_zoom_scale(
            requested,
            &transform.world_bounds(),
            transform.scale_x.abs(),
            &self.units,
        )
    }

    /// Layers switched on that have never had tiles generated
    pub fn newly_visible_layers(
        &self,
        new: &LayerVisibilityMap,
        previous: &LayerVisibilityMap,
    ) -> Vec<LayerKey> {
        detect_newly_visible_layers(new, previous, self.index.items())
    }

    /// Share of the scaled budget used by the last frame
    pub fn budget_utilization(&self) -> f64 {
        let budget = self.lod.scaled_budget();
        if budget == 0 {
            return 0.0;
        }
        (self.last_stats.visible_primitive_count as f64 / budget as f64).min(1.0)
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn viewport(&self) -> &ViewportManager<V> {
        &self.viewport
    }

    pub fn lod(&self) -> &LodManager<H, C> {
        &self.lod
    }

    pub fn lod_mut(&mut self) -> &mut LodManager<H, C> {
        &mut self.lod
    }

    pub fn units(&self) -> DocumentUnits {
        self.units
    }

    pub fn last_decision(&self) -> Option<LodDecision> {
        self.last_decision
    }

    pub fn last_stats(&self) -> VisibilityStats {
        self.last_stats
    }

    fn rebuild(&mut self, items: Vec<IndexedItem>) -> BuildReport {
        // Indexed passes only touch candidates, so start from a blank slate
        for item in &items {
            item.drawable.set_visible(false);
        }
        self.viewport.forget_shown();
        self.last_stats = VisibilityStats::default();
        self.index.build(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{DrawableHandle, VisibilityFlag};
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Host {
        utilization: f64,
        depths: Vec<u8>,
    }

    impl LodHost for Host {
        fn budget_utilization(&self) -> f64 {
            self.utilization
        }

        fn on_depth_change(&mut self, depth: u8) {
            self.depths.push(depth);
        }
    }

    fn transform(scale: f64) -> ScreenTransform {
        ScreenTransform {
            screen_width: 100.0,
            screen_height: 100.0,
            container_x: 0.0,
            container_y: 100.0,
            scale_x: scale,
            scale_y: -scale,
        }
    }

    fn items(flags: &mut Vec<Rc<VisibilityFlag>>) -> Vec<IndexedItem> {
        (0..10)
            .map(|i| {
                let flag = Rc::new(VisibilityFlag::new(true));
                flags.push(flag.clone());
                let drawable: DrawableHandle = flag;
                let min_x = i as f64 * 50.0 + 5.0;
                IndexedItem::tile(i, BoundingBox::new(min_x, 0.0, min_x + 40.0, 40.0), 1, 0, 1000, drawable)
            })
            .collect()
    }

    #[test]
    fn test_load_hides_everything_until_first_frame() {
        let mut view = LayoutView::with_clock(
            &EngineConfig::default(),
            LayerVisibilityMap::new(),
            Host::default(),
            ManualClock::new(),
        )
        .unwrap();
        let mut flags = Vec::new();
        view.load_document(items(&mut flags), DocumentUnits::default());
        assert!(flags.iter().all(|flag| !flag.is_visible()));

        let report = view.on_transform(&transform(1.0), false);
        assert_eq!(report.bounds, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(report.stats.visible_by_layer_count, 2);
        assert!(!report.rerender);
        assert!(flags[0].is_visible() && flags[1].is_visible() && !flags[2].is_visible());
    }

    #[test]
    fn test_zoom_out_triggers_rerender_and_reanchors() {
        let clock = ManualClock::new();
        let mut view = LayoutView::with_clock(
            &EngineConfig::default(),
            LayerVisibilityMap::new(),
            Host { utilization: 0.1, ..Default::default() },
            clock.clone(),
        )
        .unwrap();
        let mut flags = Vec::new();
        view.load_document(items(&mut flags), DocumentUnits::default());

        view.on_transform(&transform(1.0), false);
        let report = view.on_transform(&transform(0.1), false);
        assert!(report.rerender);
        assert_eq!(report.depth, 1);
        assert_eq!(view.lod().host().depths, vec![1]);
        assert_eq!(view.lod().zoom_thresholds().unwrap().reference, 0.1);
        assert_eq!(report.stats.visible_by_layer_count, 10);

        // Tile generator is rebuilding: no second intent
        clock.advance(Duration::from_secs(5));
        assert!(!view.on_transform(&transform(0.001), true).rerender);
    }

    #[test]
    fn test_load_document_resets_lod() {
        let mut view = LayoutView::with_clock(
            &EngineConfig::default(),
            LayerVisibilityMap::new(),
            Host { utilization: 0.1, ..Default::default() },
            ManualClock::new(),
        )
        .unwrap();
        let mut flags = Vec::new();
        view.load_document(items(&mut flags), DocumentUnits::default());
        view.on_transform(&transform(1.0), false);
        view.on_transform(&transform(10.0), false);
        assert_eq!(view.lod().current_depth(), 1);

        view.load_document(items(&mut flags), DocumentUnits::default());
        assert_eq!(view.lod().current_depth(), 0);
        assert!(view.lod().zoom_thresholds().is_none());
    }

    #[test]
    fn test_budget_utilization_from_last_frame() {
        let mut view = LayoutView::with_clock(
            &EngineConfig::default(),
            LayerVisibilityMap::new(),
            Host::default(),
            ManualClock::new(),
        )
        .unwrap();
        let mut flags = Vec::new();
        view.load_document(items(&mut flags), DocumentUnits::default());
        view.on_transform(&transform(1.0), false);
        // Two tiles of 1000 primitives against a 100_000 budget
        assert!((view.budget_utilization() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_zoom_uses_document_units() {
        let view = LayoutView::with_clock(
            &EngineConfig::default(),
            LayerVisibilityMap::new(),
            Host::default(),
            ManualClock::new(),
        )
        .unwrap();
        // 100 database units of 1 nm at scale 1: max zoom is 25
        let clamped = view.clamp_zoom(1e9, &transform(1.0));
        assert!((clamped - 25.0).abs() < 1e-9);
    }
}
