/*!
# gdsview Core

Adaptive visibility and level-of-detail engine for interactive viewing of very
large 2D layouts (millions of primitives across many layers).

## Architecture

- **Spatial index**: static bulk-loaded R-tree over tile bounding boxes
- **Viewport culling**: screen transform to world rectangle, per-layer visibility, drawable flags
- **Zoom limits**: physically bounded min/max zoom from document units
- **LOD policy**: hysteresis-gated, budget-driven detail depth with a change cooldown

Everything runs synchronously on the caller's UI thread. Parsing layouts and
issuing draw calls belong to the caller; this crate only decides what is
visible and at which detail depth tiles should be generated.
*/

pub mod clock;
pub mod config;
pub mod error;
pub mod lod;
pub mod spatial;
pub mod types;
pub mod view;
pub mod viewport;
pub mod zoom;

// Re-export commonly used types and functions
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{EngineConfig, IndexConfig, LodConfig};
pub use error::{Error, GeometryError, Result};
pub use lod::{LodDecision, LodHost, LodManager, LodState, ZoomThresholds};
pub use spatial::{BuildReport, RejectedItem, SpatialIndex};
pub use types::{
    BoundingBox, DocumentUnits, Drawable, DrawableHandle, IndexedItem, ItemId, ItemKind, LayerKey,
    LayerVisibility, LayerVisibilityMap, VisibilityFlag,
};
pub use view::{FrameReport, LayoutView};
pub use viewport::{
    detect_newly_visible_layers, viewport_bounds, ScreenTransform, ViewportManager, VisibilityStats,
};
pub use zoom::{clamp_zoom_scale, max_zoom_scale, min_zoom_scale, zoom_range, ZoomRange};

/// Version information for the gdsview core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
