//! Physically bounded zoom limits.
//!
//! The on-screen scale reference must never stand for less than 1 nm or more
//! than 1 m, whatever the layout size. Both limits are derived from the current
//! viewport width converted to microns, so they hold for any consistent
//! database unit.

use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, DocumentUnits};

/// Finest span the scale reference may represent: 1 nm
pub const MIN_REFERENCE_SPAN_UM: f64 = 0.001;

/// Coarsest span the scale reference may represent: 1 m
pub const MAX_REFERENCE_SPAN_UM: f64 = 1_000_000.0;

/// Visible width is taken to be four reference spans
pub const VIEWPORT_SPANS: f64 = 4.0;

const METRES_PER_MICRON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    pub fn clamp(&self, requested: f64) -> f64 {
        requested.max(self.min).min(self.max)
    }

    pub fn contains(&self, scale: f64) -> bool {
        scale >= self.min && scale <= self.max
    }
}

fn viewport_width_um(viewport: &BoundingBox, units: &DocumentUnits) -> f64 {
    let width_db = viewport.max_x - viewport.min_x;
    width_db * units.database / METRES_PER_MICRON
}

/// Scale at which the visible width spans four nanometres.
pub fn max_zoom_scale(viewport: &BoundingBox, current_scale: f64, units: &DocumentUnits) -> f64 {
    current_scale * (viewport_width_um(viewport, units) / (MIN_REFERENCE_SPAN_UM * VIEWPORT_SPANS))
}

/// Scale at which the visible width spans four metres.
pub fn min_zoom_scale(viewport: &BoundingBox, current_scale: f64, units: &DocumentUnits) -> f64 {
    current_scale * (viewport_width_um(viewport, units) / (MAX_REFERENCE_SPAN_UM * VIEWPORT_SPANS))
}

/// Both limits, or `None` when the inputs cannot give a usable range
/// (zero or non-finite width, scale or unit factor).
pub fn zoom_range(viewport: &BoundingBox, current_scale: f64, units: &DocumentUnits) -> Option<ZoomRange> {
    let width_um = viewport_width_um(viewport, units);
    if !width_um.is_finite() || width_um <= 0.0 || !current_scale.is_finite() || current_scale == 0.0 {
        return None;
    }

    let lower = min_zoom_scale(viewport, current_scale, units);
    let upper = max_zoom_scale(viewport, current_scale, units);
    if !lower.is_finite() || !upper.is_finite() {
        return None;
    }

    // A negative scale flips the order of the two limits
    Some(ZoomRange {
        min: lower.min(upper),
        max: lower.max(upper),
    })
}

/// Clamp `requested` into the limits computed from the given arguments.
/// Degenerate inputs leave `current_scale` in place.
pub fn clamp_zoom_scale(
    requested: f64,
    viewport: &BoundingBox,
    current_scale: f64,
    units: &DocumentUnits,
) -> f64 {
    match zoom_range(viewport, current_scale, units) {
        Some(range) if requested.is_finite() => range.clamp(requested),
        Some(_) => {
            log::warn!("Ignoring non-finite zoom request {}", requested);
            current_scale
        }
        None => {
            log::debug!(
                "Degenerate zoom limits for viewport {:?} at scale {}; keeping current scale",
                viewport,
                current_scale
            );
            current_scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> DocumentUnits {
        DocumentUnits { database: 1e-9, user: 1e-6 }
    }

    fn approx(a: f64, b: f64) -> bool {
        ((a - b) / b).abs() < 1e-9
    }

    #[test]
    fn test_reference_limits() {
        let viewport = BoundingBox::new(0.0, 0.0, 1000.0, 800.0);
        assert!(approx(max_zoom_scale(&viewport, 1.0, &units()), 250.0));
        assert!(approx(min_zoom_scale(&viewport, 1.0, &units()), 2.5e-7));
    }

    #[test]
    fn test_limits_scale_with_current_scale() {
        let viewport = BoundingBox::new(-500.0, 0.0, 500.0, 1.0);
        assert!(approx(max_zoom_scale(&viewport, 4.0, &units()), 1000.0));
    }

    #[test]
    fn test_limits_are_unit_system_invariant() {
        // Same physical width expressed in 1 nm and in 0.25 nm database units
        let coarse = BoundingBox::new(0.0, 0.0, 1000.0, 1.0);
        let fine = BoundingBox::new(0.0, 0.0, 4000.0, 1.0);
        let fine_units = DocumentUnits { database: 0.25e-9, user: 1e-6 };
        assert!(approx(
            max_zoom_scale(&coarse, 1.0, &units()),
            max_zoom_scale(&fine, 1.0, &fine_units)
        ));
    }

    #[test]
    fn test_clamp_keeps_in_range_value() {
        let viewport = BoundingBox::new(0.0, 0.0, 1000.0, 800.0);
        assert_eq!(clamp_zoom_scale(3.0, &viewport, 1.0, &units()), 3.0);
    }

    #[test]
    fn test_clamp_bounds_extremes() {
        let viewport = BoundingBox::new(0.0, 0.0, 1000.0, 800.0);
        assert!(approx(clamp_zoom_scale(1e6, &viewport, 1.0, &units()), 250.0));
        assert!(approx(clamp_zoom_scale(1e-12, &viewport, 1.0, &units()), 2.5e-7));
    }

    #[test]
    fn test_degenerate_viewport_returns_current_scale() {
        let flat = BoundingBox::new(10.0, 0.0, 10.0, 800.0);
        assert_eq!(clamp_zoom_scale(99.0, &flat, 1.5, &units()), 1.5);
        assert!(zoom_range(&flat, 1.5, &units()).is_none());

        let nan = BoundingBox::new(f64::NAN, 0.0, 10.0, 800.0);
        assert_eq!(clamp_zoom_scale(99.0, &nan, 1.5, &units()), 1.5);

        let zero_units = DocumentUnits { database: 0.0, user: 1e-6 };
        let viewport = BoundingBox::new(0.0, 0.0, 1000.0, 800.0);
        assert_eq!(clamp_zoom_scale(99.0, &viewport, 1.5, &zero_units), 1.5);
    }

    #[test]
    fn test_negative_scale_keeps_range_ordered() {
        let viewport = BoundingBox::new(0.0, 0.0, 1000.0, 800.0);
        let range = zoom_range(&viewport, -1.0, &units()).unwrap();
        assert!(range.min <= range.max);
        assert!(range.contains(-1.0));
    }
}
