use anyhow::{anyhow, Result};

use gdsview_core::viewport_bounds;

pub fn execute(
    width: f64,
    height: f64,
    container_x: f64,
    container_y: f64,
    scale_x: f64,
    scale_y: f64,
) -> Result<()> {
    if scale_x == 0.0 || scale_y == 0.0 {
        return Err(anyhow!("Scale must be non-zero (got {}, {})", scale_x, scale_y));
    }

    let bounds = viewport_bounds(width, height, container_x, container_y, scale_x, scale_y);
    println!(
        "x: [{:.3}, {:.3}]  y: [{:.3}, {:.3}]  ({:.3} x {:.3})",
        bounds.min_x,
        bounds.max_x,
        bounds.min_y,
        bounds.max_y,
        bounds.width(),
        bounds.height()
    );
    Ok(())
}
