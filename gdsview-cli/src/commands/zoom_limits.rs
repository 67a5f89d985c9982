use anyhow::{anyhow, Result};

use gdsview_core::{zoom_range, BoundingBox, DocumentUnits};

pub fn execute(width_db: f64, scale: f64, database_unit: f64) -> Result<()> {
    let units = DocumentUnits {
        database: database_unit,
        ..DocumentUnits::default()
    };
    let viewport = BoundingBox::new(0.0, 0.0, width_db, 0.0);

    let range = zoom_range(&viewport, scale, &units).ok_or_else(|| {
        anyhow!(
            "No usable zoom range for width {} at scale {} with database unit {}",
            width_db,
            scale,
            database_unit
        )
    })?;

    println!("visible width: {:.6} um", units.database_to_microns(width_db));
    println!("min zoom scale: {:e}", range.min);
    println!("max zoom scale: {:e}", range.max);
    Ok(())
}
