//! Replay zoom scales over a manifest through a [`LayoutView`].

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::Path;

use gdsview_core::{
    BoundingBox, EngineConfig, Error, FrameReport, LayerVisibilityMap, LayoutView, LodHost, ScreenTransform,
};

use crate::manifest::Manifest;

pub struct SimulateOptions {
    pub width: f64,
    pub height: f64,
    pub scales: Vec<f64>,
    pub outline: bool,
    pub json: bool,
}

/// Stand-in for the tile generator: reports the utilization measured on the
/// previous frame and queues re-render intents.
#[derive(Debug, Default)]
pub struct ReplayHost {
    pub utilization: f64,
    pub outline: bool,
    pub pending_depth: Option<u8>,
}

impl LodHost for ReplayHost {
    fn budget_utilization(&self) -> f64 {
        self.utilization
    }

    fn rerender_on_zoom_change(&self) -> bool {
        self.outline
    }

    fn on_depth_change(&mut self, depth: u8) {
        self.pending_depth = Some(depth);
    }
}

#[derive(Debug, Serialize)]
pub struct FrameLine {
    pub frame: usize,
    pub requested_scale: f64,
    #[serde(flatten)]
    pub report: FrameReport,
    pub budget_utilization: f64,
}

impl FrameLine {
    fn describe(&self) -> String {
        let b = &self.report.bounds;
        format!(
            "frame {:>3}  scale {:<12.6}  bounds [{:.1}, {:.1}]x[{:.1}, {:.1}]  visible {}  layer-hidden {}  primitives {}  utilization {:.3}  depth {}{}",
            self.frame,
            self.report.scale,
            b.min_x,
            b.max_x,
            b.min_y,
            b.max_y,
            self.report.stats.visible_by_layer_count,
            self.report.stats.hidden_by_layer_count,
            self.report.stats.visible_primitive_count,
            self.budget_utilization,
            self.report.depth,
            if self.report.rerender { "  RERENDER" } else { "" }
        )
    }
}

/// Transform placing `center` in the middle of the screen at `scale`, y up.
pub fn centered_transform(width: f64, height: f64, center: (f64, f64), scale: f64) -> ScreenTransform {
    ScreenTransform {
        screen_width: width,
        screen_height: height,
        container_x: width / 2.0 - center.0 * scale,
        container_y: height / 2.0 + center.1 * scale,
        scale_x: scale,
        scale_y: -scale,
    }
}

pub fn execute(config: &EngineConfig, manifest_path: &Path, options: &SimulateOptions) -> Result<()> {
    log::info!("Loading manifest {}", manifest_path.display());
    let manifest = Manifest::load(manifest_path)?;
    let frames = run(config, &manifest, options)?;

    for frame in &frames {
        if options.json {
            println!("{}", serde_json::to_string(frame).context("Failed to encode frame")?);
        } else {
            println!("{}", frame.describe());
        }
    }
    Ok(())
}

pub fn run(config: &EngineConfig, manifest: &Manifest, options: &SimulateOptions) -> Result<Vec<FrameLine>> {
    if options.scales.is_empty() {
        return Err(anyhow!("At least one scale is required"));
    }

    let host = ReplayHost {
        outline: options.outline,
        ..Default::default()
    };
    let layers: LayerVisibilityMap = manifest.layers.clone();
    let mut view = LayoutView::new(config, layers, host).context("Invalid engine configuration")?;

    let tiles = manifest.tiles();
    let report = view.load_document(tiles.items.clone(), manifest.units);
    for rejected in &report.rejected {
        log::warn!("Tile skipped: {}", Error::geometry(rejected.id, rejected.error));
    }
    log::info!(
        "Indexed {} of {} tiles (tree height {})",
        report.indexed,
        tiles.items.len(),
        report.tree_height
    );

    let center = view
        .index()
        .bounds()
        .map(|bounds: BoundingBox| bounds.center())
        .unwrap_or((0.0, 0.0));

    let mut frames = Vec::with_capacity(options.scales.len());
    let mut current = centered_transform(options.width, options.height, center, options.scales[0]);

    for (frame, &requested) in options.scales.iter().enumerate() {
        let scale = if frame == 0 {
            requested
        } else {
            view.clamp_zoom(requested, &current)
        };
        if scale != requested {
            log::info!("Zoom {} clamped to {}", requested, scale);
        }
        current = centered_transform(options.width, options.height, center, scale);

        let report = view.on_transform(&current, false);
        if let Some(depth) = view.lod_mut().host_mut().pending_depth.take() {
            // Rebuild is synchronous here; the same tiles stand in for the new tier
            log::debug!("Regenerating tiles at depth {}", depth);
            view.replace_items(tiles.items.clone());
            view.on_transform(&current, false);
        }

        let utilization = view.budget_utilization();
        view.lod_mut().host_mut().utilization = utilization;

        frames.push(FrameLine {
            frame,
            requested_scale: requested,
            report,
            budget_utilization: utilization,
        });
    }

    log::debug!("{} of {} tiles visible after replay", tiles.visible_count(), tiles.flags.len());
    Ok(frames)
}
