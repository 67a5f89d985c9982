/*!
# Level of Detail (LOD) Management

Tracks a discrete detail depth and decides when a zoom change should trigger a
rebuild of the drawable tiles.

- A hysteresis band around the last anchored scale ignores small zoom jitter.
- In budget-driven (filled) rendering, depth moves up when the visible set uses
  little of the primitive budget and down when it uses nearly all of it.
- In outline rendering every significant zoom re-tessellates at the current depth,
  since stroke quality depends on the zoom-relative line width.
- A cooldown between committed changes prevents flapping near a utilization threshold.

The manager only emits an intent through [`LodHost::on_depth_change`]; the tile
generator owns the rebuild and reports it back through `is_rerendering`.
*/

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::config::LodConfig;
use crate::error::Result;

/// Capabilities the renderer lends to the LOD policy.
pub trait LodHost {
    /// Fraction of the primitive budget used by the visible tiles, in `[0, 1]`
    fn budget_utilization(&self) -> f64;

    /// Whether the current render mode re-tessellates on every significant zoom
    fn rerender_on_zoom_change(&self) -> bool {
        false
    }

    /// Re-render intent: rebuild tiles at `depth`
    fn on_depth_change(&mut self, depth: u8);
}

/// Hysteresis band anchored at `reference`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomThresholds {
    pub reference: f64,
    pub low: f64,
    pub high: f64,
}

impl ZoomThresholds {
    pub fn contains(&self, scale: f64) -> bool {
        !(scale < self.low || scale > self.high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodState {
    pub current_depth: u8,
    pub last_change: Option<Duration>,
    pub zoom_thresholds: Option<ZoomThresholds>,
}

/// Why [`LodManager::evaluate`] did or did not fire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LodDecision {
    /// A rebuild is already in flight
    Busy,
    /// No threshold has been anchored yet
    Unanchored,
    /// The scale is still inside the hysteresis band
    Insignificant,
    /// Budget-driven mode and utilization calls for no depth change
    WithinBudget { utilization: f64 },
    /// A change was proposed but the previous one is too recent
    CoolingDown { remaining: Duration },
    /// Intent emitted
    Rerender { from: u8, to: u8 },
}

impl LodDecision {
    pub fn is_rerender(&self) -> bool {
        matches!(self, LodDecision::Rerender { .. })
    }
}

pub struct LodManager<H, C = MonotonicClock> {
    config: LodConfig,
    host: H,
    clock: C,
    state: LodState,
}

impl<H: LodHost> LodManager<H, MonotonicClock> {
    pub fn new(config: LodConfig, host: H) -> Result<Self> {
        Self::with_clock(config, host, MonotonicClock::new())
    }
}

impl<H: LodHost, C: Clock> LodManager<H, C> {
    pub fn with_clock(config: LodConfig, host: H, clock: C) -> Result<Self> {
        config.validate()?;
        let state = LodState {
            current_depth: config.min_depth,
            last_change: None,
            zoom_thresholds: None,
        };
        Ok(Self {
            config,
            host,
            clock,
            state,
        })
    }

    pub fn current_depth(&self) -> u8 {
        self.state.current_depth
    }

    pub fn state(&self) -> LodState {
        self.state
    }

    pub fn zoom_thresholds(&self) -> Option<ZoomThresholds> {
        self.state.zoom_thresholds
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn budget_multiplier(&self) -> f64 {
        let slot = (self.state.current_depth - self.config.min_depth) as usize;
        self.config.budget_multipliers[slot]
    }

    /// Configured base budget scaled for the current depth
    pub fn scaled_budget(&self) -> u64 {
        self.scale_budget(self.config.base_budget)
    }

    /// `base` scaled for the current depth
    pub fn scale_budget(&self, base: u64) -> u64 {
        (base as f64 * self.budget_multiplier()).round() as u64
    }

    /// Re-anchor the hysteresis band at `current_scale`. Call after every
    /// committed change and whenever the view settles.
    pub fn update_zoom_thresholds(&mut self, current_scale: f64) {
        if !current_scale.is_finite() || current_scale <= 0.0 {
            log::warn!("Ignoring zoom threshold anchor at invalid scale {}", current_scale);
            return;
        }
        self.state.zoom_thresholds = Some(ZoomThresholds {
            reference: current_scale,
            low: current_scale * self.config.zoom_low_factor,
            high: current_scale * self.config.zoom_high_factor,
        });
    }

    pub fn has_zoom_changed_significantly(&self, new_scale: f64) -> bool {
        match self.state.zoom_thresholds {
            Some(thresholds) => !thresholds.contains(new_scale),
            None => false,
        }
    }

    pub fn check_and_trigger_rerender(&mut self, new_scale: f64, is_rerendering: bool) -> bool {
        self.evaluate(new_scale, is_rerendering).is_rerender()
    }

    /// Run the policy for `new_scale` and commit any accepted change.
    ///
    /// The caller re-anchors with [`update_zoom_thresholds`](Self::update_zoom_thresholds)
    /// after a [`LodDecision::Rerender`].
    pub fn evaluate(&mut self, new_scale: f64, is_rerendering: bool) -> LodDecision {
        if is_rerendering {
            return LodDecision::Busy;
        }
        if self.state.zoom_thresholds.is_none() {
            return LodDecision::Unanchored;
        }
        if !self.has_zoom_changed_significantly(new_scale) {
            return LodDecision::Insignificant;
        }

        let current = self.state.current_depth;
        let target = if self.host.rerender_on_zoom_change() {
            current
        } else {
            match self.budget_target(current) {
                Ok(target) => target,
                Err(decision) => return decision,
            }
        };

        if let Some(remaining) = self.cooldown_remaining() {
            log::debug!(
                "Suppressed LOD change {} -> {}: {:?} of cooldown left",
                current,
                target,
                remaining
            );
            return LodDecision::CoolingDown { remaining };
        }

        self.commit(target);
        LodDecision::Rerender {
            from: current,
            to: target,
        }
    }

    /// Explicit depth request, clamped into the configured range. A change is
    /// committed at once and reported to the host.
    pub fn request_depth(&mut self, depth: i64) -> u8 {
        let clamped = depth.clamp(self.config.min_depth as i64, self.config.max_depth as i64) as u8;
        if clamped as i64 != depth {
            log::debug!("Clamped requested LOD depth {} to {}", depth, clamped);
        }
        if clamped != self.state.current_depth {
            self.commit(clamped);
        }
        clamped
    }

    /// Back to the initial state for a newly loaded document.
    pub fn reset(&mut self) {
        self.state = LodState {
            current_depth: self.config.min_depth,
            last_change: None,
            zoom_thresholds: None,
        };
    }

    fn budget_target(&self, current: u8) -> std::result::Result<u8, LodDecision> {
        let reported = self.host.budget_utilization();
        if !reported.is_finite() {
            log::warn!("Ignoring non-finite budget utilization {}", reported);
            return Err(LodDecision::WithinBudget { utilization: reported });
        }
        let utilization = reported.clamp(0.0, 1.0);

        if utilization < self.config.low_utilization && current < self.config.max_depth {
            Ok(current + 1)
        } else if utilization > self.config.high_utilization && current > self.config.min_depth {
            Ok(current - 1)
        } else {
            Err(LodDecision::WithinBudget { utilization })
        }
    }

    fn cooldown_remaining(&self) -> Option<Duration> {
        let last = self.state.last_change?;
        let elapsed = self.clock.now().saturating_sub(last);
        let cooldown = self.config.cooldown();
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    fn commit(&mut self, depth: u8) {
        let previous = self.state.current_depth;
        self.state.current_depth = depth;
        self.state.last_change = Some(self.clock.now());
        if previous == depth {
            log::debug!("Re-render requested at LOD depth {}", depth);
        } else {
            log::info!("LOD depth {} -> {} (budget {})", previous, depth, self.scaled_budget());
        }
        self.host.on_depth_change(depth);
    }
}
