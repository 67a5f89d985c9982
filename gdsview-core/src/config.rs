//! Configuration handling for the gdsview engine
//!
//! Supports loading configuration from gdsview.toml files; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub lod: LodConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum children per R-tree node
    #[serde(default = "default_node_capacity")]
    pub node_capacity: usize,

    /// Below this many items queries scan linearly instead of building a tree
    #[serde(default = "default_linear_scan_threshold")]
    pub linear_scan_threshold: usize,

    /// Item count above which bulk-load sorting runs on the rayon pool
    #[serde(default = "default_parallel_sort_threshold")]
    pub parallel_sort_threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodConfig {
    #[serde(default = "default_min_depth")]
    pub min_depth: u8,

    #[serde(default = "default_max_depth")]
    pub max_depth: u8,

    /// Primitive budget at the minimum depth
    #[serde(default = "default_base_budget")]
    pub base_budget: u64,

    /// One multiplier per depth, starting at `min_depth`
    #[serde(default = "default_budget_multipliers")]
    pub budget_multipliers: Vec<f64>,

    /// Minimum time between committed depth changes
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Lower hysteresis bound as a fraction of the anchor scale
    #[serde(default = "default_zoom_low_factor")]
    pub zoom_low_factor: f64,

    /// Upper hysteresis bound as a multiple of the anchor scale
    #[serde(default = "default_zoom_high_factor")]
    pub zoom_high_factor: f64,

    /// Utilization under which detail is increased
    #[serde(default = "default_low_utilization")]
    pub low_utilization: f64,

    /// Utilization over which detail is reduced
    #[serde(default = "default_high_utilization")]
    pub high_utilization: f64,
}

fn default_node_capacity() -> usize { 16 }
fn default_linear_scan_threshold() -> usize { 64 }
fn default_parallel_sort_threshold() -> usize { 100_000 }
fn default_min_depth() -> u8 { 0 }
fn default_max_depth() -> u8 { 3 }
fn default_base_budget() -> u64 { 100_000 }
fn default_budget_multipliers() -> Vec<f64> { vec![1.0, 1.5, 2.0, 2.5] }
fn default_cooldown_ms() -> u64 { 1000 }
fn default_zoom_low_factor() -> f64 { 0.2 }
fn default_zoom_high_factor() -> f64 { 2.0 }
fn default_low_utilization() -> f64 { 0.30 }
fn default_high_utilization() -> f64 { 0.90 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            node_capacity: default_node_capacity(),
            linear_scan_threshold: default_linear_scan_threshold(),
            parallel_sort_threshold: default_parallel_sort_threshold(),
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            min_depth: default_min_depth(),
            max_depth: default_max_depth(),
            base_budget: default_base_budget(),
            budget_multipliers: default_budget_multipliers(),
            cooldown_ms: default_cooldown_ms(),
            zoom_low_factor: default_zoom_low_factor(),
            zoom_high_factor: default_zoom_high_factor(),
            low_utilization: default_low_utilization(),
            high_utilization: default_high_utilization(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.node_capacity < 2 {
            return Err(Error::config(format!(
                "index.node_capacity must be at least 2, got {}",
                self.node_capacity
            )));
        }
        Ok(())
    }
}

impl LodConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_depth > self.max_depth {
            return Err(Error::config(format!(
                "lod.min_depth ({}) exceeds lod.max_depth ({})",
                self.min_depth, self.max_depth
            )));
        }

        let depth_count = (self.max_depth - self.min_depth) as usize + 1;
        if self.budget_multipliers.len() != depth_count {
            return Err(Error::config(format!(
                "lod.budget_multipliers has {} entries, expected {} (one per depth)",
                self.budget_multipliers.len(),
                depth_count
            )));
        }
        if let Some(bad) = self
            .budget_multipliers
            .iter()
            .find(|m| !m.is_finite() || **m <= 0.0)
        {
            return Err(Error::config(format!(
                "lod.budget_multipliers must be positive and finite, got {}",
                bad
            )));
        }

        if self.base_budget == 0 {
            return Err(Error::config("lod.base_budget must be positive"));
        }

        let factors_ok = self.zoom_low_factor.is_finite()
            && self.zoom_high_factor.is_finite()
            && self.zoom_low_factor > 0.0
            && self.zoom_low_factor < 1.0
            && self.zoom_high_factor > 1.0;
        if !factors_ok {
            return Err(Error::config(format!(
                "lod zoom factors must satisfy 0 < low < 1 < high, got low={} high={}",
                self.zoom_low_factor, self.zoom_high_factor
            )));
        }

        let utilization_ok = self.low_utilization >= 0.0
            && self.high_utilization <= 1.0
            && self.low_utilization < self.high_utilization;
        if !utilization_ok {
            return Err(Error::config(format!(
                "lod utilization thresholds must satisfy 0 <= low < high <= 1, got low={} high={}",
                self.low_utilization, self.high_utilization
            )));
        }

        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        self.lod.validate()
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> String {
        Self::default()
            .to_toml_string()
            .unwrap_or_else(|err| format!("# failed to render defaults: {}\n", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.lod.max_depth, 3);
        assert_eq!(config.lod.budget_multipliers, vec![1.0, 1.5, 2.0, 2.5]);
        assert_eq!(config.lod.cooldown(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("[lod]\nbase_budget = 5000\n").unwrap();
        assert_eq!(config.lod.base_budget, 5000);
        assert_eq!(config.lod.zoom_low_factor, 0.2);
        assert_eq!(config.index.node_capacity, 16);
    }

    #[test]
    fn test_rejects_mismatched_multipliers() {
        let err = EngineConfig::from_toml_str("[lod]\nmax_depth = 4\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("budget_multipliers"));
    }

    #[test]
    fn test_rejects_inverted_hysteresis() {
        let config = LodConfig {
            zoom_low_factor: 1.5,
            ..LodConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_utilization() {
        let config = LodConfig {
            low_utilization: 0.95,
            ..LodConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = EngineConfig::default();
        config.lod.cooldown_ms = 250;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = EngineConfig::load_from_file(temp_file.path())?;

        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_example_toml_generation() {
        let example = EngineConfig::example_toml();
        assert!(example.contains("[index]"));
        assert!(example.contains("[lod]"));
        assert!(example.contains("cooldown_ms"));
    }
}
