use serde::{Deserialize, Serialize};

use crate::domain::chart::{ChartTheme, Color, PaneWeights};
use crate::domain::errors::{ChartError, ChartResult};
use crate::domain::logging::LogLevel;
use crate::domain::scheduling::ContainerSize;

/// Timing and sizing rules for pane layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResizePolicy {
    pub min_pane_height: u32,
    /// Border between stacked panes
    pub border_px: u32,
    /// How long the range guard stays up after a resize pass
    pub settle_delay_ms: u32,
    /// Extra passes after a layout is mounted
    pub mount_checkpoints_ms: Vec<u32>,
    /// Passes spanning an animated sidebar transition; `0` runs immediately
    pub transition_checkpoints_ms: Vec<u32>,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self {
            min_pane_height: 10,
            border_px: 1,
            settle_delay_ms: 50,
            mount_checkpoints_ms: vec![50, 200],
            transition_checkpoints_ms: vec![0, 100, 200, 300, 350],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub theme: ChartTheme,
    pub pane_weights: PaneWeights,
    pub resize: ResizePolicy,
    pub default_overlay_color: Color,
    /// Used for initial surface sizes when the container measures zero
    pub fallback_container: (f64, f64),
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            theme: ChartTheme::default(),
            pane_weights: PaneWeights::default(),
            resize: ResizePolicy::default(),
            default_overlay_color: Color::NEUTRAL,
            fallback_container: (800.0, 1000.0),
            log_level: LogLevel::Info,
        }
    }
}

impl EngineConfig {
    /// Parses a partial JSON document; missing keys keep their defaults.
    pub fn from_json(json: &str) -> ChartResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChartResult<()> {
        if self.resize.min_pane_height == 0 {
            return Err(ChartError::Configuration("minPaneHeight must be positive".to_string()));
        }
        let (w, h) = self.fallback_container;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(ChartError::Configuration("fallbackContainer must be a positive size".to_string()));
        }
        Ok(())
    }

    pub fn fallback_size(&self) -> ContainerSize {
        ContainerSize::new(self.fallback_container.0, self.fallback_container.1)
    }
}
