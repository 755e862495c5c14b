use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString, IntoEnumIterator};

use super::indicators::{IndicatorConfigSet, IndicatorKind};

/// Panes in stack order, top to bottom
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, StrumDisplay, EnumString, AsRefStr, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum PaneId {
    Price,
    Volume,
    Macd,
    Force13,
    Force2,
}

impl PaneId {
    pub fn default_weight(&self) -> f64 {
        match self {
            PaneId::Price => 10.0,
            PaneId::Volume => 1.5,
            PaneId::Macd => 3.5,
            PaneId::Force13 => 4.0,
            PaneId::Force2 => 2.0,
        }
    }

    /// Indicator kind whose visibility shows or hides this pane
    pub fn toggled_by(&self) -> Option<IndicatorKind> {
        match self {
            PaneId::Price => None,
            PaneId::Volume => Some(IndicatorKind::Volume),
            PaneId::Macd => Some(IndicatorKind::Macd),
            PaneId::Force13 => Some(IndicatorKind::Force13),
            PaneId::Force2 => Some(IndicatorKind::Force2),
        }
    }
}

/// Relative height weights, keyed by pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaneWeights(BTreeMap<PaneId, f64>);

impl Default for PaneWeights {
    fn default() -> Self {
        Self(PaneId::iter().map(|pane| (pane, pane.default_weight())).collect())
    }
}

impl PaneWeights {
    /// Configured weight, or the pane default when missing or not positive
    pub fn weight(&self, pane: PaneId) -> f64 {
        self.0
            .get(&pane)
            .copied()
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or_else(|| pane.default_weight())
    }

    pub fn set(&mut self, pane: PaneId, weight: f64) {
        self.0.insert(pane, weight);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaneSpec {
    pub id: PaneId,
    pub weight: f64,
    pub visible: bool,
}

impl PaneSpec {
    /// Every pane in stack order with visibility taken from the `panes` list.
    /// The price pane is always visible.
    pub fn stack_for(configs: &IndicatorConfigSet, weights: &PaneWeights) -> Vec<PaneSpec> {
        PaneId::iter()
            .map(|id| PaneSpec {
                id,
                weight: weights.weight(id),
                visible: id.toggled_by().is_none_or(|kind| configs.is_kind_visible(kind)),
            })
            .collect()
    }
}

/// What forces a full surface rebuild when it changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneSetIdentity {
    pub symbol: String,
    pub timeframe: String,
    pub panes: Vec<PaneId>,
}

impl PaneSetIdentity {
    pub fn new(symbol: &str, timeframe: &str, specs: &[PaneSpec]) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            panes: specs.iter().filter(|s| s.visible).map(|s| s.id).collect(),
        }
    }
}
