use derive_more::{Deref, Display, From};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

use super::panes::PaneId;
use super::value_objects::{Color, LineStyle};
use crate::domain::errors::ChartResult;

/// Stable identity of a configured indicator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
#[serde(transparent)]
pub struct IndicatorId(String);

impl From<&str> for IndicatorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IndicatorCategory {
    #[default]
    Overlay,
    Pane,
    Signal,
}

/// Closed set of indicator kinds the engine knows how to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, AsRefStr, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum IndicatorKind {
    Ema,
    Sma,
    ValueZones,
    SafeZones,
    Bollinger,
    AtrStop,
    Guppy,
    Volume,
    Macd,
    Force13,
    Force2,
    ForceZones,
    MacdDivergence,
    ForceDivergence,
    ForceMarkers,
    GuppySignals,
    SrLevels,
}

/// Which candle markers a signal kind contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSource {
    ForceIndex,
    Guppy,
}

/// How a kind reaches the screen
#[derive(Debug, Clone, Copy)]
pub enum KindBinding {
    /// One registry-owned line per entry, reading the column built by `column`
    DynamicLine { pane: PaneId, column: fn(&IndicatorConfigEntry) -> Option<String> },
    /// Toggles series pre-declared when the pane is created
    Structural,
    /// Shows or hides a whole pane
    Pane(PaneId),
    Markers(MarkerSource),
    /// Host-supplied price levels drawn on the candle series
    PriceLines,
}

#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    pub kind: IndicatorKind,
    pub category: IndicatorCategory,
    pub binding: KindBinding,
}

impl KindDescriptor {
    fn build(kind: IndicatorKind) -> Self {
        use IndicatorKind::*;
        let (category, binding) = match kind {
            Ema | Sma => (
                IndicatorCategory::Overlay,
                KindBinding::DynamicLine { pane: PaneId::Price, column: windowed_column },
            ),
            ValueZones | SafeZones | Bollinger | AtrStop | Guppy => (IndicatorCategory::Overlay, KindBinding::Structural),
            Volume => (IndicatorCategory::Pane, KindBinding::Pane(PaneId::Volume)),
            Macd => (IndicatorCategory::Pane, KindBinding::Pane(PaneId::Macd)),
            Force13 => (IndicatorCategory::Pane, KindBinding::Pane(PaneId::Force13)),
            Force2 => (IndicatorCategory::Pane, KindBinding::Pane(PaneId::Force2)),
            ForceZones | MacdDivergence | ForceDivergence => (IndicatorCategory::Signal, KindBinding::Structural),
            ForceMarkers => (IndicatorCategory::Signal, KindBinding::Markers(MarkerSource::ForceIndex)),
            GuppySignals => (IndicatorCategory::Signal, KindBinding::Markers(MarkerSource::Guppy)),
            SrLevels => (IndicatorCategory::Overlay, KindBinding::PriceLines),
        };
        Self { kind, category, binding }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.binding, KindBinding::DynamicLine { .. })
    }
}

/// `ema` + window 13 reads column `ema_13`
fn windowed_column(entry: &IndicatorConfigEntry) -> Option<String> {
    let window = entry.window()?;
    Some(format!("{}_{}", entry.kind.as_ref(), format_parameter(window)))
}

/// `13.0` prints as `13`, `2.5` stays `2.5`
pub fn format_parameter(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 { format!("{}", value as i64) } else { format!("{}", value) }
}

static KIND_REGISTRY: Lazy<HashMap<IndicatorKind, KindDescriptor>> =
    Lazy::new(|| IndicatorKind::iter().map(|kind| (kind, KindDescriptor::build(kind))).collect());

impl IndicatorKind {
    pub fn descriptor(&self) -> &'static KindDescriptor {
        &KIND_REGISTRY[self]
    }
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConfigEntry {
    pub id: IndicatorId,
    /// Assigned from the list the entry arrives in
    #[serde(default)]
    pub category: IndicatorCategory,
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    #[serde(default, rename = "params", alias = "parameters")]
    pub parameters: BTreeMap<String, f64>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub line_style: Option<LineStyle>,
    #[serde(default)]
    pub line_width: Option<f32>,
    #[serde(default)]
    pub label: Option<String>,
}

impl IndicatorConfigEntry {
    pub fn new(id: impl Into<IndicatorId>, kind: IndicatorKind) -> Self {
        Self {
            id: id.into(),
            category: kind.descriptor().category,
            kind,
            parameters: BTreeMap::new(),
            visible: true,
            color: None,
            line_style: None,
            line_width: None,
            label: None,
        }
    }

    /// Moving average with the given window
    pub fn moving_average(id: impl Into<IndicatorId>, kind: IndicatorKind, window: u32) -> Self {
        Self::new(id, kind).with_parameter("window", window as f64)
    }

    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn window(&self) -> Option<f64> {
        self.parameters.get("window").copied().filter(|w| w.is_finite() && *w > 0.0)
    }

    /// Source column for dynamic lines
    pub fn column(&self) -> Option<String> {
        match self.kind.descriptor().binding {
            KindBinding::DynamicLine { column, .. } => column(self),
            _ => None,
        }
    }

    /// `EMA(13)` unless an explicit label is set
    pub fn display_label(&self) -> String {
        if let Some(label) = self.label.as_deref().filter(|l| !l.trim().is_empty()) {
            return label.to_string();
        }
        let tag = self.kind.as_ref().to_uppercase();
        match self.window() {
            Some(window) => format!("{}({})", tag, format_parameter(window)),
            None => tag,
        }
    }
}

/// The three toolbar lists, treated as read-only input
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfigSet {
    pub overlays: Vec<IndicatorConfigEntry>,
    pub panes: Vec<IndicatorConfigEntry>,
    pub signals: Vec<IndicatorConfigEntry>,
}

impl IndicatorConfigSet {
    pub fn new(
        overlays: Vec<IndicatorConfigEntry>,
        panes: Vec<IndicatorConfigEntry>,
        signals: Vec<IndicatorConfigEntry>,
    ) -> Self {
        Self { overlays, panes, signals }.normalized()
    }

    pub fn from_json(json: &str) -> ChartResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        Ok(set.normalized())
    }

    fn normalized(mut self) -> Self {
        for (list, category) in [
            (&mut self.overlays, IndicatorCategory::Overlay),
            (&mut self.panes, IndicatorCategory::Pane),
            (&mut self.signals, IndicatorCategory::Signal),
        ] {
            for entry in list.iter_mut() {
                entry.category = category;
            }
        }
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndicatorConfigEntry> + '_ {
        self.overlays.iter().chain(self.panes.iter()).chain(self.signals.iter())
    }

    pub fn find(&self, id: &IndicatorId) -> Option<&IndicatorConfigEntry> {
        self.entries().find(|entry| &entry.id == id)
    }

    /// Visibility of the first entry of `kind`; absent kinds are hidden
    pub fn is_kind_visible(&self, kind: IndicatorKind) -> bool {
        self.entries().find(|entry| entry.kind == kind).is_some_and(|entry| entry.visible)
    }

    /// Entries that own a dedicated line series
    pub fn dynamic_entries(&self) -> impl Iterator<Item = &IndicatorConfigEntry> + '_ {
        self.entries().filter(|entry| entry.kind.descriptor().is_dynamic())
    }

    /// Moving-average overlays shown in the price legend, in list order
    pub fn visible_overlays(&self) -> impl Iterator<Item = &IndicatorConfigEntry> + '_ {
        self.overlays.iter().filter(|entry| entry.visible && entry.kind.descriptor().is_dynamic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_kind() {
        for kind in IndicatorKind::iter() {
            assert_eq!(kind.descriptor().kind, kind);
        }
        assert!(IndicatorKind::Ema.descriptor().is_dynamic());
        assert!(!IndicatorKind::Bollinger.descriptor().is_dynamic());
    }

    #[test]
    fn column_name_encodes_kind_and_window() {
        let entry = IndicatorConfigEntry::moving_average("ema-13", IndicatorKind::Ema, 13);
        assert_eq!(entry.column().as_deref(), Some("ema_13"));
        assert_eq!(entry.display_label(), "EMA(13)");
        let unparameterized = IndicatorConfigEntry::new("sma", IndicatorKind::Sma);
        assert_eq!(unparameterized.column(), None);
    }

    #[test]
    fn parses_toolbar_json_and_stamps_categories() {
        let json = r##"{
            "overlays": [{"id": "ema-13", "type": "ema", "params": {"window": 13}, "color": "#f59e0b"}],
            "panes": [{"id": "vol", "type": "volume", "visible": false}],
            "signals": [{"id": "div", "type": "macdDivergence"}]
        }"##;
        let set = IndicatorConfigSet::from_json(json).unwrap();
        assert_eq!(set.overlays[0].category, IndicatorCategory::Overlay);
        assert_eq!(set.signals[0].category, IndicatorCategory::Signal);
        assert_eq!(set.overlays[0].color, Some(Color::from_hex(0xf59e0b)));
        assert!(!set.is_kind_visible(IndicatorKind::Volume));
        assert!(set.is_kind_visible(IndicatorKind::MacdDivergence));
        assert!(!set.is_kind_visible(IndicatorKind::Guppy));
    }

    #[test]
    fn sr_levels_entry_parses_alongside_moving_averages() {
        let json = r#"{
            "overlays": [
                {"id": "ema-13", "type": "ema", "params": {"window": 13}},
                {"id": "sr", "type": "srLevels", "visible": true}
            ]
        }"#;
        let set = IndicatorConfigSet::from_json(json).unwrap();
        assert_eq!(set.overlays.len(), 2);
        assert!(set.is_kind_visible(IndicatorKind::SrLevels));
        assert_eq!(set.dynamic_entries().count(), 1);
        assert_eq!(set.visible_overlays().map(|e| e.id.to_string()).collect::<Vec<_>>(), vec!["ema-13"]);
    }
}
