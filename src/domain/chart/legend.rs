use serde::{Deserialize, Serialize};

use super::panes::PaneId;
use super::value_objects::Color;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendSpan {
    pub text: String,
    pub color: Color,
}

impl LegendSpan {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self { text: text.into(), color }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegendLine {
    pub spans: Vec<LegendSpan>,
}

impl LegendLine {
    pub fn push(&mut self, text: impl Into<String>, color: Color) {
        self.spans.push(LegendSpan::new(text, color));
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}

/// Legend block drawn in a pane's top-left corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneLegend {
    pub pane: PaneId,
    pub lines: Vec<LegendLine>,
}

impl PaneLegend {
    pub fn new(pane: PaneId) -> Self {
        Self { pane, lines: Vec::new() }
    }

    pub fn text(&self) -> String {
        self.lines.iter().map(LegendLine::text).collect::<Vec<_>>().join("\n")
    }
}
