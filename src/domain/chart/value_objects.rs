use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, EnumIter, EnumString};

/// Value Object - Color, serialized as a CSS color string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb(((hex >> 16) & 0xFF) as u8, ((hex >> 8) & 0xFF) as u8, (hex & 0xFF) as u8)
    }

    pub fn to_hex(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub fn with_alpha(&self, alpha: f32) -> Self {
        Self { a: alpha.clamp(0.0, 1.0), ..*self }
    }

    /// Parses `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)` and `rgba(..)`.
    pub fn parse(css: &str) -> Option<Self> {
        let css = css.trim();
        if let Some(hex) = css.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let (body, has_alpha) = if let Some(body) = css.strip_prefix("rgba(") {
            (body, true)
        } else if let Some(body) = css.strip_prefix("rgb(") {
            (body, false)
        } else {
            return None;
        };
        let parts: Vec<&str> = body.strip_suffix(')')?.split(',').map(str::trim).collect();
        let channel = |s: &str| s.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
        match (parts.as_slice(), has_alpha) {
            ([r, g, b], false) => Some(Self::rgb(channel(r)?, channel(g)?, channel(b)?)),
            ([r, g, b, a], true) => {
                let alpha = a.parse::<f32>().ok()?;
                Some(Self::rgba(channel(r)?, channel(g)?, channel(b)?, alpha.clamp(0.0, 1.0)))
            }
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)? as f32 / 255.0)),
            _ => None,
        }
    }

    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0.0);
    pub const UP: Color = Color::from_hex(0x22c55e);
    pub const DOWN: Color = Color::from_hex(0xef4444);
    pub const NEUTRAL: Color = Color::from_hex(0x60a5fa);
    pub const MUTED: Color = Color::from_hex(0x9ca3af);
    pub const DIVERGENCE: Color = Color::rgba(255, 165, 0, 0.8);
}

impl From<u32> for Color {
    fn from(hex: u32) -> Self {
        Self::from_hex(hex)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", raw)))
    }
}

/// Value Object - horizontal extent in bar-index units shared by all panes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogicalRange {
    pub from: f64,
    pub to: f64,
}

impl LogicalRange {
    /// Rejects non-finite or inverted bounds
    pub fn new(from: f64, to: f64) -> Option<Self> {
        (from.is_finite() && to.is_finite() && from <= to).then_some(Self { from, to })
    }

    pub fn span(&self) -> f64 {
        self.to - self.from
    }

    /// Zoom around `anchor`; factor > 1 zooms in
    pub fn zoom(&self, factor: f64, anchor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return *self;
        }
        let ratio = if self.span() > 0.0 { (anchor - self.from) / self.span() } else { 0.5 };
        let span = (self.span() / factor).max(2.0);
        let from = anchor - span * ratio;
        Self { from, to: from + span }
    }

    pub fn pan(&self, delta_bars: f64) -> Self {
        Self { from: self.from + delta_bars, to: self.to + delta_bars }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dotted,
    Dashed,
    LargeDashed,
}

impl LineStyle {
    /// Canvas dash pattern in pixels
    pub fn dash_pattern(&self) -> &'static [f64] {
        match self {
            LineStyle::Solid => &[],
            LineStyle::Dotted => &[1.0, 2.0],
            LineStyle::Dashed => &[4.0, 4.0],
            LineStyle::LargeDashed => &[8.0, 6.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceFormat {
    Price { precision: u8 },
    Volume,
}

impl Default for PriceFormat {
    fn default() -> Self {
        PriceFormat::Price { precision: 2 }
    }
}

impl PriceFormat {
    pub fn format(&self, value: f64) -> String {
        match self {
            PriceFormat::Price { precision } => format!("{:.*}", *precision as usize, value),
            PriceFormat::Volume => format_compact(value),
        }
    }
}

/// `1.23M`, `45.6K`, `12.00`
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

/// Shared look of every pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartTheme {
    pub background: Color,
    pub text: Color,
    pub grid: Color,
    pub border: Color,
    pub crosshair: Color,
    pub crosshair_label: Color,
    pub up: Color,
    pub down: Color,
    /// Fixed right axis width so stacked axes line up
    pub price_axis_width: u32,
    pub time_axis_height: u32,
    pub font: String,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0x111827),
            text: Color::rgba(255, 255, 255, 0.9),
            grid: Color::rgba(197, 203, 206, 0.05),
            border: Color::rgba(197, 203, 206, 0.1),
            crosshair: Color::rgba(255, 255, 255, 0.75),
            crosshair_label: Color::from_hex(0x4f46e5),
            up: Color::UP,
            down: Color::DOWN,
            price_axis_width: 95,
            time_axis_height: 26,
            font: "11px sans-serif".to_string(),
        }
    }
}
