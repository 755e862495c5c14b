use derive_more::{Constructor, Deref, Display, From};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Value Object - truncated date used to align every pane on one time axis
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
#[serde(transparent)]
pub struct TimeKey(String);

impl TimeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a raw record date: everything before the `T` (or space) separator.
    pub fn from_date(date: &str) -> Option<Self> {
        let day = date
            .split(|c: char| c == 'T' || c == ' ')
            .next()
            .map(str::trim)
            .unwrap_or_default();
        if day.is_empty() { None } else { Some(Self(day.to_string())) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TimeKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Value Object - open/high/low/close quadruple
#[derive(Debug, Clone, Copy, PartialEq, Constructor, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close].iter().all(|v| v.is_finite())
    }

    /// Falling or flat candle
    pub fn is_down(&self) -> bool {
        self.open >= self.close
    }
}

/// Momentum state that drives candle coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Impulse {
    Green,
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DivergenceType {
    #[display(fmt = "bearish")]
    Bearish,
    #[display(fmt = "bullish")]
    Bullish,
}

/// Value Object - two raw record indices flagged as a divergence pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceAnnotation {
    pub idx1: usize,
    pub idx2: usize,
    #[serde(rename = "type")]
    pub kind: DivergenceType,
}

impl DivergenceAnnotation {
    pub fn new(idx1: usize, idx2: usize, kind: DivergenceType) -> Self {
        Self { idx1, idx2, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SrLevelType {
    #[display(fmt = "SUPPORT")]
    Support,
    #[display(fmt = "RESISTANCE")]
    Resistance,
    /// Missing or unrecognized tag
    #[default]
    #[serde(other)]
    #[display(fmt = "SR")]
    Unknown,
}

/// Value Object - one support or resistance price supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrLevel {
    pub price: f64,
    #[serde(rename = "type", default)]
    pub kind: SrLevelType,
}

impl SrLevel {
    pub fn new(price: f64, kind: SrLevelType) -> Self {
        Self { price, kind }
    }
}

/// Indicator a divergence is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, AsRefStr)]
pub enum DivergenceSource {
    Macd,
    ForceIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_key_truncates_at_separator() {
        assert_eq!(TimeKey::from_date("2024-03-01T00:00:00").unwrap().as_str(), "2024-03-01");
        assert_eq!(TimeKey::from_date("2024-03-01 09:30").unwrap().as_str(), "2024-03-01");
        assert_eq!(TimeKey::from_date("2024-03-01").unwrap().as_str(), "2024-03-01");
        assert!(TimeKey::from_date("").is_none());
        assert!(TimeKey::from_date("T10:00").is_none());
    }

    #[test]
    fn sr_levels_tolerate_unknown_tags() {
        let levels: Vec<SrLevel> =
            serde_json::from_str(r#"[{"price": 101.5, "type": "resistance"}, {"price": 90, "type": "pivot"}, {"price": 80}]"#)
                .unwrap();
        assert_eq!(levels[0], SrLevel::new(101.5, SrLevelType::Resistance));
        assert_eq!(levels[1].kind, SrLevelType::Unknown);
        assert_eq!(levels[2].kind.to_string(), "SR");
    }

    #[test]
    fn time_keys_order_chronologically() {
        assert!(TimeKey::from("2023-12-31") < TimeKey::from("2024-01-01"));
    }
}
