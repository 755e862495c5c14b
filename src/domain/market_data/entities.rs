use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::value_objects::{DivergenceAnnotation, Impulse, Ohlc, SrLevel, TimeKey};

/// Entity - one period of market data with precomputed indicator columns
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open", default)]
    pub open: Option<f64>,
    #[serde(rename = "High", default)]
    pub high: Option<f64>,
    #[serde(rename = "Low", default)]
    pub low: Option<f64>,
    #[serde(rename = "Close", default)]
    pub close: Option<f64>,
    #[serde(rename = "Volume", default)]
    pub volume: Option<f64>,
    /// Indicator columns named by convention (`ema_13`, `macd_diff`, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl TimeSeriesRecord {
    pub fn new(date: impl Into<String>) -> Self {
        Self { date: date.into(), ..Default::default() }
    }

    pub fn with_ohlcv(mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.close = Some(close);
        self.volume = Some(volume);
        self
    }

    /// Sets a numeric column. Non-finite values are stored as null.
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        let value = serde_json::Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null);
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn time_key(&self) -> Option<TimeKey> {
        TimeKey::from_date(&self.date)
    }

    /// Numeric lookup. Null, non-numeric, and non-finite values are absent.
    pub fn field(&self, name: &str) -> Option<f64> {
        let raw = match name {
            "Open" => self.open,
            "High" => self.high,
            "Low" => self.low,
            "Close" => self.close,
            "Volume" => self.volume,
            _ => match self.fields.get(name)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            },
        };
        raw.filter(|v| v.is_finite())
    }

    /// Truthy flag: `true` or any non-zero number
    pub fn flag(&self, name: &str) -> bool {
        match self.fields.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0 && v.is_finite()),
            _ => false,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn ohlc(&self) -> Option<Ohlc> {
        let ohlc = Ohlc::new(self.open?, self.high?, self.low?, self.close?);
        ohlc.is_finite().then_some(ohlc)
    }

    pub fn impulse(&self) -> Option<Impulse> {
        self.text("impulse").and_then(|s| Impulse::from_str(s).ok())
    }

    /// Copy with OHLC replaced by values reported from a series lookup
    pub fn with_ohlc_override(&self, ohlc: Ohlc) -> Self {
        Self {
            open: Some(ohlc.open),
            high: Some(ohlc.high),
            low: Some(ohlc.low),
            close: Some(ohlc.close),
            ..self.clone()
        }
    }
}

/// Deduplicated, time-keyed view over a record slice
#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    rows: Vec<(TimeKey, usize)>,
}

impl TimeIndex {
    /// Single pass; records sharing a key after truncation are dropped, first wins.
    pub fn build(records: &[TimeSeriesRecord]) -> Self {
        let mut seen = std::collections::HashSet::new();
        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let Some(key) = record.time_key() else { continue };
            if seen.insert(key.clone()) {
                rows.push((key, idx));
            }
        }
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&TimeKey, usize)> + '_ {
        self.rows.iter().map(|(key, idx)| (key, *idx))
    }

    pub fn last(&self) -> Option<(&TimeKey, usize)> {
        self.rows.last().map(|(key, idx)| (key, *idx))
    }

    /// Logical position of a key on the shared axis
    pub fn position(&self, key: &TimeKey) -> Option<usize> {
        self.rows.binary_search_by(|(k, _)| k.cmp(key)).ok()
    }

    /// Record index for the nearest key at or before `key`, else the first row.
    pub fn nearest(&self, key: &TimeKey) -> Option<usize> {
        let row = match self.rows.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(exact) => exact,
            Err(0) => 0,
            Err(insert_at) => insert_at - 1,
        };
        self.rows.get(row).map(|(_, idx)| *idx)
    }
}

/// Divergence annotations supplied alongside the series
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceSet {
    #[serde(default)]
    pub macd_divergence: Option<DivergenceAnnotation>,
    #[serde(default, rename = "f13Divergence")]
    pub force_divergence: Option<DivergenceAnnotation>,
}

/// Everything the host hands the engine for one symbol/timeframe
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInput {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default, alias = "data")]
    pub records: Vec<TimeSeriesRecord>,
    #[serde(default)]
    pub divergences: DivergenceSet,
    #[serde(default, alias = "sr_levels")]
    pub sr_levels: Vec<SrLevel>,
}

impl ChartInput {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, records: Vec<TimeSeriesRecord>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            records,
            divergences: DivergenceSet::default(),
            sr_levels: Vec::new(),
        }
    }

    pub fn with_sr_levels(mut self, levels: Vec<SrLevel>) -> Self {
        self.sr_levels = levels;
        self
    }

    pub fn with_divergences(mut self, divergences: DivergenceSet) -> Self {
        self.divergences = divergences;
        self
    }
}
