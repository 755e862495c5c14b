use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use super::indicators::IndicatorKind;
use super::panes::PaneId;
use super::value_objects::{Color, LineStyle, PriceFormat};
use crate::domain::errors::{SurfaceError, SurfaceResult};
use crate::domain::market_data::{DivergenceSource, Ohlc, TimeKey};

/// Identity of a series inside a surface, allocated by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize)]
#[display(fmt = "#{}", _0)]
pub struct SeriesId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Serialize, Deserialize)]
pub enum SeriesKind {
    Candlestick,
    Line,
    Histogram,
}

/// Visual options applied without touching data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesOptions {
    pub color: Option<Color>,
    pub line_width: f32,
    pub line_style: LineStyle,
    pub visible: bool,
    pub last_value_visible: bool,
    pub price_line_visible: bool,
    pub crosshair_marker_visible: bool,
    pub price_format: PriceFormat,
    /// Horizontal reference line drawn at this value
    pub baseline: Option<f64>,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            color: None,
            line_width: 1.0,
            line_style: LineStyle::Solid,
            visible: true,
            last_value_visible: false,
            price_line_visible: false,
            crosshair_marker_visible: true,
            price_format: PriceFormat::default(),
            baseline: None,
        }
    }
}

impl SeriesOptions {
    pub fn line(color: Color, width: f32) -> Self {
        Self { color: Some(color), line_width: width, ..Default::default() }
    }

    /// Thin grey channel band
    pub fn band(opacity: f32, style: LineStyle) -> Self {
        Self {
            color: Some(Color::rgba(148, 163, 184, opacity)),
            line_style: style,
            crosshair_marker_visible: false,
            ..Default::default()
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.line_width = width;
        self
    }

    pub fn with_style(mut self, style: LineStyle) -> Self {
        self.line_style = style;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.crosshair_marker_visible = false;
        self
    }

    pub fn volume_format(mut self) -> Self {
        self.price_format = PriceFormat::Volume;
        self
    }

    pub fn with_baseline(mut self, value: f64) -> Self {
        self.baseline = Some(value);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub time: TimeKey,
    pub value: f64,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePoint {
    pub time: TimeKey,
    pub ohlc: Ohlc,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeriesData {
    Candles(Vec<CandlePoint>),
    Values(Vec<ValuePoint>),
}

impl SeriesData {
    pub fn empty_for(kind: SeriesKind) -> Self {
        match kind {
            SeriesKind::Candlestick => SeriesData::Candles(Vec::new()),
            SeriesKind::Line | SeriesKind::Histogram => SeriesData::Values(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SeriesData::Candles(points) => points.len(),
            SeriesData::Values(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn times(&self) -> Vec<&TimeKey> {
        match self {
            SeriesData::Candles(points) => points.iter().map(|p| &p.time).collect(),
            SeriesData::Values(points) => points.iter().map(|p| &p.time).collect(),
        }
    }

    pub fn value_at(&self, time: &TimeKey) -> Option<PointValue> {
        match self {
            SeriesData::Candles(points) => points
                .binary_search_by(|p| p.time.cmp(time))
                .ok()
                .map(|i| PointValue::Ohlc(points[i].ohlc)),
            SeriesData::Values(points) => points
                .binary_search_by(|p| p.time.cmp(time))
                .ok()
                .map(|i| PointValue::Value(points[i].value)),
        }
    }

    /// Strictly ascending times and finite values, the contract every surface enforces
    pub fn validate(&self) -> SurfaceResult<()> {
        let mut previous: Option<&TimeKey> = None;
        let check_order = |time: &TimeKey, previous: Option<&TimeKey>| match previous {
            Some(prev) if prev >= time => Err(SurfaceError::OutOfOrder(time.clone())),
            _ => Ok(()),
        };
        match self {
            SeriesData::Candles(points) => {
                for point in points {
                    check_order(&point.time, previous)?;
                    if !point.ohlc.is_finite() {
                        return Err(SurfaceError::InvalidPoint {
                            time: point.time.clone(),
                            reason: "non-finite OHLC".to_string(),
                        });
                    }
                    previous = Some(&point.time);
                }
            }
            SeriesData::Values(points) => {
                for point in points {
                    check_order(&point.time, previous)?;
                    if !point.value.is_finite() {
                        return Err(SurfaceError::InvalidPoint {
                            time: point.time.clone(),
                            reason: "non-finite value".to_string(),
                        });
                    }
                    previous = Some(&point.time);
                }
            }
        }
        Ok(())
    }
}

/// Value a surface reports for a series under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointValue {
    Ohlc(Ohlc),
    Value(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMarker {
    pub time: TimeKey,
    pub position: MarkerPosition,
    pub shape: MarkerShape,
    pub color: Color,
    pub text: String,
}

/// Horizontal line at a fixed price across the whole pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub price: f64,
    pub color: Color,
    pub line_width: f32,
    pub line_style: LineStyle,
    pub title: String,
}

/// Upper/lower channel lines, 1 to 3 deviations out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, AsRefStr)]
pub enum BandLevel {
    H1,
    L1,
    H2,
    L2,
    H3,
    L3,
}

impl BandLevel {
    fn suffix(&self) -> &'static str {
        match self {
            BandLevel::H1 => "h1",
            BandLevel::L1 => "l1",
            BandLevel::H2 => "h2",
            BandLevel::L2 => "l2",
            BandLevel::H3 => "h3",
            BandLevel::L3 => "l3",
        }
    }

    fn options(&self) -> SeriesOptions {
        match self {
            BandLevel::H1 | BandLevel::L1 => SeriesOptions::band(0.15, LineStyle::Dashed),
            BandLevel::H2 | BandLevel::L2 => SeriesOptions::band(0.25, LineStyle::LargeDashed),
            BandLevel::H3 | BandLevel::L3 => SeriesOptions::band(0.6, LineStyle::Solid).with_width(1.5),
        }
    }
}

/// Fixed roles for series declared when a pane is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StructuralRole {
    Candles,
    Ema22,
    PriceBand(BandLevel),
    SafeZoneLong,
    SafeZoneShort,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    AtrStop,
    Guppy { long: bool, period: u16 },
    DivergencePrice(DivergenceSource),
    VolumeBars,
    VolumeSma,
    MacdHistogram,
    MacdSignal,
    ForceIndex13,
    ForceSignal,
    ForceBand(BandLevel),
    ForceIndex2,
    DivergenceIndicator(DivergenceSource),
    /// Invisible zero line giving the crosshair a vertical anchor
    Anchor,
}

/// Histogram bar coloring
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarColoring {
    BySign { positive: Color, negative: Color },
    ByCandleDirection { up: Color, down: Color },
}

/// How a series derives its points from a record
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Candles,
    Line { column: String },
    Histogram { column: String, coloring: BarColoring },
    Anchor,
    Divergence { source: DivergenceSource, on_price: bool },
    /// Configured indicator with no resolvable column
    Empty,
}

/// Pre-declared series for one pane
#[derive(Debug, Clone)]
pub struct StructuralDecl {
    pub role: StructuralRole,
    pub kind: SeriesKind,
    pub options: SeriesOptions,
    pub projection: Projection,
    /// Kind whose visibility gates this series; `None` is always on
    pub toggle: Option<IndicatorKind>,
}

impl StructuralDecl {
    fn line(role: StructuralRole, column: &str, options: SeriesOptions, toggle: Option<IndicatorKind>) -> Self {
        Self {
            role,
            kind: SeriesKind::Line,
            options,
            projection: Projection::Line { column: column.to_string() },
            toggle,
        }
    }

    fn divergence(source: DivergenceSource, on_price: bool) -> Self {
        let toggle = match source {
            DivergenceSource::Macd => IndicatorKind::MacdDivergence,
            DivergenceSource::ForceIndex => IndicatorKind::ForceDivergence,
        };
        let mut options = SeriesOptions::line(Color::DIVERGENCE, 2.0).quiet();
        if matches!(source, DivergenceSource::ForceIndex) && !on_price {
            options = options.volume_format();
        }
        Self {
            role: if on_price {
                StructuralRole::DivergencePrice(source)
            } else {
                StructuralRole::DivergenceIndicator(source)
            },
            kind: SeriesKind::Line,
            options,
            projection: Projection::Divergence { source, on_price },
            toggle: Some(toggle),
        }
    }

    fn anchor() -> Self {
        Self {
            role: StructuralRole::Anchor,
            kind: SeriesKind::Line,
            options: SeriesOptions::default().quiet().hidden(),
            projection: Projection::Anchor,
            toggle: None,
        }
    }
}

pub const GUPPY_SHORT: [u16; 6] = [3, 5, 8, 10, 12, 15];
pub const GUPPY_LONG: [u16; 6] = [30, 35, 40, 45, 50, 60];

/// Structural series every pane of the given kind starts with, in draw order
pub fn structural_layout(pane: PaneId) -> Vec<StructuralDecl> {
    use strum::IntoEnumIterator;
    use IndicatorKind as K;
    use StructuralRole as R;

    let mut decls = Vec::new();
    match pane {
        PaneId::Price => {
            decls.push(StructuralDecl {
                role: R::Candles,
                kind: SeriesKind::Candlestick,
                options: SeriesOptions::default(),
                projection: Projection::Candles,
                toggle: None,
            });
            decls.push(StructuralDecl::line(
                R::Ema22,
                "ema_22",
                SeriesOptions::line(Color::rgba(255, 255, 255, 0.4), 1.0),
                Some(K::ValueZones),
            ));
            for level in BandLevel::iter() {
                let column = format!("price_atr_{}", level.suffix());
                decls.push(StructuralDecl::line(R::PriceBand(level), &column, level.options(), Some(K::ValueZones)));
            }
            let safe = |color| SeriesOptions::line(color, 1.0).with_style(LineStyle::Dashed);
            decls.push(StructuralDecl::line(
                R::SafeZoneLong,
                "safezone_long",
                safe(Color::rgba(239, 68, 68, 0.7)),
                Some(K::SafeZones),
            ));
            decls.push(StructuralDecl::line(
                R::SafeZoneShort,
                "safezone_short",
                safe(Color::rgba(34, 197, 94, 0.7)),
                Some(K::SafeZones),
            ));
            let bb = |alpha| SeriesOptions::line(Color::rgba(34, 211, 238, alpha), 1.0).quiet();
            decls.push(StructuralDecl::line(R::BollingerUpper, "bb_upper", bb(0.6), Some(K::Bollinger)));
            decls.push(StructuralDecl::line(R::BollingerMiddle, "bb_middle", bb(0.8), Some(K::Bollinger)));
            decls.push(StructuralDecl::line(R::BollingerLower, "bb_lower", bb(0.6), Some(K::Bollinger)));
            decls.push(StructuralDecl::line(
                R::AtrStop,
                "volatility_stop",
                SeriesOptions::line(Color::from_hex(0xec4899), 2.0).quiet(),
                Some(K::AtrStop),
            ));
            for (long, periods, color) in [
                (false, GUPPY_SHORT, Color::rgba(59, 130, 246, 0.6)),
                (true, GUPPY_LONG, Color::rgba(239, 68, 68, 0.6)),
            ] {
                for period in periods {
                    let column = format!("guppy_{}_{}", if long { "long" } else { "short" }, period);
                    decls.push(StructuralDecl::line(
                        R::Guppy { long, period },
                        &column,
                        SeriesOptions::line(color, 1.0).quiet(),
                        Some(K::Guppy),
                    ));
                }
            }
            decls.push(StructuralDecl::divergence(DivergenceSource::Macd, true));
            decls.push(StructuralDecl::divergence(DivergenceSource::ForceIndex, true));
        }
        PaneId::Volume => {
            decls.push(StructuralDecl {
                role: R::VolumeBars,
                kind: SeriesKind::Histogram,
                options: SeriesOptions::default().volume_format(),
                projection: Projection::Histogram {
                    column: "Volume".to_string(),
                    coloring: BarColoring::ByCandleDirection {
                        up: Color::rgba(34, 197, 94, 0.3),
                        down: Color::rgba(239, 68, 68, 0.3),
                    },
                },
                toggle: None,
            });
            decls.push(StructuralDecl::line(
                R::VolumeSma,
                "volume_sma_20",
                SeriesOptions::line(Color::from_hex(0xf59e0b), 1.0).volume_format(),
                None,
            ));
        }
        PaneId::Macd => {
            decls.push(StructuralDecl {
                role: R::MacdHistogram,
                kind: SeriesKind::Histogram,
                options: SeriesOptions::default(),
                projection: Projection::Histogram {
                    column: "macd_diff".to_string(),
                    coloring: BarColoring::BySign {
                        positive: Color::rgba(34, 197, 94, 0.5),
                        negative: Color::rgba(239, 68, 68, 0.5),
                    },
                },
                toggle: None,
            });
            decls.push(StructuralDecl::line(
                R::MacdSignal,
                "macd_signal",
                SeriesOptions::line(Color::DOWN, 1.0).quiet(),
                None,
            ));
            decls.push(StructuralDecl::divergence(DivergenceSource::Macd, false));
        }
        PaneId::Force13 => {
            decls.push(StructuralDecl::line(
                R::ForceIndex13,
                "efi_truncated",
                SeriesOptions::line(Color::NEUTRAL, 2.5).volume_format().with_baseline(0.0),
                None,
            ));
            decls.push(StructuralDecl::line(
                R::ForceSignal,
                "efi_signal",
                SeriesOptions::line(Color::DOWN, 1.0).volume_format().quiet(),
                None,
            ));
            for level in BandLevel::iter() {
                let column = format!("efi_atr_{}", level.suffix());
                decls.push(StructuralDecl::line(
                    R::ForceBand(level),
                    &column,
                    level.options().volume_format(),
                    Some(K::ForceZones),
                ));
            }
            decls.push(StructuralDecl::divergence(DivergenceSource::ForceIndex, false));
        }
        PaneId::Force2 => {
            decls.push(StructuralDecl {
                role: R::ForceIndex2,
                kind: SeriesKind::Histogram,
                options: SeriesOptions::default().volume_format(),
                projection: Projection::Histogram {
                    column: "force_index_2".to_string(),
                    coloring: BarColoring::BySign {
                        positive: Color::rgba(34, 197, 94, 0.8),
                        negative: Color::rgba(239, 68, 68, 0.8),
                    },
                },
                toggle: None,
            });
        }
    }
    if pane != PaneId::Price {
        decls.push(StructuralDecl::anchor());
    }
    decls
}
