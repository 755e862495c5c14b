//! Projects records into per-series point sets and pushes them to surfaces.

use crate::domain::{
    chart::{
        BarColoring, CandlePoint, Color, IndicatorConfigSet, IndicatorKind, LineStyle, MarkerPosition, MarkerShape,
        PriceLine, Projection, SeriesData, SeriesMarker, SeriesOptions, ValuePoint,
    },
    errors::ChartError,
    logging::LogComponent,
    market_data::{
        ChartInput, DivergenceAnnotation, DivergenceSource, DivergenceType, Impulse, SrLevelType, TimeIndex, TimeKey,
        TimeSeriesRecord,
    },
};
use crate::{log_debug, log_warn};

use super::pane_manager::PaneSet;
use super::series_registry::SeriesRegistry;

/// Input and configuration of the current mount
#[derive(Debug, Clone, Default)]
pub struct ChartContext {
    pub input: ChartInput,
    pub index: TimeIndex,
    pub configs: IndicatorConfigSet,
}

impl ChartContext {
    pub fn new(input: ChartInput, configs: IndicatorConfigSet) -> Self {
        let index = TimeIndex::build(&input.records);
        Self { input, index, configs }
    }

    pub fn replace_input(&mut self, input: ChartInput) {
        self.index = TimeIndex::build(&input.records);
        self.input = input;
    }

    pub fn records(&self) -> &[TimeSeriesRecord] {
        &self.input.records
    }

    pub fn latest_record(&self) -> Option<&TimeSeriesRecord> {
        self.index.last().and_then(|(_, idx)| self.input.records.get(idx))
    }

    /// Record under the pointer: exact key, else the nearest earlier one
    pub fn resolve(&self, time: &TimeKey) -> Option<&TimeSeriesRecord> {
        self.index.nearest(time).and_then(|idx| self.input.records.get(idx))
    }
}

#[derive(Debug, Default)]
pub struct BindReport {
    pub bound: usize,
    /// Hidden or unreachable handles left stale
    pub deferred: usize,
    pub failures: Vec<ChartError>,
}

/// Candle body color from the momentum state
pub fn impulse_color(impulse: Option<Impulse>) -> Color {
    match impulse {
        Some(Impulse::Green) => Color::UP,
        Some(Impulse::Red) => Color::DOWN,
        _ => Color::NEUTRAL,
    }
}

fn bar_color(coloring: &BarColoring, value: f64, record: &TimeSeriesRecord) -> Color {
    match coloring {
        BarColoring::BySign { positive, negative } => {
            if value >= 0.0 {
                *positive
            } else {
                *negative
            }
        }
        BarColoring::ByCandleDirection { up, down } => match (record.open, record.close) {
            (Some(open), Some(close)) if close < open => *down,
            _ => *up,
        },
    }
}

/// Appends the point `record` contributes to `buffer`, if any
fn project_row(projection: &Projection, time: &TimeKey, record: &TimeSeriesRecord, buffer: &mut SeriesData) {
    match (projection, buffer) {
        (Projection::Candles, SeriesData::Candles(points)) => {
            if let Some(ohlc) = record.ohlc() {
                points.push(CandlePoint { time: time.clone(), ohlc, color: Some(impulse_color(record.impulse())) });
            }
        }
        (Projection::Line { column }, SeriesData::Values(points)) => {
            if let Some(value) = record.field(column) {
                points.push(ValuePoint { time: time.clone(), value, color: None });
            }
        }
        (Projection::Histogram { column, coloring }, SeriesData::Values(points)) => {
            if let Some(value) = record.field(column) {
                points.push(ValuePoint { time: time.clone(), value, color: Some(bar_color(coloring, value, record)) });
            }
        }
        (Projection::Anchor, SeriesData::Values(points)) => {
            points.push(ValuePoint { time: time.clone(), value: 0.0, color: None });
        }
        _ => {}
    }
}

/// Two-point divergence leg, ordered by time. Empty when the annotation is
/// absent or any endpoint cannot be resolved.
pub fn divergence_line(
    records: &[TimeSeriesRecord],
    annotation: Option<&DivergenceAnnotation>,
    source: DivergenceSource,
    on_price: bool,
) -> Vec<ValuePoint> {
    let Some(annotation) = annotation else { return Vec::new() };
    let endpoint = |idx: usize| -> Option<ValuePoint> {
        let record = records.get(idx)?;
        let value = if on_price {
            match annotation.kind {
                DivergenceType::Bearish => record.high,
                DivergenceType::Bullish => record.low,
            }
            .filter(|v| v.is_finite())
        } else {
            match source {
                DivergenceSource::Macd => record.field("macd_diff"),
                DivergenceSource::ForceIndex => record.field("efi_truncated").or_else(|| record.field("efi")),
            }
        }?;
        Some(ValuePoint { time: record.time_key()?, value, color: None })
    };
    let (Some(first), Some(second)) = (endpoint(annotation.idx1), endpoint(annotation.idx2)) else {
        return Vec::new();
    };
    match first.time.cmp(&second.time) {
        std::cmp::Ordering::Less => vec![first, second],
        std::cmp::Ordering::Greater => vec![second, first],
        std::cmp::Ordering::Equal => Vec::new(),
    }
}

fn divergence_color(annotation: Option<&DivergenceAnnotation>) -> Option<Color> {
    annotation.map(|a| match a.kind {
        DivergenceType::Bearish => Color::DOWN,
        DivergenceType::Bullish => Color::UP,
    })
}

/// Pushes data into every enabled stale handle in one pass over the rows.
/// A failing series is reported and stays stale; the rest still bind.
pub fn bind_stale(ctx: &ChartContext, registry: &mut SeriesRegistry, panes: &PaneSet) -> BindReport {
    let mut report = BindReport::default();
    let mut targets = Vec::new();
    for handle in registry.handles_mut() {
        if !handle.stale {
            continue;
        }
        if handle.enabled {
            let buffer = SeriesData::empty_for(handle.kind);
            targets.push((handle, buffer));
        } else {
            report.deferred += 1;
        }
    }
    if targets.is_empty() {
        return report;
    }

    for (time, idx) in ctx.index.rows() {
        let Some(record) = ctx.input.records.get(idx) else { continue };
        for (handle, buffer) in targets.iter_mut() {
            project_row(&handle.projection, time, record, buffer);
        }
    }

    for (handle, mut data) in targets {
        if let Projection::Divergence { source, on_price } = handle.projection {
            let annotation = match source {
                DivergenceSource::Macd => ctx.input.divergences.macd_divergence.as_ref(),
                DivergenceSource::ForceIndex => ctx.input.divergences.force_divergence.as_ref(),
            };
            data = SeriesData::Values(divergence_line(ctx.records(), annotation, source, on_price));
            if let Some(color) = divergence_color(annotation).filter(|c| handle.options.color != Some(*c)) {
                let recolored = SeriesOptions { color: Some(color), ..handle.options.clone() };
                match panes.with_surface(handle.pane, |surface| surface.apply_series_options(handle.id, &recolored)) {
                    Some(Ok(())) => handle.options = recolored,
                    Some(Err(err)) => {
                        log_warn!(LogComponent::Application("DataBinder"), "recolor of {} failed: {}", handle.id, err);
                    }
                    None => {}
                }
            }
        }

        match panes.with_surface(handle.pane, |surface| surface.set_series_data(handle.id, &data)) {
            Some(Ok(())) => {
                handle.stale = false;
                report.bound += 1;
            }
            Some(Err(err)) => {
                log_warn!(
                    LogComponent::Application("DataBinder"),
                    "series {} on '{}' rejected {} points: {}",
                    handle.id,
                    handle.pane,
                    data.len(),
                    err
                );
                report.failures.push(ChartError::SeriesData { series: handle.id, reason: err.to_string() });
            }
            None => {
                report.deferred += 1;
            }
        }
    }

    log_debug!(
        LogComponent::Application("DataBinder"),
        "bound {} series over {} rows ({} deferred, {} failed)",
        report.bound,
        ctx.index.len(),
        report.deferred,
        report.failures.len()
    );
    report
}

/// Candle markers for the enabled signal kinds, one per time key.
/// Force markers win over Guppy markers on the same bar.
pub fn build_markers(ctx: &ChartContext) -> Vec<SeriesMarker> {
    let force = ctx.configs.is_kind_visible(IndicatorKind::ForceMarkers);
    let guppy = ctx.configs.is_kind_visible(IndicatorKind::GuppySignals);
    if !force && !guppy {
        return Vec::new();
    }
    let mut markers = Vec::new();
    for (time, idx) in ctx.index.rows() {
        let Some(record) = ctx.input.records.get(idx) else { continue };
        let marker = |position, shape, color, text: &str| SeriesMarker {
            time: time.clone(),
            position,
            shape,
            color,
            text: text.to_string(),
        };
        if force && record.flag("efi_buy_signal") {
            markers.push(marker(MarkerPosition::BelowBar, MarkerShape::ArrowUp, Color::UP, "E"));
        } else if force && record.flag("efi_sell_signal") {
            markers.push(marker(MarkerPosition::AboveBar, MarkerShape::ArrowDown, Color::DOWN, "E"));
        } else if guppy {
            match record.field("guppy_signal") {
                Some(v) if v == 1.0 => {
                    markers.push(marker(MarkerPosition::BelowBar, MarkerShape::ArrowUp, Color::from_hex(0x60a5fa), "G"))
                }
                Some(v) if v == -1.0 => markers.push(marker(
                    MarkerPosition::AboveBar,
                    MarkerShape::ArrowDown,
                    Color::from_hex(0xf87171),
                    "G",
                )),
                _ => {}
            }
        }
    }
    markers
}

/// Replaces the candle markers. Returns the marker count.
pub fn bind_markers(ctx: &ChartContext, registry: &SeriesRegistry, panes: &PaneSet) -> usize {
    let Some(candles) = registry.candles() else { return 0 };
    let markers = build_markers(ctx);
    match panes.with_surface(candles.pane, |surface| surface.set_markers(candles.id, &markers)) {
        Some(Ok(())) => markers.len(),
        Some(Err(err)) => {
            log_warn!(LogComponent::Application("DataBinder"), "markers rejected: {}", err);
            0
        }
        None => 0,
    }
}

/// Support and resistance levels as candle price lines, empty while the
/// `srLevels` entry is hidden or absent
pub fn build_price_lines(ctx: &ChartContext) -> Vec<PriceLine> {
    if !ctx.configs.is_kind_visible(IndicatorKind::SrLevels) {
        return Vec::new();
    }
    ctx.input
        .sr_levels
        .iter()
        .filter(|level| level.price.is_finite())
        .map(|level| PriceLine {
            price: level.price,
            color: if level.kind == SrLevelType::Resistance { Color::DOWN } else { Color::UP },
            line_width: 1.5,
            line_style: LineStyle::Dotted,
            title: level.kind.to_string(),
        })
        .collect()
}

/// Replaces the candle price lines. Returns the line count.
pub fn bind_price_lines(ctx: &ChartContext, registry: &SeriesRegistry, panes: &PaneSet) -> usize {
    let Some(candles) = registry.candles() else { return 0 };
    let lines = build_price_lines(ctx);
    match panes.with_surface(candles.pane, |surface| surface.set_price_lines(candles.id, &lines)) {
        Some(Ok(())) => lines.len(),
        Some(Err(err)) => {
            log_warn!(LogComponent::Application("DataBinder"), "price lines rejected: {}", err);
            0
        }
        None => 0,
    }
}
