//! Pane geometry: bar index to pixel, price to pixel and axis ticks.
//!
//! Pure math kept apart from the canvas so it can be tested natively.

use crate::domain::chart::{ChartTheme, LogicalRange, PriceFormat};

/// Part of the pane where series are drawn, left of the price axis and
/// above the time axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub width: f64,
    pub height: f64,
}

impl PlotArea {
    pub fn new(width: u32, height: u32, theme: &ChartTheme, time_axis_visible: bool) -> Self {
        let axis_height = if time_axis_visible { theme.time_axis_height } else { 0 };
        Self {
            width: f64::from(width.saturating_sub(theme.price_axis_width)),
            height: f64::from(height.saturating_sub(axis_height)),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width && y < self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Horizontal mapping between logical bar indices and pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    range: LogicalRange,
    width: f64,
}

impl TimeScale {
    pub fn new(range: LogicalRange, width: f64) -> Self {
        Self { range, width }
    }

    pub fn range(&self) -> LogicalRange {
        self.range
    }

    /// Pixels per bar
    pub fn bar_spacing(&self) -> f64 {
        let span = self.range.span();
        if span <= 0.0 { self.width.max(1.0) } else { self.width / span }
    }

    pub fn index_to_x(&self, index: f64) -> f64 {
        (index - self.range.from) * self.bar_spacing()
    }

    pub fn x_to_index(&self, x: f64) -> f64 {
        self.range.from + x / self.bar_spacing()
    }

    /// Bar under `x`, clamped to the data
    pub fn nearest_bar(&self, x: f64, bars: usize) -> Option<usize> {
        if bars == 0 || !x.is_finite() {
            return None;
        }
        let index = self.x_to_index(x).round();
        Some(index.clamp(0.0, (bars - 1) as f64) as usize)
    }

    /// Indices of bars at least partly on screen
    pub fn visible_bars(&self, bars: usize) -> std::ops::Range<usize> {
        if bars == 0 {
            return 0..0;
        }
        let first = (self.range.from.floor() - 1.0).max(0.0) as usize;
        let last = ((self.range.to.ceil() + 1.0).max(0.0) as usize).min(bars - 1);
        if first > last { 0..0 } else { first..last + 1 }
    }

    /// Candle body width: 80% of the spacing, at least one pixel
    pub fn body_width(&self) -> f64 {
        (self.bar_spacing() * 0.8).max(1.0)
    }
}

/// Vertical mapping fitted to the values on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScale {
    min: f64,
    max: f64,
    height: f64,
}

impl PriceScale {
    const MARGIN: f64 = 0.1;

    /// Fits the finite values with a 10% margin on both ends.
    /// `None` when nothing finite is given.
    pub fn fit(values: impl IntoIterator<Item = f64>, height: f64) -> Option<Self> {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if min > max {
            return None;
        }
        let span = max - min;
        let pad = if span > 0.0 { span * Self::MARGIN } else { min.abs().max(1.0) * Self::MARGIN };
        Some(Self { min: min - pad, max: max + pad, height })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn to_y(&self, value: f64) -> f64 {
        self.height - (value - self.min) / (self.max - self.min) * self.height
    }

    pub fn from_y(&self, y: f64) -> f64 {
        self.min + (self.height - y) / self.height * (self.max - self.min)
    }

    pub fn ticks(&self, target: usize) -> Vec<f64> {
        axis_ticks(self.min, self.max, target)
    }
}

/// Round tick values (1, 2 or 5 times a power of ten) inside `[min, max]`
pub fn axis_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min || target == 0 {
        return Vec::new();
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Axis label for a tick, trimming noise below the tick step
pub fn axis_label(value: f64, format: PriceFormat) -> String {
    // -0.00 reads badly on an axis
    let value = if value.abs() < 1e-12 { 0.0 } else { value };
    format.format(value)
}

/// Every n-th bar gets a time label so labels are at least `min_gap` px apart
pub fn time_label_stride(bar_spacing: f64, min_gap: f64) -> usize {
    if bar_spacing <= 0.0 || !bar_spacing.is_finite() {
        return 1;
    }
    ((min_gap / bar_spacing).ceil() as usize).max(1)
}
