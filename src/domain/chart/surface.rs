//! Rendering-surface port. One surface draws one pane; the engine never
//! touches a concrete chart library directly.

use std::rc::Rc;

use super::legend::PaneLegend;
use super::panes::PaneId;
use super::series::{PointValue, PriceLine, SeriesData, SeriesId, SeriesKind, SeriesMarker, SeriesOptions};
use super::value_objects::{ChartTheme, LogicalRange};
use crate::domain::errors::SurfaceResult;
use crate::domain::market_data::TimeKey;

/// Creation parameters for one pane surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub pane: PaneId,
    pub stack_index: usize,
    pub theme: ChartTheme,
    pub width: u32,
    pub height: u32,
    /// Only the bottom pane shows time labels
    pub time_axis_visible: bool,
    pub crosshair_time_label_visible: bool,
    pub horz_line_visible: bool,
}

pub trait Surface {
    fn pane(&self) -> PaneId;

    fn add_series(&mut self, kind: SeriesKind, options: &SeriesOptions) -> SurfaceResult<SeriesId>;
    fn remove_series(&mut self, series: SeriesId);
    fn apply_series_options(&mut self, series: SeriesId, options: &SeriesOptions) -> SurfaceResult<()>;
    /// Replaces the series data. On error the previous data stays in place.
    fn set_series_data(&mut self, series: SeriesId, data: &SeriesData) -> SurfaceResult<()>;
    fn set_markers(&mut self, series: SeriesId, markers: &[SeriesMarker]) -> SurfaceResult<()>;
    /// Replaces every price line attached to `series`
    fn set_price_lines(&mut self, series: SeriesId, lines: &[PriceLine]) -> SurfaceResult<()>;

    fn visible_logical_range(&self) -> Option<LogicalRange>;
    fn set_visible_logical_range(&mut self, range: LogicalRange);
    fn fit_content(&mut self);

    /// Vertical crosshair at `time`, anchored on `anchor`
    fn set_crosshair_position(&mut self, time: &TimeKey, anchor: SeriesId);
    fn clear_crosshair_position(&mut self);
    fn set_horz_line_visible(&mut self, visible: bool);

    fn resize(&mut self, width: u32, height: u32);
    fn set_legend(&mut self, legend: &PaneLegend);
    fn snapshot(&mut self) -> SurfaceResult<PaneImage>;
    /// Unsubscribes every listener and releases the surface. Must not emit events.
    fn dispose(&mut self);
}

pub trait SurfaceFactory {
    fn create(&mut self, config: &SurfaceConfig, events: SurfaceEventSink) -> SurfaceResult<Box<dyn Surface>>;
}

/// Pointer position reported by a surface
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointerEvent {
    /// `None` when the pointer left the plotting area
    pub time: Option<TimeKey>,
    /// Values of this surface's own series at `time`
    pub series_values: Vec<(SeriesId, PointValue)>,
}

impl PointerEvent {
    pub fn at(time: TimeKey) -> Self {
        Self { time: Some(time), series_values: Vec::new() }
    }

    pub fn left() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, series: SeriesId, value: PointValue) -> Self {
        self.series_values.push((series, value));
        self
    }

    pub fn value_of(&self, series: SeriesId) -> Option<PointValue> {
        self.series_values.iter().find(|(id, _)| *id == series).map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEventKind {
    VisibleRangeChanged(Option<LogicalRange>),
    PointerMoved(PointerEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEvent {
    pub pane: PaneId,
    pub kind: SurfaceEventKind,
}

/// Where a surface sends its interaction events
#[derive(Clone)]
pub struct SurfaceEventSink {
    pane: PaneId,
    handler: Option<Rc<dyn Fn(SurfaceEvent)>>,
}

impl SurfaceEventSink {
    pub fn new(pane: PaneId, handler: Rc<dyn Fn(SurfaceEvent)>) -> Self {
        Self { pane, handler: Some(handler) }
    }

    /// Sink that drops everything
    pub fn detached(pane: PaneId) -> Self {
        Self { pane, handler: None }
    }

    pub fn pane(&self) -> PaneId {
        self.pane
    }

    pub fn emit(&self, kind: SurfaceEventKind) {
        if let Some(handler) = &self.handler {
            handler(SurfaceEvent { pane: self.pane, kind });
        }
    }

    pub fn range_changed(&self, range: Option<LogicalRange>) {
        self.emit(SurfaceEventKind::VisibleRangeChanged(range));
    }

    pub fn pointer_moved(&self, pointer: PointerEvent) {
        self.emit(SurfaceEventKind::PointerMoved(pointer));
    }
}

impl std::fmt::Debug for SurfaceEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceEventSink")
            .field("pane", &self.pane)
            .field("attached", &self.handler.is_some())
            .finish()
    }
}

/// RGBA8 pixels of one pane
#[derive(Debug, Clone, PartialEq)]
pub struct PaneImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PaneImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

/// Stacks pane images top to bottom. Width follows the first image; narrower
/// rows are padded transparent, wider rows are clipped.
pub fn compose_vertical(images: &[PaneImage]) -> Option<PaneImage> {
    let first = images.first()?;
    if images.iter().any(|img| !img.is_well_formed()) {
        return None;
    }
    let width = first.width as usize;
    let height: u32 = images.iter().map(|img| img.height).sum();
    let mut rgba = Vec::with_capacity(width * height as usize * 4);
    for image in images {
        let src_row = image.width as usize * 4;
        let copy = src_row.min(width * 4);
        for row in 0..image.height as usize {
            let start = row * src_row;
            rgba.extend_from_slice(&image.rgba[start..start + copy]);
            rgba.resize(rgba.len() + (width * 4 - copy), 0);
        }
    }
    Some(PaneImage::new(first.width, height, rgba))
}
