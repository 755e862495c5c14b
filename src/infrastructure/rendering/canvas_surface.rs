//! Canvas 2D surface: one `<canvas>` per pane, painted on the next
//! animation frame after any change.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use gloo::render::{AnimationFrame, request_animation_frame};
use leptos::ev;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, ImageData, MouseEvent, WheelEvent};

use super::painter::{PlotArea, PriceScale, TimeScale, axis_label, time_label_stride};
use crate::domain::{
    chart::{
        Color, LogicalRange, MarkerPosition, MarkerShape, PaneId, PaneImage, PaneLegend, PointValue, PointerEvent,
        PriceFormat, PriceLine, SeriesData, SeriesId, SeriesKind, SeriesMarker, SeriesOptions, Surface, SurfaceConfig,
        SurfaceEventSink, SurfaceFactory,
    },
    errors::{SurfaceError, SurfaceResult},
    logging::LogComponent,
    market_data::TimeKey,
};
use crate::infrastructure::dom_events::{EventListenerHandle, EventOptions, listen};
use crate::{log_debug, log_trace, log_warn};

const LEGEND_LINE_HEIGHT: f64 = 16.0;
const LEGEND_PADDING: f64 = 8.0;
const TIME_LABEL_GAP: f64 = 90.0;
const WHEEL_ZOOM_STEP: f64 = 1.1;

fn js_err(context: &str) -> impl Fn(JsValue) -> SurfaceError + '_ {
    move |err| SurfaceError::Browser(format!("{}: {:?}", context, err))
}

struct CanvasSeries {
    id: SeriesId,
    kind: SeriesKind,
    options: SeriesOptions,
    data: SeriesData,
    markers: Vec<SeriesMarker>,
    price_lines: Vec<PriceLine>,
}

/// Crosshair placed by the user (pixel `y`) or by the engine (`anchor` series)
struct CrosshairMark {
    time: TimeKey,
    y: Option<f64>,
    anchor: Option<SeriesId>,
}

#[derive(Clone, Copy)]
struct Drag {
    start_x: f64,
    origin: LogicalRange,
}

struct CanvasState {
    config: SurfaceConfig,
    width: u32,
    height: u32,
    series: Vec<CanvasSeries>,
    next_id: u64,
    /// Sorted union of every series' times; bar index = position here
    times: Vec<TimeKey>,
    range: Option<LogicalRange>,
    crosshair: Option<CrosshairMark>,
    horz_line_visible: bool,
    legend: Option<PaneLegend>,
    drag: Option<Drag>,
    disposed: bool,
}

impl CanvasState {
    fn new(config: &SurfaceConfig) -> Self {
        Self {
            config: config.clone(),
            width: config.width,
            height: config.height,
            series: Vec::new(),
            next_id: 1,
            times: Vec::new(),
            range: None,
            crosshair: None,
            horz_line_visible: config.horz_line_visible,
            legend: None,
            drag: None,
            disposed: false,
        }
    }

    fn series_mut(&mut self, id: SeriesId) -> SurfaceResult<&mut CanvasSeries> {
        if self.disposed {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        self.series.iter_mut().find(|s| s.id == id).ok_or(SurfaceError::UnknownSeries(id))
    }

    fn rebuild_times(&mut self) {
        let all: BTreeSet<&TimeKey> = self.series.iter().flat_map(|s| s.data.times()).collect();
        self.times = all.into_iter().cloned().collect();
    }

    fn bar_of(&self, time: &TimeKey) -> Option<usize> {
        self.times.binary_search(time).ok()
    }

    fn plot(&self) -> PlotArea {
        PlotArea::new(self.width, self.height, &self.config.theme, self.config.time_axis_visible)
    }

    fn fitted_range(&self) -> Option<LogicalRange> {
        if self.times.is_empty() {
            return None;
        }
        LogicalRange::new(-0.5, self.times.len() as f64 - 0.5)
    }

    /// Explicit range, or every bar when nothing was set yet
    fn time_scale(&self) -> Option<TimeScale> {
        let range = self.range.or_else(|| self.fitted_range())?;
        Some(TimeScale::new(range, self.plot().width))
    }

    fn pointer_at(&self, time: &TimeKey) -> PointerEvent {
        self.series.iter().fold(PointerEvent::at(time.clone()), |event, series| {
            match series.data.value_at(time) {
                Some(value) => event.with_value(series.id, value),
                None => event,
            }
        })
    }

    fn price_scale(&self, bars: std::ops::Range<usize>) -> Option<PriceScale> {
        let first = self.times.get(bars.start)?;
        let last = self.times.get(bars.end.saturating_sub(1))?;
        let in_view = |t: &TimeKey| t >= first && t <= last;
        let mut values = Vec::new();
        for series in self.series.iter().filter(|s| s.options.visible) {
            match &series.data {
                SeriesData::Candles(points) => {
                    for p in points.iter().filter(|p| in_view(&p.time)) {
                        values.push(p.ohlc.high);
                        values.push(p.ohlc.low);
                    }
                }
                SeriesData::Values(points) => {
                    values.extend(points.iter().filter(|p| in_view(&p.time)).map(|p| p.value));
                    if series.kind == SeriesKind::Histogram {
                        values.push(series.options.baseline.unwrap_or(0.0));
                    }
                }
            }
            values.extend(series.options.baseline);
        }
        PriceScale::fit(values, self.plot().height)
    }

    fn axis_format(&self) -> PriceFormat {
        self.series
            .iter()
            .find(|s| s.options.visible && !s.data.is_empty())
            .map(|s| s.options.price_format)
            .unwrap_or_default()
    }
}

/// Context, state and the pending paint shared with DOM listeners
struct CanvasShared {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    state: RefCell<CanvasState>,
    frame: RefCell<Option<AnimationFrame>>,
    frame_pending: Cell<bool>,
}

impl CanvasShared {
    /// Coalesces into one paint per frame. The handle of a finished frame is
    /// replaced on the next request, never dropped inside its own callback.
    fn request_paint(self: &Rc<Self>) {
        if self.frame_pending.replace(true) {
            return;
        }
        let weak = Rc::downgrade(self);
        let handle = request_animation_frame(move |_timestamp| {
            if let Some(shared) = weak.upgrade() {
                shared.frame_pending.set(false);
                shared.paint_now();
            }
        });
        *self.frame.borrow_mut() = Some(handle);
    }

    fn paint_now(&self) {
        let Ok(state) = self.state.try_borrow() else { return };
        if state.disposed {
            return;
        }
        if let Err(err) = paint(&self.context, &state, device_pixel_ratio()) {
            log_warn!(
                LogComponent::Infrastructure("CanvasSurface"),
                "paint of '{}' failed: {:?}",
                state.config.pane,
                err
            );
        }
    }

    fn apply_size(&self, width: u32, height: u32) {
        let dpr = device_pixel_ratio();
        self.canvas.set_width((f64::from(width) * dpr).round() as u32);
        self.canvas.set_height((f64::from(height) * dpr).round() as u32);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", width));
        let _ = style.set_property("height", &format!("{}px", height));
    }
}

fn device_pixel_ratio() -> f64 {
    web_sys::window().map(|w| w.device_pixel_ratio()).filter(|r| *r > 0.0).unwrap_or(1.0)
}

/// What a pointer handler decided while holding the state borrow
enum Interaction {
    Pan(LogicalRange),
    Hover(PointerEvent),
    Left,
    Nothing,
}

impl Interaction {
    fn emit(self, events: &SurfaceEventSink) {
        match self {
            Interaction::Pan(range) => events.range_changed(Some(range)),
            Interaction::Hover(pointer) => events.pointer_moved(pointer),
            Interaction::Left => events.pointer_moved(PointerEvent::left()),
            Interaction::Nothing => {}
        }
    }
}

fn on_mouse_move(shared: &Rc<CanvasShared>, events: &SurfaceEventSink, ev: &MouseEvent) {
    let (x, y) = (f64::from(ev.offset_x()), f64::from(ev.offset_y()));
    let interaction = {
        let Ok(mut state) = shared.state.try_borrow_mut() else { return };
        if state.disposed {
            return;
        }
        let plot = state.plot();
        if let Some(drag) = state.drag {
            let spacing = TimeScale::new(drag.origin, plot.width).bar_spacing();
            let range = drag.origin.pan((drag.start_x - x) / spacing);
            state.range = Some(range);
            Interaction::Pan(range)
        } else if plot.contains(x, y) {
            let bar = state.time_scale().and_then(|scale| scale.nearest_bar(x, state.times.len()));
            match bar.and_then(|i| state.times.get(i).cloned()) {
                Some(time) => {
                    let pointer = state.pointer_at(&time);
                    state.crosshair = Some(CrosshairMark { time, y: Some(y), anchor: None });
                    Interaction::Hover(pointer)
                }
                None => Interaction::Nothing,
            }
        } else if state.crosshair.take().is_some() {
            Interaction::Left
        } else {
            Interaction::Nothing
        }
    };
    shared.request_paint();
    interaction.emit(events);
}

fn on_mouse_leave(shared: &Rc<CanvasShared>, events: &SurfaceEventSink) {
    let had_crosshair = {
        let Ok(mut state) = shared.state.try_borrow_mut() else { return };
        state.drag = None;
        state.crosshair.take().is_some()
    };
    if had_crosshair {
        shared.request_paint();
        events.pointer_moved(PointerEvent::left());
    }
}

fn on_mouse_down(shared: &Rc<CanvasShared>, ev: &MouseEvent) {
    if ev.button() != 0 {
        return;
    }
    let Ok(mut state) = shared.state.try_borrow_mut() else { return };
    let x = f64::from(ev.offset_x());
    if let Some(scale) = state.time_scale().filter(|_| state.plot().contains(x, f64::from(ev.offset_y()))) {
        state.drag = Some(Drag { start_x: x, origin: scale.range() });
    }
}

fn on_wheel(shared: &Rc<CanvasShared>, events: &SurfaceEventSink, ev: &WheelEvent) {
    ev.prevent_default();
    let range = {
        let Ok(mut state) = shared.state.try_borrow_mut() else { return };
        let Some(scale) = state.time_scale() else { return };
        let factor = if ev.delta_y() < 0.0 { WHEEL_ZOOM_STEP } else { 1.0 / WHEEL_ZOOM_STEP };
        let anchor = scale.x_to_index(f64::from(ev.offset_x()));
        let range = scale.range().zoom(factor, anchor);
        state.range = Some(range);
        range
    };
    shared.request_paint();
    events.range_changed(Some(range));
}

pub struct CanvasSurface {
    shared: Rc<CanvasShared>,
    events: SurfaceEventSink,
    listeners: Vec<EventListenerHandle>,
}

impl CanvasSurface {
    fn attach_listeners(&mut self) {
        let target: &web_sys::EventTarget = self.shared.canvas.as_ref();
        let passive = EventOptions::default();

        let (shared, events) = (self.shared.clone(), self.events.clone());
        self.listeners.push(listen(target, ev::mousemove, &passive, move |e| on_mouse_move(&shared, &events, &e)));

        let (shared, events) = (self.shared.clone(), self.events.clone());
        self.listeners.push(listen(target, ev::mouseleave, &passive, move |_| on_mouse_leave(&shared, &events)));

        let shared = self.shared.clone();
        self.listeners.push(listen(target, ev::mousedown, &passive, move |e| on_mouse_down(&shared, &e)));

        let shared = self.shared.clone();
        self.listeners.push(listen(target, ev::mouseup, &passive, move |_| {
            if let Ok(mut state) = shared.state.try_borrow_mut() {
                state.drag = None;
            }
        }));

        let (shared, events) = (self.shared.clone(), self.events.clone());
        self.listeners.push(listen(target, ev::wheel, &EventOptions::active(), move |e| on_wheel(&shared, &events, &e)));
    }

    /// Stores `range` and reports it when it moved
    fn update_range(&mut self, range: Option<LogicalRange>) {
        let changed = {
            let mut state = self.shared.state.borrow_mut();
            let changed = range.is_some() && state.range != range;
            if changed {
                state.range = range;
            }
            changed
        };
        if changed {
            self.shared.request_paint();
            self.events.range_changed(range);
        }
    }

    fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }
}

impl Surface for CanvasSurface {
    fn pane(&self) -> PaneId {
        self.shared.state.borrow().config.pane
    }

    fn add_series(&mut self, kind: SeriesKind, options: &SeriesOptions) -> SurfaceResult<SeriesId> {
        let mut state = self.shared.state.borrow_mut();
        if state.disposed {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        let id = SeriesId(state.next_id);
        state.next_id += 1;
        state.series.push(CanvasSeries {
            id,
            kind,
            options: options.clone(),
            data: SeriesData::empty_for(kind),
            markers: Vec::new(),
            price_lines: Vec::new(),
        });
        Ok(id)
    }

    fn remove_series(&mut self, series: SeriesId) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.series.retain(|s| s.id != series);
            state.rebuild_times();
        }
        self.shared.request_paint();
    }

    fn apply_series_options(&mut self, series: SeriesId, options: &SeriesOptions) -> SurfaceResult<()> {
        self.shared.state.borrow_mut().series_mut(series)?.options = options.clone();
        self.shared.request_paint();
        Ok(())
    }

    fn set_series_data(&mut self, series: SeriesId, data: &SeriesData) -> SurfaceResult<()> {
        {
            let mut state = self.shared.state.borrow_mut();
            let target = state.series_mut(series)?;
            if std::mem::discriminant(&target.data) != std::mem::discriminant(data) {
                return Err(SurfaceError::InvalidPoint {
                    time: data.times().first().map(|t| (*t).clone()).unwrap_or_else(|| TimeKey::new("")),
                    reason: format!("{} series cannot take this point type", target.kind.as_ref()),
                });
            }
            data.validate()?;
            target.data = data.clone();
            state.rebuild_times();
        }
        self.shared.request_paint();
        Ok(())
    }

    fn set_markers(&mut self, series: SeriesId, markers: &[SeriesMarker]) -> SurfaceResult<()> {
        self.shared.state.borrow_mut().series_mut(series)?.markers = markers.to_vec();
        self.shared.request_paint();
        Ok(())
    }

    fn set_price_lines(&mut self, series: SeriesId, lines: &[PriceLine]) -> SurfaceResult<()> {
        self.shared.state.borrow_mut().series_mut(series)?.price_lines = lines.to_vec();
        self.shared.request_paint();
        Ok(())
    }

    fn visible_logical_range(&self) -> Option<LogicalRange> {
        self.shared.state.borrow().range
    }

    fn set_visible_logical_range(&mut self, range: LogicalRange) {
        if !self.is_disposed() {
            self.update_range(Some(range));
        }
    }

    fn fit_content(&mut self) {
        let fitted = {
            let state = self.shared.state.borrow();
            if state.disposed {
                return;
            }
            state.fitted_range()
        };
        self.update_range(fitted);
    }

    fn set_crosshair_position(&mut self, time: &TimeKey, anchor: SeriesId) {
        let pointer = {
            let mut state = self.shared.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.crosshair = state
                .bar_of(time)
                .map(|_| CrosshairMark { time: time.clone(), y: None, anchor: Some(anchor) });
            state.pointer_at(time)
        };
        self.shared.request_paint();
        self.events.pointer_moved(pointer);
    }

    fn clear_crosshair_position(&mut self) {
        let had_crosshair = self.shared.state.borrow_mut().crosshair.take().is_some();
        if had_crosshair {
            self.shared.request_paint();
            self.events.pointer_moved(PointerEvent::left());
        }
    }

    fn set_horz_line_visible(&mut self, visible: bool) {
        self.shared.state.borrow_mut().horz_line_visible = visible;
        self.shared.request_paint();
    }

    fn resize(&mut self, width: u32, height: u32) {
        let range = {
            let mut state = self.shared.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.width = width;
            state.height = height;
            state.range
        };
        self.shared.apply_size(width, height);
        self.shared.request_paint();
        if range.is_some() {
            self.events.range_changed(range);
        }
    }

    fn set_legend(&mut self, legend: &PaneLegend) {
        self.shared.state.borrow_mut().legend = Some(legend.clone());
        self.shared.request_paint();
    }

    fn snapshot(&mut self) -> SurfaceResult<PaneImage> {
        if self.is_disposed() {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        self.shared.paint_now();
        let (width, height) = (self.shared.canvas.width(), self.shared.canvas.height());
        let image = self
            .shared
            .context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(js_err("getImageData"))?;
        Ok(PaneImage::new(width, height, image.data().0))
    }

    fn dispose(&mut self) {
        let pane = {
            let mut state = self.shared.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.series.clear();
            state.config.pane
        };
        log_trace!(
            LogComponent::Infrastructure("CanvasSurface"),
            "disposing '{}', dropping {} listeners",
            pane,
            self.listeners.len()
        );
        self.listeners.clear();
        self.shared.frame.borrow_mut().take();
        self.shared.frame_pending.set(false);
        self.shared.canvas.remove();
        self.events = SurfaceEventSink::detached(pane);
    }
}

/// Appends one canvas per pane to a container element, in creation order
pub struct CanvasSurfaceFactory {
    document: Document,
    container: Element,
}

impl CanvasSurfaceFactory {
    pub fn new(container: Element) -> Result<Self, SurfaceError> {
        let document = container
            .owner_document()
            .ok_or_else(|| SurfaceError::Unavailable("container is not attached to a document".to_string()))?;
        Ok(Self { document, container })
    }

    fn create_canvas(&self) -> SurfaceResult<(HtmlCanvasElement, CanvasRenderingContext2d)> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(js_err("createElement"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| SurfaceError::Browser("created element is not a canvas".to_string()))?;
        let _ = canvas.style().set_property("display", "block");
        let context = canvas
            .get_context("2d")
            .map_err(js_err("getContext"))?
            .ok_or_else(|| SurfaceError::Unavailable("2D context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| SurfaceError::Browser("context is not 2D".to_string()))?;
        Ok((canvas, context))
    }
}

impl SurfaceFactory for CanvasSurfaceFactory {
    fn create(&mut self, config: &SurfaceConfig, events: SurfaceEventSink) -> SurfaceResult<Box<dyn Surface>> {
        let (canvas, context) = self.create_canvas()?;
        self.container.append_child(&canvas).map_err(js_err("appendChild"))?;

        let shared = Rc::new(CanvasShared {
            canvas,
            context,
            state: RefCell::new(CanvasState::new(config)),
            frame: RefCell::new(None),
            frame_pending: Cell::new(false),
        });
        shared.apply_size(config.width, config.height);

        let mut surface = CanvasSurface { shared, events, listeners: Vec::new() };
        surface.attach_listeners();
        surface.shared.request_paint();
        log_debug!(
            LogComponent::Infrastructure("CanvasSurface"),
            "created '{}' at {}x{}",
            config.pane,
            config.width,
            config.height
        );
        Ok(Box::new(surface))
    }
}

/// Encodes a pane image as a PNG data URL through a detached canvas
pub fn encode_data_url(document: &Document, image: &PaneImage) -> SurfaceResult<String> {
    if !image.is_well_formed() {
        return Err(SurfaceError::Unavailable("malformed image".to_string()));
    }
    let canvas = document
        .create_element("canvas")
        .map_err(js_err("createElement"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| SurfaceError::Browser("created element is not a canvas".to_string()))?;
    canvas.set_width(image.width);
    canvas.set_height(image.height);
    let context = canvas
        .get_context("2d")
        .map_err(js_err("getContext"))?
        .ok_or_else(|| SurfaceError::Unavailable("2D context unavailable".to_string()))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| SurfaceError::Browser("context is not 2D".to_string()))?;
    let data = ImageData::new_with_u8_clamped_array_and_sh(Clamped(image.rgba.as_slice()), image.width, image.height)
        .map_err(js_err("ImageData"))?;
    context.put_image_data(&data, 0.0, 0.0).map_err(js_err("putImageData"))?;
    canvas.to_data_url().map_err(js_err("toDataURL"))
}

// ---------------------------------------------------------------- painting

fn set_dash(ctx: &CanvasRenderingContext2d, pattern: &[f64]) -> Result<(), JsValue> {
    let array = js_sys::Array::new();
    for step in pattern {
        array.push(&JsValue::from_f64(*step));
    }
    ctx.set_line_dash(&array)
}

fn hline(ctx: &CanvasRenderingContext2d, y: f64, x0: f64, x1: f64) {
    let y = y.round() + 0.5;
    ctx.begin_path();
    ctx.move_to(x0, y);
    ctx.line_to(x1, y);
    ctx.stroke();
}

fn vline(ctx: &CanvasRenderingContext2d, x: f64, y0: f64, y1: f64) {
    let x = x.round() + 0.5;
    ctx.begin_path();
    ctx.move_to(x, y0);
    ctx.line_to(x, y1);
    ctx.stroke();
}

fn paint(ctx: &CanvasRenderingContext2d, state: &CanvasState, dpr: f64) -> Result<(), JsValue> {
    let theme = &state.config.theme;
    let (width, height) = (f64::from(state.width), f64::from(state.height));
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.set_fill_style_str(&theme.background.to_css());
    ctx.fill_rect(0.0, 0.0, width, height);
    ctx.set_font(&theme.font);

    let plot = state.plot();
    if plot.is_empty() {
        return Ok(());
    }

    let scales = state.time_scale().and_then(|time| {
        let bars = time.visible_bars(state.times.len());
        state.price_scale(bars.clone()).map(|price| (time, price, bars))
    });

    if let Some((time, price, bars)) = &scales {
        draw_grid(ctx, state, price, plot);
        ctx.save();
        ctx.begin_path();
        ctx.rect(0.0, 0.0, plot.width, plot.height);
        ctx.clip();
        for series in state.series.iter().filter(|s| s.options.visible) {
            draw_series(ctx, state, series, time, price, bars.clone())?;
        }
        ctx.restore();
        draw_price_axis(ctx, state, price, plot)?;
        if state.config.time_axis_visible {
            draw_time_axis(ctx, state, time, bars.clone(), plot)?;
        }
        draw_crosshair(ctx, state, time, price, plot)?;
    }

    ctx.set_stroke_style_str(&theme.border.to_css());
    ctx.set_line_width(1.0);
    vline(ctx, plot.width, 0.0, height);
    if state.config.time_axis_visible {
        hline(ctx, plot.height, 0.0, width);
    }
    draw_legend(ctx, state)
}

fn draw_grid(ctx: &CanvasRenderingContext2d, state: &CanvasState, price: &PriceScale, plot: PlotArea) {
    ctx.set_stroke_style_str(&state.config.theme.grid.to_css());
    ctx.set_line_width(1.0);
    for tick in price.ticks(tick_target(plot.height)) {
        hline(ctx, price.to_y(tick), 0.0, plot.width);
    }
}

fn tick_target(plot_height: f64) -> usize {
    ((plot_height / 50.0).floor() as usize).clamp(2, 10)
}

fn draw_series(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    series: &CanvasSeries,
    time: &TimeScale,
    price: &PriceScale,
    bars: std::ops::Range<usize>,
) -> Result<(), JsValue> {
    let theme = &state.config.theme;
    let in_view = |t: &TimeKey| state.bar_of(t).filter(|i| bars.contains(i));
    match (&series.data, series.kind) {
        (SeriesData::Candles(points), _) => {
            let body = time.body_width();
            for point in points {
                let Some(bar) = in_view(&point.time) else { continue };
                let x = time.index_to_x(bar as f64);
                let color = point.color.unwrap_or(if point.ohlc.is_down() { theme.down } else { theme.up });
                ctx.set_stroke_style_str(&color.to_css());
                ctx.set_fill_style_str(&color.to_css());
                ctx.set_line_width(1.0);
                vline(ctx, x, price.to_y(point.ohlc.high), price.to_y(point.ohlc.low));
                let top = price.to_y(point.ohlc.open.max(point.ohlc.close));
                let bottom = price.to_y(point.ohlc.open.min(point.ohlc.close));
                ctx.fill_rect(x - body / 2.0, top, body, (bottom - top).max(1.0));
            }
        }
        (SeriesData::Values(points), SeriesKind::Histogram) => {
            let base_y = price.to_y(series.options.baseline.unwrap_or(0.0));
            let body = time.body_width();
            let fallback = series.options.color.unwrap_or(Color::NEUTRAL);
            for point in points {
                let Some(bar) = in_view(&point.time) else { continue };
                let x = time.index_to_x(bar as f64);
                let y = price.to_y(point.value);
                ctx.set_fill_style_str(&point.color.unwrap_or(fallback).to_css());
                ctx.fill_rect(x - body / 2.0, y.min(base_y), body, (base_y - y).abs().max(1.0));
            }
        }
        (SeriesData::Values(points), _) => {
            let color = series.options.color.unwrap_or(theme.text);
            ctx.set_stroke_style_str(&color.to_css());
            ctx.set_line_width(f64::from(series.options.line_width));
            set_dash(ctx, series.options.line_style.dash_pattern())?;
            ctx.begin_path();
            let mut started = false;
            for point in points {
                let Some(bar) = in_view(&point.time) else { continue };
                let (x, y) = (time.index_to_x(bar as f64), price.to_y(point.value));
                if started {
                    ctx.line_to(x, y);
                } else {
                    ctx.move_to(x, y);
                    started = true;
                }
            }
            ctx.stroke();
            set_dash(ctx, &[])?;
        }
    }

    if let Some(baseline) = series.options.baseline.filter(|_| series.kind == SeriesKind::Line) {
        ctx.set_stroke_style_str(&theme.border.to_css());
        ctx.set_line_width(1.0);
        set_dash(ctx, &[4.0, 4.0])?;
        hline(ctx, price.to_y(baseline), 0.0, f64::from(state.width));
        set_dash(ctx, &[])?;
    }

    draw_price_lines(ctx, state, series, price)?;
    draw_markers(ctx, state, series, time, price, &bars)
}

fn draw_price_lines(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    series: &CanvasSeries,
    price: &PriceScale,
) -> Result<(), JsValue> {
    let right = state.plot().width;
    for line in &series.price_lines {
        let y = price.to_y(line.price);
        ctx.set_stroke_style_str(&line.color.to_css());
        ctx.set_line_width(f64::from(line.line_width));
        set_dash(ctx, line.line_style.dash_pattern())?;
        hline(ctx, y, 0.0, right);
        set_dash(ctx, &[])?;
        if !line.title.is_empty() {
            let width = ctx.measure_text(&line.title)?.width();
            ctx.set_fill_style_str(&line.color.to_css());
            ctx.fill_text(&line.title, right - width - 4.0, y - 4.0)?;
        }
    }
    Ok(())
}

fn draw_markers(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    series: &CanvasSeries,
    time: &TimeScale,
    price: &PriceScale,
    bars: &std::ops::Range<usize>,
) -> Result<(), JsValue> {
    let size = time.body_width().clamp(6.0, 12.0);
    for marker in &series.markers {
        let Some(bar) = state.bar_of(&marker.time).filter(|i| bars.contains(i)) else { continue };
        let Some(value) = series.data.value_at(&marker.time) else { continue };
        let (high, low) = match value {
            PointValue::Ohlc(ohlc) => (ohlc.high, ohlc.low),
            PointValue::Value(v) => (v, v),
        };
        let x = time.index_to_x(bar as f64);
        let (tip, label_y) = match marker.position {
            MarkerPosition::AboveBar => (price.to_y(high) - 4.0, price.to_y(high) - 6.0 - size),
            MarkerPosition::BelowBar => (price.to_y(low) + 4.0, price.to_y(low) + 6.0 + size + 10.0),
        };
        let base = match marker.shape {
            MarkerShape::ArrowDown => tip - size,
            MarkerShape::ArrowUp => tip + size,
        };
        ctx.set_fill_style_str(&marker.color.to_css());
        ctx.begin_path();
        ctx.move_to(x, tip);
        ctx.line_to(x - size / 2.0, base);
        ctx.line_to(x + size / 2.0, base);
        ctx.close_path();
        ctx.fill();
        if !marker.text.is_empty() {
            ctx.set_text_align("center");
            ctx.fill_text(&marker.text, x, label_y)?;
            ctx.set_text_align("start");
        }
    }
    Ok(())
}

fn draw_price_axis(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    price: &PriceScale,
    plot: PlotArea,
) -> Result<(), JsValue> {
    let format = state.axis_format();
    ctx.set_fill_style_str(&state.config.theme.text.to_css());
    ctx.set_text_baseline("middle");
    for tick in price.ticks(tick_target(plot.height)) {
        ctx.fill_text(&axis_label(tick, format), plot.width + 8.0, price.to_y(tick))?;
    }
    ctx.set_text_baseline("alphabetic");
    Ok(())
}

fn draw_time_axis(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    time: &TimeScale,
    bars: std::ops::Range<usize>,
    plot: PlotArea,
) -> Result<(), JsValue> {
    let stride = time_label_stride(time.bar_spacing(), TIME_LABEL_GAP);
    ctx.set_fill_style_str(&state.config.theme.text.to_css());
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    let y = plot.height + f64::from(state.config.theme.time_axis_height) / 2.0;
    for bar in bars.filter(|i| i % stride == 0) {
        let x = time.index_to_x(bar as f64);
        if x < 0.0 || x > plot.width {
            continue;
        }
        if let Some(key) = state.times.get(bar) {
            ctx.fill_text(key.as_str(), x, y)?;
        }
    }
    ctx.set_text_align("start");
    ctx.set_text_baseline("alphabetic");
    Ok(())
}

fn draw_crosshair(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    time: &TimeScale,
    price: &PriceScale,
    plot: PlotArea,
) -> Result<(), JsValue> {
    let Some(mark) = &state.crosshair else { return Ok(()) };
    let Some(bar) = state.bar_of(&mark.time) else { return Ok(()) };
    let theme = &state.config.theme;
    let x = time.index_to_x(bar as f64);

    ctx.set_stroke_style_str(&theme.crosshair.to_css());
    ctx.set_line_width(1.0);
    set_dash(ctx, &[4.0, 4.0])?;
    vline(ctx, x, 0.0, plot.height);

    let y = mark.y.or_else(|| {
        let anchor = state.series.iter().find(|s| Some(s.id) == mark.anchor)?;
        match anchor.data.value_at(&mark.time)? {
            PointValue::Ohlc(ohlc) => Some(price.to_y(ohlc.close)),
            PointValue::Value(v) => Some(price.to_y(v)),
        }
    });
    if let Some(y) = y.filter(|_| state.horz_line_visible) {
        hline(ctx, y, 0.0, plot.width);
        set_dash(ctx, &[])?;
        ctx.set_fill_style_str(&theme.crosshair_label.to_css());
        ctx.fill_rect(plot.width, y - 9.0, f64::from(theme.price_axis_width), 18.0);
        ctx.set_fill_style_str(&Color::WHITE.to_css());
        ctx.set_text_baseline("middle");
        ctx.fill_text(&axis_label(price.from_y(y), state.axis_format()), plot.width + 8.0, y)?;
        ctx.set_text_baseline("alphabetic");
    }
    set_dash(ctx, &[])?;

    if state.config.crosshair_time_label_visible && state.config.time_axis_visible {
        let label = mark.time.as_str();
        let label_width = ctx.measure_text(label)?.width() + 12.0;
        ctx.set_fill_style_str(&theme.crosshair_label.to_css());
        ctx.fill_rect(x - label_width / 2.0, plot.height, label_width, f64::from(theme.time_axis_height));
        ctx.set_fill_style_str(&Color::WHITE.to_css());
        ctx.set_text_align("center");
        ctx.set_text_baseline("middle");
        ctx.fill_text(label, x, plot.height + f64::from(theme.time_axis_height) / 2.0)?;
        ctx.set_text_align("start");
        ctx.set_text_baseline("alphabetic");
    }
    Ok(())
}

fn draw_legend(ctx: &CanvasRenderingContext2d, state: &CanvasState) -> Result<(), JsValue> {
    let Some(legend) = &state.legend else { return Ok(()) };
    ctx.set_text_baseline("top");
    for (row, line) in legend.lines.iter().enumerate() {
        let y = LEGEND_PADDING + row as f64 * LEGEND_LINE_HEIGHT;
        let mut x = LEGEND_PADDING;
        for span in &line.spans {
            ctx.set_fill_style_str(&span.color.to_css());
            ctx.fill_text(&span.text, x, y)?;
            x += ctx.measure_text(&span.text)?.width() + 4.0;
        }
    }
    ctx.set_text_baseline("alphabetic");
    Ok(())
}
