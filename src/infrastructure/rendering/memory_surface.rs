//! Headless surface that records every call.
//!
//! Programmatic range and crosshair writes are echoed back through the event
//! sink the same way a browser chart library reports them, so the sync
//! protocol runs against it unchanged.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::domain::{
    chart::{
        LogicalRange, PaneId, PaneImage, PaneLegend, PointerEvent, Surface, SurfaceConfig, SurfaceEventSink,
        SurfaceFactory, PriceLine, SeriesData, SeriesId, SeriesKind, SeriesMarker, SeriesOptions,
    },
    errors::{SurfaceError, SurfaceResult},
    logging::LogComponent,
    market_data::TimeKey,
};
use crate::log_trace;

/// Recorded state of one series
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySeries {
    pub id: SeriesId,
    pub kind: SeriesKind,
    pub options: SeriesOptions,
    pub data: SeriesData,
    pub markers: Vec<SeriesMarker>,
    pub price_lines: Vec<PriceLine>,
    pub data_pushes: usize,
}

struct MemoryState {
    config: SurfaceConfig,
    series: BTreeMap<SeriesId, MemorySeries>,
    next_id: u64,
    range: Option<LogicalRange>,
    crosshair: Option<(TimeKey, SeriesId)>,
    horz_line_visible: bool,
    width: u32,
    height: u32,
    legend: Option<PaneLegend>,
    rejected: BTreeSet<SeriesId>,
    rejected_options: BTreeSet<SeriesId>,
    fit_calls: usize,
    resize_calls: usize,
    disposed: bool,
}

impl MemoryState {
    fn new(config: &SurfaceConfig) -> Self {
        Self {
            config: config.clone(),
            series: BTreeMap::new(),
            next_id: 1,
            range: None,
            crosshair: None,
            horz_line_visible: config.horz_line_visible,
            width: config.width,
            height: config.height,
            legend: None,
            rejected: BTreeSet::new(),
            rejected_options: BTreeSet::new(),
            fit_calls: 0,
            resize_calls: 0,
            disposed: false,
        }
    }

    fn pointer_at(&self, time: &TimeKey) -> PointerEvent {
        self.series.values().fold(PointerEvent::at(time.clone()), |event, series| {
            match series.data.value_at(time) {
                Some(value) => event.with_value(series.id, value),
                None => event,
            }
        })
    }

    /// Range covering every bar any series holds
    fn fitted_range(&self) -> Option<LogicalRange> {
        let bars = self.series.values().map(|s| s.data.len()).max().unwrap_or(0);
        if bars == 0 {
            return None;
        }
        LogicalRange::new(-0.5, bars as f64 - 0.5)
    }

    fn series_mut(&mut self, id: SeriesId) -> SurfaceResult<&mut MemorySeries> {
        if self.disposed {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        self.series.get_mut(&id).ok_or(SurfaceError::UnknownSeries(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLifecycle {
    Created(PaneId),
    Disposed(PaneId),
}

type Journal = Rc<RefCell<Vec<SurfaceLifecycle>>>;

pub struct MemorySurface {
    state: Rc<RefCell<MemoryState>>,
    events: SurfaceEventSink,
    journal: Journal,
}

impl MemorySurface {
    fn update_range(&mut self, range: Option<LogicalRange>) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = range.is_some() && state.range != range;
            if changed {
                state.range = range;
            }
            changed
        };
        if changed {
            self.events.range_changed(range);
        }
    }
}

impl Surface for MemorySurface {
    fn pane(&self) -> PaneId {
        self.state.borrow().config.pane
    }

    fn add_series(&mut self, kind: SeriesKind, options: &SeriesOptions) -> SurfaceResult<SeriesId> {
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        let id = SeriesId(state.next_id);
        state.next_id += 1;
        state.series.insert(
            id,
            MemorySeries {
                id,
                kind,
                options: options.clone(),
                data: SeriesData::empty_for(kind),
                markers: Vec::new(),
                price_lines: Vec::new(),
                data_pushes: 0,
            },
        );
        Ok(id)
    }

    fn remove_series(&mut self, series: SeriesId) {
        self.state.borrow_mut().series.remove(&series);
    }

    fn apply_series_options(&mut self, series: SeriesId, options: &SeriesOptions) -> SurfaceResult<()> {
        let mut state = self.state.borrow_mut();
        if state.rejected_options.contains(&series) {
            return Err(SurfaceError::Unavailable(format!("series {} refuses options", series)));
        }
        state.series_mut(series)?.options = options.clone();
        Ok(())
    }

    fn set_series_data(&mut self, series: SeriesId, data: &SeriesData) -> SurfaceResult<()> {
        let mut state = self.state.borrow_mut();
        if state.rejected.contains(&series) {
            return Err(SurfaceError::Unavailable(format!("series {} refuses data", series)));
        }
        let target = state.series_mut(series)?;
        if std::mem::discriminant(&target.data) != std::mem::discriminant(data) {
            return Err(SurfaceError::InvalidPoint {
                time: data.times().first().map(|t| (*t).clone()).unwrap_or_else(|| TimeKey::new("")),
                reason: format!("{} series cannot take this point type", target.kind.as_ref()),
            });
        }
        data.validate()?;
        target.data = data.clone();
        target.data_pushes += 1;
        Ok(())
    }

    fn set_markers(&mut self, series: SeriesId, markers: &[SeriesMarker]) -> SurfaceResult<()> {
        let mut state = self.state.borrow_mut();
        state.series_mut(series)?.markers = markers.to_vec();
        Ok(())
    }

    fn set_price_lines(&mut self, series: SeriesId, lines: &[PriceLine]) -> SurfaceResult<()> {
        let mut state = self.state.borrow_mut();
        state.series_mut(series)?.price_lines = lines.to_vec();
        Ok(())
    }

    fn visible_logical_range(&self) -> Option<LogicalRange> {
        self.state.borrow().range
    }

    fn set_visible_logical_range(&mut self, range: LogicalRange) {
        if self.state.borrow().disposed {
            return;
        }
        self.update_range(Some(range));
    }

    fn fit_content(&mut self) {
        let fitted = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.fit_calls += 1;
            state.fitted_range()
        };
        self.update_range(fitted);
    }

    fn set_crosshair_position(&mut self, time: &TimeKey, anchor: SeriesId) {
        let pointer = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.crosshair = Some((time.clone(), anchor));
            state.pointer_at(time)
        };
        self.events.pointer_moved(pointer);
    }

    fn clear_crosshair_position(&mut self) {
        let had_crosshair = self.state.borrow_mut().crosshair.take().is_some();
        if had_crosshair {
            self.events.pointer_moved(PointerEvent::left());
        }
    }

    fn set_horz_line_visible(&mut self, visible: bool) {
        self.state.borrow_mut().horz_line_visible = visible;
    }

    fn resize(&mut self, width: u32, height: u32) {
        let range = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.width = width;
            state.height = height;
            state.resize_calls += 1;
            state.range
        };
        // a new width changes the bar spacing, which the chart reports as a range change
        if range.is_some() {
            self.events.range_changed(range);
        }
    }

    fn set_legend(&mut self, legend: &PaneLegend) {
        self.state.borrow_mut().legend = Some(legend.clone());
    }

    fn snapshot(&mut self) -> SurfaceResult<PaneImage> {
        let state = self.state.borrow();
        if state.disposed {
            return Err(SurfaceError::Unavailable("surface disposed".to_string()));
        }
        let bg = state.config.theme.background;
        let pixel = [bg.r, bg.g, bg.b, (bg.a.clamp(0.0, 1.0) * 255.0).round() as u8];
        let rgba = pixel.repeat(state.width as usize * state.height as usize);
        Ok(PaneImage::new(state.width, state.height, rgba))
    }

    fn dispose(&mut self) {
        let pane = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.series.clear();
            state.config.pane
        };
        self.events = SurfaceEventSink::detached(pane);
        self.journal.borrow_mut().push(SurfaceLifecycle::Disposed(pane));
        log_trace!(LogComponent::Infrastructure("MemorySurface"), "disposed '{}'", pane);
    }
}

/// Test-side view of a [`MemorySurface`]: inspects its state and plays user input
#[derive(Clone)]
pub struct SurfaceProbe {
    state: Rc<RefCell<MemoryState>>,
    events: SurfaceEventSink,
}

impl SurfaceProbe {
    pub fn pane(&self) -> PaneId {
        self.state.borrow().config.pane
    }

    pub fn config(&self) -> SurfaceConfig {
        self.state.borrow().config.clone()
    }

    fn live(&self) -> bool {
        !self.state.borrow().disposed
    }

    /// Drag or wheel on this pane
    pub fn user_pan(&self, range: LogicalRange) {
        if !self.live() {
            return;
        }
        self.state.borrow_mut().range = Some(range);
        self.events.range_changed(Some(range));
    }

    pub fn user_hover(&self, time: &str) {
        if !self.live() {
            return;
        }
        let time = TimeKey::from(time);
        let pointer = self.state.borrow().pointer_at(&time);
        self.events.pointer_moved(pointer);
    }

    /// Hover reporting `pointer` verbatim
    pub fn user_pointer(&self, pointer: PointerEvent) {
        if self.live() {
            self.events.pointer_moved(pointer);
        }
    }

    pub fn user_leave(&self) {
        if self.live() {
            self.events.pointer_moved(PointerEvent::left());
        }
    }

    /// Makes `set_series_data` fail for `series` until cleared
    pub fn reject_data_for(&self, series: SeriesId, reject: bool) {
        let mut state = self.state.borrow_mut();
        if reject {
            state.rejected.insert(series);
        } else {
            state.rejected.remove(&series);
        }
    }

    /// Makes `apply_series_options` fail for `series` until cleared
    pub fn reject_options_for(&self, series: SeriesId, reject: bool) {
        let mut state = self.state.borrow_mut();
        if reject {
            state.rejected_options.insert(series);
        } else {
            state.rejected_options.remove(&series);
        }
    }

    pub fn range(&self) -> Option<LogicalRange> {
        self.state.borrow().range
    }

    pub fn crosshair(&self) -> Option<(TimeKey, SeriesId)> {
        self.state.borrow().crosshair.clone()
    }

    pub fn horz_line_visible(&self) -> bool {
        self.state.borrow().horz_line_visible
    }

    pub fn size(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.width, state.height)
    }

    pub fn legend(&self) -> Option<PaneLegend> {
        self.state.borrow().legend.clone()
    }

    pub fn legend_text(&self) -> String {
        self.legend().map(|legend| legend.text()).unwrap_or_default()
    }

    pub fn series(&self, id: SeriesId) -> Option<MemorySeries> {
        self.state.borrow().series.get(&id).cloned()
    }

    pub fn series_count(&self) -> usize {
        self.state.borrow().series.len()
    }

    pub fn fit_calls(&self) -> usize {
        self.state.borrow().fit_calls
    }

    pub fn resize_calls(&self) -> usize {
        self.state.borrow().resize_calls
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }
}

#[derive(Default)]
struct FactoryState {
    probes: BTreeMap<PaneId, SurfaceProbe>,
    fail_on: BTreeSet<PaneId>,
    created: usize,
}

/// Builds [`MemorySurface`]s and keeps a probe to the latest one per pane
#[derive(Clone, Default)]
pub struct MemorySurfaceFactory {
    state: Rc<RefCell<FactoryState>>,
    journal: Journal,
}

impl MemorySurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface creation for `pane` fails from now on
    pub fn fail_on(&self, pane: PaneId) {
        self.state.borrow_mut().fail_on.insert(pane);
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().fail_on.clear();
    }

    pub fn probe(&self, pane: PaneId) -> Option<SurfaceProbe> {
        self.state.borrow().probes.get(&pane).cloned()
    }

    /// Probes of surfaces not yet disposed, in stack order
    pub fn live_probes(&self) -> Vec<SurfaceProbe> {
        let mut live: Vec<SurfaceProbe> =
            self.state.borrow().probes.values().filter(|probe| !probe.is_disposed()).cloned().collect();
        live.sort_by_key(|probe| probe.config().stack_index);
        live
    }

    pub fn created_count(&self) -> usize {
        self.state.borrow().created
    }

    pub fn journal(&self) -> Vec<SurfaceLifecycle> {
        self.journal.borrow().clone()
    }
}

impl SurfaceFactory for MemorySurfaceFactory {
    fn create(&mut self, config: &SurfaceConfig, events: SurfaceEventSink) -> SurfaceResult<Box<dyn Surface>> {
        let mut factory = self.state.borrow_mut();
        if factory.fail_on.contains(&config.pane) {
            return Err(SurfaceError::Unavailable(format!("injected failure for '{}'", config.pane)));
        }
        let state = Rc::new(RefCell::new(MemoryState::new(config)));
        factory.probes.insert(config.pane, SurfaceProbe { state: state.clone(), events: events.clone() });
        factory.created += 1;
        self.journal.borrow_mut().push(SurfaceLifecycle::Created(config.pane));
        Ok(Box::new(MemorySurface { state, events, journal: self.journal.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::{ChartTheme, SurfaceEvent, SurfaceEventKind, ValuePoint};

    fn config(pane: PaneId) -> SurfaceConfig {
        SurfaceConfig {
            pane,
            stack_index: 0,
            theme: ChartTheme::default(),
            width: 4,
            height: 2,
            time_axis_visible: true,
            crosshair_time_label_visible: true,
            horz_line_visible: true,
        }
    }

    #[test]
    fn programmatic_writes_echo_through_the_sink() {
        let seen = Rc::new(RefCell::new(Vec::<SurfaceEvent>::new()));
        let sink = {
            let seen = seen.clone();
            SurfaceEventSink::new(PaneId::Macd, Rc::new(move |event| seen.borrow_mut().push(event)))
        };
        let mut factory = MemorySurfaceFactory::new();
        let mut surface = factory.create(&config(PaneId::Macd), sink).unwrap();
        let line = surface.add_series(SeriesKind::Line, &SeriesOptions::default()).unwrap();
        let data = SeriesData::Values(vec![ValuePoint { time: TimeKey::from("2024-01-01"), value: 0.0, color: None }]);
        surface.set_series_data(line, &data).unwrap();

        let range = LogicalRange::new(0.0, 10.0).unwrap();
        surface.set_visible_logical_range(range);
        surface.set_visible_logical_range(range);
        surface.set_crosshair_position(&TimeKey::from("2024-01-01"), line);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2, "unchanged range is not re-reported");
        assert_eq!(seen[0].kind, SurfaceEventKind::VisibleRangeChanged(Some(range)));
        match &seen[1].kind {
            SurfaceEventKind::PointerMoved(pointer) => {
                assert_eq!(pointer.value_of(line), Some(crate::domain::chart::PointValue::Value(0.0)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_points_of_the_wrong_shape() {
        let mut factory = MemorySurfaceFactory::new();
        let mut surface = factory.create(&config(PaneId::Price), SurfaceEventSink::detached(PaneId::Price)).unwrap();
        let candles = surface.add_series(SeriesKind::Candlestick, &SeriesOptions::default()).unwrap();
        let err = surface.set_series_data(candles, &SeriesData::Values(Vec::new())).unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidPoint { .. }));
        surface.dispose();
        assert_eq!(factory.journal(), vec![SurfaceLifecycle::Created(PaneId::Price), SurfaceLifecycle::Disposed(PaneId::Price)]);
        assert!(surface.snapshot().is_err());
    }
}
