//! Range and crosshair synchronization across the pane stack.
//!
//! Surfaces report interaction through their event sinks, which call straight
//! back into [`SyncCoordinator::handle`]. Writes to sibling surfaces echo new
//! events synchronously; the per-channel guards swallow those echoes before
//! anything else is touched.

use once_cell::unsync::OnceCell;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::domain::{
    chart::{
        LogicalRange, PaneId, PaneLegend, PointValue, PointerEvent, SurfaceEvent, SurfaceEventKind, SurfaceEventSink,
    },
    logging::LogComponent,
    market_data::{TimeKey, TimeSeriesRecord},
    scheduling::LivenessToken,
};
use crate::{log_debug, log_trace, log_warn};

use super::data_binder::ChartContext;
use super::legend_renderer::{OverlayValues, render_legends};
use super::pane_manager::PaneSet;
use super::series_registry::SeriesLookup;

/// Counters exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    pub range_propagations: u64,
    pub crosshair_propagations: u64,
    /// Events dropped by a guard or an active resize
    pub suppressed: u64,
}

/// Holds a guard flag for the lifetime of one propagation
struct GuardScope<'a>(&'a Cell<bool>);

impl<'a> GuardScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) { None } else { Some(Self(flag)) }
    }
}

impl Drop for GuardScope<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Sync state of one mounted pane set. Built with the panes and dropped with them.
pub struct SyncCoordinator {
    panes: OnceCell<Rc<PaneSet>>,
    context: Rc<RefCell<ChartContext>>,
    liveness: LivenessToken,

    range_syncing: Cell<bool>,
    crosshair_syncing: Cell<bool>,
    resizing: Cell<bool>,

    last_hovered: Cell<PaneId>,
    hovered_time: RefCell<Option<TimeKey>>,
    visible_range: Cell<Option<LogicalRange>>,
    lookup: RefCell<SeriesLookup>,

    legend_record: RefCell<Option<TimeSeriesRecord>>,
    overlay_values: RefCell<OverlayValues>,
    legends: RefCell<BTreeMap<PaneId, PaneLegend>>,
    stats: Cell<SyncStats>,
}

impl SyncCoordinator {
    pub fn new(context: Rc<RefCell<ChartContext>>, liveness: LivenessToken) -> Rc<Self> {
        Rc::new(Self {
            panes: OnceCell::new(),
            context,
            liveness,
            range_syncing: Cell::new(false),
            crosshair_syncing: Cell::new(false),
            resizing: Cell::new(false),
            last_hovered: Cell::new(PaneId::Price),
            hovered_time: RefCell::new(None),
            visible_range: Cell::new(None),
            lookup: RefCell::new(SeriesLookup::default()),
            legend_record: RefCell::new(None),
            overlay_values: RefCell::new(OverlayValues::new()),
            legends: RefCell::new(BTreeMap::new()),
            stats: Cell::new(SyncStats::default()),
        })
    }

    /// Event sink for one pane. Holds the coordinator weakly so surfaces never keep it alive.
    pub fn sink_for(self: &Rc<Self>, pane: PaneId) -> SurfaceEventSink {
        let weak: Weak<Self> = Rc::downgrade(self);
        SurfaceEventSink::new(
            pane,
            Rc::new(move |event| {
                if let Some(sync) = weak.upgrade() {
                    sync.handle(event);
                }
            }),
        )
    }

    pub fn attach(&self, panes: Rc<PaneSet>) {
        if self.panes.set(panes).is_err() {
            log_warn!(LogComponent::Application("SyncCoordinator"), "pane set already attached");
        }
    }

    pub fn set_series_lookup(&self, lookup: SeriesLookup) {
        *self.lookup.borrow_mut() = lookup;
    }

    fn bump(&self, update: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    pub fn handle(&self, event: SurfaceEvent) {
        if !self.liveness.is_alive() {
            return;
        }
        match event.kind {
            SurfaceEventKind::VisibleRangeChanged(range) => self.on_range_changed(event.pane, range),
            SurfaceEventKind::PointerMoved(pointer) => self.on_pointer_moved(event.pane, pointer),
        }
    }

    fn on_range_changed(&self, source: PaneId, range: Option<LogicalRange>) {
        if self.resizing.get() {
            self.bump(|s| s.suppressed += 1);
            return;
        }
        let Some(_guard) = GuardScope::enter(&self.range_syncing) else {
            self.bump(|s| s.suppressed += 1);
            return;
        };
        let (Some(range), Some(panes)) = (range, self.panes.get()) else { return };

        self.visible_range.set(Some(range));
        for pane in panes.iter().filter(|pane| pane.id() != source) {
            if pane.with_surface(|surface| surface.set_visible_logical_range(range)).is_none() {
                log_trace!(LogComponent::Application("SyncCoordinator"), "pane '{}' busy, range skipped", pane.id());
            }
        }
        self.bump(|s| s.range_propagations += 1);
        log_trace!(
            LogComponent::Application("SyncCoordinator"),
            "range {:.1}..{:.1} from '{}'",
            range.from,
            range.to,
            source
        );
    }

    fn on_pointer_moved(&self, source: PaneId, pointer: PointerEvent) {
        if self.resizing.get() {
            self.bump(|s| s.suppressed += 1);
            return;
        }
        let Some(_guard) = GuardScope::enter(&self.crosshair_syncing) else {
            self.bump(|s| s.suppressed += 1);
            return;
        };
        let Some(panes) = self.panes.get().cloned() else { return };

        let Some(time) = pointer.time.clone() else {
            *self.hovered_time.borrow_mut() = None;
            for pane in panes.iter() {
                pane.with_surface(|surface| surface.clear_crosshair_position());
            }
            self.show_latest_legend();
            return;
        };

        if self.last_hovered.get() != source {
            log_debug!(
                LogComponent::Application("SyncCoordinator"),
                "horizontal line moves '{}' -> '{}'",
                self.last_hovered.get(),
                source
            );
            self.last_hovered.set(source);
            for pane in panes.iter() {
                let visible = pane.id() == source;
                pane.with_surface(|surface| surface.set_horz_line_visible(visible));
            }
        }

        let lookup = self.lookup.borrow().clone();
        for pane in panes.iter().filter(|pane| pane.id() != source) {
            if let Some(anchor) = lookup.anchors.get(&pane.id()) {
                pane.with_surface(|surface| surface.set_crosshair_position(&time, *anchor));
            }
        }
        self.bump(|s| s.crosshair_propagations += 1);

        let resolved = match self.context.try_borrow() {
            Ok(ctx) => ctx.resolve(&time).cloned(),
            Err(_) => {
                log_warn!(LogComponent::Application("SyncCoordinator"), "chart context busy, legend skipped");
                return;
            }
        };

        let mut overlay_values = OverlayValues::new();
        let record = if source == PaneId::Price {
            for (series, indicator) in &lookup.overlays {
                if let Some(PointValue::Value(value)) = pointer.value_of(*series) {
                    overlay_values.insert(indicator.clone(), value);
                }
            }
            let reported = lookup.candles.and_then(|candles| pointer.value_of(candles));
            match (resolved, reported) {
                (Some(record), Some(PointValue::Ohlc(ohlc))) => Some(record.with_ohlc_override(ohlc)),
                (record, _) => record,
            }
        } else {
            resolved
        };

        *self.hovered_time.borrow_mut() = Some(time);
        self.render(record, overlay_values);
    }

    fn render(&self, record: Option<TimeSeriesRecord>, overlay_values: OverlayValues) {
        let Some(panes) = self.panes.get() else { return };
        let legends = {
            let Ok(ctx) = self.context.try_borrow() else { return };
            render_legends(record.as_ref(), &ctx.configs, &panes.ids(), &overlay_values)
        };
        for (pane, legend) in &legends {
            panes.with_surface(*pane, |surface| surface.set_legend(legend));
        }
        *self.legend_record.borrow_mut() = record;
        *self.overlay_values.borrow_mut() = overlay_values;
        *self.legends.borrow_mut() = legends;
    }

    /// Legends for the most recent record, as shown when nothing is hovered
    pub fn show_latest_legend(&self) {
        let latest = match self.context.try_borrow() {
            Ok(ctx) => ctx.latest_record().cloned(),
            Err(_) => return,
        };
        self.render(latest, OverlayValues::new());
    }

    /// Re-renders from the last legend record against the current configuration
    pub fn refresh_legends(&self) {
        let record = self.legend_record.borrow().clone();
        if record.is_none() {
            self.show_latest_legend();
            return;
        }
        let overlay_values = self.overlay_values.borrow().clone();
        self.render(record, overlay_values);
    }

    /// Suppresses both channels until [`end_resize`](Self::end_resize)
    pub fn begin_resize(&self) {
        self.resizing.set(true);
    }

    pub fn end_resize(&self) {
        self.resizing.set(false);
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing.get()
    }

    pub fn legends(&self) -> BTreeMap<PaneId, PaneLegend> {
        self.legends.borrow().clone()
    }

    pub fn last_hovered(&self) -> PaneId {
        self.last_hovered.get()
    }

    pub fn hovered_time(&self) -> Option<TimeKey> {
        self.hovered_time.borrow().clone()
    }

    pub fn visible_range(&self) -> Option<LogicalRange> {
        self.visible_range.get()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get()
    }
}
