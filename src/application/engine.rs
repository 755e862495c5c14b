use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::domain::{
    chart::{
        IndicatorConfigSet, PaneId, PaneImage, PaneLegend, PaneSetIdentity, PaneSpec, SurfaceEvent, SurfaceFactory,
        compose_vertical,
    },
    errors::{ChartError, ChartResult},
    logging::LogComponent,
    market_data::ChartInput,
    scheduling::{ContainerMeasure, FrameScheduler, LivenessToken},
};
use crate::{log_debug, log_error, log_info, log_warn};

use super::config::EngineConfig;
use super::data_binder::{self, ChartContext};
use super::pane_manager::{PaneManager, PaneSet};
use super::resize_scheduler::{PaneLayout, ResizeScheduler};
use super::series_registry::{ReconcileReport, SeriesRegistry};
use super::sync_coordinator::{SyncCoordinator, SyncStats};

pub type FatalErrorCallback = Rc<dyn Fn(&ChartError)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Mounted,
    Failed,
}

/// Everything tied to one pane set; dropped as a unit
struct Session {
    liveness: LivenessToken,
    panes: Rc<PaneSet>,
    sync: Rc<SyncCoordinator>,
    resize: ResizeScheduler,
}

enum EngineState {
    Idle,
    Mounted(Session),
    Failed(ChartError),
}

/// Multi-pane chart: owns the panes, their series and the sync protocol.
///
/// `mount` builds the pane stack for a symbol and timeframe. Data and
/// configuration updates reuse the stack unless its identity changes.
pub struct ChartEngine {
    config: EngineConfig,
    scheduler: Rc<dyn FrameScheduler>,
    container: Rc<dyn ContainerMeasure>,
    pane_manager: PaneManager,
    registry: SeriesRegistry,
    context: Rc<RefCell<ChartContext>>,
    state: EngineState,
    on_fatal: Option<FatalErrorCallback>,
    fatal_reported: bool,
}

impl ChartEngine {
    pub fn new(
        config: EngineConfig,
        factory: Box<dyn SurfaceFactory>,
        scheduler: Rc<dyn FrameScheduler>,
        container: Rc<dyn ContainerMeasure>,
    ) -> Self {
        let pane_manager = PaneManager::new(
            factory,
            config.theme.clone(),
            config.resize.min_pane_height,
            config.resize.border_px,
        );
        let registry = SeriesRegistry::new(config.default_overlay_color);
        Self {
            config,
            scheduler,
            container,
            pane_manager,
            registry,
            context: Rc::new(RefCell::new(ChartContext::default())),
            state: EngineState::Idle,
            on_fatal: None,
            fatal_reported: false,
        }
    }

    /// Called once per mount with the first initialization failure
    pub fn on_fatal_error(&mut self, callback: impl Fn(&ChartError) + 'static) {
        self.on_fatal = Some(Rc::new(callback));
    }

    pub fn status(&self) -> EngineStatus {
        match self.state {
            EngineState::Idle => EngineStatus::Idle,
            EngineState::Mounted(_) => EngineStatus::Mounted,
            EngineState::Failed(_) => EngineStatus::Failed,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds the pane stack and binds everything. Also the retry path after a failure.
    pub fn mount(&mut self, input: ChartInput, configs: IndicatorConfigSet) -> ChartResult<()> {
        self.teardown();
        self.fatal_reported = false;
        log_info!(
            LogComponent::Application("ChartEngine"),
            "mounting {} {} with {} records",
            input.symbol,
            input.timeframe,
            input.records.len()
        );
        *self.context.borrow_mut() = ChartContext::new(input, configs);
        self.rebuild_if_needed().map(|_| ())
    }

    /// New records or divergences. Rebinds every series, refits and shows the latest legend.
    pub fn set_data(&mut self, input: ChartInput) -> ChartResult<()> {
        self.ensure_mounted()?;
        self.context.borrow_mut().replace_input(input);
        if !self.rebuild_if_needed()? {
            self.rebind_all();
        }
        Ok(())
    }

    /// Reconciles series in place. Pane visibility changes rebuild the stack.
    pub fn set_indicator_configs(&mut self, configs: IndicatorConfigSet) -> ChartResult<ReconcileReport> {
        self.ensure_mounted()?;
        self.context.borrow_mut().configs = configs;
        if self.rebuild_if_needed()? {
            return Ok(ReconcileReport::default());
        }
        let EngineState::Mounted(session) = &self.state else {
            return Err(ChartError::NotMounted);
        };
        let report = {
            let ctx = self.context.borrow();
            let report = self.registry.reconcile(&ctx.configs, &session.panes);
            let bind = data_binder::bind_stale(&ctx, &mut self.registry, &session.panes);
            data_binder::bind_markers(&ctx, &self.registry, &session.panes);
            data_binder::bind_price_lines(&ctx, &self.registry, &session.panes);
            log_debug!(
                LogComponent::Application("ChartEngine"),
                "config update: {:?}, {} series bound",
                report,
                bind.bound
            );
            report
        };
        session.sync.set_series_lookup(self.registry.lookup());
        session.sync.refresh_legends();
        Ok(report)
    }

    pub fn notify_container_resized(&self) {
        if let EngineState::Mounted(session) = &self.state {
            session.resize.request();
        }
    }

    /// Sidebar animations resize the container over time; sample it across the transition.
    pub fn notify_layout_transition(&self) {
        if let EngineState::Mounted(session) = &self.state {
            session.resize.schedule_checkpoints(&self.config.resize.transition_checkpoints_ms);
        }
    }

    /// Feeds an event as if a surface had emitted it
    pub fn dispatch(&self, event: SurfaceEvent) {
        if let EngineState::Mounted(session) = &self.state {
            session.sync.handle(event);
        }
    }

    pub fn legends(&self) -> BTreeMap<PaneId, PaneLegend> {
        match &self.state {
            EngineState::Mounted(session) => session.sync.legends(),
            _ => BTreeMap::new(),
        }
    }

    pub fn visible_panes(&self) -> Vec<PaneId> {
        match &self.state {
            EngineState::Mounted(session) => session.panes.ids(),
            _ => Vec::new(),
        }
    }

    pub fn sync_stats(&self) -> Option<SyncStats> {
        match &self.state {
            EngineState::Mounted(session) => Some(session.sync.stats()),
            _ => None,
        }
    }

    pub fn last_hovered(&self) -> Option<PaneId> {
        match &self.state {
            EngineState::Mounted(session) => Some(session.sync.last_hovered()),
            _ => None,
        }
    }

    pub fn last_layout(&self) -> Option<PaneLayout> {
        match &self.state {
            EngineState::Mounted(session) => session.resize.last_layout(),
            _ => None,
        }
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    /// All visible panes stacked top to bottom, or the price pane alone when
    /// the stack cannot be composed.
    pub fn snapshot(&self) -> ChartResult<PaneImage> {
        let EngineState::Mounted(session) = &self.state else {
            return Err(self.unavailable_error());
        };
        let mut images = Vec::with_capacity(session.panes.len());
        for pane in session.panes.iter() {
            match pane.with_surface(|surface| surface.snapshot()) {
                Some(Ok(image)) => images.push((pane.id(), image)),
                Some(Err(err)) => {
                    log_warn!(LogComponent::Application("ChartEngine"), "snapshot of '{}' failed: {}", pane.id(), err);
                }
                None => {
                    log_warn!(LogComponent::Application("ChartEngine"), "pane '{}' busy during snapshot", pane.id());
                }
            }
        }
        if images.len() == session.panes.len() {
            let stack: Vec<PaneImage> = images.iter().map(|(_, image)| image.clone()).collect();
            if let Some(composed) = compose_vertical(&stack) {
                return Ok(composed);
            }
        }
        log_warn!(LogComponent::Application("ChartEngine"), "snapshot falls back to the price pane");
        images
            .into_iter()
            .find(|(pane, _)| *pane == PaneId::Price)
            .map(|(_, image)| image)
            .ok_or_else(|| ChartError::Snapshot("price pane produced no image".to_string()))
    }

    /// Disposes every surface and returns to idle
    pub fn unmount(&mut self) {
        self.teardown();
        log_info!(LogComponent::Application("ChartEngine"), "unmounted");
    }

    fn ensure_mounted(&self) -> ChartResult<()> {
        match &self.state {
            EngineState::Mounted(_) => Ok(()),
            _ => Err(self.unavailable_error()),
        }
    }

    fn unavailable_error(&self) -> ChartError {
        match &self.state {
            EngineState::Failed(err) => err.clone(),
            _ => ChartError::NotMounted,
        }
    }

    fn identity(&self) -> (PaneSetIdentity, Vec<PaneSpec>) {
        let ctx = self.context.borrow();
        let specs = PaneSpec::stack_for(&ctx.configs, &self.config.pane_weights);
        let identity = PaneSetIdentity::new(&ctx.input.symbol, &ctx.input.timeframe, &specs);
        (identity, specs)
    }

    /// Returns `true` when a new pane stack was built
    fn rebuild_if_needed(&mut self) -> ChartResult<bool> {
        let (identity, specs) = self.identity();
        if matches!(self.state, EngineState::Mounted(_)) && self.pane_manager.is_current(&identity) {
            return Ok(false);
        }
        self.teardown();

        let liveness = LivenessToken::new();
        let sync = SyncCoordinator::new(self.context.clone(), liveness.clone());
        let measured = self.container.measure();
        let size = if measured.is_degenerate() { self.config.fallback_size() } else { measured };

        let outcome = self.pane_manager.rebuild(identity, &specs, size, &mut self.registry, |pane| sync.sink_for(pane));
        let panes = match outcome {
            Ok(outcome) => outcome.panes().clone(),
            Err(err) => {
                liveness.invalidate();
                return Err(self.fail(err));
            }
        };
        sync.attach(panes.clone());
        self.registry.declare_structural(&panes);

        let resize = ResizeScheduler::new(
            panes.clone(),
            sync.clone(),
            self.scheduler.clone(),
            self.container.clone(),
            liveness.clone(),
            self.config.resize.clone(),
        );
        resize.request();
        resize.schedule_checkpoints(&self.config.resize.mount_checkpoints_ms);

        self.state = EngineState::Mounted(Session { liveness, panes, sync, resize });
        self.rebind_all();
        Ok(true)
    }

    fn rebind_all(&mut self) {
        let EngineState::Mounted(session) = &self.state else { return };
        {
            let ctx = self.context.borrow();
            self.registry.reconcile(&ctx.configs, &session.panes);
            self.registry.mark_all_stale();
            let report = data_binder::bind_stale(&ctx, &mut self.registry, &session.panes);
            let markers = data_binder::bind_markers(&ctx, &self.registry, &session.panes);
            let levels = data_binder::bind_price_lines(&ctx, &self.registry, &session.panes);
            log_debug!(
                LogComponent::Application("ChartEngine"),
                "bound {} series, {} markers, {} price lines, {} failures",
                report.bound,
                markers,
                levels,
                report.failures.len()
            );
        }
        session.sync.set_series_lookup(self.registry.lookup());
        session.panes.with_surface(PaneId::Price, |surface| surface.fit_content());
        session.sync.show_latest_legend();
    }

    fn fail(&mut self, err: ChartError) -> ChartError {
        log_error!(LogComponent::Application("ChartEngine"), "{}", err);
        self.state = EngineState::Failed(err.clone());
        if err.is_fatal() && !self.fatal_reported {
            self.fatal_reported = true;
            if let Some(callback) = self.on_fatal.clone() {
                callback(&err);
            }
        }
        err
    }

    fn teardown(&mut self) {
        if let EngineState::Mounted(session) = std::mem::replace(&mut self.state, EngineState::Idle) {
            session.liveness.invalidate();
            session.resize.cancel_all();
        }
        self.pane_manager.dispose(&mut self.registry);
    }
}

impl Drop for ChartEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
