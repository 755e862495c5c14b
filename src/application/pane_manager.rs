use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::application::series_registry::SeriesRegistry;
use crate::domain::{
    chart::{
        ChartTheme, PaneId, PaneSetIdentity, PaneSpec, Surface, SurfaceConfig, SurfaceEventSink,
        SurfaceFactory,
    },
    errors::{ChartError, ChartResult},
    logging::LogComponent,
    scheduling::ContainerSize,
};
use crate::{log_debug, log_error, log_info};

use super::resize_scheduler::compute_pane_heights;

/// One materialized pane
pub struct MountedPane {
    spec: PaneSpec,
    surface: RefCell<Box<dyn Surface>>,
}

impl MountedPane {
    pub fn id(&self) -> PaneId {
        self.spec.id
    }

    pub fn spec(&self) -> &PaneSpec {
        &self.spec
    }

    /// Runs `f` against the surface unless it is already borrowed further up
    /// the stack (a surface echoing into its own handler).
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut dyn Surface) -> R) -> Option<R> {
        let mut surface = self.surface.try_borrow_mut().ok()?;
        Some(f(surface.as_mut()))
    }
}

/// The visible panes of one mount, in stack order. Immutable once built;
/// a layout change produces a new set.
pub struct PaneSet {
    panes: Vec<MountedPane>,
    disposed: Cell<bool>,
}

impl PaneSet {
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountedPane> + '_ {
        self.panes.iter()
    }

    pub fn ids(&self) -> Vec<PaneId> {
        self.panes.iter().map(MountedPane::id).collect()
    }

    pub fn get(&self, pane: PaneId) -> Option<&MountedPane> {
        self.panes.iter().find(|p| p.id() == pane)
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.get(pane).is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn with_surface<R>(&self, pane: PaneId, f: impl FnOnce(&mut dyn Surface) -> R) -> Option<R> {
        if self.is_disposed() {
            return None;
        }
        self.get(pane)?.with_surface(f)
    }

    pub fn weights(&self) -> Vec<f64> {
        self.panes.iter().map(|p| p.spec.weight).collect()
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        for pane in self.panes.iter().rev() {
            if pane.with_surface(|surface| surface.dispose()).is_none() {
                log_error!(
                    LogComponent::Application("PaneManager"),
                    "surface for pane '{}' busy during dispose",
                    pane.id()
                );
            }
        }
    }
}

pub enum RebuildOutcome {
    /// Same identity; the existing surfaces were kept
    Unchanged(Rc<PaneSet>),
    Rebuilt(Rc<PaneSet>),
}

impl RebuildOutcome {
    pub fn panes(&self) -> &Rc<PaneSet> {
        match self {
            RebuildOutcome::Unchanged(panes) | RebuildOutcome::Rebuilt(panes) => panes,
        }
    }
}

/// Owns the pane surfaces and their lifecycle
pub struct PaneManager {
    factory: Box<dyn SurfaceFactory>,
    theme: ChartTheme,
    min_pane_height: u32,
    border_px: u32,
    current: Option<(PaneSetIdentity, Rc<PaneSet>)>,
}

impl PaneManager {
    pub fn new(factory: Box<dyn SurfaceFactory>, theme: ChartTheme, min_pane_height: u32, border_px: u32) -> Self {
        Self { factory, theme, min_pane_height, border_px, current: None }
    }

    pub fn is_current(&self, identity: &PaneSetIdentity) -> bool {
        self.current.as_ref().is_some_and(|(current, _)| current == identity)
    }

    pub fn panes(&self) -> Option<&Rc<PaneSet>> {
        self.current.as_ref().map(|(_, panes)| panes)
    }

    /// Materializes one surface per visible spec. Identical identity is a no-op.
    /// Otherwise the previous set and every series it owns are disposed first.
    pub fn rebuild(
        &mut self,
        identity: PaneSetIdentity,
        specs: &[PaneSpec],
        container: ContainerSize,
        registry: &mut SeriesRegistry,
        mut sink_for: impl FnMut(PaneId) -> SurfaceEventSink,
    ) -> ChartResult<RebuildOutcome> {
        if let Some((current, panes)) = &self.current {
            if *current == identity {
                log_debug!(LogComponent::Application("PaneManager"), "pane set unchanged, keeping surfaces");
                return Ok(RebuildOutcome::Unchanged(panes.clone()));
            }
        }
        self.dispose(registry);

        let visible: Vec<PaneSpec> = specs.iter().copied().filter(|s| s.visible).collect();
        let (width, height) = container.pixels();
        let weights: Vec<f64> = visible.iter().map(|s| s.weight).collect();
        let heights = compute_pane_heights(&weights, height, self.border_px, self.min_pane_height);

        let mut panes = Vec::with_capacity(visible.len());
        for (index, spec) in visible.iter().enumerate() {
            let is_last = index + 1 == visible.len();
            let config = SurfaceConfig {
                pane: spec.id,
                stack_index: index,
                theme: self.theme.clone(),
                width,
                height: heights.get(index).copied().unwrap_or(self.min_pane_height),
                time_axis_visible: is_last,
                crosshair_time_label_visible: is_last,
                horz_line_visible: spec.id == PaneId::Price,
            };
            match self.factory.create(&config, sink_for(spec.id)) {
                Ok(surface) => panes.push(MountedPane { spec: *spec, surface: RefCell::new(surface) }),
                Err(err) => {
                    log_error!(
                        LogComponent::Application("PaneManager"),
                        "surface creation failed for pane '{}': {}",
                        spec.id,
                        err
                    );
                    let partial = PaneSet { panes, disposed: Cell::new(false) };
                    partial.dispose();
                    return Err(ChartError::Initialization { pane: spec.id, reason: err.to_string() });
                }
            }
        }

        let set = Rc::new(PaneSet { panes, disposed: Cell::new(false) });
        log_info!(
            LogComponent::Application("PaneManager"),
            "built {} panes for {} {}",
            set.len(),
            identity.symbol,
            identity.timeframe
        );
        self.current = Some((identity, set.clone()));
        Ok(RebuildOutcome::Rebuilt(set))
    }

    /// Frees every series, then every surface
    pub fn dispose(&mut self, registry: &mut SeriesRegistry) {
        if let Some((_, panes)) = self.current.take() {
            registry.dispose(&panes);
            panes.dispose();
        }
    }
}
