use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{
    chart::{
        Color, IndicatorConfigEntry, IndicatorConfigSet, IndicatorId, IndicatorKind, KindBinding, PaneId, Projection,
        SeriesId, SeriesKind, SeriesOptions, StructuralRole, structural_layout,
    },
    logging::LogComponent,
};
use crate::{log_debug, log_warn};

use super::pane_manager::PaneSet;

/// One live series on one pane
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesHandle {
    pub id: SeriesId,
    pub pane: PaneId,
    pub kind: SeriesKind,
    pub projection: Projection,
    pub options: SeriesOptions,
    /// Drawn and eligible for binding. Anchors are enabled while their options keep them invisible.
    pub enabled: bool,
    /// Data not yet pushed for the current input
    pub stale: bool,
    pub toggle: Option<IndicatorKind>,
}

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub created: usize,
    /// Visual options re-applied
    pub updated: usize,
    /// Same id, new column; data must be re-pushed
    pub rebound: usize,
    pub removed: usize,
    /// Structural groups shown or hidden
    pub toggled: usize,
}

impl ReconcileReport {
    /// Handles created or destroyed
    pub fn churn(&self) -> usize {
        self.created + self.removed
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// What the sync coordinator needs to know about live series
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesLookup {
    /// Series each pane positions its crosshair on
    pub anchors: BTreeMap<PaneId, SeriesId>,
    pub candles: Option<SeriesId>,
    /// Price-pane overlay series and the entries they draw
    pub overlays: BTreeMap<SeriesId, IndicatorId>,
}

/// Sole owner of every series handle of a mount.
///
/// Structural series are declared once per pane set and only toggled.
/// Dynamic series follow the configured entries and are diffed by id.
pub struct SeriesRegistry {
    structural: BTreeMap<(PaneId, StructuralRole), SeriesHandle>,
    dynamic: BTreeMap<IndicatorId, SeriesHandle>,
    default_color: Color,
}

impl SeriesRegistry {
    pub fn new(default_color: Color) -> Self {
        Self { structural: BTreeMap::new(), dynamic: BTreeMap::new(), default_color }
    }

    pub fn len(&self) -> usize {
        self.structural.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn structural(&self, pane: PaneId, role: StructuralRole) -> Option<&SeriesHandle> {
        self.structural.get(&(pane, role))
    }

    pub fn dynamic(&self, id: &IndicatorId) -> Option<&SeriesHandle> {
        self.dynamic.get(id)
    }

    pub fn dynamic_ids(&self) -> Vec<IndicatorId> {
        self.dynamic.keys().cloned().collect()
    }

    pub fn handles(&self) -> impl Iterator<Item = &SeriesHandle> + '_ {
        self.structural.values().chain(self.dynamic.values())
    }

    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut SeriesHandle> + '_ {
        self.structural.values_mut().chain(self.dynamic.values_mut())
    }

    pub fn candles(&self) -> Option<&SeriesHandle> {
        self.structural(PaneId::Price, StructuralRole::Candles)
    }

    /// Creates every pre-declared series on every pane. A series the surface
    /// refuses is logged and left out.
    pub fn declare_structural(&mut self, panes: &PaneSet) {
        for pane in panes.iter() {
            for decl in structural_layout(pane.id()) {
                let created = pane.with_surface(|surface| surface.add_series(decl.kind, &decl.options));
                match created {
                    Some(Ok(id)) => {
                        self.structural.insert(
                            (pane.id(), decl.role),
                            SeriesHandle {
                                id,
                                pane: pane.id(),
                                kind: decl.kind,
                                projection: decl.projection,
                                options: decl.options,
                                enabled: true,
                                stale: true,
                                toggle: decl.toggle,
                            },
                        );
                    }
                    Some(Err(err)) => {
                        log_warn!(
                            LogComponent::Application("SeriesRegistry"),
                            "pane '{}' refused structural series {:?}: {}",
                            pane.id(),
                            decl.role,
                            err
                        );
                    }
                    None => {
                        log_warn!(
                            LogComponent::Application("SeriesRegistry"),
                            "pane '{}' busy, structural series {:?} skipped",
                            pane.id(),
                            decl.role
                        );
                    }
                }
            }
        }
    }

    fn options_for(&self, entry: &IndicatorConfigEntry) -> SeriesOptions {
        let mut options = SeriesOptions::line(entry.color.unwrap_or(self.default_color), entry.line_width.unwrap_or(1.5));
        if let Some(style) = entry.line_style {
            options.line_style = style;
        }
        options.visible = entry.visible;
        options
    }

    fn projection_for(entry: &IndicatorConfigEntry) -> Projection {
        entry.column().map(|column| Projection::Line { column }).unwrap_or(Projection::Empty)
    }

    /// Brings live handles in line with `configs`, matching entries by id only.
    /// Entries sharing an id after the first are ignored.
    pub fn reconcile(&mut self, configs: &IndicatorConfigSet, panes: &PaneSet) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for handle in self.structural.values_mut() {
            let Some(kind) = handle.toggle else { continue };
            let wanted = configs.is_kind_visible(kind);
            if wanted == handle.enabled {
                continue;
            }
            handle.enabled = wanted;
            handle.options.visible = wanted;
            let applied = panes.with_surface(handle.pane, |surface| surface.apply_series_options(handle.id, &handle.options));
            if let Some(Err(err)) = applied {
                log_warn!(LogComponent::Application("SeriesRegistry"), "toggle of {} failed: {}", handle.id, err);
            }
            report.toggled += 1;
        }

        let mut desired: BTreeMap<IndicatorId, &IndicatorConfigEntry> = BTreeMap::new();
        for entry in configs.dynamic_entries() {
            desired.entry(entry.id.clone()).or_insert(entry);
        }

        let gone: Vec<IndicatorId> = self.dynamic.keys().filter(|id| !desired.contains_key(*id)).cloned().collect();
        for id in gone {
            if let Some(handle) = self.dynamic.remove(&id) {
                panes.with_surface(handle.pane, |surface| surface.remove_series(handle.id));
                report.removed += 1;
            }
        }

        for (id, entry) in desired {
            let KindBinding::DynamicLine { pane, .. } = entry.kind.descriptor().binding else { continue };
            let options = self.options_for(entry);
            let projection = Self::projection_for(entry);

            if let Some(handle) = self.dynamic.get_mut(&id) {
                if handle.projection != projection {
                    handle.projection = projection;
                    handle.stale = true;
                    report.rebound += 1;
                }
                handle.enabled = entry.visible;
                if handle.options != options {
                    handle.options = options;
                    let applied =
                        panes.with_surface(handle.pane, |surface| surface.apply_series_options(handle.id, &handle.options));
                    if let Some(Err(err)) = applied {
                        log_warn!(LogComponent::Application("SeriesRegistry"), "options for '{}' rejected: {}", id, err);
                    }
                    report.updated += 1;
                }
                continue;
            }

            match panes.with_surface(pane, |surface| surface.add_series(SeriesKind::Line, &options)) {
                Some(Ok(series)) => {
                    log_debug!(LogComponent::Application("SeriesRegistry"), "created {} for '{}'", series, id);
                    self.dynamic.insert(
                        id,
                        SeriesHandle {
                            id: series,
                            pane,
                            kind: SeriesKind::Line,
                            projection,
                            options,
                            enabled: entry.visible,
                            stale: true,
                            toggle: None,
                        },
                    );
                    report.created += 1;
                }
                Some(Err(err)) => {
                    log_warn!(LogComponent::Application("SeriesRegistry"), "series for '{}' not created: {}", id, err);
                }
                None => {
                    log_warn!(LogComponent::Application("SeriesRegistry"), "pane '{}' unavailable for '{}'", pane, id);
                }
            }
        }

        if !report.is_noop() {
            log_debug!(LogComponent::Application("SeriesRegistry"), "reconciled: {:?}", report);
        }
        report
    }

    /// New input: every handle needs its data again
    pub fn mark_all_stale(&mut self) {
        for handle in self.handles_mut() {
            handle.stale = true;
        }
    }

    pub fn lookup(&self) -> SeriesLookup {
        let anchors = self
            .structural
            .iter()
            .filter(|((pane, role), _)| match role {
                StructuralRole::Candles => *pane == PaneId::Price,
                StructuralRole::Anchor => true,
                _ => false,
            })
            .map(|((pane, _), handle)| (*pane, handle.id))
            .collect();
        let overlays = self
            .dynamic
            .iter()
            .filter(|(_, handle)| handle.pane == PaneId::Price)
            .map(|(id, handle)| (handle.id, id.clone()))
            .collect();
        SeriesLookup { anchors, candles: self.candles().map(|handle| handle.id), overlays }
    }

    /// Removes every series from its surface and forgets all handles
    pub fn dispose(&mut self, panes: &PaneSet) {
        let count = self.len();
        for handle in self.dynamic.values().chain(self.structural.values()) {
            panes.with_surface(handle.pane, |surface| surface.remove_series(handle.id));
        }
        self.dynamic.clear();
        self.structural.clear();
        log_debug!(LogComponent::Application("SeriesRegistry"), "disposed {} series", count);
    }
}
