pub mod config;
pub mod data_binder;
pub mod engine;
pub mod legend_renderer;
pub mod pane_manager;
pub mod resize_scheduler;
pub mod series_registry;
pub mod sync_coordinator;

pub use config::{EngineConfig, ResizePolicy};
pub use data_binder::{BindReport, ChartContext};
pub use engine::{ChartEngine, EngineStatus, FatalErrorCallback};
pub use legend_renderer::render_legends;
pub use pane_manager::{PaneManager, PaneSet};
pub use resize_scheduler::{PaneLayout, ResizeScheduler, compute_pane_heights};
pub use series_registry::{ReconcileReport, SeriesHandle, SeriesLookup, SeriesRegistry};
pub use sync_coordinator::{SyncCoordinator, SyncStats};
