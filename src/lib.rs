use wasm_bindgen::prelude::*;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::{ChartEngine, EngineConfig};
pub use presentation::{MultiPaneChart, MultiPaneChartView};

/// Installs the panic hook and the browser clock. The logger is installed by
/// the first chart, at the level its configuration asks for.
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();
    domain::logging::init_time_provider(Box::new(infrastructure::services::BrowserTimeProvider));
}
