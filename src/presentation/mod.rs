pub mod chart_view;
pub mod wasm_api;

pub use chart_view::MultiPaneChartView;
pub use wasm_api::MultiPaneChart;
