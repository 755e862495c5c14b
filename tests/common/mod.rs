#![allow(dead_code)]

use std::rc::Rc;

use multi_pane_chart_wasm::application::{ChartEngine, EngineConfig};
use multi_pane_chart_wasm::domain::chart::{
    Color, IndicatorConfigEntry, IndicatorConfigSet, IndicatorKind, PaneId, SeriesId, StructuralRole,
};
use multi_pane_chart_wasm::domain::market_data::{ChartInput, TimeSeriesRecord};
use multi_pane_chart_wasm::infrastructure::rendering::{MemorySeries, MemorySurfaceFactory, SurfaceProbe};
use multi_pane_chart_wasm::infrastructure::{FixedContainer, ManualScheduler};

pub const WIDTH: f64 = 800.0;
pub const HEIGHT: f64 = 1000.0;

const MONTH_DAYS_2024: [usize; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// `i` days after 2024-01-01
pub fn day(i: usize) -> String {
    let mut rest = i % 366;
    for (month, days) in MONTH_DAYS_2024.iter().enumerate() {
        if rest < *days {
            return format!("2024-{:02}-{:02}", month + 1, rest + 1);
        }
        rest -= days;
    }
    unreachable!("2024 has 366 days")
}

/// Daily record with every column the default panes read
pub fn record(i: usize) -> TimeSeriesRecord {
    let base = 100.0 + i as f64 * 0.5;
    let open = base;
    let close = if i % 3 == 0 { base - 1.0 } else { base + 0.5 };
    let signed = i as f64 - 50.0;
    TimeSeriesRecord::new(format!("{}T00:00:00", day(i)))
        .with_ohlcv(open, open.max(close) + 1.0, open.min(close) - 1.0, close, 1_000_000.0 + i as f64 * 10_000.0)
        .with_field("ema_13", base - 0.25)
        .with_field("ema_26", base - 0.75)
        .with_field("volume_sma_20", 1_000_000.0)
        .with_field("macd_diff", signed / 10.0)
        .with_field("macd_signal", signed / 12.0)
        .with_field("efi", signed * 1e5)
        .with_field("efi_truncated", signed * 1e5)
        .with_field("force_index_2", signed * 1e3)
        .with_value("impulse", serde_json::json!(["green", "red", "blue"][i % 3]))
}

pub fn records(n: usize) -> Vec<TimeSeriesRecord> {
    (0..n).map(record).collect()
}

pub fn input(n: usize) -> ChartInput {
    ChartInput::new("AAPL", "1d", records(n))
}

pub fn ema(id: &str, window: u32, color: u32) -> IndicatorConfigEntry {
    IndicatorConfigEntry::moving_average(id, IndicatorKind::Ema, window).with_color(Color::from_hex(color))
}

pub fn pane_entries() -> Vec<IndicatorConfigEntry> {
    vec![
        IndicatorConfigEntry::new("volume", IndicatorKind::Volume),
        IndicatorConfigEntry::new("macd", IndicatorKind::Macd),
        IndicatorConfigEntry::new("force13", IndicatorKind::Force13),
        IndicatorConfigEntry::new("force2", IndicatorKind::Force2),
    ]
}

/// Two EMA overlays and all four secondary panes
pub fn default_configs() -> IndicatorConfigSet {
    IndicatorConfigSet::new(vec![ema("ema-13", 13, 0xf59e0b), ema("ema-26", 26, 0xa855f7)], pane_entries(), vec![])
}

pub fn configs_with_signals(signals: Vec<IndicatorConfigEntry>) -> IndicatorConfigSet {
    IndicatorConfigSet::new(vec![ema("ema-13", 13, 0xf59e0b), ema("ema-26", 26, 0xa855f7)], pane_entries(), signals)
}

/// Engine over headless surfaces, a hand-driven clock and a fixed container
pub struct Harness {
    pub engine: ChartEngine,
    pub factory: MemorySurfaceFactory,
    pub scheduler: ManualScheduler,
    pub container: FixedContainer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let factory = MemorySurfaceFactory::new();
        let scheduler = ManualScheduler::new();
        let container = FixedContainer::new(WIDTH, HEIGHT);
        let engine = ChartEngine::new(
            config,
            Box::new(factory.clone()),
            Rc::new(scheduler.clone()),
            Rc::new(container.clone()),
        );
        Self { engine, factory, scheduler, container }
    }

    /// Mounted and past every startup resize pass
    pub fn mounted(input: ChartInput, configs: IndicatorConfigSet) -> Self {
        let mut harness = Self::new();
        harness.engine.mount(input, configs).expect("mount");
        harness.scheduler.settle(400);
        harness
    }

    pub fn probe(&self, pane: PaneId) -> SurfaceProbe {
        self.factory.probe(pane).expect("surface for pane")
    }

    pub fn structural_id(&self, pane: PaneId, role: StructuralRole) -> SeriesId {
        self.engine.registry().structural(pane, role).expect("structural series").id
    }

    pub fn dynamic_id(&self, id: &str) -> SeriesId {
        self.engine.registry().dynamic(&id.into()).expect("dynamic series").id
    }

    pub fn structural_series(&self, pane: PaneId, role: StructuralRole) -> MemorySeries {
        self.probe(pane).series(self.structural_id(pane, role)).expect("series on surface")
    }

    pub fn overlay_series(&self, id: &str) -> MemorySeries {
        self.probe(PaneId::Price).series(self.dynamic_id(id)).expect("overlay on surface")
    }

    pub fn price_legend(&self) -> String {
        self.probe(PaneId::Price).legend_text()
    }
}
