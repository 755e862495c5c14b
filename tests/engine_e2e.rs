#![cfg(feature = "render")]
mod common;

use common::{Harness, day, default_configs, ema, input, pane_entries};
use multi_pane_chart_wasm::application::EngineStatus;
use multi_pane_chart_wasm::domain::chart::{
    IndicatorConfigSet, LogicalRange, PaneId, SeriesData, StructuralRole,
};
use multi_pane_chart_wasm::domain::errors::ChartError;
use multi_pane_chart_wasm::domain::market_data::{ChartInput, DivergenceSource, DivergenceType};

fn toggled_ema26(visible: bool) -> IndicatorConfigSet {
    let ema26 = ema("ema-26", 26, 0xa855f7);
    IndicatorConfigSet::new(
        vec![ema("ema-13", 13, 0xf59e0b), if visible { ema26 } else { ema26.hidden() }],
        pane_entries(),
        vec![],
    )
}

#[test]
fn toggling_an_overlay_touches_options_only() {
    let mut h = Harness::mounted(input(100), default_configs());
    let id = h.dynamic_id("ema-26");
    let data = h.overlay_series("ema-26").data;
    assert!(h.price_legend().contains("EMA(26)"));

    let off = h.engine.set_indicator_configs(toggled_ema26(false)).unwrap();
    assert_eq!((off.updated, off.churn()), (1, 0));
    assert!(!h.overlay_series("ema-26").options.visible);
    assert!(!h.price_legend().contains("EMA(26)"), "{}", h.price_legend());

    let on = h.engine.set_indicator_configs(toggled_ema26(true)).unwrap();
    assert_eq!((on.updated, on.churn()), (1, 0));
    let series = h.overlay_series("ema-26");
    assert_eq!(series.id, id);
    assert_eq!(series.data_pushes, 1);
    assert_eq!(series.data, data);
    assert!(h.price_legend().contains("EMA(26) 148.75"), "{}", h.price_legend());
}

#[test]
fn hidden_overlay_catches_up_when_shown() {
    let mut h = Harness::mounted(input(100), toggled_ema26(false));
    assert_eq!(h.overlay_series("ema-26").data_pushes, 0);

    h.engine.set_data(input(101)).unwrap();
    assert_eq!(h.overlay_series("ema-26").data_pushes, 0);

    h.engine.set_indicator_configs(toggled_ema26(true)).unwrap();
    let series = h.overlay_series("ema-26");
    assert_eq!(series.data_pushes, 1);
    assert_eq!(series.data.len(), 101);
}

#[test]
fn new_data_refits_and_shows_the_latest_bar() {
    let mut h = Harness::mounted(input(100), default_configs());
    h.probe(PaneId::Volume).user_pan(LogicalRange::new(10.0, 30.0).unwrap());
    h.probe(PaneId::Price).user_hover(&day(20));
    let fits = h.probe(PaneId::Price).fit_calls();

    h.engine.set_data(input(120)).unwrap();

    assert_eq!(h.probe(PaneId::Price).fit_calls(), fits + 1);
    let fitted = LogicalRange::new(-0.5, 119.5);
    assert_eq!(h.probe(PaneId::Force2).range(), fitted);
    assert!(h.price_legend().starts_with("O 159.50"), "{}", h.price_legend());
}

#[test]
fn configuration_changes_do_not_refit() {
    let mut h = Harness::mounted(input(100), default_configs());
    let range = LogicalRange::new(50.0, 90.0).unwrap();
    h.probe(PaneId::Price).user_pan(range);
    let fits = h.probe(PaneId::Price).fit_calls();

    h.engine.set_indicator_configs(toggled_ema26(false)).unwrap();

    assert_eq!(h.probe(PaneId::Price).fit_calls(), fits);
    assert_eq!(h.probe(PaneId::Macd).range(), Some(range));
}

#[test]
fn snapshot_stacks_every_pane() {
    let h = Harness::mounted(input(100), default_configs());
    let image = h.engine.snapshot().unwrap();
    let layout = h.engine.last_layout().unwrap();

    assert_eq!(image.width, 800);
    assert_eq!(image.height, layout.heights.iter().map(|(_, height)| height).sum::<u32>());
    assert!(image.is_well_formed());
}

#[test]
fn json_payloads_drive_a_full_mount() {
    let input: ChartInput = serde_json::from_str(
        r#"{
            "symbol": "BTC-USD",
            "timeframe": "4h",
            "data": [
                {"Date": "2024-03-01T00:00:00", "Open": 10, "High": 12, "Low": 9, "Close": 11, "Volume": 2500000, "ema_13": 10.5, "impulse": "green"},
                {"Date": "2024-03-02T00:00:00", "Open": 11, "High": 13, "Low": 10, "Close": 10.5, "Volume": 1500000, "ema_13": "10.75", "impulse": "red"}
            ],
            "divergences": {"macdDivergence": {"idx1": 0, "idx2": 1, "type": "bullish"}}
        }"#,
    )
    .unwrap();
    assert_eq!(input.divergences.macd_divergence.map(|d| d.kind), Some(DivergenceType::Bullish));
    let configs = IndicatorConfigSet::from_json(
        r##"{
            "overlays": [{"id": "ema-13", "type": "ema", "params": {"window": 13}, "color": "#f59e0b"}],
            "panes": [{"id": "vol", "type": "volume"}, {"id": "macd", "type": "macd", "visible": false}],
            "signals": [{"id": "div", "type": "macdDivergence"}]
        }"##,
    )
    .unwrap();

    let mut h = Harness::new();
    h.engine.mount(input, configs).unwrap();
    h.scheduler.settle(400);

    assert_eq!(h.engine.visible_panes(), vec![PaneId::Price, PaneId::Volume]);
    assert_eq!(h.price_legend(), "O 11.00 H 13.00 L 10.00 C 10.50 EMA(13) 10.75");
    assert_eq!(h.probe(PaneId::Volume).legend_text(), "VOL 1.50M");
    let divergence = StructuralRole::DivergencePrice(DivergenceSource::Macd);
    let SeriesData::Values(line) = h.structural_series(PaneId::Price, divergence).data else {
        panic!("line data expected");
    };
    assert_eq!(line.iter().map(|p| p.value).collect::<Vec<_>>(), vec![9.0, 10.0]);
    assert_eq!(h.structural_series(PaneId::Price, StructuralRole::Candles).data.len(), 2);
}

#[test]
fn operations_before_mount_report_not_mounted() {
    let mut h = Harness::new();
    assert_eq!(h.engine.status(), EngineStatus::Idle);
    assert_eq!(h.engine.set_data(input(10)), Err(ChartError::NotMounted));
    assert_eq!(h.engine.set_indicator_configs(default_configs()), Err(ChartError::NotMounted));
    assert_eq!(h.engine.snapshot().unwrap_err(), ChartError::NotMounted);
    assert!(h.engine.legends().is_empty());
    h.engine.notify_container_resized();
    assert_eq!(h.scheduler.pending_frames(), 0);
}
