#![cfg(feature = "render")]
mod common;

use common::{Harness, configs_with_signals, day, default_configs, input, record, records};
use multi_pane_chart_wasm::domain::chart::{
    Color, IndicatorConfigEntry, IndicatorConfigSet, IndicatorKind, LineStyle, MarkerPosition, PaneId, PointValue,
    SeriesData, StructuralRole,
};
use multi_pane_chart_wasm::domain::market_data::{
    ChartInput, DivergenceAnnotation, DivergenceSet, DivergenceSource, DivergenceType, SrLevel, SrLevelType, TimeKey,
};

fn times(data: &SeriesData) -> Vec<String> {
    data.times().into_iter().map(|t| t.to_string()).collect()
}

fn values(data: &SeriesData) -> Vec<f64> {
    match data {
        SeriesData::Values(points) => points.iter().map(|p| p.value).collect(),
        SeriesData::Candles(points) => points.iter().map(|p| p.ohlc.close).collect(),
    }
}

#[test]
fn missing_values_leave_gaps_not_zeros() {
    let mut rows = records(20);
    rows[5] = record(5).with_field("ema_13", f64::NAN);
    rows[6] = record(6).with_value("ema_13", serde_json::Value::Null);
    let h = Harness::mounted(ChartInput::new("AAPL", "1d", rows), default_configs());

    let ema = h.overlay_series("ema-13");
    assert_eq!(ema.data.len(), 18);
    assert!(!times(&ema.data).contains(&day(5)));
    assert!(!times(&ema.data).contains(&day(6)));
    assert!(values(&ema.data).iter().all(|v| *v != 0.0));

    // zero is a value, not a gap
    let h = Harness::mounted(input(60), default_configs());
    let macd = h.structural_series(PaneId::Macd, StructuralRole::MacdHistogram);
    assert_eq!(macd.data.len(), 60);
    assert!(values(&macd.data).contains(&0.0));
}

#[test]
fn candles_are_colored_by_impulse_and_volume_by_direction() {
    let h = Harness::mounted(input(6), default_configs());
    let SeriesData::Candles(candles) = h.structural_series(PaneId::Price, StructuralRole::Candles).data else {
        panic!("candles expected");
    };
    let colors: Vec<Option<Color>> = candles.iter().map(|c| c.color).collect();
    assert_eq!(colors[..3], [Some(Color::UP), Some(Color::DOWN), Some(Color::NEUTRAL)]);

    let SeriesData::Values(bars) = h.structural_series(PaneId::Volume, StructuralRole::VolumeBars).data else {
        panic!("histogram expected");
    };
    // record 0 closes below its open
    assert_eq!(bars[0].color, Some(Color::rgba(239, 68, 68, 0.3)));
    assert_eq!(bars[1].color, Some(Color::rgba(34, 197, 94, 0.3)));
}

#[test]
fn duplicate_time_keys_keep_the_first_record() {
    let mut rows = records(10);
    rows.insert(4, record(3).with_field("ema_13", 1.0));
    let h = Harness::mounted(ChartInput::new("AAPL", "1d", rows), default_configs());

    let ema = h.overlay_series("ema-13");
    assert_eq!(ema.data.len(), 10);
    assert_eq!(ema.data.value_at(&TimeKey::from(day(3).as_str())), Some(PointValue::Value(101.25)));
}

#[test]
fn divergence_lines_follow_annotations_and_clear_without_them() {
    let configs = configs_with_signals(vec![IndicatorConfigEntry::new("macd-div", IndicatorKind::MacdDivergence)]);
    let annotated = input(60).with_divergences(DivergenceSet {
        macd_divergence: Some(DivergenceAnnotation::new(40, 10, DivergenceType::Bearish)),
        force_divergence: None,
    });
    let mut h = Harness::mounted(annotated, configs);

    let on_price = h.structural_series(PaneId::Price, StructuralRole::DivergencePrice(DivergenceSource::Macd));
    assert_eq!(times(&on_price.data), vec![day(10), day(40)]);
    assert_eq!(values(&on_price.data), vec![record(10).high.unwrap(), record(40).high.unwrap()]);
    assert_eq!(on_price.options.color, Some(Color::DOWN));

    let on_macd = h.structural_series(PaneId::Macd, StructuralRole::DivergenceIndicator(DivergenceSource::Macd));
    assert_eq!(values(&on_macd.data), vec![-4.0, -1.0]);

    h.engine.set_data(input(60)).unwrap();
    let cleared = h.structural_series(PaneId::Price, StructuralRole::DivergencePrice(DivergenceSource::Macd));
    assert!(cleared.data.is_empty());
    assert_eq!(cleared.data_pushes, 2);
    assert!(h.structural_series(PaneId::Macd, StructuralRole::DivergenceIndicator(DivergenceSource::Macd)).data.is_empty());
}

#[test]
fn unresolvable_divergence_endpoint_clears_the_line() {
    let configs = configs_with_signals(vec![IndicatorConfigEntry::new("f-div", IndicatorKind::ForceDivergence)]);
    let annotated = input(30).with_divergences(DivergenceSet {
        macd_divergence: None,
        force_divergence: Some(DivergenceAnnotation::new(5, 300, DivergenceType::Bullish)),
    });
    let h = Harness::mounted(annotated, configs);

    let line = h.structural_series(PaneId::Force13, StructuralRole::DivergenceIndicator(DivergenceSource::ForceIndex));
    assert_eq!(line.data_pushes, 1);
    assert!(line.data.is_empty());
}

#[test]
fn one_rejected_series_does_not_block_the_rest() {
    let mut h = Harness::mounted(input(60), default_configs());
    let histogram = h.structural_id(PaneId::Macd, StructuralRole::MacdHistogram);
    h.probe(PaneId::Macd).reject_data_for(histogram, true);

    h.engine.set_data(input(61)).unwrap();

    assert_eq!(h.structural_series(PaneId::Macd, StructuralRole::MacdHistogram).data.len(), 60);
    assert_eq!(h.structural_series(PaneId::Macd, StructuralRole::MacdSignal).data.len(), 61);
    assert_eq!(h.structural_series(PaneId::Price, StructuralRole::Candles).data.len(), 61);
    assert!(h.price_legend().starts_with("O 130.00"), "{}", h.price_legend());
}

#[test]
fn force_markers_win_over_guppy_markers() {
    let mut rows = records(20);
    rows[7] = record(7).with_value("efi_buy_signal", serde_json::json!(true)).with_field("guppy_signal", 1.0);
    rows[9] = record(9).with_value("efi_sell_signal", serde_json::json!(true));
    rows[12] = record(12).with_field("guppy_signal", -1.0);
    let configs = configs_with_signals(vec![
        IndicatorConfigEntry::new("markers", IndicatorKind::ForceMarkers),
        IndicatorConfigEntry::new("guppy-signals", IndicatorKind::GuppySignals),
    ]);
    let h = Harness::mounted(ChartInput::new("AAPL", "1d", rows), configs);

    let markers = h.structural_series(PaneId::Price, StructuralRole::Candles).markers;
    let summary: Vec<(String, MarkerPosition, String)> =
        markers.iter().map(|m| (m.time.to_string(), m.position, m.text.clone())).collect();
    assert_eq!(
        summary,
        vec![
            (day(7), MarkerPosition::BelowBar, "E".to_string()),
            (day(9), MarkerPosition::AboveBar, "E".to_string()),
            (day(12), MarkerPosition::AboveBar, "G".to_string()),
        ]
    );
}

#[test]
fn markers_clear_when_their_signal_is_hidden() {
    let mut rows = records(20);
    rows[3] = record(3).with_value("efi_buy_signal", serde_json::json!(1));
    let configs = configs_with_signals(vec![IndicatorConfigEntry::new("markers", IndicatorKind::ForceMarkers)]);
    let mut h = Harness::mounted(ChartInput::new("AAPL", "1d", rows), configs);
    assert_eq!(h.structural_series(PaneId::Price, StructuralRole::Candles).markers.len(), 1);

    let hidden = configs_with_signals(vec![IndicatorConfigEntry::new("markers", IndicatorKind::ForceMarkers).hidden()]);
    h.engine.set_indicator_configs(hidden).unwrap();
    assert!(h.structural_series(PaneId::Price, StructuralRole::Candles).markers.is_empty());
}

#[test]
fn rejected_divergence_recolor_keeps_the_data_and_retries() {
    let configs = configs_with_signals(vec![IndicatorConfigEntry::new("macd-div", IndicatorKind::MacdDivergence)]);
    let annotated = |kind| {
        input(60).with_divergences(DivergenceSet {
            macd_divergence: Some(DivergenceAnnotation::new(40, 10, kind)),
            force_divergence: None,
        })
    };
    let mut h = Harness::mounted(annotated(DivergenceType::Bearish), configs);
    let role = StructuralRole::DivergencePrice(DivergenceSource::Macd);
    let id = h.structural_id(PaneId::Price, role);
    h.probe(PaneId::Price).reject_options_for(id, true);

    h.engine.set_data(annotated(DivergenceType::Bullish)).unwrap();
    let line = h.structural_series(PaneId::Price, role);
    assert_eq!(line.options.color, Some(Color::DOWN));
    assert_eq!(values(&line.data), vec![record(10).low.unwrap(), record(40).low.unwrap()]);

    h.probe(PaneId::Price).reject_options_for(id, false);
    h.engine.set_data(annotated(DivergenceType::Bullish)).unwrap();
    assert_eq!(h.structural_series(PaneId::Price, role).options.color, Some(Color::UP));
}

fn with_sr_entry(visible: bool) -> IndicatorConfigSet {
    let entry = IndicatorConfigEntry::new("sr", IndicatorKind::SrLevels);
    let mut configs = default_configs();
    configs.overlays.push(if visible { entry } else { entry.hidden() });
    configs
}

#[test]
fn support_and_resistance_lines_follow_their_toggle() {
    let levels = vec![
        SrLevel::new(120.0, SrLevelType::Resistance),
        SrLevel::new(f64::NAN, SrLevelType::Support),
        SrLevel::new(95.0, SrLevelType::Support),
    ];
    let mut h = Harness::mounted(input(30).with_sr_levels(levels), with_sr_entry(true));

    let lines = h.structural_series(PaneId::Price, StructuralRole::Candles).price_lines;
    let summary: Vec<(f64, Color, String)> = lines.iter().map(|l| (l.price, l.color, l.title.clone())).collect();
    assert_eq!(
        summary,
        vec![(120.0, Color::DOWN, "RESISTANCE".to_string()), (95.0, Color::UP, "SUPPORT".to_string())]
    );
    assert!(lines.iter().all(|l| l.line_style == LineStyle::Dotted));
    assert!(!h.price_legend().contains("SR"), "{}", h.price_legend());

    let report = h.engine.set_indicator_configs(with_sr_entry(false)).unwrap();
    assert_eq!(report.churn(), 0);
    assert!(h.structural_series(PaneId::Price, StructuralRole::Candles).price_lines.is_empty());

    h.engine.set_indicator_configs(with_sr_entry(true)).unwrap();
    assert_eq!(h.structural_series(PaneId::Price, StructuralRole::Candles).price_lines.len(), 2);

    h.engine.set_data(input(31)).unwrap();
    assert!(h.structural_series(PaneId::Price, StructuralRole::Candles).price_lines.is_empty());
}
