#![cfg(feature = "render")]
mod common;

use common::{Harness, default_configs, ema, input, pane_entries};
use multi_pane_chart_wasm::domain::chart::{
    IndicatorConfigEntry, IndicatorConfigSet, IndicatorKind, PaneId, StructuralRole,
};
use quickcheck_macros::quickcheck;

#[test]
fn same_configuration_twice_changes_nothing() {
    let mut h = Harness::mounted(input(60), default_configs());
    let created = h.factory.created_count();
    let series = h.probe(PaneId::Price).series_count();

    let report = h.engine.set_indicator_configs(default_configs()).unwrap();

    assert!(report.is_noop(), "{:?}", report);
    assert_eq!(h.factory.created_count(), created);
    assert_eq!(h.probe(PaneId::Price).series_count(), series);
}

#[test]
fn reordering_overlays_keeps_series_identity() {
    let mut h = Harness::mounted(input(60), default_configs());
    let ema13 = h.dynamic_id("ema-13");
    let ema26 = h.dynamic_id("ema-26");

    let reordered = IndicatorConfigSet::new(
        vec![ema("ema-26", 26, 0xa855f7), ema("ema-13", 13, 0xf59e0b)],
        pane_entries(),
        vec![],
    );
    let report = h.engine.set_indicator_configs(reordered).unwrap();

    assert_eq!(report.churn(), 0);
    assert_eq!(h.dynamic_id("ema-13"), ema13);
    assert_eq!(h.dynamic_id("ema-26"), ema26);
    let legend = h.price_legend();
    let (a, b) = (legend.find("EMA(26)").unwrap(), legend.find("EMA(13)").unwrap());
    assert!(a < b, "legend follows list order: {}", legend);
}

#[test]
fn window_change_rebinds_in_place() {
    let mut h = Harness::mounted(input(60), default_configs());
    let id = h.dynamic_id("ema-26");
    assert_eq!(h.overlay_series("ema-26").data_pushes, 1);

    let changed = IndicatorConfigSet::new(
        vec![ema("ema-13", 13, 0xf59e0b), ema("ema-26", 13, 0xa855f7)],
        pane_entries(),
        vec![],
    );
    let report = h.engine.set_indicator_configs(changed).unwrap();

    assert_eq!(report.rebound, 1);
    assert_eq!(report.churn(), 0);
    assert_eq!(h.dynamic_id("ema-26"), id);
    let rebound = h.overlay_series("ema-26");
    assert_eq!(rebound.data_pushes, 2);
    assert_eq!(rebound.data, h.overlay_series("ema-13").data);
}

#[test]
fn removed_and_added_entries_follow_the_configuration() {
    let mut h = Harness::mounted(input(60), default_configs());
    let old = h.dynamic_id("ema-26");

    let next = IndicatorConfigSet::new(
        vec![
            ema("ema-13", 13, 0xf59e0b),
            IndicatorConfigEntry::moving_average("sma-50", IndicatorKind::Sma, 50),
        ],
        pane_entries(),
        vec![],
    );
    let report = h.engine.set_indicator_configs(next).unwrap();

    assert_eq!((report.created, report.removed), (1, 1));
    assert!(h.probe(PaneId::Price).series(old).is_none());
    assert!(h.engine.registry().dynamic(&"ema-26".into()).is_none());
    assert!(h.engine.registry().dynamic(&"sma-50".into()).is_some());
}

#[test]
fn structural_groups_toggle_without_recreation() {
    let mut h = Harness::mounted(input(60), default_configs());
    let created = h.factory.created_count();
    let upper = h.structural_id(PaneId::Price, StructuralRole::BollingerUpper);
    assert!(!h.structural_series(PaneId::Price, StructuralRole::BollingerUpper).options.visible);

    let mut with_bands = default_configs();
    with_bands.overlays.push(IndicatorConfigEntry::new("bb", IndicatorKind::Bollinger));
    let report = h.engine.set_indicator_configs(with_bands).unwrap();

    assert_eq!(report.toggled, 3);
    assert_eq!(report.churn(), 0);
    assert_eq!(h.factory.created_count(), created);
    assert_eq!(h.structural_id(PaneId::Price, StructuralRole::BollingerUpper), upper);
    let series = h.structural_series(PaneId::Price, StructuralRole::BollingerUpper);
    assert!(series.options.visible);
    assert_eq!(series.data_pushes, 1);
}

fn overlay_pool(pick: u8) -> Option<IndicatorConfigEntry> {
    let entry = match pick % 5 {
        0 => ema("ema-13", 13, 0xf59e0b),
        1 => ema("ema-26", 26, 0xa855f7),
        2 => ema("ema-8", 8, 0x22d3ee),
        3 => IndicatorConfigEntry::moving_average("sma-50", IndicatorKind::Sma, 50),
        _ => return None,
    };
    Some(if pick & 0x10 != 0 { entry.hidden() } else { entry })
}

#[quickcheck]
fn reconcile_is_idempotent(picks: Vec<u8>) -> bool {
    let mut h = Harness::mounted(input(30), default_configs());
    let overlays: Vec<IndicatorConfigEntry> = picks.iter().take(8).filter_map(|p| overlay_pool(*p)).collect();
    let configs = IndicatorConfigSet::new(overlays, pane_entries(), vec![]);

    let first = h.engine.set_indicator_configs(configs.clone()).unwrap();
    let ids = h.engine.registry().dynamic_ids();
    let second = h.engine.set_indicator_configs(configs.clone()).unwrap();

    let mut expected: Vec<_> = configs.overlays.iter().map(|e| e.id.clone()).collect();
    expected.sort();
    expected.dedup();
    first.churn() <= 8 && second.is_noop() && h.engine.registry().dynamic_ids() == ids && ids == expected
}
