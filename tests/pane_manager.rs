#![cfg(feature = "render")]
mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{Harness, default_configs, ema, input, records};
use multi_pane_chart_wasm::application::EngineStatus;
use multi_pane_chart_wasm::domain::chart::{IndicatorConfigEntry, IndicatorConfigSet, IndicatorKind, PaneId};
use multi_pane_chart_wasm::domain::errors::ChartError;
use multi_pane_chart_wasm::domain::market_data::ChartInput;
use multi_pane_chart_wasm::infrastructure::rendering::SurfaceLifecycle::{Created, Disposed};

const ALL: [PaneId; 5] = [PaneId::Price, PaneId::Volume, PaneId::Macd, PaneId::Force13, PaneId::Force2];

fn live_panes(h: &Harness) -> Vec<PaneId> {
    h.factory.live_probes().iter().map(|probe| probe.pane()).collect()
}

#[test]
fn mount_creates_one_surface_per_visible_pane() {
    let h = Harness::mounted(input(30), default_configs());
    assert_eq!(h.engine.status(), EngineStatus::Mounted);
    assert_eq!(h.engine.visible_panes(), ALL.to_vec());
    assert_eq!(live_panes(&h), ALL.to_vec());
    assert_eq!(h.factory.journal(), ALL.iter().map(|p| Created(*p)).collect::<Vec<_>>());
}

#[test]
fn new_data_for_the_same_symbol_keeps_the_surfaces() {
    let mut h = Harness::mounted(input(30), default_configs());
    h.engine.set_data(input(31)).unwrap();
    h.engine.set_indicator_configs(default_configs()).unwrap();
    assert_eq!(h.factory.created_count(), 5);
    assert_eq!(h.factory.journal().len(), 5);
}

#[test]
fn symbol_change_disposes_before_creating() {
    let mut h = Harness::mounted(input(30), default_configs());
    let old_price = h.probe(PaneId::Price);
    let price_series = old_price.series_count();

    h.engine.set_data(ChartInput::new("MSFT", "1d", records(30))).unwrap();

    let journal = h.factory.journal();
    let disposed: Vec<_> = ALL.iter().rev().map(|p| Disposed(*p)).collect();
    let created: Vec<_> = ALL.iter().map(|p| Created(*p)).collect();
    assert_eq!(journal[5..10], disposed[..]);
    assert_eq!(journal[10..], created[..]);
    assert!(old_price.is_disposed());
    assert_eq!(old_price.series_count(), 0);
    assert_eq!(h.probe(PaneId::Price).series_count(), price_series);
}

#[test]
fn timeframe_change_rebuilds() {
    let mut h = Harness::mounted(input(30), default_configs());
    h.engine.set_data(ChartInput::new("AAPL", "1w", records(30))).unwrap();
    assert_eq!(h.factory.created_count(), 10);
    assert_eq!(live_panes(&h), ALL.to_vec());
}

#[test]
fn hiding_a_pane_rebuilds_the_stack_without_it() {
    let mut h = Harness::mounted(input(30), default_configs());

    let configs = IndicatorConfigSet::new(
        vec![ema("ema-13", 13, 0xf59e0b)],
        vec![
            IndicatorConfigEntry::new("volume", IndicatorKind::Volume).hidden(),
            IndicatorConfigEntry::new("macd", IndicatorKind::Macd),
            IndicatorConfigEntry::new("force13", IndicatorKind::Force13),
            IndicatorConfigEntry::new("force2", IndicatorKind::Force2),
        ],
        vec![],
    );
    h.engine.set_indicator_configs(configs).unwrap();
    h.scheduler.settle(400);

    let expected = vec![PaneId::Price, PaneId::Macd, PaneId::Force13, PaneId::Force2];
    assert_eq!(h.engine.visible_panes(), expected);
    assert_eq!(live_panes(&h), expected);
    assert!(h.engine.registry().dynamic(&"ema-26".into()).is_none());
    assert_eq!(h.engine.last_layout().unwrap().total_height(1), 1000);
}

#[test]
fn only_the_bottom_pane_shows_the_time_axis() {
    let mut h = Harness::mounted(input(30), default_configs());
    let axes: Vec<bool> = ALL.iter().map(|p| h.probe(*p).config().time_axis_visible).collect();
    assert_eq!(axes, vec![false, false, false, false, true]);

    let mut configs = default_configs();
    configs.panes.retain(|entry| entry.kind != IndicatorKind::Force2);
    h.engine.set_indicator_configs(configs).unwrap();

    assert!(h.probe(PaneId::Force13).config().time_axis_visible);
    assert!(h.probe(PaneId::Force13).config().crosshair_time_label_visible);
    assert!(!h.probe(PaneId::Price).config().time_axis_visible);
}

#[test]
fn surface_failure_fails_the_mount_once() {
    let mut h = Harness::new();
    let reported = Rc::new(RefCell::new(Vec::<String>::new()));
    {
        let reported = reported.clone();
        h.engine.on_fatal_error(move |err| reported.borrow_mut().push(err.to_string()));
    }
    h.factory.fail_on(PaneId::Macd);

    let err = h.engine.mount(input(30), default_configs()).unwrap_err();

    assert!(matches!(err, ChartError::Initialization { pane: PaneId::Macd, .. }), "{:?}", err);
    assert_eq!(reported.borrow().len(), 1);
    assert!(reported.borrow()[0].contains("macd"));
    assert_eq!(h.engine.status(), EngineStatus::Failed);
    assert_eq!(
        h.factory.journal(),
        vec![Created(PaneId::Price), Created(PaneId::Volume), Disposed(PaneId::Volume), Disposed(PaneId::Price)]
    );
    assert!(live_panes(&h).is_empty());

    assert_eq!(h.engine.set_data(input(31)), Err(err.clone()));
    assert_eq!(h.engine.snapshot().unwrap_err(), err);
    assert!(h.engine.legends().is_empty());
    assert_eq!(reported.borrow().len(), 1);
}

#[test]
fn mount_after_a_failure_retries_from_scratch() {
    let mut h = Harness::new();
    h.factory.fail_on(PaneId::Force2);
    assert!(h.engine.mount(input(30), default_configs()).is_err());

    h.factory.clear_failures();
    h.engine.mount(input(30), default_configs()).unwrap();
    h.scheduler.settle(400);

    assert_eq!(h.engine.status(), EngineStatus::Mounted);
    assert_eq!(live_panes(&h), ALL.to_vec());
    assert!(h.price_legend().starts_with("O "));
}

#[test]
fn unmount_returns_to_idle() {
    let mut h = Harness::mounted(input(30), default_configs());
    h.engine.unmount();

    assert_eq!(h.engine.status(), EngineStatus::Idle);
    assert!(live_panes(&h).is_empty());
    assert!(h.engine.registry().is_empty());
    assert_eq!(h.engine.set_data(input(30)), Err(ChartError::NotMounted));
}

#[test]
fn price_alone_is_a_complete_stack() {
    let configs = IndicatorConfigSet::new(vec![ema("ema-13", 13, 0xf59e0b)], vec![], vec![]);
    let h = Harness::mounted(input(30), configs);

    assert_eq!(h.engine.visible_panes(), vec![PaneId::Price]);
    assert!(h.probe(PaneId::Price).config().time_axis_visible);
    assert_eq!(h.engine.last_layout().unwrap().heights, vec![(PaneId::Price, 1000)]);
    assert!(h.price_legend().contains("EMA(13)"), "{}", h.price_legend());
}
