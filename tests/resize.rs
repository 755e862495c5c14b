#![cfg(feature = "render")]
mod common;

use common::{Harness, default_configs, input};
use multi_pane_chart_wasm::application::compute_pane_heights;
use multi_pane_chart_wasm::domain::chart::{LogicalRange, PaneId};
use quickcheck_macros::quickcheck;

const DEFAULT_HEIGHTS: [(PaneId, u32); 5] = [
    (PaneId::Price, 474),
    (PaneId::Volume, 71),
    (PaneId::Macd, 166),
    (PaneId::Force13, 190),
    (PaneId::Force2, 95),
];

#[quickcheck]
fn heights_fill_the_container_exactly(weights: Vec<u8>, height: u16) -> bool {
    let weights: Vec<f64> = weights.iter().take(6).map(|w| f64::from(*w)).collect();
    let heights = compute_pane_heights(&weights, u32::from(height), 1, 10);
    let n = weights.len() as u32;
    if n == 0 {
        return heights.is_empty();
    }
    let available = u32::from(height).saturating_sub(n - 1);
    if available < 10 * n {
        heights.iter().all(|h| *h == 10)
    } else {
        heights.len() == weights.len() && heights.iter().sum::<u32>() == available && heights.iter().all(|h| *h >= 10)
    }
}

#[test]
fn panes_split_the_container_by_weight() {
    let h = Harness::mounted(input(30), default_configs());
    let layout = h.engine.last_layout().unwrap();
    assert_eq!(layout.width, 800);
    assert_eq!(layout.heights, DEFAULT_HEIGHTS.to_vec());
    assert_eq!(layout.total_height(1), 1000);
    for (pane, height) in DEFAULT_HEIGHTS {
        assert_eq!(h.probe(pane).size(), (800, height), "{}", pane);
    }
}

#[test]
fn degenerate_container_skips_the_pass() {
    let h = Harness::mounted(input(30), default_configs());
    let before = h.engine.last_layout();
    let calls = h.probe(PaneId::Price).resize_calls();

    h.container.set(0.0, 0.0);
    h.engine.notify_container_resized();
    h.scheduler.run_frames();

    assert_eq!(h.engine.last_layout(), before);
    assert_eq!(h.probe(PaneId::Price).resize_calls(), calls);
    assert_eq!(h.probe(PaneId::Price).size(), (800, 474));
}

#[test]
fn zero_sized_container_at_mount_uses_the_fallback_size() {
    let mut h = Harness::new();
    h.container.set(0.0, 0.0);
    h.engine.mount(input(30), default_configs()).unwrap();
    h.scheduler.settle(400);

    assert_eq!(h.probe(PaneId::Price).size(), (800, 474));
    assert!(h.engine.last_layout().is_none());
}

#[test]
fn bursts_of_resize_notifications_coalesce_into_one_frame() {
    let h = Harness::mounted(input(30), default_configs());
    h.container.set(600.0, 800.0);
    for _ in 0..5 {
        h.engine.notify_container_resized();
    }
    assert_eq!(h.scheduler.pending_frames(), 1);

    h.scheduler.run_frames();

    let layout = h.engine.last_layout().unwrap();
    assert_eq!(layout.width, 600);
    assert_eq!(layout.total_height(1), 800);
    assert_eq!(h.probe(PaneId::Force2).size().0, 600);
}

#[test]
fn range_changes_during_a_resize_are_not_propagated() {
    let h = Harness::mounted(input(30), default_configs());
    let settled = h.probe(PaneId::Price).range();
    let before = h.engine.sync_stats().unwrap();

    h.container.set(700.0, 900.0);
    h.engine.notify_container_resized();
    h.scheduler.run_frames();
    h.probe(PaneId::Macd).user_pan(LogicalRange::new(2.0, 12.0).unwrap());

    assert_eq!(h.probe(PaneId::Price).range(), settled);
    assert!(h.engine.sync_stats().unwrap().suppressed > before.suppressed);

    h.scheduler.advance(60);
    let range = LogicalRange::new(4.0, 14.0).unwrap();
    h.probe(PaneId::Macd).user_pan(range);
    assert_eq!(h.probe(PaneId::Price).range(), Some(range));
}

#[test]
fn layout_transition_samples_the_container_while_it_animates() {
    let h = Harness::mounted(input(30), default_configs());

    h.container.set(500.0, 1000.0);
    h.engine.notify_layout_transition();
    assert_eq!(h.engine.last_layout().unwrap().width, 500);

    h.container.set(420.0, 1000.0);
    h.scheduler.advance(100);
    h.scheduler.run_frames();
    assert_eq!(h.engine.last_layout().unwrap().width, 420);

    h.container.set(400.0, 1000.0);
    h.scheduler.settle(400);
    assert_eq!(h.engine.last_layout().unwrap().width, 400);
    assert_eq!(h.probe(PaneId::Price).size().0, 400);
    assert_eq!(h.scheduler.pending_timers(), 0);
}

#[test]
fn unmount_cancels_pending_passes() {
    let mut h = Harness::mounted(input(30), default_configs());
    h.engine.notify_container_resized();
    h.engine.notify_layout_transition();

    h.engine.unmount();

    assert_eq!(h.scheduler.pending_frames(), 0);
    assert_eq!(h.scheduler.pending_timers(), 0);
    assert_eq!(h.scheduler.run_frames(), 0);
}
