use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::rc::{Rc, Weak};

use crate::domain::{
    chart::PaneId,
    logging::LogComponent,
    scheduling::{ContainerMeasure, FrameScheduler, LivenessToken, TaskHandle},
};
use crate::{log_debug, log_trace};

use super::config::ResizePolicy;
use super::pane_manager::PaneSet;
use super::sync_coordinator::SyncCoordinator;

/// Pixel heights for a stack of panes.
///
/// `available = height - (n - 1) * border_px` is split by weight. Shares are
/// floored, leftover pixels go to the largest fractional parts, and panes
/// under `min` are lifted at the expense of the tallest ones, so the result
/// sums to exactly `available`. When even `n * min` does not fit every pane
/// gets `min`.
pub fn compute_pane_heights(weights: &[f64], height: u32, border_px: u32, min: u32) -> Vec<u32> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let borders = u64::from(border_px) * (n as u64 - 1);
    let available = u64::from(height).saturating_sub(borders);
    if available < u64::from(min) * n as u64 {
        return vec![min; n];
    }

    let sanitized: Vec<f64> = weights.iter().map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 }).collect();
    let total: f64 = sanitized.iter().sum();
    let shares: Vec<f64> = if total > 0.0 {
        sanitized.iter().map(|w| w * available as f64 / total).collect()
    } else {
        vec![available as f64 / n as f64; n]
    };

    let mut heights: Vec<u64> = shares.iter().map(|s| s.floor() as u64).collect();
    let assigned: u64 = heights.iter().sum();

    let mut by_fraction: Vec<usize> = (0..n).collect();
    by_fraction.sort_by(|&a, &b| {
        let fa = shares[a] - shares[a].floor();
        let fb = shares[b] - shares[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    if assigned <= available {
        for &i in by_fraction.iter().cycle().take((available - assigned) as usize) {
            heights[i] += 1;
        }
    } else {
        for _ in 0..(assigned - available) {
            if let Some(i) = (0..n).max_by_key(|&i| (heights[i], Reverse(i))) {
                heights[i] -= 1;
            }
        }
    }

    let min = u64::from(min);
    let mut deficit = 0;
    for h in heights.iter_mut().filter(|h| **h < min) {
        deficit += min - *h;
        *h = min;
    }
    while deficit > 0 {
        let Some(i) = (0..n).filter(|&i| heights[i] > min).max_by_key(|&i| (heights[i], Reverse(i))) else {
            break;
        };
        heights[i] -= 1;
        deficit -= 1;
    }

    heights.into_iter().map(|h| h as u32).collect()
}

/// Result of one applied resize pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneLayout {
    pub width: u32,
    pub heights: Vec<(PaneId, u32)>,
}

impl PaneLayout {
    pub fn height_of(&self, pane: PaneId) -> Option<u32> {
        self.heights.iter().find(|(id, _)| *id == pane).map(|(_, h)| *h)
    }

    pub fn total_height(&self, border_px: u32) -> u32 {
        let panes: u32 = self.heights.iter().map(|(_, h)| h).sum();
        panes + border_px * (self.heights.len() as u32).saturating_sub(1)
    }
}

struct ResizeShared {
    panes: Rc<PaneSet>,
    sync: Rc<SyncCoordinator>,
    scheduler: Rc<dyn FrameScheduler>,
    container: Rc<dyn ContainerMeasure>,
    liveness: LivenessToken,
    policy: ResizePolicy,
    frame_pending: Cell<bool>,
    frame_task: RefCell<Option<TaskHandle>>,
    settle_task: RefCell<Option<TaskHandle>>,
    checkpoints: RefCell<Vec<TaskHandle>>,
    last_layout: RefCell<Option<PaneLayout>>,
    passes: Cell<u64>,
}

impl ResizeShared {
    /// Queues at most one recomputation per frame. The running task's own
    /// handle is only replaced by the next request, never dropped from inside it.
    fn request(self: &Rc<Self>) {
        if !self.liveness.is_alive() || self.frame_pending.replace(true) {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let handle = self.scheduler.request_frame(Box::new(move || {
            let Some(shared) = weak.upgrade() else { return };
            shared.frame_pending.set(false);
            if shared.liveness.is_alive() {
                shared.recompute();
            }
        }));
        *self.frame_task.borrow_mut() = Some(handle);
    }

    fn recompute(&self) -> Option<PaneLayout> {
        if !self.liveness.is_alive() || self.panes.is_disposed() {
            return None;
        }
        let size = self.container.measure();
        if size.is_degenerate() {
            log_debug!(
                LogComponent::Application("ResizeScheduler"),
                "container measured {}x{}, pass skipped",
                size.width,
                size.height
            );
            return None;
        }
        let (width, height) = size.pixels();
        let heights = compute_pane_heights(
            &self.panes.weights(),
            height,
            self.policy.border_px,
            self.policy.min_pane_height,
        );

        self.sync.begin_resize();
        for (pane, pane_height) in self.panes.iter().zip(&heights) {
            pane.with_surface(|surface| surface.resize(width, *pane_height));
        }
        let layout = PaneLayout { width, heights: self.panes.ids().into_iter().zip(heights).collect() };
        *self.last_layout.borrow_mut() = Some(layout.clone());
        self.passes.set(self.passes.get() + 1);

        let sync = Rc::downgrade(&self.sync);
        let liveness = self.liveness.clone();
        let release = self.scheduler.schedule_after(
            self.policy.settle_delay_ms,
            Box::new(move || {
                if !liveness.is_alive() {
                    return;
                }
                if let Some(sync) = sync.upgrade() {
                    sync.end_resize();
                }
            }),
        );
        // replacing the handle cancels the previous pending release
        *self.settle_task.borrow_mut() = Some(release);

        log_trace!(LogComponent::Application("ResizeScheduler"), "layout {:?}", layout);
        Some(layout)
    }
}

/// Keeps pane sizes in step with the container
pub struct ResizeScheduler {
    shared: Rc<ResizeShared>,
}

impl ResizeScheduler {
    pub fn new(
        panes: Rc<PaneSet>,
        sync: Rc<SyncCoordinator>,
        scheduler: Rc<dyn FrameScheduler>,
        container: Rc<dyn ContainerMeasure>,
        liveness: LivenessToken,
        policy: ResizePolicy,
    ) -> Self {
        Self {
            shared: Rc::new(ResizeShared {
                panes,
                sync,
                scheduler,
                container,
                liveness,
                policy,
                frame_pending: Cell::new(false),
                frame_task: RefCell::new(None),
                settle_task: RefCell::new(None),
                checkpoints: RefCell::new(Vec::new()),
                last_layout: RefCell::new(None),
                passes: Cell::new(0),
            }),
        }
    }

    /// Coalesced: any number of calls before the next frame yield one pass
    pub fn request(&self) {
        self.shared.request();
    }

    /// Requests a pass after each delay. `0` recomputes right away.
    /// Pending checkpoints from an earlier call are cancelled.
    pub fn schedule_checkpoints(&self, delays_ms: &[u32]) {
        let mut tasks = Vec::with_capacity(delays_ms.len());
        for &delay in delays_ms {
            if delay == 0 {
                self.recompute_now();
                continue;
            }
            let weak = Rc::downgrade(&self.shared);
            tasks.push(self.shared.scheduler.schedule_after(
                delay,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.request();
                    }
                }),
            ));
        }
        *self.shared.checkpoints.borrow_mut() = tasks;
    }

    pub fn recompute_now(&self) -> Option<PaneLayout> {
        self.shared.recompute()
    }

    pub fn last_layout(&self) -> Option<PaneLayout> {
        self.shared.last_layout.borrow().clone()
    }

    /// Completed passes
    pub fn passes(&self) -> u64 {
        self.shared.passes.get()
    }

    pub fn cancel_all(&self) {
        self.shared.frame_task.borrow_mut().take();
        self.shared.settle_task.borrow_mut().take();
        self.shared.checkpoints.borrow_mut().clear();
        self.shared.frame_pending.set(false);
    }
}

impl Drop for ResizeScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
