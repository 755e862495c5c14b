//! Frame scheduling and container measurement: browser-backed and manual.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo::render::request_animation_frame;
use gloo::timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::domain::{
    errors::SurfaceError,
    scheduling::{ContainerMeasure, ContainerSize, FrameScheduler, TaskHandle},
};

/// `requestAnimationFrame` and `setTimeout`. Dropping a handle cancels the task.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserFrameScheduler;

impl FrameScheduler for BrowserFrameScheduler {
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        TaskHandle::new(request_animation_frame(move |_timestamp| task()))
    }

    fn schedule_after(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        TaskHandle::new(Timeout::new(delay_ms, task))
    }
}

/// Live bounding box of a DOM element
pub struct ElementContainer {
    element: web_sys::Element,
}

impl ElementContainer {
    pub fn new(element: web_sys::Element) -> Self {
        Self { element }
    }
}

impl ContainerMeasure for ElementContainer {
    fn measure(&self) -> ContainerSize {
        let rect = self.element.get_bounding_client_rect();
        ContainerSize::new(rect.width(), rect.height())
    }
}

/// Calls back whenever the observed element changes size
pub struct ContainerObserver {
    observer: web_sys::ResizeObserver,
    _callback: Closure<dyn FnMut(js_sys::Array)>,
}

impl ContainerObserver {
    pub fn observe(element: &web_sys::Element, mut on_resize: impl FnMut() + 'static) -> Result<Self, SurfaceError> {
        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |_entries: js_sys::Array| on_resize());
        let observer = web_sys::ResizeObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|err| SurfaceError::Browser(format!("ResizeObserver unavailable: {:?}", err)))?;
        observer.observe(element);
        Ok(Self { observer, _callback: callback })
    }
}

impl Drop for ContainerObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Container with a size set by hand
#[derive(Debug, Clone)]
pub struct FixedContainer {
    size: Rc<Cell<ContainerSize>>,
}

impl FixedContainer {
    pub fn new(width: f64, height: f64) -> Self {
        Self { size: Rc::new(Cell::new(ContainerSize::new(width, height))) }
    }

    pub fn set(&self, width: f64, height: f64) {
        self.size.set(ContainerSize::new(width, height));
    }
}

impl ContainerMeasure for FixedContainer {
    fn measure(&self) -> ContainerSize {
        self.size.get()
    }
}

struct CancelOnDrop(Rc<Cell<bool>>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

struct PendingTask {
    seq: u64,
    due_ms: u64,
    cancelled: Rc<Cell<bool>>,
    task: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct ManualQueue {
    now_ms: u64,
    seq: u64,
    frames: Vec<PendingTask>,
    timers: Vec<PendingTask>,
}

/// Deterministic scheduler driven by the caller: frames run on
/// [`run_frames`](Self::run_frames), timers on [`advance`](Self::advance).
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, delay_ms: Option<u32>, task: Box<dyn FnOnce()>) -> TaskHandle {
        let cancelled = Rc::new(Cell::new(false));
        let mut queue = self.queue.borrow_mut();
        queue.seq += 1;
        let pending = PendingTask {
            seq: queue.seq,
            due_ms: queue.now_ms + u64::from(delay_ms.unwrap_or(0)),
            cancelled: cancelled.clone(),
            task,
        };
        match delay_ms {
            Some(_) => queue.timers.push(pending),
            None => queue.frames.push(pending),
        }
        TaskHandle::new(CancelOnDrop(cancelled))
    }

    /// Runs every frame queued so far. Frames requested meanwhile wait for the next call.
    pub fn run_frames(&self) -> usize {
        let batch = std::mem::take(&mut self.queue.borrow_mut().frames);
        let mut ran = 0;
        for pending in batch {
            if !pending.cancelled.get() {
                (pending.task)();
                ran += 1;
            }
        }
        ran
    }

    /// Moves the clock forward, firing due timers in order
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.queue.borrow().now_ms + ms;
        let mut ran = 0;
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let position = queue
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due_ms <= target)
                    .min_by_key(|(_, t)| (t.due_ms, t.seq))
                    .map(|(i, _)| i);
                position.map(|i| {
                    let pending = queue.timers.remove(i);
                    queue.now_ms = queue.now_ms.max(pending.due_ms);
                    pending
                })
            };
            let Some(pending) = next else { break };
            if !pending.cancelled.get() {
                (pending.task)();
                ran += 1;
            }
        }
        self.queue.borrow_mut().now_ms = target;
        ran
    }

    /// Alternates frames and timers until nothing is due within `ms`
    pub fn settle(&self, ms: u64) {
        self.run_frames();
        let mut elapsed = 0;
        while elapsed < ms {
            let step = 10.min(ms - elapsed);
            self.advance(step);
            self.run_frames();
            elapsed += step;
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.queue.borrow().now_ms
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.borrow().frames.iter().filter(|t| !t.cancelled.get()).count()
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.borrow().timers.iter().filter(|t| !t.cancelled.get()).count()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.enqueue(None, task)
    }

    fn schedule_after(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.enqueue(Some(delay_ms), task)
    }
}
