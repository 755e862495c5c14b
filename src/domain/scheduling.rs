//! Deferred work and layout measurement, abstracted away from the browser.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

/// Keeps a scheduled task alive; dropping it cancels the task if still pending.
pub struct TaskHandle(#[allow(dead_code)] Box<dyn Any>);

impl TaskHandle {
    pub fn new<T: 'static>(inner: T) -> Self {
        Self(Box::new(inner))
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TaskHandle")
    }
}

pub trait FrameScheduler {
    /// Run `task` before the next paint
    fn request_frame(&self, task: Box<dyn FnOnce()>) -> TaskHandle;
    fn schedule_after(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whole pixels, with non-finite or negative sizes collapsing to zero
    pub fn pixels(&self) -> (u32, u32) {
        let clamp = |v: f64| if v.is_finite() && v > 0.0 { v.floor() as u32 } else { 0 };
        (clamp(self.width), clamp(self.height))
    }

    pub fn is_degenerate(&self) -> bool {
        let (w, h) = self.pixels();
        w == 0 || h == 0
    }
}

/// Live layout measurement of the chart container
pub trait ContainerMeasure {
    fn measure(&self) -> ContainerSize;
}

/// Liveness flag shared by every callback registered for one mount
#[derive(Debug, Clone)]
pub struct LivenessToken(Rc<Cell<bool>>);

impl LivenessToken {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.get()
    }

    pub fn invalidate(&self) {
        self.0.set(false);
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_liveness() {
        let token = LivenessToken::new();
        let captured = token.clone();
        token.invalidate();
        assert!(!captured.is_alive());
    }

    #[test]
    fn degenerate_sizes() {
        assert!(ContainerSize::new(0.0, 300.0).is_degenerate());
        assert!(ContainerSize::new(f64::NAN, 300.0).is_degenerate());
        assert_eq!(ContainerSize::new(800.7, 600.2).pixels(), (800, 600));
    }
}
