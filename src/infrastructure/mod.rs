//! Browser adapters and their headless stand-ins.

pub mod dom_events;
pub mod rendering;
pub mod scheduling;
pub mod services;

pub use scheduling::{BrowserFrameScheduler, ContainerObserver, ElementContainer, FixedContainer, ManualScheduler};
pub use services::{BrowserTimeProvider, ConsoleLogger};
