use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use strum::{AsRefStr, EnumString};

/// Log levels, ordered by severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[display(fmt = "TRACE")]
    Trace = 0,
    #[display(fmt = "DEBUG")]
    Debug = 1,
    #[display(fmt = " INFO")]
    Info = 2,
    #[display(fmt = " WARN")]
    Warn = 3,
    #[display(fmt = "ERROR")]
    Error = 4,
}

impl LogLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }
}

/// Layer and component an entry came from, e.g. `APP:SyncCoordinator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogComponent {
    #[display(fmt = "APP:{}", _0)]
    Application(&'static str),
    #[display(fmt = "INF:{}", _0)]
    Infrastructure(&'static str),
    #[display(fmt = "PRE:{}", _0)]
    Presentation(&'static str),
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: u64,
    pub level: LogLevel,
    pub component: LogComponent,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: LogComponent, message: String) -> Self {
        Self { timestamp: clock().now_millis(), level, component, message }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} | {}",
            clock().format_millis(self.timestamp),
            self.level,
            self.component,
            self.message
        )
    }
}

/// Clock used to stamp entries
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> u64;
    fn format_millis(&self, millis: u64) -> String;
}

/// Sink for entries that passed the level filter
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

static LOGGER: OnceLock<Box<dyn Logger>> = OnceLock::new();
static CLOCK: OnceLock<Box<dyn TimeProvider>> = OnceLock::new();
static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Installs the process-wide logger. Only the first call takes effect,
/// including its level.
pub fn init_logger(logger: Box<dyn Logger>, level: LogLevel) {
    if LOGGER.set(logger).is_ok() {
        MAX_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

pub fn init_time_provider(provider: Box<dyn TimeProvider>) {
    let _ = CLOCK.set(provider);
}

pub fn max_level() -> LogLevel {
    LogLevel::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// False when no logger is installed, so callers skip formatting entirely
pub fn enabled(level: LogLevel) -> bool {
    LOGGER.get().is_some() && level >= max_level()
}

pub fn emit(level: LogLevel, component: LogComponent, message: String) {
    if let Some(logger) = LOGGER.get() {
        logger.log(&LogEntry::new(level, component, message));
    }
}

pub fn clock() -> &'static dyn TimeProvider {
    CLOCK.get().map(|provider| provider.as_ref()).unwrap_or(&SequenceClock)
}

/// Stands in for the browser clock on native targets
struct SequenceClock;

impl TimeProvider for SequenceClock {
    fn now_millis(&self) -> u64 {
        static TICKS: AtomicU64 = AtomicU64::new(0);
        TICKS.fetch_add(1, Ordering::Relaxed)
    }

    fn format_millis(&self, millis: u64) -> String {
        format!("#{:06}", millis)
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:expr, $component:expr, $($arg:tt)*) => {
        if $crate::domain::logging::enabled($level) {
            $crate::domain::logging::emit($level, $component, format!($($arg)*));
        }
    };
}

/// Skipped in release builds, like `log_debug!`
#[macro_export]
macro_rules! log_trace {
    ($component:expr, $($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::__log_at!($crate::domain::logging::LogLevel::Trace, $component, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($component:expr, $($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::__log_at!($crate::domain::logging::LogLevel::Debug, $component, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($component:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::domain::logging::LogLevel::Info, $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::domain::logging::LogLevel::Warn, $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($component:expr, $($arg:tt)*) => {
        $crate::__log_at!($crate::domain::logging::LogLevel::Error, $component, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn levels_parse_and_order() {
        assert_eq!(LogLevel::from_str("warn").unwrap(), LogLevel::Warn);
        assert!(LogLevel::Error > LogLevel::Debug);
        assert_eq!(LogLevel::from_u8(LogLevel::Debug as u8), LogLevel::Debug);
    }

    #[test]
    fn entries_render_level_component_and_message() {
        let entry = LogEntry {
            timestamp: 7,
            level: LogLevel::Warn,
            component: LogComponent::Application("Sync"),
            message: "range skipped".into(),
        };
        assert_eq!(entry.to_string(), "[#000007]  WARN APP:Sync | range skipped");
    }

    #[test]
    fn nothing_is_enabled_without_a_logger() {
        assert!(!enabled(LogLevel::Error));
        log_error!(LogComponent::Presentation("Test"), "dropped {}", 1);
    }
}
