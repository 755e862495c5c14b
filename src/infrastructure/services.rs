//! Browser-backed logging and clock.

use wasm_bindgen::JsValue;

use crate::domain::logging::{LogEntry, LogLevel, Logger, TimeProvider};

/// Routes entries to the matching `console` method so devtools can filter them
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, entry: &LogEntry) {
        let line = JsValue::from_str(&entry.to_string());
        match entry.level {
            LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&line),
            LogLevel::Info => web_sys::console::info_1(&line),
            LogLevel::Warn => web_sys::console::warn_1(&line),
            LogLevel::Error => web_sys::console::error_1(&line),
        }
    }
}

/// Wall clock from `Date.now()`, printed as local `HH:MM:SS.mmm`
pub struct BrowserTimeProvider;

impl TimeProvider for BrowserTimeProvider {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn format_millis(&self, millis: u64) -> String {
        let date = js_sys::Date::new(&JsValue::from_f64(millis as f64));
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            date.get_hours(),
            date.get_minutes(),
            date.get_seconds(),
            date.get_milliseconds()
        )
    }
}
