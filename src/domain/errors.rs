use crate::domain::chart::{PaneId, SeriesId};
use crate::domain::market_data::TimeKey;

/// Errors raised by a rendering surface
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    Unavailable(String),
    UnknownSeries(SeriesId),
    OutOfOrder(TimeKey),
    InvalidPoint { time: TimeKey, reason: String },
    Browser(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Unavailable(msg) => write!(f, "Surface unavailable: {}", msg),
            SurfaceError::UnknownSeries(id) => write!(f, "Unknown series {}", id),
            SurfaceError::OutOfOrder(time) => write!(f, "Points out of order at {}", time),
            SurfaceError::InvalidPoint { time, reason } => write!(f, "Invalid point at {}: {}", time, reason),
            SurfaceError::Browser(msg) => write!(f, "Browser API error: {}", msg),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Engine-level errors
#[derive(Debug, Clone, PartialEq)]
pub enum ChartError {
    /// A pane surface could not be created. Fatal for the mount.
    Initialization { pane: PaneId, reason: String },
    /// One series rejected its data. Recovered locally.
    SeriesData { series: SeriesId, reason: String },
    Configuration(String),
    /// No pane produced an image
    Snapshot(String),
    NotMounted,
}

impl std::fmt::Display for ChartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartError::Initialization { pane, reason } => {
                write!(f, "Initialization Error: pane '{}' could not be created: {}", pane, reason)
            }
            ChartError::SeriesData { series, reason } => {
                write!(f, "Series Data Error: series {} rejected data: {}", series, reason)
            }
            ChartError::Configuration(msg) => write!(f, "Configuration Error: {}", msg),
            ChartError::Snapshot(msg) => write!(f, "Snapshot Error: {}", msg),
            ChartError::NotMounted => write!(f, "Chart is not mounted"),
        }
    }
}

impl std::error::Error for ChartError {}

impl From<serde_json::Error> for ChartError {
    fn from(err: serde_json::Error) -> Self {
        ChartError::Configuration(err.to_string())
    }
}

impl ChartError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChartError::Initialization { .. })
    }
}

pub type ChartResult<T> = Result<T, ChartError>;
pub type SurfaceResult<T> = Result<T, SurfaceError>;
