//! Market data consumed by the chart: records, time keys and divergence annotations.

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
