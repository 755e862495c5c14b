//! Chart aggregate: panes, series, indicator configuration and the surface port.

pub mod indicators;
pub mod legend;
pub mod panes;
pub mod series;
pub mod surface;
pub mod value_objects;

pub use indicators::*;
pub use legend::*;
pub use panes::*;
pub use series::*;
pub use surface::*;
pub use value_objects::*;
