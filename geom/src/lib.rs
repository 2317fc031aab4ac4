//! Geometry primitives for lat/lon road polylines.
//!
//! Everything here uses a small-angle equirectangular approximation, so it's only valid for the
//! short spans found within one road network -- never use it for anything spanning more than a few
//! kilometers.

mod angle;
mod distance;
mod pt;
mod simplify;

pub use crate::angle::Angle;
pub use crate::distance::Distance;
pub use crate::pt::{line_distance, LonLat};
pub use crate::simplify::simplify;

/// Two positions less than this distance apart are considered the same point.
pub const EPSILON_DIST: Distance = Distance::const_meters(0.01);

pub(crate) const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// Round f64's to this many decimal places, to avoid NaN hijinks and spurious diffs when
// serializing.
pub(crate) fn trim_f64(x: f64) -> f64 {
    (x * 10_000_000.0).round() / 10_000_000.0
}
