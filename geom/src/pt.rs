use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Angle, Distance, EARTH_RADIUS_METERS};

// longitude is x, latitude is y
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub longitude: f64,
    pub latitude: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> LonLat {
        LonLat {
            longitude: lon,
            latitude: lat,
        }
    }

    /// Equirectangular distance to another point. Accurate enough for the spans within one road
    /// link; don't use it across a whole country.
    pub fn dist_to(self, other: LonLat) -> Distance {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let x = (other.longitude - self.longitude).to_radians() * ((lat1 + lat2) / 2.0).cos();
        let y = lat2 - lat1;
        Distance::meters(EARTH_RADIUS_METERS * (x * x + y * y).sqrt())
    }

    /// Compass bearing from `self` towards `other`.
    pub fn angle_to(self, other: LonLat) -> Angle {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
        Angle::degrees(y.atan2(x).to_degrees())
    }

    /// Linearly interpolate towards `other`. `fraction` is in [0, 1].
    pub fn interpolate(self, other: LonLat, fraction: f64) -> LonLat {
        LonLat::new(
            self.longitude + fraction * (other.longitude - self.longitude),
            self.latitude + fraction * (other.latitude - self.latitude),
        )
    }
}

impl fmt::Display for LonLat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LonLat({0}, {1})", self.longitude, self.latitude)
    }
}

/// Closest distance from `pt` to the line segment `(s1, s2)` -- perpendicular if the projection
/// falls within the segment, else distance to the nearer endpoint. Same small-angle projection as
/// `LonLat::dist_to`.
pub fn line_distance(s1: LonLat, s2: LonLat, pt: LonLat) -> Distance {
    let y1 = s1.latitude.to_radians();
    let y2 = s2.latitude.to_radians();
    let y3 = pt.latitude.to_radians();
    // Simplified reprojection of longitude
    let x1 = s1.longitude.to_radians() * y1.cos();
    let x2 = s2.longitude.to_radians() * y2.cos();
    let x3 = pt.longitude.to_radians() * y3.cos();

    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;

    let param = if len_sq != 0.0 {
        ((x3 - x1) * dx + (y3 - y1) * dy) / len_sq
    } else {
        // Zero length line
        -1.0
    };

    let (x4, y4) = if param < 0.0 {
        (x1, y1)
    } else if param > 1.0 {
        (x2, y2)
    } else {
        (x1 + param * dx, y1 + param * dy)
    };

    let x = x4 - x3;
    let y = y4 - y3;
    Distance::meters(EARTH_RADIUS_METERS * (x * x + y * y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance() {
        // One degree of latitude is about 111km everywhere
        let a = LonLat::new(10.0, 60.0);
        let b = LonLat::new(10.0, 61.0);
        let d = a.dist_to(b);
        assert!((d.inner_meters() - 111_195.0).abs() < 100.0, "got {}", d);
        assert_eq!(a.dist_to(a), Distance::ZERO);
    }

    #[test]
    fn bearing() {
        let origin = LonLat::new(10.0, 60.0);
        let north = LonLat::new(10.0, 60.1);
        let east = LonLat::new(10.1, 60.0);
        assert!(origin.angle_to(north).approx_eq(Angle::ZERO, 0.1));
        assert!(origin.angle_to(east).approx_eq(Angle::degrees(90.0), 0.1));
    }

    #[test]
    fn point_to_segment() {
        let s1 = LonLat::new(10.0, 60.0);
        let s2 = LonLat::new(10.01, 60.0);
        // Perpendicular case: directly above the middle
        let mid = LonLat::new(10.005, 60.0005);
        let d1 = line_distance(s1, s2, mid);
        assert!((d1.inner_meters() - mid.dist_to(LonLat::new(10.005, 60.0)).inner_meters()).abs() < 1.0);
        // Endpoint case: beyond s2
        let beyond = LonLat::new(10.02, 60.0);
        let d2 = line_distance(s1, s2, beyond);
        assert!((d2.inner_meters() - s2.dist_to(beyond).inner_meters()).abs() < 1.0);
    }
}
