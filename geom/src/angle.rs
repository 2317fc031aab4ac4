use std::fmt;

use serde::{Deserialize, Serialize};

/// A compass bearing, stored in degrees normalized to [0, 360). 0 is north, 90 is east.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn degrees(degs: f64) -> Angle {
        Angle(degs.rem_euclid(360.0))
    }

    pub fn normalized_degrees(self) -> f64 {
        self.0
    }

    pub fn opposite(self) -> Angle {
        Angle::degrees(self.0 + 180.0)
    }

    /// The signed rotation from `self` to `other`, in (-180, 180]. Negative means turning left,
    /// positive right.
    pub fn shortest_rotation_to(self, other: Angle) -> f64 {
        let mut delta = (other.0 - self.0).rem_euclid(360.0);
        if delta > 180.0 {
            delta -= 360.0;
        }
        delta
    }

    pub fn approx_eq(self, other: Angle, epsilon_degrees: f64) -> bool {
        self.shortest_rotation_to(other).abs() < epsilon_degrees
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.0)
    }
}
