//! Spherical to Cartesian conversion for reporting.

use std::fmt;

use geocom::PolarMeasurement;

/// Station-centred Cartesian offsets [m], rounded to 0.1 mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartesian {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `x = sin θ cos φ r`, `y = sin θ sin φ r`, `z = cos θ r`.
///
/// `phi` is the horizontal angle, `theta` the zenith angle, both in radians.
pub fn to_cartesian(phi: f64, theta: f64, radius: f64) -> Cartesian {
    Cartesian {
        x: round4(theta.sin() * phi.cos() * radius),
        y: round4(theta.sin() * phi.sin() * radius),
        z: round4(theta.cos() * radius),
    }
}

/// Convert a measurement. The instrument's Hz angle grows clockwise, so
/// φ = −Hz gives a right-handed frame with x along Hz = 0.
pub fn from_measurement(polar: &PolarMeasurement) -> Cartesian {
    to_cartesian(-polar.hz, polar.v, polar.slope_distance)
}

fn round4(value: f64) -> f64 {
    // + 0.0 turns -0.0 into 0.0
    (value * 1e4).round() / 1e4 + 0.0
}

impl fmt::Display for Cartesian {
    /// `x;y;z;`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4};{:.4};{:.4};", self.x, self.y, self.z)
    }
}
