//! Core data types for the positioning engine

use serde::{Deserialize, Serialize};

/// 3D position in the local deployment frame, meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A coordinate with any NaN/Inf component is a failed estimate, not a
    /// position; callers must check before using one.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Euclidean distance to another coordinate
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Arithmetic mean of a set of coordinates
    pub fn centroid(points: &[Coordinate]) -> Coordinate {
        let n = points.len() as f64;
        let mut c = Coordinate::ORIGIN;
        for p in points {
            c.x += p.x;
            c.y += p.y;
            c.z += p.z;
        }
        Coordinate::new(c.x / n, c.y / n, c.z / n)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Role of a node in the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRole {
    /// Fixed reference node with a known or self-determined position
    Anchor,
    /// Mobile node whose position is being determined
    Tag,
}

/// Identity and calibration of one node, resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    /// Deterministic hash of the radio IC's part/lot IDs, used for lookup
    pub device_hash: u32,
    /// Personal area network identifier shared by the deployment
    pub pan_id: u16,
    /// 16-bit short address used on the air
    pub address: u16,
    /// Logical ordinal (1..=5) selecting the positioning strategy
    pub ordinal: u8,
    pub role: DeviceRole,
    /// Calibrated transmit antenna delay, radio time units
    pub tx_antenna_delay: u16,
    /// Calibrated receive antenna delay, radio time units
    pub rx_antenna_delay: u16,
    /// Current position estimate, mutated in place by the solvers
    pub coordinate: Coordinate,
}

impl DeviceIdentity {
    /// The ordinal-1 anchor drives the positioning sequence.
    pub fn is_coordinator(&self) -> bool {
        self.ordinal == 1 && self.role == DeviceRole::Anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_origin() {
        assert_eq!(Coordinate::default(), Coordinate::ORIGIN);
    }

    #[test]
    fn test_distance() {
        let a = Coordinate::new(0.0, 0.0, 0.0);
        let b = Coordinate::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_centroid() {
        let pts = [
            Coordinate::new(0.0, 0.0, 0.0),
            Coordinate::new(4.0, 0.0, 0.0),
            Coordinate::new(2.0, 4.0, 0.0),
            Coordinate::new(2.0, 2.0, 2.0),
        ];
        let c = Coordinate::centroid(&pts);
        assert_eq!(c, Coordinate::new(2.0, 1.5, 0.5));
    }

    #[test]
    fn test_finiteness_detection() {
        assert!(Coordinate::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Coordinate::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Coordinate::new(0.0, f64::INFINITY, 0.0).is_finite());
    }
}
