//! Closed-form self-positioning against 1, 2 or 3 already-positioned peers
//!
//! Each strategy averages repeated two-way ranges to suppress timing noise,
//! then solves the circle/sphere intersection algebraically. Negative
//! radicands (ranges slightly shorter than geometry allows) are clamped to
//! zero rather than failing. Repetition counts are configuration, not
//! contract.

use crate::core::Coordinate;
use crate::hardware::RadioTransport;
use crate::protocol::ranging::range_with;
use std::fmt;
use tracing::debug;

/// Failure of a closed-form strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedFormError {
    /// Every ranging attempt to the given peer failed; nothing to average
    NoMeasurements { anchor_address: u16 },
}

impl fmt::Display for ClosedFormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedFormError::NoMeasurements { anchor_address } => {
                write!(f, "no successful ranges to anchor 0x{:04X}", anchor_address)
            }
        }
    }
}

impl std::error::Error for ClosedFormError {}

/// Running mean over the successful ranges to one peer. Failed attempts
/// leave the accumulator untouched; the mean divides by the success count,
/// not the attempt count.
#[derive(Debug, Clone, Copy, Default)]
struct RangeAccumulator {
    sum: f64,
    successes: usize,
    peer_coordinate: Coordinate,
}

impl RangeAccumulator {
    fn record(&mut self, distance: f64, coordinate: Coordinate) {
        self.sum += distance;
        self.successes += 1;
        self.peer_coordinate = coordinate;
    }

    fn mean(&self, anchor_address: u16) -> Result<(f64, Coordinate), ClosedFormError> {
        if self.successes == 0 {
            return Err(ClosedFormError::NoMeasurements { anchor_address });
        }
        Ok((self.sum / self.successes as f64, self.peer_coordinate))
    }
}

fn accumulate<T: RadioTransport>(
    transport: &mut T,
    own: Coordinate,
    peer: u16,
    acc: &mut RangeAccumulator,
) {
    match range_with(transport, own, peer) {
        Ok((distance, coordinate)) => acc.record(distance, coordinate),
        Err(e) => debug!("range attempt to 0x{:04X} failed: {}", peer, e),
    }
}

/// One-anchor placement: the node lies on the anchor's x axis at the mean
/// measured distance. Valid only when the true position is on that axis.
pub fn solve_one_anchor<T: RadioTransport>(
    transport: &mut T,
    own: Coordinate,
    anchor: u16,
    repetitions: usize,
) -> Result<Coordinate, ClosedFormError> {
    let mut acc = RangeAccumulator::default();
    for _ in 0..repetitions {
        accumulate(transport, own, anchor, &mut acc);
    }
    let (d, a1) = acc.mean(anchor)?;
    Ok(Coordinate::new(a1.x + d, a1.y, a1.z))
}

/// Two-anchor placement: intersection of two circles in the anchors' plane.
/// Anchor 1 is assumed at the origin of that plane and anchor 2 on its
/// x axis, which the deployment guarantees.
pub fn solve_two_anchor<T: RadioTransport>(
    transport: &mut T,
    own: Coordinate,
    anchors: (u16, u16),
    repetitions: usize,
) -> Result<Coordinate, ClosedFormError> {
    let mut acc1 = RangeAccumulator::default();
    let mut acc2 = RangeAccumulator::default();
    for _ in 0..repetitions {
        accumulate(transport, own, anchors.0, &mut acc1);
        accumulate(transport, own, anchors.1, &mut acc2);
    }
    let (d1, a1) = acc1.mean(anchors.0)?;
    let (d2, a2) = acc2.mean(anchors.1)?;

    let x = (d1 * d1 - d2 * d2 + a2.x * a2.x) / (2.0 * a2.x);
    let y = (d1 * d1 - x * x).max(0.0).sqrt();
    Ok(Coordinate::new(x, y, a1.z))
}

/// Three-anchor placement: x and y from two linear equations obtained by
/// pairwise sphere subtraction, z from the remaining radicand.
pub fn solve_three_anchor<T: RadioTransport>(
    transport: &mut T,
    own: Coordinate,
    anchors: (u16, u16, u16),
    repetitions: usize,
) -> Result<Coordinate, ClosedFormError> {
    let mut acc1 = RangeAccumulator::default();
    let mut acc2 = RangeAccumulator::default();
    let mut acc3 = RangeAccumulator::default();
    for _ in 0..repetitions {
        accumulate(transport, own, anchors.0, &mut acc1);
        accumulate(transport, own, anchors.1, &mut acc2);
        accumulate(transport, own, anchors.2, &mut acc3);
    }
    let (d1, _a1) = acc1.mean(anchors.0)?;
    let (d2, a2) = acc2.mean(anchors.1)?;
    let (d3, a3) = acc3.mean(anchors.2)?;

    let x = (d1 * d1 - d2 * d2 + a2.x * a2.x) / (2.0 * a2.x);
    let y = (d2 * d2 - d3 * d3 - a2.x * a2.x + a3.x * a3.x + a3.y * a3.y
        + 2.0 * x * (a2.x - a3.x))
        / (2.0 * a3.y);
    let z = (d1 * d1 - x * x - y * y).max(0.0).sqrt();
    Ok(Coordinate::new(x, y, z))
}
