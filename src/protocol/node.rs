//! Command/position protocol state machine
//!
//! One node runs one of three states: `Responder` (every non-coordinator
//! node, a blocking receive loop), `CoordinatorCalibration` (the coordinator
//! walks the anchors through self-positioning in address order), and
//! `CoordinatorSteadyState` (the coordinator repeatedly orders the tag to
//! position itself). Transitions are explicit so each state can be stepped
//! and tested in isolation from a real radio.

use crate::config::PositioningConfig;
use crate::core::{
    Coordinate, DeviceIdentity, COORDINATOR_ADDRESS, PREDEFINED_ANCHORS,
};
use crate::hardware::{RadioError, RadioTransport, ReceivedFrame, TxMode};
use crate::protocol::message::{Command, RangingMessage};
use crate::protocol::ranging::{self, range_with};
use crate::solver::{
    gauss_newton, linear_least_squares, solve_one_anchor, solve_three_anchor, solve_two_anchor,
};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anchor short addresses in deployment order; the first is the coordinator
const ANCHOR_ADDRESSES: [u16; 4] = [0x0001, 0x0002, 0x0003, 0x0004];
/// The tag's short address
const TAG_ADDRESS: u16 = 0x0005;
/// Consecutive receive timeouts before a coordinator wait gives up and the
/// sequence moves on
const MAX_CONSECUTIVE_TIMEOUTS: usize = 600;

/// Protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Blocking receive loop; every non-coordinator node lives here
    Responder,
    /// Coordinator walking anchors through self-positioning, one at a time
    CoordinatorCalibration { next_anchor: usize },
    /// Coordinator repeating positioning rounds against the tag
    CoordinatorSteadyState,
}

/// Receives the human-readable results; the console is outside the engine
pub trait AnnouncementObserver {
    fn on_announcement(
        &mut self,
        sender: u16,
        method: Command,
        coordinate: Coordinate,
        nominal_error: Option<f64>,
    );
}

/// Default observer: structured log output
pub struct LogObserver;

impl AnnouncementObserver for LogObserver {
    fn on_announcement(
        &mut self,
        sender: u16,
        method: Command,
        coordinate: Coordinate,
        nominal_error: Option<f64>,
    ) {
        match nominal_error {
            Some(err) => info!(
                "0x{:04X} announced {} via {}, error vs nominal {:.3} m",
                sender, coordinate, method, err
            ),
            None => info!("0x{:04X} announced {} via {}", sender, coordinate, method),
        }
    }
}

/// Outcome of dispatching one received frame
enum FrameOutcome {
    /// Frame consumed; nothing for a waiting coordinator
    Handled,
    /// An announcement was recorded (coordinator only)
    Announcement { sender: u16, method: Command },
}

/// One node's runtime: identity, transport and the protocol driver
pub struct PositioningNode<T: RadioTransport> {
    transport: T,
    identity: DeviceIdentity,
    config: PositioningConfig,
    observer: Box<dyn AnnouncementObserver + Send>,
}

impl<T: RadioTransport> PositioningNode<T> {
    pub fn new(transport: T, identity: DeviceIdentity, config: PositioningConfig) -> Self {
        Self { transport, identity, config, observer: Box::new(LogObserver) }
    }

    pub fn with_observer(mut self, observer: Box<dyn AnnouncementObserver + Send>) -> Self {
        self.observer = observer;
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn initial_state(&self) -> NodeState {
        if self.identity.is_coordinator() {
            NodeState::CoordinatorCalibration { next_anchor: 0 }
        } else {
            NodeState::Responder
        }
    }

    /// Run the state machine until the process ends. Positioning is
    /// self-healing by repetition; no state is terminal.
    pub fn run(&mut self) -> ! {
        let mut state = self.initial_state();
        loop {
            state = self.step(state);
        }
    }

    /// Execute one state transition
    pub fn step(&mut self, state: NodeState) -> NodeState {
        match state {
            NodeState::Responder => {
                self.responder_step();
                NodeState::Responder
            }
            NodeState::CoordinatorCalibration { next_anchor } => {
                self.calibration_step(next_anchor)
            }
            NodeState::CoordinatorSteadyState => {
                self.steady_state_round();
                NodeState::CoordinatorSteadyState
            }
        }
    }

    /// One iteration of the responder loop: receive and dispatch
    fn responder_step(&mut self) {
        match self.transport.receive() {
            Ok(frame) => {
                self.dispatch(frame);
            }
            Err(RadioError::Timeout) | Err(RadioError::WrongAddress) => {}
            Err(e) => debug!(error = %e, "receive failed"),
        }
    }

    /// Order one anchor to position itself and wait for its announcement
    fn calibration_step(&mut self, next_anchor: usize) -> NodeState {
        // The coordinator itself is first in the list; skip it
        let targets: Vec<u16> = ANCHOR_ADDRESSES
            .iter()
            .copied()
            .filter(|&a| a != self.identity.address)
            .collect();
        if next_anchor >= targets.len() {
            info!("anchor calibration complete");
            return NodeState::CoordinatorSteadyState;
        }

        let target = targets[next_anchor];
        info!("requesting self-positioning from anchor 0x{:04X}", target);
        let order = RangingMessage::with_coordinate(
            Command::PositionYourself,
            self.identity.coordinate,
        );
        if let Err(e) = self.transport.send(target, &order.encode(), TxMode::immediate()) {
            warn!(error = %e, "failed to send position order");
            return NodeState::CoordinatorCalibration { next_anchor };
        }

        if self.wait_for_announcement(|sender, _| sender == target) {
            NodeState::CoordinatorCalibration { next_anchor: next_anchor + 1 }
        } else {
            warn!("no announcement from anchor 0x{:04X}; retrying", target);
            NodeState::CoordinatorCalibration { next_anchor }
        }
    }

    /// One steady-state round: order the tag, wait for its final
    /// announcement, then pause
    fn steady_state_round(&mut self) {
        let order = RangingMessage::with_coordinate(
            Command::PositionYourself,
            self.identity.coordinate,
        );
        if let Err(e) = self.transport.send(TAG_ADDRESS, &order.encode(), TxMode::immediate()) {
            warn!(error = %e, "failed to send position order to tag");
        } else if !self.wait_for_announcement(|sender, method| {
            sender == TAG_ADDRESS && method == Command::PositionAnnouncementPredefGn
        }) {
            warn!("tag round produced no final announcement");
        }
        thread::sleep(Duration::from_millis(self.config.steady_state_interval_ms));
    }

    /// Responder-style receive loop that returns once an announcement
    /// matching `done` has been handled. The coordinator keeps serving
    /// ranging requests while it waits; that is how the anchors measure
    /// their distance to it.
    fn wait_for_announcement(&mut self, done: impl Fn(u16, Command) -> bool) -> bool {
        let mut consecutive_timeouts = 0;
        loop {
            match self.transport.receive() {
                Ok(frame) => {
                    consecutive_timeouts = 0;
                    if let FrameOutcome::Announcement { sender, method } = self.dispatch(frame)
                    {
                        if done(sender, method) {
                            return true;
                        }
                    }
                }
                Err(RadioError::Timeout) => {
                    consecutive_timeouts += 1;
                    if consecutive_timeouts >= MAX_CONSECUTIVE_TIMEOUTS {
                        return false;
                    }
                }
                Err(RadioError::WrongAddress) => {}
                Err(e) => debug!(error = %e, "receive failed while waiting"),
            }
        }
    }

    /// Dispatch one received frame by command
    fn dispatch(&mut self, frame: ReceivedFrame) -> FrameOutcome {
        let message = match RangingMessage::decode(&frame.payload) {
            Ok(m) => m,
            // Not our protocol; skip without comment
            Err(e) => {
                debug!("skipping frame from 0x{:04X}: {}", frame.sender, e);
                return FrameOutcome::Handled;
            }
        };

        match message.command {
            Command::RangingRequest => {
                if let Err(e) =
                    ranging::respond_to_poll(&mut self.transport, &self.identity, frame.sender)
                {
                    debug!(error = %e, "failed to answer ranging request");
                }
                FrameOutcome::Handled
            }
            Command::RangingResponse => {
                // Only valid as the reply inside an active ranging exchange
                warn!("stray ranging response from 0x{:04X} outside an exchange", frame.sender);
                FrameOutcome::Handled
            }
            Command::PositionYourself => {
                self.position_self();
                FrameOutcome::Handled
            }
            method @ (Command::PositionAnnouncement
            | Command::PositionAnnouncementGn
            | Command::PositionAnnouncementPredef
            | Command::PositionAnnouncementPredefGn) => {
                if self.identity.is_coordinator() {
                    let nominal_error = nominal_anchor(frame.sender)
                        .map(|nominal| message.coordinate.distance_to(&nominal));
                    self.observer.on_announcement(
                        frame.sender,
                        method,
                        message.coordinate,
                        nominal_error,
                    );
                    FrameOutcome::Announcement { sender: frame.sender, method }
                } else {
                    FrameOutcome::Handled
                }
            }
        }
    }

    /// Run the positioning strategy selected by this node's ordinal and
    /// announce the result
    fn position_self(&mut self) {
        let reps = self.config.repetitions;
        let own = self.identity.coordinate;
        let solved = match self.identity.ordinal {
            2 => solve_one_anchor(&mut self.transport, own, ANCHOR_ADDRESSES[0], reps.one_anchor)
                .map_err(|e| e.to_string()),
            3 => solve_two_anchor(
                &mut self.transport,
                own,
                (ANCHOR_ADDRESSES[0], ANCHOR_ADDRESSES[1]),
                reps.two_anchor,
            )
            .map_err(|e| e.to_string()),
            4 => solve_three_anchor(
                &mut self.transport,
                own,
                (ANCHOR_ADDRESSES[0], ANCHOR_ADDRESSES[1], ANCHOR_ADDRESSES[2]),
                reps.three_anchor,
            )
            .map_err(|e| e.to_string()),
            5 => {
                self.tag_round();
                return;
            }
            other => {
                warn!(ordinal = other, "no positioning strategy for this ordinal");
                return;
            }
        };

        match solved {
            // A NaN/Inf estimate (degenerate anchor geometry) is a failed
            // solve, not a position; it must never go out on the air
            Ok(coordinate) if coordinate.is_finite() => {
                self.identity.coordinate = coordinate;
                self.announce(Command::PositionAnnouncement);
            }
            Ok(coordinate) => {
                warn!("non-finite estimate {}; keeping previous coordinate", coordinate)
            }
            Err(e) => warn!(error = %e, "self-positioning failed; keeping previous coordinate"),
        }
    }

    /// The tag's four-anchor round: measure all four ranges, then run both
    /// solver stages against the measured anchor coordinates and again
    /// against the predefined nominal ones, announcing each result
    fn tag_round(&mut self) {
        let reps = self.config.repetitions.multilateration;
        let own = self.identity.coordinate;

        let mut sums = [0.0f64; 4];
        let mut successes = [0usize; 4];
        let mut measured = PREDEFINED_ANCHORS;
        for _ in 0..reps {
            for (i, &anchor) in ANCHOR_ADDRESSES.iter().enumerate() {
                match range_with(&mut self.transport, own, anchor) {
                    Ok((distance, coordinate)) => {
                        sums[i] += distance;
                        successes[i] += 1;
                        measured[i] = coordinate;
                    }
                    Err(e) => debug!("range to anchor 0x{:04X} failed: {}", anchor, e),
                }
            }
        }

        let mut distances = [0.0f64; 4];
        for i in 0..4 {
            if successes[i] == 0 {
                warn!(
                    "anchor 0x{:04X} unreachable; abandoning this round",
                    ANCHOR_ADDRESSES[i]
                );
                return;
            }
            distances[i] = sums[i] / successes[i] as f64;
        }

        let pause = Duration::from_millis(self.config.announcement_pause_ms);
        let passes: [(&[Coordinate; 4], Command, Command); 2] = [
            (&measured, Command::PositionAnnouncement, Command::PositionAnnouncementGn),
            (
                &PREDEFINED_ANCHORS,
                Command::PositionAnnouncementPredef,
                Command::PositionAnnouncementPredefGn,
            ),
        ];
        for (anchors, linear_cmd, gn_cmd) in passes {
            match linear_least_squares(anchors, &distances) {
                Ok(estimate) => {
                    self.identity.coordinate = estimate;
                    self.announce(linear_cmd);
                }
                Err(e) => warn!(error = %e, "linear stage failed; skipping its announcement"),
            }
            thread::sleep(pause);

            self.identity.coordinate = gauss_newton(anchors, &distances);
            self.announce(gn_cmd);
            thread::sleep(pause);
        }
    }

    /// Send the current coordinate to the coordinator
    fn announce(&mut self, method: Command) {
        let message = RangingMessage::with_coordinate(method, self.identity.coordinate);
        if let Err(e) =
            self.transport.send(COORDINATOR_ADDRESS, &message.encode(), TxMode::immediate())
        {
            warn!(error = %e, "failed to announce position");
        }
    }
}

/// Predefined nominal coordinate for an anchor address, if it has one
fn nominal_anchor(address: u16) -> Option<Coordinate> {
    ANCHOR_ADDRESSES
        .iter()
        .position(|&a| a == address)
        .map(|i| PREDEFINED_ANCHORS[i])
}
