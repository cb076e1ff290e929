//! Test doubles for the radio transport
//!
//! [`MockTransport`] replays a scripted sequence of receive results and
//! records everything sent through it. [`LinkedTransport`] pairs nodes over
//! in-process channels with synthetic flight-time stamping, so a whole
//! deployment can run inside one test process.

use crate::core::{DWT_TIME_UNITS, SPEED_OF_LIGHT};
use crate::hardware::{
    RadioError, RadioResult, RadioTransport, ReceivedFrame, TxMode, TxStart,
};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One frame captured from a mock transmission
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub target: u16,
    pub payload: Vec<u8>,
    pub mode: TxMode,
}

/// Scripted transport for unit tests
pub struct MockTransport {
    receive_script: VecDeque<RadioResult<ReceivedFrame>>,
    sent: Vec<SentFrame>,
    tx_timestamp: u64,
    rx_timestamp: u64,
    clock_offset_ratio: f64,
    error_probability: f64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            receive_script: VecDeque::new(),
            sent: Vec::new(),
            tx_timestamp: 0,
            rx_timestamp: 0,
            clock_offset_ratio: 0.0,
            error_probability: 0.0,
        }
    }

    /// Queue the next result `receive` will return
    pub fn script_receive(&mut self, result: RadioResult<ReceivedFrame>) {
        self.receive_script.push_back(result);
    }

    /// Queue a well-formed frame from the given sender
    pub fn script_frame(&mut self, sender: u16, payload: Vec<u8>) {
        self.script_receive(Ok(ReceivedFrame { sender, payload }));
    }

    pub fn set_timestamps(&mut self, tx: u64, rx: u64) {
        self.tx_timestamp = tx;
        self.rx_timestamp = rx;
    }

    pub fn set_clock_offset_ratio(&mut self, ratio: f64) {
        self.clock_offset_ratio = ratio;
    }

    /// Make every operation fail with the given probability (0.0 to 1.0)
    pub fn simulate_errors(&mut self, probability: f64) {
        self.error_probability = probability.clamp(0.0, 1.0);
    }

    pub fn sent_frames(&self) -> &[SentFrame] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    fn should_fail(&self) -> bool {
        if self.error_probability <= 0.0 {
            return false;
        }
        use rand::Rng;
        rand::thread_rng().gen::<f64>() < self.error_probability
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioTransport for MockTransport {
    fn send(&mut self, target: u16, payload: &[u8], mode: TxMode) -> RadioResult<()> {
        if payload.is_empty() {
            return Err(RadioError::InvalidParam);
        }
        if self.should_fail() {
            return Err(RadioError::CommError);
        }
        self.sent.push(SentFrame { target, payload: payload.to_vec(), mode });
        Ok(())
    }

    fn receive(&mut self) -> RadioResult<ReceivedFrame> {
        if self.should_fail() {
            return Err(RadioError::Timeout);
        }
        self.receive_script.pop_front().unwrap_or(Err(RadioError::Timeout))
    }

    fn read_tx_timestamp(&mut self) -> u64 {
        self.tx_timestamp
    }

    fn read_rx_timestamp(&mut self) -> u64 {
        self.rx_timestamp
    }

    fn clock_offset_ratio(&mut self) -> f64 {
        self.clock_offset_ratio
    }
}

/// A frame in flight between linked transports
#[derive(Debug, Clone)]
struct AirFrame {
    sender: u16,
    payload: Vec<u8>,
    /// Actual transmission timestamp on the shared simulated clock
    tx_time: u64,
    /// Propagation time in radio units, derived from node geometry
    flight: u64,
}

#[derive(Default)]
struct HubShared {
    inboxes: HashMap<u16, Sender<AirFrame>>,
    /// Simulated positions, used only to synthesize flight times
    positions: HashMap<u16, (f64, f64, f64)>,
    clock: u64,
}

/// Shared medium connecting a set of [`LinkedTransport`] nodes
#[derive(Clone, Default)]
pub struct RadioHub {
    shared: Arc<Mutex<HubShared>>,
}

impl RadioHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a node on the simulated medium. The position feeds flight-time
    /// synthesis only; the engine under test never sees it.
    pub fn attach(&self, address: u16, position: (f64, f64, f64)) -> LinkedTransport {
        let (tx, rx) = mpsc::channel();
        let mut shared = self.shared.lock().unwrap();
        shared.inboxes.insert(address, tx);
        shared.positions.insert(address, position);
        LinkedTransport {
            hub: self.clone(),
            address,
            inbox: rx,
            receive_timeout: Duration::from_millis(500),
            tx_antenna_delay: 0,
            last_tx_ts: 0,
            last_rx_ts: 0,
        }
    }

    fn flight_units(&self, from: u16, to: u16) -> Option<u64> {
        let shared = self.shared.lock().unwrap();
        let &(ax, ay, az) = shared.positions.get(&from)?;
        let &(bx, by, bz) = shared.positions.get(&to)?;
        let d = ((ax - bx).powi(2) + (ay - by).powi(2) + (az - bz).powi(2)).sqrt();
        Some((d / SPEED_OF_LIGHT / DWT_TIME_UNITS).round() as u64)
    }

    fn advance_clock(&self, min_step: u64) -> u64 {
        let mut shared = self.shared.lock().unwrap();
        shared.clock += min_step;
        shared.clock
    }
}

/// Channel-backed transport attached to a [`RadioHub`]
pub struct LinkedTransport {
    hub: RadioHub,
    address: u16,
    inbox: Receiver<AirFrame>,
    receive_timeout: Duration,
    /// Added to a delayed transmission's scheduled time, mirroring the
    /// antenna-delay compensation the real radio applies on transmit
    tx_antenna_delay: u64,
    last_tx_ts: u64,
    last_rx_ts: u64,
}

impl LinkedTransport {
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    pub fn set_tx_antenna_delay(&mut self, delay: u64) {
        self.tx_antenna_delay = delay;
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

impl RadioTransport for LinkedTransport {
    fn send(&mut self, target: u16, payload: &[u8], mode: TxMode) -> RadioResult<()> {
        if payload.is_empty() {
            return Err(RadioError::InvalidParam);
        }
        let tx_time = match mode.start {
            TxStart::Immediate => self.hub.advance_clock(1_000),
            TxStart::Delayed(at) => at + self.tx_antenna_delay,
        };
        self.last_tx_ts = tx_time;
        // An unattached target behaves like an empty channel: silence
        let Some(flight) = self.hub.flight_units(self.address, target) else {
            return Ok(());
        };
        let frame = AirFrame {
            sender: self.address,
            payload: payload.to_vec(),
            tx_time,
            flight,
        };
        let shared = self.hub.shared.lock().unwrap();
        if let Some(tx) = shared.inboxes.get(&target) {
            let _ = tx.send(frame);
        }
        Ok(())
    }

    fn receive(&mut self) -> RadioResult<ReceivedFrame> {
        match self.inbox.recv_timeout(self.receive_timeout) {
            Ok(frame) => {
                self.last_rx_ts = frame.tx_time + frame.flight;
                Ok(ReceivedFrame { sender: frame.sender, payload: frame.payload })
            }
            Err(_) => Err(RadioError::Timeout),
        }
    }

    fn read_tx_timestamp(&mut self) -> u64 {
        self.last_tx_ts
    }

    fn read_rx_timestamp(&mut self) -> u64 {
        self.last_rx_ts
    }

    fn clock_offset_ratio(&mut self) -> f64 {
        // Linked nodes share one simulated oscillator
        0.0
    }
}

/// Two transports wired directly to each other at the given separation in
/// meters, for exercising a full two-way exchange in tests
pub fn linked_pair(addr_a: u16, addr_b: u16, separation_m: f64) -> (LinkedTransport, LinkedTransport) {
    let hub = RadioHub::new();
    let a = hub.attach(addr_a, (0.0, 0.0, 0.0));
    let b = hub.attach(addr_b, (separation_m, 0.0, 0.0));
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_receive_order() {
        let mut mock = MockTransport::new();
        mock.script_frame(0x0002, vec![1, 2, 3]);
        mock.script_receive(Err(RadioError::Timeout));

        let frame = mock.receive().unwrap();
        assert_eq!(frame.sender, 0x0002);
        assert_eq!(frame.payload, vec![1, 2, 3]);
        assert_eq!(mock.receive(), Err(RadioError::Timeout));
        // Script exhausted: further receives time out
        assert_eq!(mock.receive(), Err(RadioError::Timeout));
    }

    #[test]
    fn test_sent_frames_recorded() {
        let mut mock = MockTransport::new();
        mock.send(0x0001, &[9, 9], TxMode::immediate()).unwrap();
        assert_eq!(mock.sent_frames().len(), 1);
        assert_eq!(mock.sent_frames()[0].target, 0x0001);
    }

    #[test]
    fn test_empty_payload_rejected() {
        let mut mock = MockTransport::new();
        assert_eq!(mock.send(0x0001, &[], TxMode::immediate()), Err(RadioError::InvalidParam));
    }

    #[test]
    fn test_linked_pair_delivery_and_timestamps() {
        let (mut a, mut b) = linked_pair(0x0001, 0x0002, 10.0);
        a.send(0x0002, &[0xAB], TxMode::immediate_with_response()).unwrap();

        let frame = b.receive().unwrap();
        assert_eq!(frame.sender, 0x0001);
        assert_eq!(frame.payload, vec![0xAB]);

        // RX timestamp trails TX by the synthetic flight time
        let flight = b.read_rx_timestamp() - a.read_tx_timestamp();
        let meters = flight as f64 * DWT_TIME_UNITS * SPEED_OF_LIGHT;
        assert!((meters - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_linked_receive_times_out_when_silent() {
        let (mut a, _b) = linked_pair(0x0001, 0x0002, 1.0);
        a.set_receive_timeout(Duration::from_millis(10));
        assert_eq!(a.receive(), Err(RadioError::Timeout));
    }
}
