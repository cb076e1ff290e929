//! In-process simulation of a full deployment: the coordinator anchor at
//! the origin, three anchors that self-position against it, and a tag that
//! multilaterates against all four. Nodes run on their own threads,
//! connected by channel-backed transports with synthetic flight times.

use std::thread;
use std::time::Duration;

use tracing::info;
use uwb_positioning::config::PositioningConfig;
use uwb_positioning::core::{Coordinate, DeviceIdentity, DeviceRole};
use uwb_positioning::hardware::mock::RadioHub;
use uwb_positioning::protocol::{NodeState, PositioningNode};

fn identity(address: u16, ordinal: u8, role: DeviceRole) -> DeviceIdentity {
    DeviceIdentity {
        device_hash: 0,
        pan_id: 0xABCD,
        address,
        ordinal,
        role,
        tx_antenna_delay: 0,
        rx_antenna_delay: 0,
        coordinate: Coordinate::ORIGIN,
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    // True geometry, known only to the simulated radio medium
    let deployment: [(u16, u8, DeviceRole, (f64, f64, f64)); 5] = [
        (0x0001, 1, DeviceRole::Anchor, (0.0, 0.0, 0.0)),
        (0x0002, 2, DeviceRole::Anchor, (4.0, 0.0, 0.0)),
        (0x0003, 3, DeviceRole::Anchor, (2.0, 4.0, 0.0)),
        (0x0004, 4, DeviceRole::Anchor, (2.0, 2.0, 2.0)),
        (0x0005, 5, DeviceRole::Tag, (1.0, 1.2, 0.8)),
    ];

    // Trimmed repetition counts keep the simulated run short
    let config = PositioningConfig {
        repetitions: uwb_positioning::config::RepetitionConfig {
            one_anchor: 50,
            two_anchor: 25,
            three_anchor: 10,
            multilateration: 1,
        },
        receive_timeout_ms: 200,
        announcement_pause_ms: 20,
        steady_state_interval_ms: 100,
    };

    let hub = RadioHub::new();
    let mut coordinator = None;
    for &(address, ordinal, role, position) in &deployment {
        let mut transport = hub.attach(address, position);
        transport.set_receive_timeout(Duration::from_millis(config.receive_timeout_ms));
        let node = PositioningNode::new(transport, identity(address, ordinal, role), config.clone());

        if node.identity().is_coordinator() {
            coordinator = Some(node);
        } else {
            thread::spawn(move || {
                let mut node = node;
                loop {
                    node.step(NodeState::Responder);
                }
            });
        }
    }
    let mut coordinator = coordinator.expect("deployment has a coordinator");

    info!("starting anchor calibration");
    let mut state = coordinator.initial_state();
    while state != NodeState::CoordinatorSteadyState {
        state = coordinator.step(state);
    }

    info!("starting steady-state tag positioning");
    for _ in 0..3 {
        coordinator.step(NodeState::CoordinatorSteadyState);
    }
    info!("simulation complete");
}
