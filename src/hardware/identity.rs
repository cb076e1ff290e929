//! Device identity lookup
//!
//! Each radio IC carries a factory part ID and lot ID; a deterministic hash
//! of the two selects this node's entry in a deployment table. The table is
//! behind a trait so tests can substitute synthetic identities without real
//! hardware.

use crate::core::{Coordinate, DeviceIdentity, DeviceRole};
use crate::hardware::{RadioError, RadioResult};

/// Calibrated antenna delay applied to every device until measured per unit
pub const DEFAULT_ANTENNA_DELAY: u16 = 16385;

/// Resolves this node's identity from its hardware hash
pub trait IdentityProvider {
    fn identity_for(&self, device_hash: u32) -> Option<DeviceIdentity>;

    /// Identity lookup that treats a miss as the startup-fatal error it is
    fn resolve(&self, device_hash: u32) -> RadioResult<DeviceIdentity> {
        self.identity_for(device_hash).ok_or(RadioError::DeviceNotFound)
    }
}

/// FNV-1a over the concatenated part ID (4 bytes) and lot ID (8 bytes)
pub fn device_hash(part_id: u32, lot_id: u64) -> u32 {
    let mut buf = [0u8; 12];
    buf[..4].copy_from_slice(&part_id.to_le_bytes());
    buf[4..].copy_from_slice(&lot_id.to_le_bytes());
    fnv1a(&buf)
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in data {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// The static deployment table: one coordinator anchor, three further
/// anchors, and the tag
pub struct StaticIdentityTable {
    entries: Vec<DeviceIdentity>,
}

impl StaticIdentityTable {
    pub fn new(entries: Vec<DeviceIdentity>) -> Self {
        Self { entries }
    }

    /// The deployment this engine was calibrated for
    pub fn deployment_default() -> Self {
        let pan_id = 0xABCD;
        let entry = |hash, address, ordinal, role| DeviceIdentity {
            device_hash: hash,
            pan_id,
            address,
            ordinal,
            role,
            tx_antenna_delay: DEFAULT_ANTENNA_DELAY,
            rx_antenna_delay: DEFAULT_ANTENNA_DELAY,
            coordinate: Coordinate::ORIGIN,
        };
        Self::new(vec![
            entry(0x1FC5_135C, 0x0001, 1, DeviceRole::Anchor),
            entry(0xF059_DE36, 0x0002, 2, DeviceRole::Anchor),
            entry(0x1A0A_B824, 0x0003, 3, DeviceRole::Anchor),
            entry(0x4BB9_19FB, 0x0004, 4, DeviceRole::Anchor),
            entry(0x8E0C_40D1, 0x0005, 5, DeviceRole::Tag),
        ])
    }
}

impl IdentityProvider for StaticIdentityTable {
    fn identity_for(&self, device_hash: u32) -> Option<DeviceIdentity> {
        self.entries.iter().find(|e| e.device_hash == device_hash).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_empty_is_offset_basis() {
        assert_eq!(fnv1a(&[]), 0x811c_9dc5);
    }

    #[test]
    fn test_device_hash_deterministic() {
        assert_eq!(device_hash(0x1234, 0x5678), device_hash(0x1234, 0x5678));
        assert_ne!(device_hash(0x1234, 0x5678), device_hash(0x1235, 0x5678));
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let table = StaticIdentityTable::deployment_default();
        let id = table.identity_for(0x1FC5_135C).unwrap();
        assert_eq!(id.address, 0x0001);
        assert!(id.is_coordinator());

        assert!(table.identity_for(0xDEAD_BEEF).is_none());
        assert_eq!(table.resolve(0xDEAD_BEEF), Err(RadioError::DeviceNotFound));
    }

    #[test]
    fn test_exactly_one_coordinator() {
        let table = StaticIdentityTable::deployment_default();
        let coordinators =
            table.entries.iter().filter(|e| e.is_coordinator()).count();
        assert_eq!(coordinators, 1);
    }
}
