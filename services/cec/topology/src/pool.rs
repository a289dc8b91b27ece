//! Logical address pool.

use cec_wire::{DeviceType, LogicalAddress};
use tracing::{debug, warn};

/// Allocation bitset over the 16 logical addresses.
///
/// Address 15 is shared by every unregistered device and broadcast traffic,
/// so it is never marked as allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalAddressPool {
    allocated: u16,
}

impl LogicalAddressPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the first free candidate address for `device_type`.
    ///
    /// Returns `UNREGISTERED` when every candidate is taken.
    pub fn allocate(&mut self, device_type: DeviceType) -> LogicalAddress {
        let free = device_type
            .candidate_addresses()
            .iter()
            .copied()
            .find(|address| !address.is_broadcast() && !self.is_allocated(*address));

        match free {
            Some(address) => {
                self.mark(address);
                debug!("Allocated logical address {} for {}", address, device_type);
                address
            }
            None => {
                warn!(
                    "No free logical address for {}, using unregistered",
                    device_type
                );
                LogicalAddress::UNREGISTERED
            }
        }
    }

    /// Claim a specific address, returns false when it is already taken
    pub fn reserve(&mut self, address: LogicalAddress) -> bool {
        if address.is_broadcast() {
            return true;
        }
        if self.is_allocated(address) {
            return false;
        }
        self.mark(address);
        true
    }

    /// Return an address to the pool
    pub fn release(&mut self, address: LogicalAddress) {
        self.allocated &= !(1 << address.as_u8());
    }

    /// Whether `address` is currently taken
    pub fn is_allocated(&self, address: LogicalAddress) -> bool {
        self.allocated & (1 << address.as_u8()) != 0
    }

    /// Number of allocated addresses
    pub fn allocated_count(&self) -> u32 {
        self.allocated.count_ones()
    }

    fn mark(&mut self, address: LogicalAddress) {
        self.allocated |= 1 << address.as_u8();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_in_preference_order() {
        let mut pool = LogicalAddressPool::new();

        assert_eq!(pool.allocate(DeviceType::Playback), LogicalAddress::PlaybackDevice1);
        assert_eq!(pool.allocate(DeviceType::Playback), LogicalAddress::PlaybackDevice2);
        assert_eq!(pool.allocate(DeviceType::Playback), LogicalAddress::PlaybackDevice3);
        assert_eq!(pool.allocate(DeviceType::Playback), LogicalAddress::UNREGISTERED);
        assert_eq!(pool.allocated_count(), 3);
    }

    #[test]
    fn test_unknown_type_is_unregistered() {
        let mut pool = LogicalAddressPool::new();
        assert_eq!(pool.allocate(DeviceType::Unknown), LogicalAddress::UNREGISTERED);
        assert!(!pool.is_allocated(LogicalAddress::Broadcast));
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_reserve_and_release() {
        let mut pool = LogicalAddressPool::new();

        assert!(pool.reserve(LogicalAddress::Tv));
        assert!(!pool.reserve(LogicalAddress::Tv));
        assert_eq!(pool.allocate(DeviceType::Tv), LogicalAddress::FreeUse);

        pool.release(LogicalAddress::Tv);
        assert!(!pool.is_allocated(LogicalAddress::Tv));
        assert_eq!(pool.allocate(DeviceType::Tv), LogicalAddress::Tv);
        assert_eq!(pool.allocated_count(), 2);
    }

    #[test]
    fn test_audio_system_single_slot() {
        let mut pool = LogicalAddressPool::new();
        assert_eq!(pool.allocate(DeviceType::AudioSystem), LogicalAddress::AudioSystem);
        assert_eq!(pool.allocate(DeviceType::AudioSystem), LogicalAddress::UNREGISTERED);
    }
}
