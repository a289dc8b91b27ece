//! Opaque HAL handles.
//!
//! A handle names a registry slot and the generation it was issued for. Once
//! the slot is released its generation moves on, so old handles stop
//! resolving even after the slot is reused.

use std::fmt;

/// Opaque handle to an open HAL instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalHandle {
    index: u32,
    generation: u32,
}

impl HalHandle {
    const INVALID_INDEX: u32 = u32::MAX;

    /// Raw token for C-style callers, never 0
    pub fn as_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index.wrapping_add(1))
    }

    /// Rebuild a handle from a raw token; 0 never resolves
    pub fn from_raw(raw: u64) -> Self {
        let low = raw as u32;
        Self {
            index: low.checked_sub(1).unwrap_or(Self::INVALID_INDEX),
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for HalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_raw())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    occupied: bool,
}

/// Fixed-capacity registry of live handles
#[derive(Debug, Clone)]
pub struct HandleRegistry {
    slots: Vec<Slot>,
}

impl HandleRegistry {
    /// Create a registry with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::default(); capacity],
        }
    }

    /// Issue a handle, `None` when every slot is taken
    pub fn register(&mut self) -> Option<HalHandle> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.occupied)?;
        slot.occupied = true;
        Some(HalHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }

    /// Whether `handle` names a live slot
    pub fn resolve(&self, handle: HalHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.occupied && slot.generation == handle.generation)
    }

    /// Release the slot named by `handle`, false when it does not resolve
    pub fn release(&mut self, handle: HalHandle) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.occupied && slot.generation == handle.generation => {
                slot.occupied = false;
                slot.generation = slot.generation.wrapping_add(1);
                true
            }
            _ => false,
        }
    }

    /// Number of live handles
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupied).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot_registry() {
        let mut registry = HandleRegistry::new(1);

        let first = registry.register().unwrap();
        assert!(registry.register().is_none());
        assert!(registry.resolve(first));
        assert_eq!(registry.active(), 1);

        assert!(registry.release(first));
        assert!(!registry.release(first));
        assert!(!registry.resolve(first));

        let second = registry.register().unwrap();
        assert_ne!(first, second);
        assert!(!registry.resolve(first));
        assert!(registry.resolve(second));
    }

    #[test]
    fn test_raw_round_trip() {
        let mut registry = HandleRegistry::new(1);
        let handle = registry.register().unwrap();

        assert_ne!(handle.as_raw(), 0);
        assert_eq!(HalHandle::from_raw(handle.as_raw()), handle);
        assert!(!registry.resolve(HalHandle::from_raw(0)));
    }
}
