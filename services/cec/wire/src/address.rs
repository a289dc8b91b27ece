//! Logical and physical CEC addressing.
//!
//! Logical addresses are the 4-bit role-scoped identifiers carried in every
//! frame header. Physical addresses are 16-bit values made of four nibbles
//! describing the position of a device in the HDMI port tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of logical addresses on the bus
pub const LOGICAL_ADDRESS_COUNT: usize = 16;

/// CEC logical address
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalAddress {
    /// TV
    Tv = 0,
    /// Recording device 1
    RecordingDevice1 = 1,
    /// Recording device 2
    RecordingDevice2 = 2,
    /// Tuner 1
    Tuner1 = 3,
    /// Playback device 1
    PlaybackDevice1 = 4,
    /// Audio system
    AudioSystem = 5,
    /// Tuner 2
    Tuner2 = 6,
    /// Tuner 3
    Tuner3 = 7,
    /// Playback device 2
    PlaybackDevice2 = 8,
    /// Recording device 3
    RecordingDevice3 = 9,
    /// Tuner 4
    Tuner4 = 10,
    /// Playback device 3
    PlaybackDevice3 = 11,
    /// Reserved
    Reserved1 = 12,
    /// Reserved
    Reserved2 = 13,
    /// Free use / specific use
    FreeUse = 14,
    /// Broadcast as destination, unregistered as initiator
    Broadcast = 15,
}

impl LogicalAddress {
    /// Unregistered shares the value of broadcast
    pub const UNREGISTERED: LogicalAddress = LogicalAddress::Broadcast;

    /// Raw 4-bit value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is the broadcast/unregistered address
    pub fn is_broadcast(self) -> bool {
        self == LogicalAddress::Broadcast
    }
}

impl TryFrom<u8> for LogicalAddress {
    type Error = crate::WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LogicalAddress::Tv),
            1 => Ok(LogicalAddress::RecordingDevice1),
            2 => Ok(LogicalAddress::RecordingDevice2),
            3 => Ok(LogicalAddress::Tuner1),
            4 => Ok(LogicalAddress::PlaybackDevice1),
            5 => Ok(LogicalAddress::AudioSystem),
            6 => Ok(LogicalAddress::Tuner2),
            7 => Ok(LogicalAddress::Tuner3),
            8 => Ok(LogicalAddress::PlaybackDevice2),
            9 => Ok(LogicalAddress::RecordingDevice3),
            10 => Ok(LogicalAddress::Tuner4),
            11 => Ok(LogicalAddress::PlaybackDevice3),
            12 => Ok(LogicalAddress::Reserved1),
            13 => Ok(LogicalAddress::Reserved2),
            14 => Ok(LogicalAddress::FreeUse),
            15 => Ok(LogicalAddress::Broadcast),
            _ => Err(crate::WireError::Address(value)),
        }
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.as_u8())
    }
}

/// CEC physical address (`a.b.c.d`, one nibble per level)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PhysicalAddress(pub u16);

impl PhysicalAddress {
    /// Address of the root device (0.0.0.0)
    pub const ROOT: PhysicalAddress = PhysicalAddress(0x0000);

    /// Address used before allocation (f.f.f.f)
    pub const INVALID: PhysicalAddress = PhysicalAddress(0xFFFF);

    /// Split into nibbles, most significant first
    pub fn nibbles(self) -> [u8; 4] {
        [
            ((self.0 >> 12) & 0x0F) as u8,
            ((self.0 >> 8) & 0x0F) as u8,
            ((self.0 >> 4) & 0x0F) as u8,
            (self.0 & 0x0F) as u8,
        ]
    }

    /// Pack nibbles, most significant first
    pub fn from_nibbles(nibbles: [u8; 4]) -> Self {
        Self(
            ((nibbles[0] as u16 & 0x0F) << 12)
                | ((nibbles[1] as u16 & 0x0F) << 8)
                | ((nibbles[2] as u16 & 0x0F) << 4)
                | (nibbles[3] as u16 & 0x0F),
        )
    }

    /// Address of a device plugged into `port` of the device at `self`.
    ///
    /// The port id is written into the first nibble that is still zero. A
    /// parent already four levels deep has no free nibble; the address is
    /// returned unchanged in that case.
    pub fn child(self, port: u8) -> Self {
        let mut nibbles = self.nibbles();
        if let Some(slot) = nibbles.iter_mut().find(|n| **n == 0) {
            *slot = port & 0x0F;
        }
        Self::from_nibbles(nibbles)
    }

    /// Big-endian bytes as carried in CEC parameters
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.nibbles();
        write!(f, "{:x}.{:x}.{:x}.{:x}", a, b, c, d)
    }
}
