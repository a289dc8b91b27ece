//! Value tables carried in device profiles and CEC parameters.
//!
//! Each table converts both ways between the profile spelling and the
//! protocol value. Lookups are exhaustive matches; a miss yields `None` and
//! the caller picks the fallback.

use crate::address::LogicalAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CEC primary device type
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// TV (sink)
    Tv = 0,
    /// Recording device
    Recorder = 1,
    /// Reserved
    Reserved = 2,
    /// Tuner
    Tuner = 3,
    /// Playback device
    Playback = 4,
    /// Audio system
    AudioSystem = 5,
    /// Free use
    FreeUse = 6,
    /// Unregistered
    Unregistered = 7,
    /// Not declared or not recognised
    Unknown = 8,
}

impl DeviceType {
    /// Parse the profile spelling of a device type
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TV" => Some(DeviceType::Tv),
            "PlaybackDevice" => Some(DeviceType::Playback),
            "AudioSystem" => Some(DeviceType::AudioSystem),
            "RecordingDevice" => Some(DeviceType::Recorder),
            "Tuner" => Some(DeviceType::Tuner),
            "Reserved" => Some(DeviceType::Reserved),
            _ => None,
        }
    }

    /// Profile spelling, `None` for types a profile cannot declare
    pub fn name(self) -> Option<&'static str> {
        match self {
            DeviceType::Tv => Some("TV"),
            DeviceType::Playback => Some("PlaybackDevice"),
            DeviceType::AudioSystem => Some("AudioSystem"),
            DeviceType::Recorder => Some("RecordingDevice"),
            DeviceType::Tuner => Some("Tuner"),
            DeviceType::Reserved => Some("Reserved"),
            DeviceType::FreeUse | DeviceType::Unregistered | DeviceType::Unknown => None,
        }
    }

    /// Logical addresses a device of this type may claim, in preference order
    pub fn candidate_addresses(self) -> &'static [LogicalAddress] {
        use LogicalAddress::*;
        match self {
            DeviceType::Tv => &[Tv, FreeUse],
            DeviceType::Playback => &[PlaybackDevice1, PlaybackDevice2, PlaybackDevice3],
            DeviceType::AudioSystem => &[AudioSystem],
            DeviceType::Recorder => &[RecordingDevice1, RecordingDevice2, RecordingDevice3],
            DeviceType::Tuner => &[Tuner1, Tuner2, Tuner3, Tuner4],
            DeviceType::Reserved
            | DeviceType::FreeUse
            | DeviceType::Unregistered
            | DeviceType::Unknown => &[LogicalAddress::UNREGISTERED],
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("Unknown"))
    }
}

/// Device power status
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerStatus {
    /// On
    On = 0x00,
    /// Standby
    Standby = 0x01,
    /// In transition from standby to on
    TransitionStandbyToOn = 0x02,
    /// In transition from on to standby
    TransitionOnToStandby = 0x03,
    /// Not declared
    Unknown = 0x99,
}

impl PowerStatus {
    /// Parse the profile spelling of a power status
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "on" => Some(PowerStatus::On),
            "standby" => Some(PowerStatus::Standby),
            "unknown" => Some(PowerStatus::Unknown),
            _ => None,
        }
    }

    /// Profile spelling, `None` for the transition states
    pub fn name(self) -> Option<&'static str> {
        match self {
            PowerStatus::On => Some("on"),
            PowerStatus::Standby => Some("standby"),
            PowerStatus::Unknown => Some("unknown"),
            PowerStatus::TransitionStandbyToOn | PowerStatus::TransitionOnToStandby => None,
        }
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "transition(0x{:02X})", *self as u8),
        }
    }
}

/// CEC version as reported by `CECVersion`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CecVersion {
    /// Not declared
    Unknown = 0,
    /// 1.2
    V1_2 = 1,
    /// 1.2a
    V1_2a = 2,
    /// 1.3
    V1_3 = 3,
    /// 1.3a
    V1_3a = 4,
    /// 1.4
    V1_4 = 5,
    /// 2.0
    V2_0 = 6,
}

impl From<u32> for CecVersion {
    fn from(value: u32) -> Self {
        match value {
            1 => CecVersion::V1_2,
            2 => CecVersion::V1_2a,
            3 => CecVersion::V1_3,
            4 => CecVersion::V1_3a,
            5 => CecVersion::V1_4,
            6 => CecVersion::V2_0,
            _ => CecVersion::Unknown,
        }
    }
}

/// 24-bit IEEE OUI vendor id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VendorId(pub u32);

/// Vendor names accepted in profiles
const VENDORS: &[(&str, u32)] = &[
    ("TOSHIBA", 0x000039),
    ("SAMSUNG", 0x0000F0),
    ("DENON", 0x0005CD),
    ("MARANTZ", 0x000678),
    ("LOEWE", 0x000982),
    ("ONKYO", 0x0009B0),
    ("MEDION", 0x000CB8),
    ("TOSHIBA2", 0x000CE7),
    ("APPLE", 0x0010FA),
    ("HARMAN_KARDON2", 0x001950),
    ("GOOGLE", 0x001A11),
    ("AKAI", 0x0020C7),
    ("AOC", 0x002467),
    ("PANASONIC", 0x008045),
    ("PHILIPS", 0x00903E),
    ("DAEWOO", 0x009053),
    ("YAMAHA", 0x00A0DE),
    ("GRUNDIG", 0x00D0D5),
    ("PIONEER", 0x00E036),
    ("LG", 0x00E091),
    ("SHARP", 0x08001F),
    ("SONY", 0x080046),
    ("BROADCOM", 0x18C086),
    ("SHARP2", 0x534850),
    ("VIZIO", 0x6B746D),
    ("BENQ", 0x8065E9),
    ("HARMAN_KARDON", 0x9C645E),
    ("UNKNOWN", 0x000000),
];

impl VendorId {
    /// Vendor id used when none is declared
    pub const UNKNOWN: VendorId = VendorId(0);

    /// Parse the profile spelling of a vendor
    pub fn from_name(name: &str) -> Option<Self> {
        VENDORS
            .iter()
            .find(|(vendor, _)| *vendor == name)
            .map(|(_, code)| VendorId(*code))
    }

    /// Profile spelling of a known vendor code
    pub fn name(self) -> Option<&'static str> {
        VENDORS
            .iter()
            .find(|(_, code)| *code == self.0)
            .map(|(vendor, _)| *vendor)
    }

    /// Three big-endian bytes as carried by `DeviceVendorID`
    pub fn to_be_bytes(self) -> [u8; 3] {
        let [_, a, b, c] = self.0.to_be_bytes();
        [a, b, c]
    }
}
