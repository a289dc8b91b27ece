//! Validated HAL profile: ports, emulated device and device tree.

use bitflags::bitflags;
use cec_profile::{OptionalField, Profile, ProfileError};
use cec_topology::{DeviceTree, TopologyError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Profile key of the root of the device tree
pub const DEVICE_MAP_ROOT: &str = "hdmicec/device_map/0";

/// Profile validation errors
#[derive(Error, Debug)]
pub enum HalProfileError {
    /// Profile could not be read
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Device tree could not be built
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// `number_devices` is below one
    #[error("profile declares no devices")]
    NoDevices,

    /// Emulated device is not part of the device tree
    #[error("emulated device {0} not found in device map")]
    EmulatedDeviceMissing(String),
}

/// Direction of an HDMI port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortType {
    /// HDMI input
    Input,
    /// HDMI output
    Output,
    /// Not declared
    Unknown,
}

impl PortType {
    /// Parse the profile spelling of a port type
    pub fn from_name(name: &str) -> Self {
        match name {
            "in" => PortType::Input,
            "out" => PortType::Output,
            _ => PortType::Unknown,
        }
    }

    /// Profile spelling
    pub fn name(self) -> &'static str {
        match self {
            PortType::Input => "in",
            PortType::Output => "out",
            PortType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Port capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct PortCapabilities: u8 {
        /// CEC line connected
        const CEC = 0b0000_0001;
        /// Audio return channel
        const ARC = 0b0000_0010;
    }
}

/// One HDMI port of the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port id
    pub id: u16,
    /// Port direction
    pub port_type: PortType,
    /// Capabilities
    pub capabilities: PortCapabilities,
}

impl PortInfo {
    fn from_profile(profile: &Profile, index: usize) -> Result<Self, ProfileError> {
        let prefix = format!("hdmicec/ports/{}", index);
        let id = profile.get_u32(&format!("{}/id", prefix))?;
        let port_type = profile
            .get_str(&format!("{}/type", prefix))
            .optional()?
            .map_or(PortType::Unknown, |name| PortType::from_name(&name));

        let mut capabilities = PortCapabilities::empty();
        let cec = profile.get_bool(&format!("{}/cec_supported", prefix)).optional()?;
        capabilities.set(PortCapabilities::CEC, cec.unwrap_or(false));
        let arc = profile.get_bool(&format!("{}/arc_supported", prefix)).optional()?;
        capabilities.set(PortCapabilities::ARC, arc.unwrap_or(false));

        Ok(Self {
            id: u16::try_from(id).map_err(|_| ProfileError::Type {
                key: format!("{}/id", prefix),
                expected: "port id",
            })?,
            port_type,
            capabilities,
        })
    }
}

/// Everything the HAL needs from a profile, validated up front
#[derive(Debug, Clone)]
pub struct HalProfile {
    /// Name of the device the HAL emulates
    pub emulated_device: String,
    /// Declared number of devices in the network
    pub number_devices: u32,
    /// Ports of the emulated device
    pub ports: Vec<PortInfo>,
    /// Device tree as loaded, before address allocation
    pub tree: DeviceTree,
}

impl HalProfile {
    /// Validate and extract the HAL profile
    pub fn load(profile: &Profile) -> Result<Self, HalProfileError> {
        let emulated_device = profile.get_str("hdmicec/emulated_device")?;

        let number_devices = profile.get_u32("hdmicec/number_devices")?;
        if number_devices < 1 {
            return Err(HalProfileError::NoDevices);
        }

        let listed = profile.len("hdmicec/ports");
        let number_ports = match profile.get_u32("hdmicec/number_ports").optional()? {
            Some(declared) => {
                if declared as usize != listed {
                    warn!(
                        "Profile declares {} ports but lists {}, using the listed ports",
                        declared, listed
                    );
                }
                listed.min(declared as usize)
            }
            None => listed,
        };
        let ports = (0..number_ports)
            .map(|index| PortInfo::from_profile(profile, index))
            .collect::<Result<Vec<_>, _>>()?;

        let tree = DeviceTree::from_profile(profile, DEVICE_MAP_ROOT)?;
        if tree.get(&emulated_device).is_none() {
            return Err(HalProfileError::EmulatedDeviceMissing(emulated_device));
        }
        if tree.device_count() != number_devices as usize {
            debug!(
                "Profile declares {} devices, device map holds {}",
                number_devices,
                tree.device_count()
            );
        }

        Ok(Self {
            emulated_device,
            number_devices,
            ports,
            tree,
        })
    }
}
