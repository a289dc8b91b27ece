//! Device node data and per-node profile loading.

use crate::TopologyError;
use cec_profile::{join, OptionalField, Profile};
use cec_wire::{CecVersion, DeviceType, LogicalAddress, PhysicalAddress, PowerStatus, VendorId};
use serde::Serialize;
use tracing::warn;

/// Maximum OSD name length in characters
pub const MAX_OSD_NAME_LENGTH: usize = 15;

/// One device on the virtual HDMI network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// OSD name, unique within a tree
    pub name: String,
    /// Primary device type
    pub device_type: DeviceType,
    /// CEC version
    pub version: CecVersion,
    /// Vendor id
    pub vendor: VendorId,
    /// Power status
    pub power_status: PowerStatus,
    /// Whether the device is the active source
    pub active_source: bool,
    /// Port of the parent this device is plugged into
    pub port_id: u8,
    /// Physical address, `INVALID` until allocated
    pub physical_address: PhysicalAddress,
    /// Logical address, `None` until allocated
    pub logical_address: Option<LogicalAddress>,
}

impl Device {
    /// Create a device with default attributes
    pub fn new(name: &str, device_type: DeviceType) -> Self {
        Self {
            name: truncate_name(name),
            device_type,
            version: CecVersion::Unknown,
            vendor: VendorId::UNKNOWN,
            power_status: PowerStatus::Unknown,
            active_source: false,
            port_id: 0,
            physical_address: PhysicalAddress::INVALID,
            logical_address: None,
        }
    }

    /// Set the port of the parent this device is plugged into
    pub fn with_port(mut self, port_id: u8) -> Self {
        self.port_id = port_id;
        self
    }

    /// Load one node at `prefix`, returning it with its declared child count.
    ///
    /// Only `name` is required. Unrecognised type, vendor and power status
    /// spellings fall back to their unknown values.
    pub fn from_profile(profile: &Profile, prefix: &str) -> Result<(Self, u32), TopologyError> {
        let name = profile.get_str(&join(prefix, "name"))?;
        let mut device = Device::new(&name, DeviceType::Unknown);

        if let Some(active) = profile.get_bool(&join(prefix, "active_source")).optional()? {
            device.active_source = active;
        }

        if let Some(status) = profile.get_str(&join(prefix, "pwr_status")).optional()? {
            device.power_status = PowerStatus::from_name(&status).unwrap_or_else(|| {
                warn!("Device {}: unknown power status {:?}", device.name, status);
                PowerStatus::Unknown
            });
        }

        if let Some(version) = profile.get_u32(&join(prefix, "version")).optional()? {
            device.version = CecVersion::from(version);
        }

        if let Some(vendor) = profile.get_str(&join(prefix, "vendor")).optional()? {
            device.vendor = VendorId::from_name(&vendor).unwrap_or_else(|| {
                warn!("Device {}: unknown vendor {:?}", device.name, vendor);
                VendorId::UNKNOWN
            });
        }

        if let Some(kind) = profile.get_str(&join(prefix, "type")).optional()? {
            device.device_type = DeviceType::from_name(&kind).unwrap_or_else(|| {
                warn!("Device {}: unknown device type {:?}", device.name, kind);
                DeviceType::Unknown
            });
        }

        if let Some(port) = profile.get_u32(&join(prefix, "port_id")).optional()? {
            device.port_id = u8::try_from(port)
                .ok()
                .filter(|p| *p <= 0x0F)
                .ok_or_else(|| TopologyError::InvalidPort {
                    name: device.name.clone(),
                    port,
                })?;
        }

        let declared = profile
            .get_u32(&join(prefix, "number_children"))
            .optional()?
            .unwrap_or(0);

        Ok((device, declared))
    }

    /// Whether the device has been given a logical address
    pub fn is_allocated(&self) -> bool {
        self.logical_address.is_some()
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_OSD_NAME_LENGTH).collect()
}
