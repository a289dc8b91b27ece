//! Physical/logical address allocation and tree reporting.

use super::{DeviceId, DeviceTree};
use crate::LogicalAddressPool;
use cec_wire::{LogicalAddress, PhysicalAddress};
use serde::Serialize;
use tracing::info;

/// Serializable view of a device and its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    /// OSD name
    pub name: String,
    /// Device type name
    pub device_type: String,
    /// Power status name
    pub power_status: String,
    /// Vendor name, or the hex code when unnamed
    pub vendor: String,
    /// Physical address as `a.b.c.d`
    pub physical_address: String,
    /// Logical address, `None` until allocated
    pub logical_address: Option<u8>,
    /// Active source flag
    pub active_source: bool,
    /// Children in declaration order
    pub children: Vec<DeviceSnapshot>,
}

impl DeviceTree {
    /// Assign physical and logical addresses across the tree.
    ///
    /// Physical addresses are recomputed for every device: the root is
    /// 0.0.0.0 and each child writes its port id into the first free nibble
    /// of its parent's address. Logical addresses are drawn from `pool` only
    /// for devices that have none yet. A root that is also the `emulated`
    /// device is left unregistered until the driver claims an address.
    pub fn allocate_addresses(&mut self, emulated: DeviceId, pool: &mut LogicalAddressPool) {
        for (id, _) in self.walk(self.root) {
            let parent_address = self
                .parent(id)
                .and_then(|parent| self.device(parent))
                .map(|parent| parent.physical_address);
            let is_root = id == self.root;

            let Some(device) = self.device_mut(id) else {
                continue;
            };

            device.physical_address = match parent_address {
                Some(parent) => parent.child(device.port_id),
                None => PhysicalAddress::ROOT,
            };

            if device.logical_address.is_none() {
                device.logical_address = Some(if is_root && id == emulated {
                    LogicalAddress::Broadcast
                } else {
                    pool.allocate(device.device_type)
                });
            }
        }
    }

    /// Log the tree, one block per device indented by depth
    pub fn print_map(&self) {
        for (id, depth) in self.walk(self.root) {
            let Some(device) = self.device(id) else {
                continue;
            };
            let indent = depth * 4;
            info!("{:indent$}Device          : {}", "", device.name, indent = indent);
            info!("{:indent$}Type            : {}", "", device.device_type, indent = indent);
            info!("{:indent$}Pwr Status      : {}", "", device.power_status, indent = indent);
            info!("{:indent$}Physical Address: {}", "", device.physical_address, indent = indent);
            info!(
                "{:indent$}Logical Address : {}",
                "",
                device
                    .logical_address
                    .map_or_else(|| "unallocated".to_string(), |a| a.to_string()),
                indent = indent
            );
            info!("-------------------------------------------");
        }
    }

    /// Serializable view of the whole tree
    pub fn snapshot(&self) -> Option<DeviceSnapshot> {
        self.snapshot_of(self.root)
    }

    fn snapshot_of(&self, id: DeviceId) -> Option<DeviceSnapshot> {
        let device = self.device(id)?;
        Some(DeviceSnapshot {
            name: device.name.clone(),
            device_type: device.device_type.to_string(),
            power_status: device.power_status.to_string(),
            vendor: device
                .vendor
                .name()
                .map_or_else(|| format!("0x{:06X}", device.vendor.0), str::to_string),
            physical_address: device.physical_address.to_string(),
            logical_address: device.logical_address.map(LogicalAddress::as_u8),
            active_source: device.active_source,
            children: self
                .children(id)
                .iter()
                .filter_map(|child| self.snapshot_of(*child))
                .collect(),
        })
    }
}
