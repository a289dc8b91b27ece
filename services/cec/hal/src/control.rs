//! Handling of control-plane messages on the worker thread.
//!
//! Command messages turn into one CEC frame for the Rx callback. State
//! messages change the topology or log the current status. Every failure is
//! logged and produces no frame.

use crate::instance::HalCore;
use crate::message::{field, field_path, MessageKind};
use bytes::Bytes;
use cec_profile::Profile;
use cec_wire::{Command, DeviceType, LogicalAddress, Opcode};
use tracing::{debug, error, info};

/// Destination name addressing every device
pub const BROADCAST: &str = "broadcast";

/// State message adding a device subtree
pub const STATE_ADD_DEVICE: &str = "AddDevice";
/// State message removing a device subtree
pub const STATE_REMOVE_DEVICE: &str = "RemoveDevice";
/// State message logging the HAL status
pub const STATE_PRINT_STATUS: &str = "PrintStatus";

impl HalCore {
    /// Handle one message, returning the frames to deliver to the Rx callback
    pub(crate) fn handle_message(&mut self, kind: MessageKind, payload: &[u8]) -> Vec<Bytes> {
        let document = match Profile::from_slice(payload) {
            Ok(document) => document,
            Err(e) => {
                error!("Failed to parse {} message: {}", kind, e);
                return Vec::new();
            }
        };

        match kind {
            MessageKind::Command => self
                .parse_command(&document)
                .map(|command| {
                    debug!("Delivering frame {}", command);
                    vec![command.to_bytes()]
                })
                .unwrap_or_default(),
            MessageKind::State => self.handle_state_message(&document),
            MessageKind::Event | MessageKind::Config => {
                info!("Received {} message, ignoring", kind);
                Vec::new()
            }
        }
    }

    /// Build the CEC frame a command message describes
    pub(crate) fn parse_command(&self, document: &Profile) -> Option<Command> {
        let name = field(document, "command").unwrap_or_default();
        let Some(opcode) = Opcode::from_name(&name) else {
            error!("ParseCommand: Opcode[{}] Unknown", name);
            return None;
        };
        debug!("ParseCommand: Opcode[{}]", name);

        let name = field(document, "initiator").unwrap_or_default();
        let Some(initiator) = self.tree.find(&name) else {
            error!("ParseCommand: Initiator[{}] Unknown", name);
            return None;
        };

        let name = field(document, "destination").unwrap_or_default();
        let destination = if name == BROADCAST {
            None
        } else {
            match self.tree.find(&name) {
                Some(device) => Some(device),
                None => {
                    error!("ParseCommand: Destination[{}] Unknown", name);
                    return None;
                }
            }
        };
        debug!(
            "ParseCommand: Initiator[{}] Destination[{}]",
            initiator.name, name
        );

        let mut command = Command::with(
            initiator
                .logical_address
                .unwrap_or(LogicalAddress::UNREGISTERED),
            destination
                .and_then(|device| device.logical_address)
                .unwrap_or(LogicalAddress::Broadcast),
            Some(opcode),
        );

        match opcode {
            Opcode::ActiveSource | Opcode::InactiveSource | Opcode::RoutingInformation => {
                command.push_back_slice(&initiator.physical_address.to_be_bytes());
            }
            Opcode::ReportPhysicalAddress => {
                command.push_back_slice(&initiator.physical_address.to_be_bytes());
                command.push_back_byte(initiator.device_type as u8);
            }
            Opcode::SetOsdName => {
                let osd_name = field(document, "osd_name").unwrap_or_else(|| initiator.name.clone());
                command.push_back_slice(osd_name.as_bytes());
            }
            Opcode::DeviceVendorId => {
                command.push_back_slice(&initiator.vendor.to_be_bytes());
            }
            Opcode::CecVersion => {
                command.push_back_byte(initiator.version as u8);
            }
            Opcode::ReportPowerStatus => {
                command.push_back_byte(initiator.power_status as u8);
            }
            Opcode::SetStreamPath => {
                // The stream path names the destination, or an explicit target
                let target = field(document, "target")
                    .and_then(|name| self.tree.find(&name))
                    .or(destination);
                match target {
                    Some(device) => {
                        command.push_back_slice(&device.physical_address.to_be_bytes());
                    }
                    None => error!("ParseCommand: SetStreamPath without a target device"),
                }
            }
            _ => {}
        }

        Some(command)
    }

    /// Apply a state message, returning announcement frames
    pub(crate) fn handle_state_message(&mut self, document: &Profile) -> Vec<Bytes> {
        let state = field(document, "state").unwrap_or_default();
        match state.as_str() {
            STATE_ADD_DEVICE => self.add_device(document).into_iter().collect(),
            STATE_REMOVE_DEVICE => {
                self.remove_device(document);
                Vec::new()
            }
            STATE_PRINT_STATUS => {
                match field(document, "parameters/status").as_deref() {
                    Some("Devices") => self.print_devices(),
                    Some("Ports") => self.print_ports(),
                    _ => self.print_status(),
                }
                Vec::new()
            }
            other => {
                error!("Unknown State Message: {}", other);
                Vec::new()
            }
        }
    }

    fn add_device(&mut self, document: &Profile) -> Option<Bytes> {
        let parent_name = field(document, "parameters/parent").unwrap_or_default();
        let Some(parent) = self.tree.get(&parent_name) else {
            error!("AddDevice: failed to get parent [{}]", parent_name);
            return None;
        };

        // A TV being emulated can only take as many devices as it has ports
        if parent == self.emulated
            && self
                .emulated_device()
                .is_some_and(|device| device.device_type == DeviceType::Tv)
            && self.tree.children(parent).len() >= self.ports.len()
        {
            error!("AddDevice: No free port to Add Device");
            return None;
        }

        let prefix = field_path(document, "parameters");
        let id = match self.tree.insert_from_profile(parent, document, &prefix) {
            Ok(id) => id,
            Err(e) => {
                error!("AddDevice: failed to create device: {}", e);
                return None;
            }
        };
        self.allocate_addresses();

        let device = self.tree.device(id)?;
        info!(
            "AddDevice: {} at {} as {}",
            device.name,
            device.physical_address,
            device
                .logical_address
                .unwrap_or(LogicalAddress::UNREGISTERED)
        );

        let mut announcement = Command::with(
            device
                .logical_address
                .unwrap_or(LogicalAddress::UNREGISTERED),
            LogicalAddress::Broadcast,
            Some(Opcode::ReportPhysicalAddress),
        );
        announcement.push_back_slice(&device.physical_address.to_be_bytes());
        announcement.push_back_byte(device.device_type as u8);
        Some(announcement.to_bytes())
    }

    fn remove_device(&mut self, document: &Profile) {
        let name = field(document, "parameters/name").unwrap_or_default();
        let Some(id) = self.tree.get(&name) else {
            error!("RemoveDevice: failed to get device [{}]", name);
            return;
        };
        if self.tree.is_within(self.emulated, id) {
            error!("RemoveDevice: [{}] holds the emulated device, refusing", name);
            return;
        }

        match self.tree.remove_subtree(id) {
            Ok(removed) => {
                for device in &removed {
                    if let Some(address) = device.logical_address {
                        if !address.is_broadcast() {
                            self.pool.release(address);
                        }
                    }
                }
                info!("RemoveDevice: removed {} device(s) under [{}]", removed.len(), name);
            }
            Err(e) => error!("RemoveDevice: [{}] {}", name, e),
        }
    }
}
