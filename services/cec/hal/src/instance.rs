//! State of one open HAL instance.

use crate::profile::{HalProfile, PortInfo};
use crate::queue::MessageQueue;
use crate::registry::HalHandle;
use crate::status::TxResult;
use cec_topology::{Device, DeviceId, DeviceTree, LogicalAddressPool};
use cec_wire::{DeviceType, LogicalAddress, PhysicalAddress};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Receives frames from the virtual bus
pub type RxCallback = Arc<dyn Fn(HalHandle, &[u8]) + Send + Sync>;

/// Receives asynchronous transmit outcomes
pub type TxCallback = Arc<dyn Fn(HalHandle, TxResult) + Send + Sync>;

/// HAL lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalState {
    /// No instance
    Closed,
    /// Instance exists but is being built or torn down
    Open,
    /// Instance accepts driver calls and messages
    Ready,
}

#[derive(Default, Clone)]
pub(crate) struct Callbacks {
    pub(crate) rx: Option<RxCallback>,
    pub(crate) tx: Option<TxCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("rx", &self.rx.is_some())
            .field("tx", &self.tx.is_some())
            .finish()
    }
}

/// Everything owned by an open HAL
#[derive(Debug)]
pub(crate) struct HalCore {
    pub(crate) handle: HalHandle,
    pub(crate) state: HalState,
    pub(crate) ports: Vec<PortInfo>,
    pub(crate) tree: DeviceTree,
    pub(crate) emulated: DeviceId,
    pub(crate) pool: LogicalAddressPool,
    pub(crate) callbacks: Callbacks,
    pub(crate) queue: Option<MessageQueue>,
}

impl HalCore {
    /// Build the instance from a validated profile and allocate addresses
    pub(crate) fn new(handle: HalHandle, profile: &HalProfile) -> Option<Self> {
        let tree = profile.tree.clone();
        let emulated = tree.get(&profile.emulated_device)?;

        let mut core = Self {
            handle,
            state: HalState::Open,
            ports: profile.ports.clone(),
            tree,
            emulated,
            pool: LogicalAddressPool::new(),
            callbacks: Callbacks::default(),
            queue: None,
        };
        core.allocate_addresses();

        let device = core.tree.device_mut(emulated)?;
        if device.device_type == DeviceType::Tv {
            info!("Emulating a TV");
            if let Some(address) = device.logical_address.replace(LogicalAddress::Broadcast) {
                if !address.is_broadcast() {
                    core.pool.release(address);
                }
            }
        } else {
            info!("Emulating a source device");
        }
        Some(core)
    }

    /// Run address allocation over the whole tree
    pub(crate) fn allocate_addresses(&mut self) {
        self.tree.allocate_addresses(self.emulated, &mut self.pool);
        if let Some(device) = self.tree.device_mut(self.emulated) {
            if device.device_type == DeviceType::Tv {
                device.physical_address = PhysicalAddress::ROOT;
            }
        }
    }

    /// The emulated device
    pub(crate) fn emulated_device(&self) -> Option<&Device> {
        self.tree.device(self.emulated)
    }

    /// The emulated device, mutably
    pub(crate) fn emulated_device_mut(&mut self) -> Option<&mut Device> {
        self.tree.device_mut(self.emulated)
    }

    /// Whether the emulated device is a sink without a claimed address
    pub(crate) fn sink_unclaimed(&self) -> bool {
        self.emulated_device().is_some_and(|device| {
            device.device_type == DeviceType::Tv
                && device.logical_address.map_or(true, LogicalAddress::is_broadcast)
        })
    }

    /// Log the emulated device, ports and device count, then the tree
    pub(crate) fn print_status(&self) {
        info!(">>>>>>> >>>>> >>>> >> >> >");
        info!(
            "Emulated Device               : {}",
            self.emulated_device().map_or("<missing>", |d| d.name.as_str())
        );
        info!("Number of Ports               : {}", self.ports.len());
        info!("Number of devices in Network  : {}", self.tree.device_count());
        info!("Allocated logical addresses   : {}", self.pool.allocated_count());
        info!("===========================");
        self.tree.print_map();
        info!("=================================");
    }

    /// Log the device count and the tree
    pub(crate) fn print_devices(&self) {
        info!(">>>>>>> >>>>> >>>> >> >> >");
        info!("Number of devices in Network  : {}", self.tree.device_count());
        info!("===========================");
        self.tree.print_map();
        info!("=================================");
    }

    /// Log every port
    pub(crate) fn print_ports(&self) {
        info!(">>>>>>> >>>>> >>>> >> >> >");
        info!("Number of Ports               : {}", self.ports.len());
        info!("=================================");
        for port in &self.ports {
            info!("Port Id        : {}", port.id);
            info!("Port type      : {}", port.port_type);
            info!("Capabilities   : {:?}", port.capabilities);
        }
        info!("=================================");
    }

    /// Detach the message queue so it can be shut down outside the lock
    pub(crate) fn take_queue(&mut self) -> Option<MessageQueue> {
        let queue = self.queue.take();
        if queue.is_none() {
            warn!("HAL instance has no message queue");
        }
        queue
    }
}
