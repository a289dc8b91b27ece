//! Driver-facing HDMI-CEC HAL interface.

use crate::instance::{RxCallback, TxCallback};
use crate::registry::HalHandle;
use crate::status::{HalError, TxResult};
use cec_wire::{LogicalAddress, PhysicalAddress};

/// Result of a driver operation
pub type HalResult<T> = Result<T, HalError>;

/// HDMI-CEC driver operations.
///
/// Every call but `open` takes the handle `open` returned. Checks run in a
/// fixed order: an instance must be open, then the handle must name it, then
/// the arguments must be valid.
pub trait CecDriver {
    /// Create the HAL instance from the loaded profile
    fn open(&self) -> HalResult<HalHandle>;

    /// Destroy the HAL instance, draining pending messages first
    fn close(&self, handle: HalHandle) -> HalResult<()>;

    /// Physical address of the emulated device
    fn get_physical_address(&self, handle: HalHandle) -> HalResult<PhysicalAddress>;

    /// Logical address of the emulated device
    fn get_logical_address(&self, handle: HalHandle) -> HalResult<LogicalAddress>;

    /// Claim a logical address for the emulated device
    fn add_logical_address(&self, handle: HalHandle, address: LogicalAddress) -> HalResult<()>;

    /// Give up a claimed logical address
    fn remove_logical_address(&self, handle: HalHandle, address: LogicalAddress) -> HalResult<()>;

    /// Install or clear the receive callback
    fn set_rx_callback(&self, handle: HalHandle, callback: Option<RxCallback>) -> HalResult<()>;

    /// Install or clear the asynchronous transmit callback
    fn set_tx_callback(&self, handle: HalHandle, callback: Option<TxCallback>) -> HalResult<()>;

    /// Send a frame and wait for its outcome
    fn tx(&self, handle: HalHandle, frame: &[u8]) -> HalResult<TxResult>;

    /// Send a frame; the outcome goes to the transmit callback
    fn tx_async(&self, handle: HalHandle, frame: &[u8]) -> HalResult<()>;
}
