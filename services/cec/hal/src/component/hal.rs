use super::{Inner, VcState, VirtualComponent};
use crate::driver::{CecDriver, HalResult};
use crate::instance::{HalCore, HalState, RxCallback, TxCallback};
use crate::queue::MessageQueue;
use crate::registry::HalHandle;
use crate::status::{HalError, TxResult};
use cec_wire::{Command, DeviceType, LogicalAddress, PhysicalAddress, MAX_FRAME_SIZE};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl VirtualComponent {
    /// Run `f` on the live HAL named by `handle`
    fn with_live_hal<T>(
        &self,
        handle: HalHandle,
        f: impl FnOnce(&mut HalCore) -> HalResult<T>,
    ) -> HalResult<T> {
        let mut guard = self.inner.lock();
        let state: &mut VcState = &mut guard;
        let hal = match state.hal.as_mut() {
            Some(hal) if hal.state == HalState::Ready => hal,
            _ => return Err(HalError::NotOpened),
        };
        if hal.handle != handle || !state.registry.resolve(handle) {
            return Err(HalError::InvalidHandle);
        }
        f(hal)
    }
}

fn validate_frame(frame: &[u8]) -> HalResult<()> {
    if frame.is_empty() || frame.len() > MAX_FRAME_SIZE {
        warn!("Rejecting frame of {} bytes", frame.len());
        return Err(HalError::InvalidArgument);
    }
    Ok(())
}

fn log_frame(frame: &[u8]) {
    let mut hex = String::with_capacity(frame.len() * 3);
    for (i, byte) in frame.iter().enumerate() {
        if i > 0 {
            hex.push(':');
        }
        let _ = write!(hex, "{:02X}", byte);
    }
    info!("Tx frame [{}]", hex);
    match Command::decode(frame) {
        Ok(command) => debug!(
            "Tx decoded: initiator {:?} destination {:?} opcode {:?}",
            command.initiator, command.destination, command.opcode
        ),
        Err(e) => debug!("Tx frame does not decode: {}", e),
    }
}

/// Only a TV may claim or release a logical address, and only address 0
fn check_sink_address(hal: &HalCore, address: LogicalAddress) -> HalResult<()> {
    let device = hal.emulated_device().ok_or(HalError::GeneralError)?;
    if device.device_type != DeviceType::Tv || address != LogicalAddress::Tv {
        warn!(
            "Logical address {} not supported for {} ({})",
            address, device.name, device.device_type
        );
        return Err(HalError::InvalidArgument);
    }
    Ok(())
}

impl CecDriver for VirtualComponent {
    fn open(&self) -> HalResult<HalHandle> {
        let mut guard = self.inner.lock();
        let state: &mut VcState = &mut guard;
        if !state.initialized || state.profile.is_none() {
            warn!("HAL open before the component was opened");
            return Err(HalError::NotOpened);
        }
        if state.hal.is_some() {
            warn!("HAL already open");
            return Err(HalError::AlreadyOpen);
        }

        let handle = state.registry.register().ok_or(HalError::GeneralError)?;
        let core = state
            .profile
            .as_ref()
            .and_then(|profile| HalCore::new(handle, profile));
        let Some(mut core) = core else {
            error!("Failed to build HAL instance from profile");
            state.registry.release(handle);
            return Err(HalError::GeneralError);
        };

        let worker = Arc::downgrade(&self.inner);
        match MessageQueue::start(move |message| Inner::dispatch(&worker, message)) {
            Ok(queue) => core.queue = Some(queue),
            Err(e) => {
                error!("Failed to start message handler: {}", e);
                state.registry.release(handle);
                return Err(HalError::GeneralError);
            }
        }

        core.state = HalState::Ready;
        core.print_status();
        state.hal = Some(core);
        info!("HAL opened with handle {}", handle);
        Ok(handle)
    }

    fn close(&self, handle: HalHandle) -> HalResult<()> {
        let queue = {
            let mut guard = self.inner.lock();
            let state: &mut VcState = &mut guard;
            let hal = match state.hal.as_mut() {
                Some(hal) if hal.state == HalState::Ready => hal,
                _ => return Err(HalError::NotOpened),
            };
            if hal.handle != handle || !state.registry.release(handle) {
                return Err(HalError::InvalidHandle);
            }
            hal.state = HalState::Open;
            hal.take_queue()
        };

        // Pending messages are handled against the instance before it goes
        if let Some(mut queue) = queue {
            queue.shutdown();
        }

        self.inner.lock().hal = None;
        info!("HAL {} closed", handle);
        Ok(())
    }

    fn get_physical_address(&self, handle: HalHandle) -> HalResult<PhysicalAddress> {
        self.with_live_hal(handle, |hal| {
            hal.emulated_device()
                .map(|device| device.physical_address)
                .ok_or(HalError::GeneralError)
        })
    }

    fn get_logical_address(&self, handle: HalHandle) -> HalResult<LogicalAddress> {
        self.with_live_hal(handle, |hal| {
            hal.emulated_device()
                .map(|device| {
                    device
                        .logical_address
                        .unwrap_or(LogicalAddress::UNREGISTERED)
                })
                .ok_or(HalError::GeneralError)
        })
    }

    fn add_logical_address(&self, handle: HalHandle, address: LogicalAddress) -> HalResult<()> {
        self.with_live_hal(handle, |hal| {
            check_sink_address(hal, address)?;
            if hal
                .emulated_device()
                .and_then(|device| device.logical_address)
                == Some(address)
            {
                debug!("Logical address {} already claimed", address);
                return Ok(());
            }
            if !hal.pool.reserve(address) {
                warn!("Logical address {} held by another device", address);
                return Err(HalError::LogicalAddressUnavailable);
            }
            let device = hal.emulated_device_mut().ok_or(HalError::GeneralError)?;
            device.logical_address = Some(address);
            info!("Logical address {} claimed by {}", address, device.name);
            Ok(())
        })
    }

    fn remove_logical_address(&self, handle: HalHandle, address: LogicalAddress) -> HalResult<()> {
        self.with_live_hal(handle, |hal| {
            check_sink_address(hal, address)?;
            let device = hal.emulated_device_mut().ok_or(HalError::GeneralError)?;
            let current = device
                .logical_address
                .unwrap_or(LogicalAddress::UNREGISTERED);
            if current.is_broadcast() {
                return Err(HalError::AlreadyRemoved);
            }
            device.logical_address = Some(LogicalAddress::Broadcast);
            info!("Logical address {} released by {}", current, device.name);
            hal.pool.release(current);
            Ok(())
        })
    }

    fn set_rx_callback(&self, handle: HalHandle, callback: Option<RxCallback>) -> HalResult<()> {
        self.with_live_hal(handle, |hal| {
            debug!("Rx callback {}", if callback.is_some() { "set" } else { "cleared" });
            hal.callbacks.rx = callback;
            Ok(())
        })
    }

    fn set_tx_callback(&self, handle: HalHandle, callback: Option<TxCallback>) -> HalResult<()> {
        self.with_live_hal(handle, |hal| {
            debug!("Tx callback {}", if callback.is_some() { "set" } else { "cleared" });
            hal.callbacks.tx = callback;
            Ok(())
        })
    }

    fn tx(&self, handle: HalHandle, frame: &[u8]) -> HalResult<TxResult> {
        self.with_live_hal(handle, |hal| {
            validate_frame(frame)?;
            if hal.sink_unclaimed() {
                warn!("Tx: sink has no logical address");
                return Err(HalError::SentFailed);
            }
            log_frame(frame);
            Ok(TxResult::SentButNotAcked)
        })
    }

    fn tx_async(&self, handle: HalHandle, frame: &[u8]) -> HalResult<()> {
        self.with_live_hal(handle, |hal| {
            validate_frame(frame)?;
            if hal.sink_unclaimed() {
                warn!("TxAsync: sink has no logical address");
                return Err(HalError::SentFailed);
            }
            if hal.callbacks.tx.is_none() {
                warn!("TxAsync: no Tx callback registered");
                return Err(HalError::SentFailed);
            }
            log_frame(frame);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::status::HalStatus;

    const SOURCE_PROFILE: &str = r#"
hdmicec:
  emulated_device: Player
  number_devices: 2
  ports:
    - id: 1
      type: out
      cec_supported: true
  device_map:
    0:
      name: Television
      type: TV
      number_children: 1
      children:
        0:
          name: Player
          type: PlaybackDevice
          port_id: 2
"#;

    #[test]
    fn test_open_requires_loaded_profile() {
        let component = VirtualComponent::new();
        assert_eq!(CecDriver::open(&component), Err(HalError::NotOpened));
        component.initialize().unwrap();
        assert_eq!(CecDriver::open(&component), Err(HalError::NotOpened));
    }

    #[test]
    fn test_second_open_leaves_state_alone() {
        let component = opened(TV_PROFILE);
        let handle = CecDriver::open(&component).unwrap();
        component.add_logical_address(handle, LogicalAddress::Tv).unwrap();

        assert_eq!(CecDriver::open(&component), Err(HalError::AlreadyOpen));
        assert_eq!(component.get_logical_address(handle), Ok(LogicalAddress::Tv));
        assert_eq!(component.get_physical_address(handle), Ok(PhysicalAddress::ROOT));

        CecDriver::close(&component, handle).unwrap();
        assert_eq!(CecDriver::close(&component, handle), Err(HalError::NotOpened));

        // A fresh instance starts unclaimed again, and the old handle is stale
        let reopened = CecDriver::open(&component).unwrap();
        assert_ne!(reopened, handle);
        assert_eq!(component.get_logical_address(handle), Err(HalError::InvalidHandle));
        assert_eq!(
            component.get_logical_address(reopened),
            Ok(LogicalAddress::Broadcast)
        );
    }

    #[test]
    fn test_tv_scenario_addresses() {
        let (component, handle, _rx) = ready(TV_PROFILE);

        assert_eq!(component.get_logical_address(handle), Ok(LogicalAddress::Broadcast));
        assert_eq!(component.get_physical_address(handle), Ok(PhysicalAddress(0x0000)));

        let snapshot = component.snapshot().unwrap();
        let player = &snapshot.children[0];
        assert!([4, 8, 11].contains(&player.logical_address.unwrap()));
        assert_eq!(player.physical_address, "1.0.0.0");

        component.add_logical_address(handle, LogicalAddress::Tv).unwrap();
        assert_eq!(component.get_logical_address(handle), Ok(LogicalAddress::Tv));
        component.remove_logical_address(handle, LogicalAddress::Tv).unwrap();
        assert_eq!(component.get_logical_address(handle), Ok(LogicalAddress::Broadcast));
    }

    #[test]
    fn test_remove_is_not_silent() {
        let (component, handle, _rx) = ready(TV_PROFILE);

        assert_eq!(
            component.remove_logical_address(handle, LogicalAddress::Tv),
            Err(HalError::AlreadyRemoved)
        );
        component.add_logical_address(handle, LogicalAddress::Tv).unwrap();
        component.add_logical_address(handle, LogicalAddress::Tv).unwrap();
        component.remove_logical_address(handle, LogicalAddress::Tv).unwrap();

        let result = component.remove_logical_address(handle, LogicalAddress::Tv);
        assert_eq!(HalStatus::from(&result), HalStatus::AlreadyRemoved);
        assert_eq!(component.get_logical_address(handle), Ok(LogicalAddress::Broadcast));
    }

    #[test]
    fn test_only_address_zero_on_a_sink() {
        let (component, handle, _rx) = ready(TV_PROFILE);
        assert_eq!(
            component.add_logical_address(handle, LogicalAddress::FreeUse),
            Err(HalError::InvalidArgument)
        );

        let (source, handle, _rx) = ready(SOURCE_PROFILE);
        assert_eq!(
            source.add_logical_address(handle, LogicalAddress::Tv),
            Err(HalError::InvalidArgument)
        );
        assert_eq!(
            source.get_logical_address(handle),
            Ok(LogicalAddress::PlaybackDevice1)
        );
        assert_eq!(source.get_physical_address(handle), Ok(PhysicalAddress(0x2000)));
    }

    #[test]
    fn test_tx_needs_claimed_sink() {
        let (component, handle, _rx) = ready(TV_PROFILE);
        let frame = [0x04, 0x36];

        assert_eq!(component.tx(handle, &frame), Err(HalError::SentFailed));
        component.add_logical_address(handle, LogicalAddress::Tv).unwrap();

        let result = component.tx(handle, &frame);
        assert_eq!(result, Ok(TxResult::SentButNotAcked));
        assert_eq!(HalStatus::from(&result), HalStatus::Success);

        assert_eq!(component.tx(handle, &[]), Err(HalError::InvalidArgument));
        assert_eq!(
            component.tx(handle, &[0u8; MAX_FRAME_SIZE + 1]),
            Err(HalError::InvalidArgument)
        );
    }

    #[test]
    fn test_tx_async_requires_callback() {
        let (component, handle, _rx) = ready(SOURCE_PROFILE);
        let frame = [0x40, 0x04];

        assert_eq!(component.tx_async(handle, &frame), Err(HalError::SentFailed));

        let callback: TxCallback = Arc::new(|_handle: HalHandle, _result: TxResult| {});
        component.set_tx_callback(handle, Some(callback)).unwrap();
        assert_eq!(component.tx_async(handle, &frame), Ok(()));

        component.set_tx_callback(handle, None).unwrap();
        assert_eq!(component.tx_async(handle, &frame), Err(HalError::SentFailed));
    }

    #[test]
    fn test_null_handle_is_invalid() {
        let (component, _handle, _rx) = ready(TV_PROFILE);
        let null = HalHandle::from_raw(0);

        assert_eq!(component.get_physical_address(null), Err(HalError::InvalidHandle));
        assert_eq!(component.tx(null, &[]), Err(HalError::InvalidHandle));
        assert_eq!(component.set_rx_callback(null, None), Err(HalError::InvalidHandle));
        let result = CecDriver::close(&component, null);
        assert_eq!(HalStatus::from(&result).code(), 11);
    }

    #[test]
    fn test_validation_order_without_hal() {
        let component = opened(TV_PROFILE);
        let null = HalHandle::from_raw(0);
        assert_eq!(component.get_logical_address(null), Err(HalError::NotOpened));
        assert_eq!(component.tx(null, &[]), Err(HalError::NotOpened));
    }
}
