//! The virtual HDMI-CEC component.
//!
//! `VirtualComponent` owns the loaded profile and at most one open HAL
//! instance. All mutable HAL state sits behind a single mutex shared by the
//! caller thread and the message worker. Callbacks are cloned out of the lock
//! before they run, so a callback may call back into the component.

use crate::instance::{HalCore, HalState};
use crate::message::{Message, MessageKind};
use crate::profile::{HalProfile, HalProfileError};
use crate::queue::{MessageQueueStats, QueueError};
use crate::registry::{HalHandle, HandleRegistry};
use bytes::Bytes;
use cec_profile::{Profile, ProfileError};
use cec_topology::DeviceSnapshot;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

// Include implementation
mod hal;

/// Component lifecycle errors
#[derive(Error, Debug)]
pub enum VcError {
    /// `initialize` was not called
    #[error("component not initialized")]
    NotInitialized,

    /// `initialize` was called twice
    #[error("component already initialized")]
    AlreadyInitialized,

    /// No profile is loaded
    #[error("component not opened")]
    NotOpened,

    /// Profile could not be read or validated
    #[error("profile error: {0}")]
    Profile(#[from] HalProfileError),
}

/// Control-plane delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// No HAL instance is ready to take messages
    #[error("HAL not ready")]
    NotReady,

    /// Topic is not one of the control-plane topics
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Document names no known message kind
    #[error("message kind not recognised")]
    UnknownKind,

    /// Document could not be parsed
    #[error("failed to parse message: {0}")]
    Parse(#[from] ProfileError),

    /// Queue refused the message
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug)]
struct VcState {
    initialized: bool,
    profile: Option<HalProfile>,
    registry: HandleRegistry,
    hal: Option<HalCore>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<VcState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, VcState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker entry point for one queued message
    fn dispatch(inner: &Weak<Inner>, message: Message) {
        let Message::Control { kind, payload } = message else {
            return;
        };
        let Some(inner) = inner.upgrade() else {
            warn!("Component dropped, discarding {} message", kind);
            return;
        };

        let (handle, rx, frames) = {
            let mut state = inner.lock();
            let Some(hal) = state.hal.as_mut() else {
                warn!("No HAL instance, discarding {} message", kind);
                return;
            };
            let frames = hal.handle_message(kind, &payload);
            (hal.handle, hal.callbacks.rx.clone(), frames)
        };

        if frames.is_empty() {
            return;
        }
        match rx {
            Some(rx) => {
                for frame in &frames {
                    rx(handle, frame);
                }
            }
            None => debug!("No Rx callback registered, dropping {} frame(s)", frames.len()),
        }
    }
}

/// Virtual HDMI-CEC component hosting one HAL instance
#[derive(Debug)]
pub struct VirtualComponent {
    inner: Arc<Inner>,
}

impl VirtualComponent {
    /// Create an uninitialized component
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(VcState {
                    initialized: false,
                    profile: None,
                    registry: HandleRegistry::new(1),
                    hal: None,
                }),
            }),
        }
    }

    /// Initialize the component
    pub fn initialize(&self) -> Result<(), VcError> {
        let mut state = self.inner.lock();
        if state.initialized {
            return Err(VcError::AlreadyInitialized);
        }
        state.initialized = true;
        info!("Virtual HDMI-CEC component initialized");
        Ok(())
    }

    /// Whether `initialize` has been called
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Load and validate the profile at `path`
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<(), VcError> {
        if !self.is_initialized() {
            return Err(VcError::NotInitialized);
        }
        let profile = Profile::from_path(path.as_ref()).map_err(HalProfileError::from)?;
        self.open_profile(profile)
    }

    /// Validate and keep an already parsed profile
    pub fn open_profile(&self, profile: Profile) -> Result<(), VcError> {
        let mut state = self.inner.lock();
        if !state.initialized {
            return Err(VcError::NotInitialized);
        }
        if state.profile.is_some() {
            debug!("Component already opened, keeping the loaded profile");
            return Ok(());
        }

        let hal_profile = HalProfile::load(&profile)?;
        info!(
            "Loaded profile {}: emulating {} with {} port(s) and {} device(s)",
            profile
                .source()
                .map_or_else(|| "<memory>".to_string(), |path| path.display().to_string()),
            hal_profile.emulated_device,
            hal_profile.ports.len(),
            hal_profile.tree.device_count()
        );
        state.profile = Some(hal_profile);
        Ok(())
    }

    /// Close any open HAL and drop the profile
    pub fn close(&self) -> Result<(), VcError> {
        let handle = {
            let state = self.inner.lock();
            if !state.initialized {
                return Err(VcError::NotInitialized);
            }
            if state.profile.is_none() {
                return Err(VcError::NotOpened);
            }
            state
                .hal
                .as_ref()
                .filter(|hal| hal.state == HalState::Ready)
                .map(|hal| hal.handle)
        };

        if let Some(handle) = handle {
            if let Err(e) = crate::CecDriver::close(self, handle) {
                warn!("Failed to close HAL {}: {}", handle, e);
            }
        }

        self.inner.lock().profile = None;
        info!("Virtual HDMI-CEC component closed");
        Ok(())
    }

    /// Close everything and return to the uninitialized state
    pub fn deinitialize(&self) -> Result<(), VcError> {
        if !self.is_initialized() {
            return Err(VcError::NotInitialized);
        }
        match self.close() {
            Ok(()) | Err(VcError::NotOpened) => {}
            Err(e) => return Err(e),
        }
        self.inner.lock().initialized = false;
        info!("Virtual HDMI-CEC component deinitialized");
        Ok(())
    }

    /// Deliver a control-plane message published on `topic`
    pub fn deliver(&self, topic: &str, payload: impl Into<Bytes>) -> Result<(), DeliveryError> {
        let kind = MessageKind::from_topic(topic)
            .ok_or_else(|| DeliveryError::UnknownTopic(topic.to_string()))?;
        self.enqueue(Message::control(kind, payload))
    }

    /// Deliver a message document, inferring its topic from its keys
    pub fn deliver_document(&self, payload: impl Into<Bytes>) -> Result<(), DeliveryError> {
        let payload = payload.into();
        let document = Profile::from_slice(&payload)?;
        let kind = MessageKind::detect(&document).ok_or(DeliveryError::UnknownKind)?;
        self.enqueue(Message::control(kind, payload))
    }

    fn enqueue(&self, message: Message) -> Result<(), DeliveryError> {
        let state = self.inner.lock();
        let queue = state
            .hal
            .as_ref()
            .filter(|hal| hal.state == HalState::Ready)
            .and_then(|hal| hal.queue.as_ref())
            .ok_or(DeliveryError::NotReady)?;
        queue.enqueue(message)?;
        Ok(())
    }

    /// Lifecycle state of the HAL
    pub fn hal_state(&self) -> HalState {
        self.inner
            .lock()
            .hal
            .as_ref()
            .map_or(HalState::Closed, |hal| hal.state)
    }

    /// Statistics of the message queue of the open HAL
    pub fn queue_stats(&self) -> Option<MessageQueueStats> {
        let state = self.inner.lock();
        state
            .hal
            .as_ref()
            .and_then(|hal| hal.queue.as_ref())
            .map(|queue| queue.get_stats())
    }

    /// Snapshot of the device tree of the open HAL
    pub fn snapshot(&self) -> Option<DeviceSnapshot> {
        self.inner.lock().hal.as_ref().and_then(|hal| hal.tree.snapshot())
    }
}

impl Default for VirtualComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VirtualComponent {
    fn drop(&mut self) {
        if self.is_initialized() {
            if let Err(e) = self.deinitialize() {
                warn!("Failed to deinitialize component on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::instance::RxCallback;
    use crate::CecDriver;
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    pub(crate) const TV_PROFILE: &str = r#"
hdmicec:
  emulated_device: TV
  number_devices: 2
  number_ports: 3
  ports:
    - id: 1
      type: in
      cec_supported: true
      arc_supported: true
    - id: 2
      type: in
      cec_supported: true
    - id: 3
      type: in
      cec_supported: false
  device_map:
    0:
      name: TV
      type: TV
      vendor: LG
      version: 5
      pwr_status: on
      number_children: 1
      children:
        0:
          name: Playback1
          type: PlaybackDevice
          vendor: SONY
          version: 5
          pwr_status: standby
          active_source: false
          port_id: 1
"#;

    pub(crate) fn profile_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    pub(crate) fn opened(text: &str) -> VirtualComponent {
        let component = VirtualComponent::new();
        component.initialize().unwrap();
        let file = profile_file(text);
        component.open(file.path()).unwrap();
        component
    }

    /// Rx callback forwarding every frame into a channel
    pub(crate) fn rx_channel() -> (RxCallback, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: RxCallback = Arc::new(move |_handle: HalHandle, frame: &[u8]| {
            let _ = tx.lock().unwrap().send(frame.to_vec());
        });
        (callback, rx)
    }

    pub(crate) fn recv(rx: &mpsc::Receiver<Vec<u8>>) -> Vec<u8> {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    pub(crate) fn ready(text: &str) -> (VirtualComponent, HalHandle, mpsc::Receiver<Vec<u8>>) {
        let component = opened(text);
        let handle = component.open_hal().unwrap();
        let (callback, rx) = rx_channel();
        component.set_rx_callback(handle, Some(callback)).unwrap();
        (component, handle, rx)
    }

    impl VirtualComponent {
        pub(crate) fn open_hal(&self) -> crate::HalResult<HalHandle> {
            CecDriver::open(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::CecDriver;
    use std::time::Duration;

    fn command(opcode: &str) -> String {
        format!(
            "hdmicec:\n  command: {}\n  initiator: Playback1\n  destination: broadcast\n",
            opcode
        )
    }

    #[test]
    fn test_lifecycle_errors() {
        let component = VirtualComponent::new();
        let file = profile_file(TV_PROFILE);

        assert!(matches!(component.open(file.path()), Err(VcError::NotInitialized)));
        assert!(matches!(component.close(), Err(VcError::NotInitialized)));

        component.initialize().unwrap();
        assert!(matches!(component.initialize(), Err(VcError::AlreadyInitialized)));
        assert!(matches!(component.close(), Err(VcError::NotOpened)));

        component.open(file.path()).unwrap();
        // A second open keeps the loaded profile
        component.open(file.path()).unwrap();
        component.close().unwrap();
        component.deinitialize().unwrap();
        assert!(!component.is_initialized());
    }

    #[test]
    fn test_invalid_profiles() {
        let component = VirtualComponent::new();
        component.initialize().unwrap();

        let missing = component.open("/nonexistent/cec/profile.yaml");
        assert!(matches!(
            missing,
            Err(VcError::Profile(HalProfileError::Profile(ProfileError::Io { .. })))
        ));

        let no_devices = profile_file(&TV_PROFILE.replace("number_devices: 2", "number_devices: 0"));
        assert!(matches!(
            component.open(no_devices.path()),
            Err(VcError::Profile(HalProfileError::NoDevices))
        ));

        let bad_count = profile_file(&TV_PROFILE.replace("number_children: 1", "number_children: 2"));
        assert!(matches!(
            component.open(bad_count.path()),
            Err(VcError::Profile(HalProfileError::Topology(_)))
        ));
    }

    #[test]
    fn test_commands_reach_rx_in_order() {
        let (component, _handle, rx) = ready(TV_PROFILE);

        for opcode in ["ActiveSource", "ReportPhysicalAddress", "DeviceVendorID"] {
            component
                .deliver(crate::TOPIC_COMMAND, command(opcode))
                .unwrap();
        }

        let opcodes: Vec<u8> = (0..3).map(|_| recv(&rx)[1]).collect();
        assert_eq!(opcodes, vec![0x82, 0x84, 0x87]);
    }

    #[test]
    fn test_active_source_frame() {
        let (component, _handle, rx) = ready(TV_PROFILE);
        component
            .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
            .unwrap();

        assert_eq!(recv(&rx), vec![0x4F, 0x82, 0x10, 0x00]);
    }

    #[test]
    fn test_add_device_announcement() {
        let (component, _handle, rx) = ready(TV_PROFILE);
        component
            .deliver(
                crate::TOPIC_STATE,
                r#"{"state": "AddDevice", "parameters": {"parent": "TV", "name": "Recorder", "type": "RecordingDevice", "port_id": 2}}"#,
            )
            .unwrap();

        assert_eq!(recv(&rx), vec![0x1F, 0x84, 0x20, 0x00, 0x01]);
        let snapshot = component.snapshot().unwrap();
        assert_eq!(snapshot.children.len(), 2);
        assert_eq!(snapshot.children[1].name, "Recorder");
    }

    #[test]
    fn test_deliver_document_detects_kind() {
        let (component, _handle, rx) = ready(TV_PROFILE);
        component.deliver_document(command("InactiveSource")).unwrap();
        assert_eq!(recv(&rx), vec![0x4F, 0x9D, 0x10, 0x00]);

        assert!(matches!(
            component.deliver_document("other: value"),
            Err(DeliveryError::UnknownKind)
        ));
        assert!(matches!(
            component.deliver_document("[broken"),
            Err(DeliveryError::Parse(_))
        ));
    }

    #[test]
    fn test_delivery_errors() {
        let component = opened(TV_PROFILE);
        assert!(matches!(
            component.deliver(crate::TOPIC_COMMAND, command("ActiveSource")),
            Err(DeliveryError::NotReady)
        ));

        let _handle = component.open_hal().unwrap();
        assert!(matches!(
            component.deliver("hdmicec/unknown", "{}"),
            Err(DeliveryError::UnknownTopic(topic)) if topic == "hdmicec/unknown"
        ));
        component.deliver(crate::TOPIC_EVENT, "event: HotPlug").unwrap();
        component.deliver(crate::TOPIC_CONFIG, "config: none").unwrap();
    }

    #[test]
    fn test_close_drains_pending_messages() {
        let (component, handle, rx) = ready(TV_PROFILE);
        for _ in 0..5 {
            component
                .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
                .unwrap();
        }
        component.close_hal(handle).unwrap();

        assert_eq!(rx.try_iter().count(), 5);
        assert_eq!(component.hal_state(), HalState::Closed);
        assert_eq!(component.queue_stats(), None);
    }

    #[test]
    fn test_close_from_rx_callback() {
        let component = Arc::new(opened(TV_PROFILE));
        let handle = component.open_hal().unwrap();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let done_tx = Mutex::new(done_tx);

        let weak = Arc::downgrade(&component);
        let callback: crate::RxCallback = Arc::new(move |handle: HalHandle, _frame: &[u8]| {
            if let Some(component) = weak.upgrade() {
                let result = component.close_hal(handle);
                let _ = done_tx.lock().unwrap().send(result);
            }
        });
        component.set_rx_callback(handle, Some(callback)).unwrap();
        component
            .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
            .unwrap();

        let result = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok(()));
        assert_eq!(component.hal_state(), HalState::Closed);
    }

    #[test]
    fn test_drop_closes_open_hal() {
        let (component, handle, _rx) = ready(TV_PROFILE);
        component
            .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
            .unwrap();
        assert_ne!(handle.as_raw(), 0);
        drop(component);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_inside_runtime() {
        let (component, handle, rx) = ready(TV_PROFILE);
        for _ in 0..3 {
            component
                .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
                .unwrap();
        }
        CecDriver::close(&component, handle).unwrap();

        assert_eq!(rx.try_iter().count(), 3);
        assert_eq!(component.hal_state(), HalState::Closed);

        // Teardown through deinitialize and drop runs on the runtime too
        let (component, _handle, _rx) = ready(TV_PROFILE);
        component
            .deliver(crate::TOPIC_COMMAND, command("ActiveSource"))
            .unwrap();
        component.deinitialize().unwrap();
        drop(component);
    }

    impl VirtualComponent {
        fn close_hal(&self, handle: HalHandle) -> crate::HalResult<()> {
            CecDriver::close(self, handle)
        }
    }
}
