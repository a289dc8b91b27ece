//! Virtual HDMI-CEC HAL.
//!
//! `VirtualComponent` loads a device profile and hosts one HAL instance that
//! behaves like a CEC driver: callers claim logical addresses, transmit
//! frames and receive frames through callbacks. The frames a driver receives
//! come from control-plane messages (commands and topology changes)
//! delivered by topic and handled in order on a dedicated worker thread.
//!
//! ## Example
//!
//! ```no_run
//! use cec_hal::{CecDriver, HalHandle, RxCallback, VirtualComponent, TOPIC_COMMAND};
//! use std::sync::Arc;
//!
//! let component = VirtualComponent::new();
//! component.initialize()?;
//! component.open("profiles/tv.yaml")?;
//!
//! let handle = CecDriver::open(&component)?;
//! let on_rx: RxCallback = Arc::new(|_handle: HalHandle, frame: &[u8]| {
//!     println!("rx {:02X?}", frame);
//! });
//! component.set_rx_callback(handle, Some(on_rx))?;
//! component.deliver(
//!     TOPIC_COMMAND,
//!     "command: ActiveSource\ninitiator: Playback1\ndestination: broadcast",
//! )?;
//! CecDriver::close(&component, handle)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod component;
pub mod control;
pub mod driver;
pub mod instance;
pub mod message;
pub mod profile;
pub mod queue;
pub mod registry;
pub mod status;

// Re-export main types
pub use component::{DeliveryError, VcError, VirtualComponent};
pub use driver::{CecDriver, HalResult};
pub use instance::{HalState, RxCallback, TxCallback};
pub use message::{
    Message, MessageKind, MESSAGE_PREFIX, TOPIC_COMMAND, TOPIC_CONFIG, TOPIC_EVENT, TOPIC_STATE,
};
pub use profile::{HalProfile, HalProfileError, PortCapabilities, PortInfo, PortType};
pub use queue::{MessageQueue, MessageQueueStats, QueueError, MAX_QUEUE_SIZE};
pub use registry::{HalHandle, HandleRegistry};
pub use status::{HalError, HalStatus, TxResult};
