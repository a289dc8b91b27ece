//! Device topology for the HDMI-CEC emulator.
//!
//! This crate models the HDMI network as an n-ary tree of devices loaded from
//! a profile, and hands out physical and logical addresses across it. The tree
//! is an arena addressed by generation-checked ids; removing a device purges
//! its whole subtree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod pool;
pub mod tree;

pub use device::{Device, MAX_OSD_NAME_LENGTH};
pub use error::TopologyError;
pub use pool::LogicalAddressPool;
pub use tree::{DeviceId, DeviceSnapshot, DeviceTree};
