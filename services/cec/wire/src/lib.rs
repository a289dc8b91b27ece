//! CEC frame codec, opcode table and address types for the HDMI-CEC emulator.
//!
//! This crate provides the low-level protocol pieces of the virtual CEC bus:
//! logical and physical addressing, the value tables carried in device
//! profiles (device type, power status, CEC version, vendor), the opcode
//! table and the `Command` frame builder/parser.
//!
//! ## Features
//!
//! - **Typed addresses**: 4-bit logical addresses and 4-nibble physical addresses
//! - **Exhaustive tables**: opcode and value lookups are `match`-based, misses are `None`
//! - **Size probing**: `Command::raw_bytes` reports the wire size without writing
//! - **Zero-Copy output**: frames encode into `BytesMut`/`Bytes`
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | header (1B)          | initiator << 4 | destination|
//! +----------------------+----------------------------+
//! | opcode (opt, 1B)     | present when opcode is set |
//! +----------------------+----------------------------+
//! | parameters           | variable (0..64B)          |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod command;
pub mod error;
pub mod opcode;
pub mod types;

// Re-export main types
pub use address::{LogicalAddress, PhysicalAddress, LOGICAL_ADDRESS_COUNT};
pub use command::{Command, MAX_FRAME_SIZE, MAX_PARAMETER_SIZE};
pub use error::WireError;
pub use opcode::Opcode;
pub use types::{CecVersion, DeviceType, PowerStatus, VendorId};
