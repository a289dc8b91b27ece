//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Frame has no header byte
    #[error("empty frame")]
    Empty,

    /// Logical address outside 0..=15
    #[error("invalid logical address: {0}")]
    Address(u8),

    /// Opcode byte not in the opcode table
    #[error("unknown opcode 0x{0:02X}")]
    Opcode(u8),

    /// Parameter payload larger than the frame allows
    #[error("size limit exceeded: {0}")]
    Size(usize),
}
