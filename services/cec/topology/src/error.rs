//! Topology error types.

use cec_profile::ProfileError;
use thiserror::Error;

/// Device tree errors
#[derive(Error, Debug)]
pub enum TopologyError {
    /// Profile could not be read
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// `number_children` disagrees with the listed children
    #[error("device {name} declares {declared} children but lists {found}")]
    ChildCountMismatch {
        /// Device name
        name: String,
        /// Declared child count
        declared: u32,
        /// Listed child count
        found: usize,
    },

    /// Port id does not fit in a physical address nibble
    #[error("device {name} has invalid port id {port}")]
    InvalidPort {
        /// Device name
        name: String,
        /// Declared port id
        port: u32,
    },

    /// A device with this name already exists
    #[error("duplicate device name: {0}")]
    DuplicateName(String),

    /// No device with this name
    #[error("device not found: {0}")]
    NotFound(String),

    /// Device id does not name a live device
    #[error("stale device id")]
    StaleId,

    /// The root device cannot be removed
    #[error("cannot remove the root device")]
    RootRemoval,
}
