//! Error types for the bus engine

use hart_protocol::EncodeError;
use hart_sim::DeviceError;
use thiserror::Error;

/// Errors caused by caller input to the bus, registry or master
///
/// Protocol-level conditions (no device, bad checksum, rejected command)
/// are reported as a transaction outcome, not as an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BusError {
    /// Polling address outside 0..=63
    #[error("invalid polling address: {0} (max 63)")]
    InvalidAddress(u8),

    /// Another device already occupies the polling address
    #[error("polling address {0} is already in use")]
    DuplicateAddress(u8),

    /// Another device already answers to the same long address
    #[error("unique identifier {0} is already registered")]
    DuplicateUniqueId(String),

    /// Master setting outside its valid range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Arguments do not fit the command
    #[error("command {command} does not take {args} arguments")]
    ArgumentMismatch {
        /// Command number
        command: u8,
        /// Kind of arguments supplied
        args: &'static str,
    },

    /// Long frame requested for a device whose unique id is not known yet
    #[error("unique identifier of device at polling address {0} is unknown")]
    UnknownDevice(u8),

    /// Device configuration rejected
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Frame could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The bus actor is no longer running
    #[error("bus actor has shut down")]
    ActorClosed,
}
