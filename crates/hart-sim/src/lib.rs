//! HART Device Simulation Library
//!
//! This crate provides simulated HART field devices for exercising
//! master-side tooling without physical instruments. It includes:
//!
//! - **Device**: answers the universal command set for five sensor kinds
//! - **ProcessModel**: generates readings around a nominal value when ticked
//! - **Roster**: the default fifteen-device plant
//!
//! # Example
//!
//! ```rust
//! use hart_sim::{default_roster, CommandStatus, Device};
//!
//! let config = default_roster().remove(0);
//! let mut device = Device::from_config(config).unwrap();
//!
//! let result = device.handle_command(1, &[]);
//! assert_eq!(result.status, CommandStatus::Success);
//! assert_eq!(result.data.len(), 5);
//! ```

pub mod device;
pub mod roster;
pub mod variables;

pub use device::{
    CommandResult, CommandStatus, Device, DeviceConfig, DeviceError, DeviceKind, UniqueId,
};
pub use roster::default_roster;
pub use variables::{ProcessModel, Variable, VariableSlot, Variables};
