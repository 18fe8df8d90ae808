//! HART Bus Engine
//!
//! This crate ties simulated devices and a master together on one
//! multi-drop bus.
//!
//! # Architecture
//!
//! A request flows master → bus → registry → device and back:
//!
//! - **Master**: builds request frames from typed arguments and the
//!   current frame settings (preambles, short or long addressing)
//! - **Bus**: runs one transaction at a time, resolving the address and
//!   wrapping the device's reply in a response frame
//! - **Registry**: owns the devices and resolves short and long addresses
//! - **Simulator**: the host-facing session with `scan`, `send` and `tick`
//!
//! Protocol conditions (no device, checksum failure, unknown command,
//! rejected data) are reported through [`Outcome`]; [`BusError`] is
//! reserved for invalid caller input.
//!
//! # Example
//!
//! ```rust
//! use hart_bus::{CommandArgs, Outcome, Simulator, SimulatorConfig};
//!
//! let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
//! assert_eq!(sim.scan().len(), 15);
//!
//! let tx = sim.send(0, 1, CommandArgs::None).unwrap();
//! assert_eq!(tx.outcome, Outcome::Ok);
//! assert_eq!(tx.response_data().len(), 5);
//! ```

pub mod actor;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod master;
pub mod registry;
pub mod session;

pub use actor::{run_bus_actor, spawn_bus_actor, BusActorCommand, BusHandle};
pub use config::SimulatorConfig;
pub use engine::{Bus, Outcome, Transaction};
pub use error::BusError;
pub use events::BusEvent;
pub use master::{CommandArgs, FrameFormat, Master, MasterSettings};
pub use registry::Registry;
pub use session::{ScanEntry, Simulator};
