//! Events emitted by the bus actor
//!
//! Observers such as a traffic monitor receive every transaction and
//! scan through a single channel, in the order the actor processed them.

use std::time::Duration;

use crate::engine::Transaction;
use crate::session::ScanEntry;

/// Bus activity
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A request went over the bus
    Traffic {
        /// The request and its response
        transaction: Transaction,
    },

    /// A scan completed
    ScanCompleted {
        /// Devices that answered
        entries: Vec<ScanEntry>,
    },

    /// The simulated process advanced
    Ticked {
        /// Time advanced
        elapsed: Duration,
    },
}
