//! Bus Actor
//!
//! Gives several async callers exclusive, serialized access to one
//! [`Simulator`]. The actor task owns the simulator and handles one
//! command at a time; callers talk to it through a cloneable
//! [`BusHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hart_bus::{spawn_bus_actor, CommandArgs, Simulator, SimulatorConfig};
//!
//! # async fn demo() -> Result<(), hart_bus::BusError> {
//! let sim = Simulator::new(SimulatorConfig::default())?;
//! let (handle, mut events, _task) = spawn_bus_actor(sim, 256);
//!
//! let entries = handle.scan().await?;
//! let tx = handle.send(entries[0].address, 1, CommandArgs::None).await??;
//! println!("{:?}", tx.outcome);
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{:?}", event);
//! }
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::Transaction;
use crate::error::BusError;
use crate::events::BusEvent;
use crate::master::CommandArgs;
use crate::session::{ScanEntry, Simulator};

/// Commands sent to the bus actor
#[derive(Debug)]
pub enum BusActorCommand {
    /// Send a command to a polling address
    Send {
        /// Target polling address
        address: u8,
        /// Command number
        command: u8,
        /// Request arguments
        args: CommandArgs,
        /// Channel to send back the transaction
        response: oneshot::Sender<Result<Transaction, BusError>>,
    },

    /// Send raw request bytes
    SendRaw {
        /// Request bytes
        bytes: Vec<u8>,
        /// Channel to send back the transaction
        response: oneshot::Sender<Transaction>,
    },

    /// Identify every device on the bus
    Scan {
        /// Channel to send back the scan result
        response: oneshot::Sender<Vec<ScanEntry>>,
    },

    /// Advance the simulated process
    Tick {
        /// Time to advance
        elapsed: Duration,
    },

    /// Shutdown the actor
    Shutdown,
}

fn emit(event_tx: &mpsc::Sender<BusEvent>, event: BusEvent) {
    if let Err(e) = event_tx.try_send(event) {
        debug!("Bus event not delivered: {}", e);
    }
}

/// Run the bus actor until shutdown or until every sender is dropped
pub async fn run_bus_actor(
    mut sim: Simulator,
    mut cmd_rx: mpsc::Receiver<BusActorCommand>,
    event_tx: mpsc::Sender<BusEvent>,
) {
    info!("Bus actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            BusActorCommand::Send {
                address,
                command,
                args,
                response,
            } => {
                let result = sim.send(address, command, args);
                if let Ok(transaction) = &result {
                    emit(
                        &event_tx,
                        BusEvent::Traffic {
                            transaction: transaction.clone(),
                        },
                    );
                }
                let _ = response.send(result);
            }

            BusActorCommand::SendRaw { bytes, response } => {
                let transaction = sim.send_raw(&bytes);
                emit(
                    &event_tx,
                    BusEvent::Traffic {
                        transaction: transaction.clone(),
                    },
                );
                let _ = response.send(transaction);
            }

            BusActorCommand::Scan { response } => {
                let entries = sim.scan();
                emit(
                    &event_tx,
                    BusEvent::ScanCompleted {
                        entries: entries.clone(),
                    },
                );
                let _ = response.send(entries);
            }

            BusActorCommand::Tick { elapsed } => {
                sim.tick(elapsed);
                emit(&event_tx, BusEvent::Ticked { elapsed });
            }

            BusActorCommand::Shutdown => {
                info!("Bus actor shutting down");
                break;
            }
        }
    }
}

/// Cloneable async front for the bus actor
#[derive(Debug, Clone)]
pub struct BusHandle {
    cmd_tx: mpsc::Sender<BusActorCommand>,
}

/// Spawn the bus actor on the current tokio runtime
///
/// Returns the handle, the event stream and the actor task.
pub fn spawn_bus_actor(
    sim: Simulator,
    buffer: usize,
) -> (BusHandle, mpsc::Receiver<BusEvent>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer);
    let (event_tx, event_rx) = mpsc::channel(buffer);
    let task = tokio::spawn(run_bus_actor(sim, cmd_rx, event_tx));
    (BusHandle::new(cmd_tx), event_rx, task)
}

impl BusHandle {
    /// Wrap the command channel of a running actor
    pub fn new(cmd_tx: mpsc::Sender<BusActorCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Send a command to a polling address
    pub async fn send(
        &self,
        address: u8,
        command: u8,
        args: CommandArgs,
    ) -> Result<Result<Transaction, BusError>, BusError> {
        let (response, rx) = oneshot::channel();
        self.request(BusActorCommand::Send {
            address,
            command,
            args,
            response,
        })
        .await?;
        rx.await.map_err(|_| BusError::ActorClosed)
    }

    /// Send raw request bytes
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<Transaction, BusError> {
        let (response, rx) = oneshot::channel();
        self.request(BusActorCommand::SendRaw { bytes, response })
            .await?;
        rx.await.map_err(|_| BusError::ActorClosed)
    }

    /// Identify every device on the bus
    pub async fn scan(&self) -> Result<Vec<ScanEntry>, BusError> {
        let (response, rx) = oneshot::channel();
        self.request(BusActorCommand::Scan { response }).await?;
        rx.await.map_err(|_| BusError::ActorClosed)
    }

    /// Advance the simulated process
    pub async fn tick(&self, elapsed: Duration) -> Result<(), BusError> {
        self.request(BusActorCommand::Tick { elapsed }).await
    }

    /// Ask the actor to stop; a no-op if it already has
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(BusActorCommand::Shutdown).await;
    }

    async fn request(&self, cmd: BusActorCommand) -> Result<(), BusError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| BusError::ActorClosed)
    }
}
