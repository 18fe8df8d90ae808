//! Bus transaction engine
//!
//! Carries one request at a time from the master to the addressed slave
//! and builds the slave's response frame. Every protocol condition ends
//! up in the returned [`Transaction`]; nothing here fails.

use hart_protocol::frame::{MAX_POLLING_ADDRESS, MAX_PREAMBLES, MIN_PREAMBLES};
use hart_protocol::status::INVALID_SELECTION;
use hart_protocol::{Address, DecodeError, Frame, FrameKind, ResponseStatus, UniversalCommand};
use hart_sim::{CommandResult, CommandStatus, Device, UniqueId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BusError;
use crate::registry::Registry;

/// How a transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The device executed the command
    Ok,
    /// No device answers to the request address
    NoDevice,
    /// Request bytes failed the checksum
    ChecksumError,
    /// Request bytes could not be parsed, or the response could not be built
    Malformed,
    /// The device does not implement the command
    CommandNotImplemented,
    /// The device rejected the request data
    InvalidData,
}

impl Outcome {
    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoDevice => "No device",
            Self::ChecksumError => "Checksum error",
            Self::Malformed => "Malformed",
            Self::CommandNotImplemented => "Command not implemented",
            Self::InvalidData => "Invalid data",
        }
    }
}

/// One request and its response, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Decoded request; absent only when raw request bytes failed to decode
    pub request: Option<Frame>,
    /// Request as sent on the wire
    pub request_bytes: Vec<u8>,
    /// Response frame
    pub response: Option<Frame>,
    /// Response as sent on the wire
    pub response_bytes: Vec<u8>,
    /// How the transaction ended
    pub outcome: Outcome,
}

impl Transaction {
    fn unanswered(request: Option<Frame>, request_bytes: Vec<u8>, outcome: Outcome) -> Self {
        Self {
            request,
            request_bytes,
            response: None,
            response_bytes: Vec::new(),
            outcome,
        }
    }

    /// Status bytes of the response
    pub fn status(&self) -> Option<ResponseStatus> {
        self.response.as_ref().and_then(Frame::status)
    }

    /// Response data with the status bytes stripped
    pub fn response_data(&self) -> &[u8] {
        self.response.as_ref().map(Frame::data).unwrap_or(&[])
    }
}

/// The shared multi-drop bus
///
/// Devices change only through transactions, so address and identity
/// conflicts are always checked. Outside this crate the registry is
/// read-only:
///
/// ```compile_fail
/// let mut bus = hart_bus::Bus::new();
/// bus.registry_mut();
/// ```
#[derive(Debug, Default)]
pub struct Bus {
    registry: Registry,
}

impl Bus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus around an existing registry
    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// Attach a device at `address`
    pub fn register(&mut self, address: u8, device: Device) -> Result<(), BusError> {
        self.registry.register(address, device)
    }

    /// The devices on the bus
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the devices on the bus
    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Run a decoded request through the bus
    pub fn transact(&mut self, request: &Frame) -> Transaction {
        let request_bytes = match request.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Request to {} cannot be encoded: {}", request.address, e);
                return Transaction::unanswered(Some(request.clone()), Vec::new(), Outcome::Malformed);
            }
        };
        self.dispatch(request.clone(), request_bytes)
    }

    /// Decode raw request bytes and run them through the bus
    pub fn transact_bytes(&mut self, bytes: &[u8]) -> Transaction {
        match Frame::decode(bytes) {
            Ok(request) => self.dispatch(request, bytes.to_vec()),
            Err(e) => {
                warn!("Dropping request bytes: {}", e);
                let outcome = match e {
                    DecodeError::ChecksumMismatch { .. } => Outcome::ChecksumError,
                    _ => Outcome::Malformed,
                };
                Transaction::unanswered(None, bytes.to_vec(), outcome)
            }
        }
    }

    fn dispatch(&mut self, request: Frame, request_bytes: Vec<u8>) -> Transaction {
        if request.kind != FrameKind::Request {
            warn!("Ignoring {:?} frame sent as a request", request.kind);
            return Transaction::unanswered(Some(request), request_bytes, Outcome::Malformed);
        }

        let conflict = self.identity_conflict(&request);
        let Some(device) = self.registry.resolve_mut(&request.address) else {
            debug!("No device at {} for command {}", request.address, request.command);
            return Transaction::unanswered(Some(request), request_bytes, Outcome::NoDevice);
        };

        let result = if conflict {
            warn!(
                "Device {} cannot take an address held by another device",
                request.address
            );
            CommandResult::rejected(INVALID_SELECTION)
        } else {
            device.handle_command(request.command, &request.payload)
        };

        let outcome = match result.status {
            CommandStatus::Success => Outcome::Ok,
            CommandStatus::CommandNotImplemented => Outcome::CommandNotImplemented,
            CommandStatus::InvalidData(_) => Outcome::InvalidData,
        };

        let status = ResponseStatus::new(result.status.response_code(), device.device_status());
        let address = match request.address {
            Address::Short(_) => Address::short(device.polling_address()),
            Address::Long(_) => Address::Long(device.unique_id().long_address()),
        };
        let response = Frame::response(address, request.command, status, &result.data)
            .with_preambles(request.preamble_count.clamp(MIN_PREAMBLES, MAX_PREAMBLES))
            .with_primary_master(request.primary_master);

        match response.encode() {
            Ok(response_bytes) => {
                debug!(
                    "{} command {} -> {} ({} data bytes)",
                    request.address,
                    request.command,
                    outcome.name(),
                    result.data.len()
                );
                Transaction {
                    request: Some(request),
                    request_bytes,
                    response: Some(response),
                    response_bytes,
                    outcome,
                }
            }
            Err(e) => {
                warn!("Response from {} cannot be encoded: {}", request.address, e);
                Transaction::unanswered(Some(request), request_bytes, Outcome::Malformed)
            }
        }
    }

    /// Whether `request` is a command 6 or 19 that would give its target
    /// a polling address or long address held by another device
    fn identity_conflict(&self, request: &Frame) -> bool {
        let Ok(command) = UniversalCommand::try_from(request.command) else {
            return false;
        };
        let Some(device) = self.registry.resolve(&request.address) else {
            return false;
        };

        match (command, &request.payload[..]) {
            (UniversalCommand::WritePollingAddress, &[target]) if target <= MAX_POLLING_ADDRESS => {
                self.registry
                    .at_polling_address(target)
                    .is_some_and(|holder| holder.unique_id() != device.unique_id())
            }
            (UniversalCommand::WriteSerialNumber, &[a, b, c]) => {
                let long = UniqueId {
                    device_id: u32::from_be_bytes([0, a, b, c]),
                    ..device.unique_id()
                }
                .long_address();
                self.registry
                    .list_all()
                    .iter()
                    .any(|other| {
                        other.polling_address() != device.polling_address()
                            && other.unique_id().long_address() == long
                    })
            }
            _ => false,
        }
    }
}
