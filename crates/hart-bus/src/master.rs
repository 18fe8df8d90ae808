//! Bus master
//!
//! Builds request frames from typed command arguments using the current
//! frame settings. For long frames the master needs each device's unique
//! identifier, which it learns from command 0 replies.

use std::collections::HashMap;

use hart_protocol::command::{pack_ascii, u24_bytes, widths};
use hart_protocol::frame::{MAX_DEVICE_ID, MAX_POLLING_ADDRESS, MAX_PREAMBLES, MIN_PREAMBLES};
use hart_protocol::{Address, Date, Frame, LongAddress, UniversalCommand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BusError;

/// Address form used for outgoing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameFormat {
    /// One-byte polling address
    #[default]
    Short,
    /// Five-byte unique identifier address
    Long,
}

/// Master frame settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    /// Preambles sent ahead of each request, 5..=20
    pub preamble_count: u8,
    /// Address form of outgoing requests
    pub frame_format: FrameFormat,
    /// Whether requests carry the primary master bit
    pub primary_master: bool,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            preamble_count: MIN_PREAMBLES,
            frame_format: FrameFormat::Short,
            primary_master: true,
        }
    }
}

impl MasterSettings {
    /// Check every setting against its range
    pub fn validate(&self) -> Result<(), BusError> {
        check_preambles(self.preamble_count)
    }
}

fn check_preambles(count: u8) -> Result<(), BusError> {
    if (MIN_PREAMBLES..=MAX_PREAMBLES).contains(&count) {
        Ok(())
    } else {
        Err(BusError::InvalidConfiguration(format!(
            "preamble count {} outside {}..={}",
            count, MIN_PREAMBLES, MAX_PREAMBLES
        )))
    }
}

/// Typed request arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArgs {
    /// No request data
    None,
    /// New polling address (command 6)
    PollingAddress(u8),
    /// Device variable slot codes (command 9)
    Slots(Vec<u8>),
    /// Message text (command 17)
    Message(String),
    /// Tag, descriptor and date (command 18)
    TagDescriptorDate {
        tag: String,
        descriptor: String,
        date: Date,
    },
    /// Serial number (command 19)
    SerialNumber(u32),
    /// Tag to look up (command 11)
    Tag(String),
    /// Long tag to look up or write (commands 21, 22)
    LongTag(String),
    /// Request data sent as-is, for any command
    Raw(Vec<u8>),
}

impl CommandArgs {
    /// Name of the argument kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "no",
            Self::PollingAddress(_) => "polling address",
            Self::Slots(_) => "slot",
            Self::Message(_) => "message",
            Self::TagDescriptorDate { .. } => "tag/descriptor/date",
            Self::SerialNumber(_) => "serial number",
            Self::Tag(_) => "tag",
            Self::LongTag(_) => "long tag",
            Self::Raw(_) => "raw",
        }
    }

    /// Encode the request data for `command`
    pub fn encode_for(&self, command: u8) -> Result<Vec<u8>, BusError> {
        use UniversalCommand as C;

        let cmd = UniversalCommand::try_from(command).ok();
        let data = match (self, cmd) {
            (Self::Raw(bytes), _) => bytes.clone(),
            (
                Self::None,
                None
                | Some(
                    C::ReadUniqueId
                    | C::ReadPrimaryVariable
                    | C::ReadLoopCurrent
                    | C::ReadDynamicVariables
                    | C::ReadLoopConfiguration
                    | C::ReadVariableClassifications
                    | C::ReadMessage
                    | C::ReadTagDescriptorDate
                    | C::ReadTransducerInfo
                    | C::ReadOutputInfo
                    | C::ReadSerialNumber
                    | C::ReadLongTag
                    | C::ResetConfigChanged
                    | C::ReadAdditionalStatus,
                ),
            ) => Vec::new(),
            (Self::PollingAddress(address), Some(C::WritePollingAddress)) => vec![*address],
            (Self::Slots(slots), Some(C::ReadDeviceVariables)) => slots.clone(),
            (Self::Message(text), Some(C::WriteMessage)) => pack_ascii(text, widths::MESSAGE),
            (
                Self::TagDescriptorDate {
                    tag,
                    descriptor,
                    date,
                },
                Some(C::WriteTagDescriptorDate),
            ) => {
                let mut out = pack_ascii(tag, widths::TAG);
                out.extend_from_slice(&pack_ascii(descriptor, widths::DESCRIPTOR));
                out.extend_from_slice(&date.to_bytes());
                out
            }
            (Self::SerialNumber(number), Some(C::WriteSerialNumber))
                if *number <= MAX_DEVICE_ID =>
            {
                u24_bytes(*number).to_vec()
            }
            (Self::Tag(tag), Some(C::ReadUniqueIdByTag)) => pack_ascii(tag, widths::TAG),
            (Self::LongTag(tag), Some(C::ReadUniqueIdByLongTag | C::WriteLongTag)) => {
                pack_ascii(tag, widths::LONG_TAG)
            }
            _ => {
                return Err(BusError::ArgumentMismatch {
                    command,
                    args: self.kind_name(),
                })
            }
        };
        Ok(data)
    }
}

/// Builds request frames and remembers device identities
#[derive(Debug, Default)]
pub struct Master {
    settings: MasterSettings,
    /// Long addresses learned from command 0, keyed by polling address
    directory: HashMap<u8, LongAddress>,
}

impl Master {
    /// Create a master with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a master with the given settings
    pub fn with_settings(settings: MasterSettings) -> Result<Self, BusError> {
        settings.validate()?;
        Ok(Self {
            settings,
            directory: HashMap::new(),
        })
    }

    /// Current settings
    pub fn settings(&self) -> &MasterSettings {
        &self.settings
    }

    /// Set the number of preambles sent with each request
    pub fn set_preambles(&mut self, count: u8) -> Result<(), BusError> {
        check_preambles(count)?;
        self.settings.preamble_count = count;
        Ok(())
    }

    /// Select short or long frames
    pub fn set_frame_format(&mut self, format: FrameFormat) {
        self.settings.frame_format = format;
    }

    /// Set or clear the primary master bit
    pub fn set_primary_master(&mut self, primary: bool) {
        self.settings.primary_master = primary;
    }

    /// Remember the long address of the device at `polling_address`
    ///
    /// A long address is known at one polling address at a time.
    pub fn learn(&mut self, polling_address: u8, address: LongAddress) {
        debug!("Learned {} at polling address {}", Address::Long(address), polling_address);
        self.directory.retain(|_, known| *known != address);
        self.directory.insert(polling_address, address);
    }

    /// Drop what is known about `polling_address`
    pub fn forget(&mut self, polling_address: u8) -> Option<LongAddress> {
        self.directory.remove(&polling_address)
    }

    /// Long address known for `polling_address`
    pub fn lookup(&self, polling_address: u8) -> Option<LongAddress> {
        self.directory.get(&polling_address).copied()
    }

    /// Move a learned identity after a polling address change
    pub fn relocate(&mut self, from: u8, to: u8) {
        if from == to {
            return;
        }
        self.directory.remove(&to);
        if let Some(address) = self.directory.remove(&from) {
            self.directory.insert(to, address);
        }
    }

    /// Replace a learned long address after the device's serial number
    /// changed
    pub fn renumber(&mut self, from: LongAddress, to: LongAddress) {
        for known in self.directory.values_mut().filter(|known| **known == from) {
            *known = to;
        }
    }

    /// Build a request to the device at `polling_address` using the
    /// configured frame format
    pub fn build_request(
        &self,
        polling_address: u8,
        command: u8,
        args: &CommandArgs,
    ) -> Result<Frame, BusError> {
        if polling_address > MAX_POLLING_ADDRESS {
            return Err(BusError::InvalidAddress(polling_address));
        }
        let address = match self.settings.frame_format {
            FrameFormat::Short => Address::short(polling_address),
            FrameFormat::Long => Address::Long(
                self.lookup(polling_address)
                    .ok_or(BusError::UnknownDevice(polling_address))?,
            ),
        };
        self.build_request_to(address, command, args)
    }

    /// Build a request to an explicit address
    pub fn build_request_to(
        &self,
        address: Address,
        command: u8,
        args: &CommandArgs,
    ) -> Result<Frame, BusError> {
        let payload = args.encode_for(command)?;
        let frame = Frame::request(address, command, payload)
            .with_preambles(self.settings.preamble_count)
            .with_primary_master(self.settings.primary_master);
        frame.validate()?;
        Ok(frame)
    }
}
