//! Typed decoding of response data
//!
//! [`Reply::parse`] turns the data field of a response (status bytes
//! already stripped) into named fields for the universal commands. The
//! layouts here are shared with the simulated devices that produce them.

use crate::command::{read_f32, read_u24, u24_bytes, unpack_ascii, widths, UniversalCommand};
use crate::error::ReplyError;
use crate::frame::{Frame, LongAddress, MAX_LONG_MANUFACTURER_ID};
use crate::status::ResponseStatus;

/// First byte of a command 0 reply
pub const IDENTITY_EXPANSION_CODE: u8 = 254;

/// Command 0 reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identity {
    /// Manufacturer identification code
    pub manufacturer_id: u8,
    /// Manufacturer's device type code
    pub device_type: u8,
    /// Preambles the device requires from the master
    pub min_preambles: u8,
    /// Universal command revision
    pub universal_revision: u8,
    /// Device-specific command revision
    pub device_revision: u8,
    /// Software revision
    pub software_revision: u8,
    /// Hardware revision
    pub hardware_revision: u8,
    /// Device function flags
    pub flags: u8,
    /// 24-bit device identification number
    pub device_id: u32,
}

impl Identity {
    /// Encoded length
    pub const LEN: usize = 12;

    /// Wire layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![
            IDENTITY_EXPANSION_CODE,
            self.manufacturer_id,
            self.device_type,
            self.min_preambles,
            self.universal_revision,
            self.device_revision,
            self.software_revision,
            self.hardware_revision,
            self.flags,
        ];
        out.extend_from_slice(&u24_bytes(self.device_id));
        out
    }

    /// Parse from command data
    pub fn parse(command: u8, data: &[u8]) -> Result<Self, ReplyError> {
        require(command, data, Self::LEN)?;
        Ok(Self {
            manufacturer_id: data[1],
            device_type: data[2],
            min_preambles: data[3],
            universal_revision: data[4],
            device_revision: data[5],
            software_revision: data[6],
            hardware_revision: data[7],
            flags: data[8],
            device_id: read_u24(data, 9, command)?,
        })
    }

    /// Address a master uses to reach this device with long frames
    pub fn long_address(&self) -> LongAddress {
        LongAddress {
            manufacturer_id: self.manufacturer_id & MAX_LONG_MANUFACTURER_ID,
            device_type: self.device_type,
            device_id: self.device_id,
        }
    }
}

/// Calendar date as carried by commands 13 and 18
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    /// Day of month
    pub day: u8,
    /// Month
    pub month: u8,
    /// Year
    pub year: u16,
}

impl Date {
    /// Create a date
    pub fn new(day: u8, month: u8, year: u16) -> Self {
        Self { day, month, year }
    }

    /// Wire layout
    pub fn to_bytes(self) -> [u8; widths::DATE] {
        let [hi, lo] = self.year.to_be_bytes();
        [self.day, self.month, hi, lo]
    }

    /// Parse four date bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [day, month, hi, lo] => Some(Self::new(*day, *month, u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }
}

/// A value with its unit code
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Unit code
    pub unit: u8,
    /// Value
    pub value: f32,
}

/// One entry of a command 9 reply
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotReading {
    /// Requested slot code
    pub slot: u8,
    /// Unit code
    pub unit: u8,
    /// Value
    pub value: f32,
    /// Slot status
    pub status: u8,
}

impl SlotReading {
    /// Encoded length
    pub const LEN: usize = 7;
}

/// Decoded response data
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reply {
    /// Commands 0, 11, 21
    Identity(Identity),
    /// Command 1
    PrimaryVariable(Reading),
    /// Command 2
    LoopCurrent { milliamps: f32, percent: f32 },
    /// Command 3
    DynamicVariables {
        loop_current: f32,
        variables: Vec<Reading>,
    },
    /// Command 6
    PollingAddress { address: u8 },
    /// Command 7
    LoopConfiguration {
        polling_address: u8,
        loop_current_enabled: bool,
    },
    /// Command 8
    Classifications(Vec<u8>),
    /// Command 9
    DeviceVariables(Vec<SlotReading>),
    /// Commands 12, 17
    Message(String),
    /// Commands 13, 18
    TagDescriptorDate {
        tag: String,
        descriptor: String,
        date: Date,
    },
    /// Command 14
    TransducerInfo {
        serial_number: u32,
        unit: u8,
        upper_limit: f32,
        lower_limit: f32,
        min_span: f32,
    },
    /// Command 15
    OutputInfo {
        alarm_code: u8,
        transfer_function: u8,
        unit: u8,
        upper_range: f32,
        lower_range: f32,
        damping: f32,
        write_protect: u8,
    },
    /// Commands 16, 19
    SerialNumber(u32),
    /// Commands 20, 22
    LongTag(String),
    /// Command 38
    ConfigChangeCounter(u16),
    /// Command 48
    AdditionalStatus(Vec<u8>),
    /// Any other command
    Unknown { command: u8, data: Vec<u8> },
}

impl Reply {
    /// Decode the data of a successful response to `command`
    pub fn parse(command: u8, data: &[u8]) -> Result<Self, ReplyError> {
        use UniversalCommand as C;

        let Ok(cmd) = UniversalCommand::try_from(command) else {
            return Ok(Self::Unknown {
                command,
                data: data.to_vec(),
            });
        };

        let reply = match cmd {
            C::ReadUniqueId | C::ReadUniqueIdByTag | C::ReadUniqueIdByLongTag => {
                Self::Identity(Identity::parse(command, data)?)
            }
            C::ReadPrimaryVariable => {
                require(command, data, 5)?;
                Self::PrimaryVariable(Reading {
                    unit: data[0],
                    value: read_f32(data, 1, command)?,
                })
            }
            C::ReadLoopCurrent => Self::LoopCurrent {
                milliamps: read_f32(data, 0, command)?,
                percent: read_f32(data, 4, command)?,
            },
            C::ReadDynamicVariables => {
                let loop_current = read_f32(data, 0, command)?;
                let variables = data[4..]
                    .chunks(5)
                    .map(|chunk| {
                        require(command, chunk, 5)?;
                        Ok(Reading {
                            unit: chunk[0],
                            value: read_f32(chunk, 1, command)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ReplyError>>()?;
                Self::DynamicVariables {
                    loop_current,
                    variables,
                }
            }
            C::WritePollingAddress => {
                require(command, data, 1)?;
                Self::PollingAddress { address: data[0] }
            }
            C::ReadLoopConfiguration => {
                require(command, data, 2)?;
                Self::LoopConfiguration {
                    polling_address: data[0],
                    loop_current_enabled: data[1] != 0,
                }
            }
            C::ReadVariableClassifications => Self::Classifications(data.to_vec()),
            C::ReadDeviceVariables => {
                let slots = data
                    .chunks(SlotReading::LEN)
                    .map(|chunk| {
                        require(command, chunk, SlotReading::LEN)?;
                        Ok(SlotReading {
                            slot: chunk[0],
                            unit: chunk[1],
                            value: read_f32(chunk, 2, command)?,
                            status: chunk[6],
                        })
                    })
                    .collect::<Result<Vec<_>, ReplyError>>()?;
                Self::DeviceVariables(slots)
            }
            C::ReadMessage | C::WriteMessage => {
                require(command, data, widths::MESSAGE)?;
                Self::Message(unpack_ascii(&data[..widths::MESSAGE]))
            }
            C::ReadTagDescriptorDate | C::WriteTagDescriptorDate => {
                require(command, data, widths::TAG_DESCRIPTOR_DATE)?;
                let desc_end = widths::TAG + widths::DESCRIPTOR;
                Self::TagDescriptorDate {
                    tag: unpack_ascii(&data[..widths::TAG]),
                    descriptor: unpack_ascii(&data[widths::TAG..desc_end]),
                    date: Date::from_bytes(&data[desc_end..widths::TAG_DESCRIPTOR_DATE])
                        .ok_or(ReplyError::ShortData {
                            command,
                            expected: widths::TAG_DESCRIPTOR_DATE,
                            actual: data.len(),
                        })?,
                }
            }
            C::ReadTransducerInfo => {
                require(command, data, 16)?;
                Self::TransducerInfo {
                    serial_number: read_u24(data, 0, command)?,
                    unit: data[3],
                    upper_limit: read_f32(data, 4, command)?,
                    lower_limit: read_f32(data, 8, command)?,
                    min_span: read_f32(data, 12, command)?,
                }
            }
            C::ReadOutputInfo => {
                require(command, data, 16)?;
                Self::OutputInfo {
                    alarm_code: data[0],
                    transfer_function: data[1],
                    unit: data[2],
                    upper_range: read_f32(data, 3, command)?,
                    lower_range: read_f32(data, 7, command)?,
                    damping: read_f32(data, 11, command)?,
                    write_protect: data[15],
                }
            }
            C::ReadSerialNumber | C::WriteSerialNumber => {
                Self::SerialNumber(read_u24(data, 0, command)?)
            }
            C::ReadLongTag | C::WriteLongTag => {
                require(command, data, widths::LONG_TAG)?;
                Self::LongTag(unpack_ascii(&data[..widths::LONG_TAG]))
            }
            C::ResetConfigChanged => {
                require(command, data, 2)?;
                Self::ConfigChangeCounter(u16::from_be_bytes([data[0], data[1]]))
            }
            C::ReadAdditionalStatus => Self::AdditionalStatus(data.to_vec()),
        };

        Ok(reply)
    }

    /// Split a response frame into its status and decoded data
    ///
    /// Data is only decoded when the response code reports success;
    /// otherwise the raw bytes are returned as [`Reply::Unknown`].
    pub fn from_response(frame: &Frame) -> Result<(ResponseStatus, Self), ReplyError> {
        let status = frame.status().ok_or(ReplyError::MissingStatus)?;
        let reply = if status.is_success() {
            Self::parse(frame.command, frame.data())?
        } else {
            Self::Unknown {
                command: frame.command,
                data: frame.data().to_vec(),
            }
        };
        Ok((status, reply))
    }
}

fn require(command: u8, data: &[u8], expected: usize) -> Result<(), ReplyError> {
    if data.len() < expected {
        Err(ReplyError::ShortData {
            command,
            expected,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}
