//! HART command numbers
//!
//! Universal commands are implemented by every field device. The
//! simulator supports the subset below; anything else is answered with
//! "command not implemented".

use crate::error::ReplyError;

/// Universal command numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum UniversalCommand {
    /// Read unique identifier
    ReadUniqueId = 0,
    /// Read primary variable
    ReadPrimaryVariable = 1,
    /// Read loop current and percent of range
    ReadLoopCurrent = 2,
    /// Read dynamic variables and loop current
    ReadDynamicVariables = 3,
    /// Write polling address
    WritePollingAddress = 6,
    /// Read loop configuration
    ReadLoopConfiguration = 7,
    /// Read dynamic variable classifications
    ReadVariableClassifications = 8,
    /// Read device variables with status
    ReadDeviceVariables = 9,
    /// Read unique identifier associated with tag
    ReadUniqueIdByTag = 11,
    /// Read message
    ReadMessage = 12,
    /// Read tag, descriptor, date
    ReadTagDescriptorDate = 13,
    /// Read primary variable transducer information
    ReadTransducerInfo = 14,
    /// Read device output information
    ReadOutputInfo = 15,
    /// Read serial number
    ReadSerialNumber = 16,
    /// Write message
    WriteMessage = 17,
    /// Write tag, descriptor, date
    WriteTagDescriptorDate = 18,
    /// Write serial number
    WriteSerialNumber = 19,
    /// Read long tag
    ReadLongTag = 20,
    /// Read unique identifier associated with long tag
    ReadUniqueIdByLongTag = 21,
    /// Write long tag
    WriteLongTag = 22,
    /// Reset configuration changed flag
    ResetConfigChanged = 38,
    /// Read additional device status
    ReadAdditionalStatus = 48,
}

impl UniversalCommand {
    /// Command number
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadUniqueId => "Read Unique Identifier",
            Self::ReadPrimaryVariable => "Read Primary Variable",
            Self::ReadLoopCurrent => "Read Loop Current And Percent Of Range",
            Self::ReadDynamicVariables => "Read Dynamic Variables And Loop Current",
            Self::WritePollingAddress => "Write Polling Address",
            Self::ReadLoopConfiguration => "Read Loop Configuration",
            Self::ReadVariableClassifications => "Read Dynamic Variable Classifications",
            Self::ReadDeviceVariables => "Read Device Variables With Status",
            Self::ReadUniqueIdByTag => "Read Unique Identifier Associated With Tag",
            Self::ReadMessage => "Read Message",
            Self::ReadTagDescriptorDate => "Read Tag, Descriptor, Date",
            Self::ReadTransducerInfo => "Read Primary Variable Transducer Information",
            Self::ReadOutputInfo => "Read Device Output Information",
            Self::ReadSerialNumber => "Read Serial Number",
            Self::WriteMessage => "Write Message",
            Self::WriteTagDescriptorDate => "Write Tag, Descriptor, Date",
            Self::WriteSerialNumber => "Write Serial Number",
            Self::ReadLongTag => "Read Long Tag",
            Self::ReadUniqueIdByLongTag => "Read Unique Identifier Associated With Long Tag",
            Self::WriteLongTag => "Write Long Tag",
            Self::ResetConfigChanged => "Reset Configuration Changed Flag",
            Self::ReadAdditionalStatus => "Read Additional Device Status",
        }
    }

    /// Returns true if the command changes device state
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::WritePollingAddress
                | Self::WriteMessage
                | Self::WriteTagDescriptorDate
                | Self::WriteSerialNumber
                | Self::WriteLongTag
                | Self::ResetConfigChanged
        )
    }
}

impl TryFrom<u8> for UniversalCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ReadUniqueId),
            1 => Ok(Self::ReadPrimaryVariable),
            2 => Ok(Self::ReadLoopCurrent),
            3 => Ok(Self::ReadDynamicVariables),
            6 => Ok(Self::WritePollingAddress),
            7 => Ok(Self::ReadLoopConfiguration),
            8 => Ok(Self::ReadVariableClassifications),
            9 => Ok(Self::ReadDeviceVariables),
            11 => Ok(Self::ReadUniqueIdByTag),
            12 => Ok(Self::ReadMessage),
            13 => Ok(Self::ReadTagDescriptorDate),
            14 => Ok(Self::ReadTransducerInfo),
            15 => Ok(Self::ReadOutputInfo),
            16 => Ok(Self::ReadSerialNumber),
            17 => Ok(Self::WriteMessage),
            18 => Ok(Self::WriteTagDescriptorDate),
            19 => Ok(Self::WriteSerialNumber),
            20 => Ok(Self::ReadLongTag),
            21 => Ok(Self::ReadUniqueIdByLongTag),
            22 => Ok(Self::WriteLongTag),
            38 => Ok(Self::ResetConfigChanged),
            48 => Ok(Self::ReadAdditionalStatus),
            other => Err(other),
        }
    }
}

/// Fixed field widths of the text-carrying commands
pub mod widths {
    /// Tag (commands 11, 13, 18)
    pub const TAG: usize = 8;
    /// Descriptor (commands 13, 18)
    pub const DESCRIPTOR: usize = 16;
    /// Date: day, month, year (big-endian u16)
    pub const DATE: usize = 4;
    /// Message (commands 12, 17)
    pub const MESSAGE: usize = 24;
    /// Long tag (commands 20, 21, 22)
    pub const LONG_TAG: usize = 32;
    /// Serial number (commands 16, 19)
    pub const SERIAL_NUMBER: usize = 3;
    /// Tag + descriptor + date (commands 13, 18)
    pub const TAG_DESCRIPTOR_DATE: usize = TAG + DESCRIPTOR + DATE;
}

/// Pad or truncate ASCII text to a fixed field width
///
/// Non-ASCII characters are replaced with `?`; short text is padded with spaces.
pub fn pack_ascii(text: &str, width: usize) -> Vec<u8> {
    let mut out: Vec<u8> = text
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .take(width)
        .collect();
    out.resize(width, b' ');
    out
}

/// Read a fixed-width ASCII field, dropping trailing spaces and NULs
pub fn unpack_ascii(field: &[u8]) -> String {
    let text: String = field
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();
    text.trim_end_matches([' ', '\0']).to_string()
}

/// Read a big-endian IEEE-754 float at `offset`
pub fn read_f32(data: &[u8], offset: usize, command: u8) -> Result<f32, ReplyError> {
    data.get(offset..offset + 4)
        .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ReplyError::ShortData {
            command,
            expected: offset + 4,
            actual: data.len(),
        })
}

/// Read a big-endian 24-bit integer at `offset`
pub fn read_u24(data: &[u8], offset: usize, command: u8) -> Result<u32, ReplyError> {
    data.get(offset..offset + 3)
        .map(|b| u32::from_be_bytes([0, b[0], b[1], b[2]]))
        .ok_or(ReplyError::ShortData {
            command,
            expected: offset + 3,
            actual: data.len(),
        })
}

/// Write a 24-bit integer big-endian
pub fn u24_bytes(value: u32) -> [u8; 3] {
    let b = value.to_be_bytes();
    [b[1], b[2], b[3]]
}
