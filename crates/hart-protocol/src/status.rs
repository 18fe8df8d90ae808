//! Response status bytes
//!
//! Every slave response starts with two bytes: the response code, which
//! reports how the command itself went, and the field device status, a
//! bit field describing the device.

/// Command completed
pub const SUCCESS: u8 = 0;
/// A request field holds a value the device does not accept
pub const INVALID_SELECTION: u8 = 2;
/// Request data shorter (or longer) than the command's layout
pub const TOO_FEW_DATA_BYTES: u8 = 5;
/// Command number not recognized by the device
pub const COMMAND_NOT_IMPLEMENTED: u8 = 64;

/// Device status: primary variable outside its limits
pub const STATUS_PV_OUT_OF_LIMITS: u8 = 0x01;
/// Device status: configuration changed since the flag was last reset
pub const STATUS_CONFIG_CHANGED: u8 = 0x40;

/// The two status bytes at the start of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResponseStatus {
    /// Response code
    pub response_code: u8,
    /// Field device status
    pub device_status: u8,
}

impl ResponseStatus {
    /// Create a status pair
    pub fn new(response_code: u8, device_status: u8) -> Self {
        Self {
            response_code,
            device_status,
        }
    }

    /// Read the status pair from the start of a response payload
    pub fn from_bytes(payload: &[u8]) -> Option<Self> {
        match payload {
            [code, status, ..] => Some(Self::new(*code, *status)),
            _ => None,
        }
    }

    /// Wire representation
    pub fn to_bytes(self) -> [u8; 2] {
        [self.response_code, self.device_status]
    }

    /// Whether the command completed
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS
    }

    /// Whether the configuration-changed bit is set
    pub fn config_changed(&self) -> bool {
        self.device_status & STATUS_CONFIG_CHANGED != 0
    }

    /// Whether the primary variable is outside its limits
    pub fn pv_out_of_limits(&self) -> bool {
        self.device_status & STATUS_PV_OUT_OF_LIMITS != 0
    }
}

/// Describe a response code
pub fn response_code_name(code: u8) -> &'static str {
    match code {
        SUCCESS => "Success",
        INVALID_SELECTION => "Invalid Selection",
        TOO_FEW_DATA_BYTES => "Too Few Data Bytes Received",
        COMMAND_NOT_IMPLEMENTED => "Command Not Implemented",
        _ => "Unknown",
    }
}
