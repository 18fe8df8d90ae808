//! Simulated field device
//!
//! A [`Device`] answers the universal command set for one of five sensor
//! kinds. Reads return the stored state and never change it; write
//! commands either apply completely or leave the device untouched.

use std::fmt;
use std::time::Duration;

use hart_protocol::command::{pack_ascii, read_u24, u24_bytes, unpack_ascii, widths};
use hart_protocol::frame::{LongAddress, MAX_DEVICE_ID, MAX_LONG_MANUFACTURER_ID, MAX_POLLING_ADDRESS, MIN_PREAMBLES};
use hart_protocol::reply::SlotReading;
use hart_protocol::status::{
    COMMAND_NOT_IMPLEMENTED, INVALID_SELECTION, STATUS_CONFIG_CHANGED, STATUS_PV_OUT_OF_LIMITS,
    SUCCESS, TOO_FEW_DATA_BYTES,
};
use hart_protocol::{units, Date, Identity, UniversalCommand};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::variables::{ProcessModel, Variable, VariableSlot, Variables};

/// Universal command revision reported by command 0
pub const UNIVERSAL_REVISION: u8 = 5;
/// Device revision reported by command 0
pub const DEVICE_REVISION: u8 = 9;
/// Software revision reported by command 0
pub const SOFTWARE_REVISION: u8 = 1;
/// Hardware revision reported by command 0
pub const HARDWARE_REVISION: u8 = 1;

/// Command 9 slot status: value valid
pub const SLOT_STATUS_GOOD: u8 = 0x00;
/// Command 9 slot status: value outside the sensor limits
pub const SLOT_STATUS_OUT_OF_LIMITS: u8 = 0x01;
/// Command 9 slot status: slot not populated by this device
pub const SLOT_STATUS_NOT_AVAILABLE: u8 = 0x02;

/// Most slots a single command 9 request may ask for
pub const MAX_SLOTS_PER_REQUEST: usize = 8;

/// Number of bytes in a command 48 reply
const ADDITIONAL_STATUS_LEN: usize = 9;
/// Command 15 distributor code: not used
const DISTRIBUTOR_NOT_USED: u8 = 250;
/// Command 15 write protect code: not write protected
const WRITE_PROTECT_NONE: u8 = 0;
/// Command 15 transfer function: linear
const TRANSFER_LINEAR: u8 = 0;
/// Command 15 alarm selection: high
const ALARM_HIGH: u8 = 0;
/// Command 48 operating mode byte: normal
const OPERATING_MODE_NORMAL: u8 = 0x01;

/// Errors raised while building a device from configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Polling address above 63
    #[error("invalid polling address: {0} (max 63)")]
    InvalidPollingAddress(u8),

    /// Device id does not fit in 24 bits
    #[error("device id 0x{0:X} exceeds 24 bits")]
    InvalidDeviceId(u32),

    /// Text field longer than its fixed width
    #[error("{field} is {len} characters (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Kind of sensor a device simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Radar level transmitter
    LevelSensor,
    /// Magnetic flow meter
    FlowSensor,
    /// Temperature transmitter
    TemperatureSensor,
    /// pH analyser
    PhSensor,
    /// Turbidity / transparency analyser
    TransparencySensor,
}

impl DeviceKind {
    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::LevelSensor => "Level",
            Self::FlowSensor => "Flow",
            Self::TemperatureSensor => "Temperature",
            Self::PhSensor => "pH",
            Self::TransparencySensor => "Transparency",
        }
    }

    /// Unit of the primary variable
    pub fn primary_unit(self) -> u8 {
        match self {
            Self::LevelSensor => units::METERS,
            Self::FlowSensor => units::CUBIC_METERS_PER_HOUR,
            Self::TemperatureSensor => units::DEGREES_CELSIUS,
            Self::PhSensor => units::PH,
            Self::TransparencySensor => units::PERCENT,
        }
    }

    /// Lower and upper sensor limits of the primary variable
    pub fn sensor_limits(self) -> (f32, f32) {
        match self {
            Self::LevelSensor => (0.0, 6.0),
            Self::PhSensor => (0.0, 14.0),
            Self::FlowSensor | Self::TemperatureSensor | Self::TransparencySensor => (0.0, 100.0),
        }
    }

    /// Noise amplitude applied to the primary variable on each tick
    pub fn primary_noise(self) -> f32 {
        match self {
            Self::LevelSensor => 0.005,
            Self::FlowSensor => 0.5,
            Self::TemperatureSensor => 0.2,
            Self::PhSensor => 0.05,
            Self::TransparencySensor => 0.5,
        }
    }

    /// Nominal primary value when the configuration names none
    pub fn default_base(self) -> f32 {
        match self {
            Self::LevelSensor => 2.0,
            Self::FlowSensor => 55.0,
            Self::TemperatureSensor => 21.0,
            Self::PhSensor => 7.0,
            Self::TransparencySensor => 88.0,
        }
    }

    /// Command 8 classification codes, one per slot
    pub fn classifications(self) -> [u8; 4] {
        match self {
            Self::FlowSensor => [1, 0, 0, 0],
            Self::LevelSensor => [2, 0, 0, 0],
            Self::TemperatureSensor | Self::PhSensor | Self::TransparencySensor => [0, 0, 0, 0],
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unique identifier of a device
///
/// The manufacturer id keeps its full byte here; only the long address
/// is limited to six bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueId {
    /// Manufacturer identification code
    pub manufacturer_id: u8,
    /// Manufacturer's device type code
    pub device_type: u8,
    /// 24-bit device identification number
    pub device_id: u32,
}

impl UniqueId {
    /// Address a master uses to reach the device with long frames
    pub fn long_address(&self) -> LongAddress {
        LongAddress {
            manufacturer_id: self.manufacturer_id & MAX_LONG_MANUFACTURER_ID,
            device_type: self.device_type,
            device_id: self.device_id,
        }
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:06X}",
            self.manufacturer_id, self.device_type, self.device_id
        )
    }
}

impl From<Identity> for UniqueId {
    fn from(identity: Identity) -> Self {
        Self {
            manufacturer_id: identity.manufacturer_id,
            device_type: identity.device_type,
            device_id: identity.device_id,
        }
    }
}

/// Outcome of a command at the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Command executed
    Success,
    /// Command number not supported
    CommandNotImplemented,
    /// Request data rejected, with the response code to report
    InvalidData(u8),
}

impl CommandStatus {
    /// Response code carried in the reply
    pub fn response_code(self) -> u8 {
        match self {
            Self::Success => SUCCESS,
            Self::CommandNotImplemented => COMMAND_NOT_IMPLEMENTED,
            Self::InvalidData(code) => code,
        }
    }
}

/// Reply data produced by a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Command-specific response data (status bytes excluded)
    pub data: Vec<u8>,
    /// How the command went
    pub status: CommandStatus,
}

impl CommandResult {
    fn ok(data: Vec<u8>) -> Self {
        Self {
            data,
            status: CommandStatus::Success,
        }
    }

    /// Reply for rejected request data
    pub fn rejected(response_code: u8) -> Self {
        Self {
            data: Vec::new(),
            status: CommandStatus::InvalidData(response_code),
        }
    }

    fn not_implemented() -> Self {
        Self {
            data: Vec::new(),
            status: CommandStatus::CommandNotImplemented,
        }
    }
}

/// Configuration for creating a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Sensor kind
    pub kind: DeviceKind,
    /// Polling address, 0..=63
    pub polling_address: u8,
    /// Tag, up to 8 characters
    pub tag: String,
    /// Descriptor, up to 16 characters
    pub descriptor: String,
    /// Message, up to 24 characters
    pub message: String,
    /// Long tag, up to 32 characters
    pub long_tag: String,
    /// Model name
    pub model: String,
    /// Manufacturer name
    pub manufacturer: String,
    /// Manufacturer identification code
    pub manufacturer_id: u8,
    /// Manufacturer's device type code
    pub device_type: u8,
    /// Serial number, used as the 24-bit device id
    pub serial_number: u32,
    /// Nominal primary value; the kind's default when unset
    pub base_value: Option<f32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::TemperatureSensor,
            polling_address: 0,
            tag: "TEMP-001".to_string(),
            descriptor: "DESC".to_string(),
            message: "READY".to_string(),
            long_tag: String::new(),
            model: "Virtual Device".to_string(),
            manufacturer: "Simulator".to_string(),
            manufacturer_id: 0x3F,
            device_type: 0x01,
            serial_number: 1,
            base_value: None,
        }
    }
}

/// A simulated HART slave device
#[derive(Debug, Clone)]
pub struct Device {
    kind: DeviceKind,
    polling_address: u8,
    unique_id: UniqueId,
    model: String,
    manufacturer: String,
    tag: String,
    descriptor: String,
    date: Date,
    message: String,
    long_tag: String,
    process: ProcessModel,
    variables: Variables,
    lower_range: f32,
    upper_range: f32,
    damping: f32,
    min_span: f32,
    config_change_counter: u16,
}

impl Device {
    /// Create a device from configuration
    pub fn from_config(config: DeviceConfig) -> Result<Self, DeviceError> {
        if config.polling_address > MAX_POLLING_ADDRESS {
            return Err(DeviceError::InvalidPollingAddress(config.polling_address));
        }
        if config.serial_number > MAX_DEVICE_ID {
            return Err(DeviceError::InvalidDeviceId(config.serial_number));
        }
        check_width("tag", &config.tag, widths::TAG)?;
        check_width("descriptor", &config.descriptor, widths::DESCRIPTOR)?;
        check_width("message", &config.message, widths::MESSAGE)?;
        check_width("long tag", &config.long_tag, widths::LONG_TAG)?;

        let base = config
            .base_value
            .unwrap_or_else(|| config.kind.default_base());
        let process = ProcessModel::new(config.kind, base);
        let variables = process.nominal();
        let (lower_range, upper_range) = config.kind.sensor_limits();

        Ok(Self {
            kind: config.kind,
            polling_address: config.polling_address,
            unique_id: UniqueId {
                manufacturer_id: config.manufacturer_id,
                device_type: config.device_type,
                device_id: config.serial_number,
            },
            model: config.model,
            manufacturer: config.manufacturer,
            tag: config.tag,
            descriptor: config.descriptor,
            date: Date::new(24, 8, 2025),
            message: config.message,
            long_tag: config.long_tag,
            process,
            variables,
            lower_range,
            upper_range,
            damping: 1.0,
            min_span: 1.0,
            config_change_counter: 0,
        })
    }

    /// Sensor kind
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Current polling address
    pub fn polling_address(&self) -> u8 {
        self.polling_address
    }

    /// Unique identifier
    pub fn unique_id(&self) -> UniqueId {
        self.unique_id
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Manufacturer name
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Serial number, which is also the device id of the unique identifier
    pub fn serial_number(&self) -> u32 {
        self.unique_id.device_id
    }

    /// Tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Descriptor
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Date
    pub fn date(&self) -> Date {
        self.date
    }

    /// Message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Long tag
    pub fn long_tag(&self) -> &str {
        &self.long_tag
    }

    /// Current variable readings
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Variable in `slot`, if populated
    pub fn variable(&self, slot: VariableSlot) -> Option<Variable> {
        self.variables.get(slot)
    }

    /// Number of configuration changes since the last command 38
    pub fn config_change_counter(&self) -> u16 {
        self.config_change_counter
    }

    /// Move the device to a new polling address
    ///
    /// Used by the registry when placing a device on the bus; commands
    /// use command 6 instead.
    pub fn set_polling_address(&mut self, address: u8) -> Result<(), DeviceError> {
        if address > MAX_POLLING_ADDRESS {
            return Err(DeviceError::InvalidPollingAddress(address));
        }
        self.polling_address = address;
        Ok(())
    }

    /// Identity reported by commands 0, 11 and 21
    pub fn identity(&self) -> Identity {
        Identity {
            manufacturer_id: self.unique_id.manufacturer_id,
            device_type: self.unique_id.device_type,
            min_preambles: MIN_PREAMBLES,
            universal_revision: UNIVERSAL_REVISION,
            device_revision: DEVICE_REVISION,
            software_revision: SOFTWARE_REVISION,
            hardware_revision: HARDWARE_REVISION,
            flags: 0,
            device_id: self.unique_id.device_id,
        }
    }

    /// Field device status byte
    pub fn device_status(&self) -> u8 {
        let mut status = 0;
        if self.config_change_counter != 0 {
            status |= STATUS_CONFIG_CHANGED;
        }
        if self.pv_out_of_limits() {
            status |= STATUS_PV_OUT_OF_LIMITS;
        }
        status
    }

    /// Whether the loop current tracks the primary variable
    ///
    /// Only a device at polling address 0 drives the loop; multi-drop
    /// devices park it at 4 mA.
    pub fn loop_current_enabled(&self) -> bool {
        self.polling_address == 0
    }

    /// Primary variable as a percentage of the range
    pub fn percent_of_range(&self) -> f32 {
        let span = self.upper_range - self.lower_range;
        if span == 0.0 {
            return 0.0;
        }
        (self.primary().value - self.lower_range) / span * 100.0
    }

    /// Loop current in milliamperes
    pub fn loop_current(&self) -> f32 {
        if self.loop_current_enabled() {
            (4.0 + self.percent_of_range() / 100.0 * 16.0).clamp(3.8, 20.8)
        } else {
            4.0
        }
    }

    /// Advance the simulated process by `elapsed`
    pub fn advance<R: Rng>(&mut self, elapsed: Duration, rng: &mut R) {
        self.variables = self.process.advance(elapsed, rng);
    }

    /// Execute a command and produce its reply data
    pub fn handle_command(&mut self, command: u8, data: &[u8]) -> CommandResult {
        use UniversalCommand as C;

        debug!(
            "Device #{} ({}) handling command {} with {} data bytes",
            self.polling_address,
            self.tag,
            command,
            data.len()
        );

        let Ok(cmd) = UniversalCommand::try_from(command) else {
            warn!(
                "Device #{} does not implement command {}",
                self.polling_address, command
            );
            return CommandResult::not_implemented();
        };

        let result = match cmd {
            C::ReadUniqueId => CommandResult::ok(self.identity().to_bytes()),
            C::ReadPrimaryVariable => {
                let pv = self.primary();
                let mut out = vec![pv.unit];
                out.extend_from_slice(&pv.value.to_be_bytes());
                CommandResult::ok(out)
            }
            C::ReadLoopCurrent => {
                let mut out = self.loop_current().to_be_bytes().to_vec();
                out.extend_from_slice(&self.percent_of_range().to_be_bytes());
                CommandResult::ok(out)
            }
            C::ReadDynamicVariables => {
                let mut out = self.loop_current().to_be_bytes().to_vec();
                for (_, var) in self.variables.populated() {
                    out.push(var.unit);
                    out.extend_from_slice(&var.value.to_be_bytes());
                }
                CommandResult::ok(out)
            }
            C::WritePollingAddress => self.write_polling_address(data),
            C::ReadLoopConfiguration => CommandResult::ok(vec![
                self.polling_address,
                u8::from(self.loop_current_enabled()),
            ]),
            C::ReadVariableClassifications => CommandResult::ok(self.kind.classifications().to_vec()),
            C::ReadDeviceVariables => self.read_device_variables(data),
            C::ReadUniqueIdByTag => {
                self.identity_if_matches(data, widths::TAG, |dev| dev.tag.as_str())
            }
            C::ReadMessage => CommandResult::ok(pack_ascii(&self.message, widths::MESSAGE)),
            C::ReadTagDescriptorDate => CommandResult::ok(self.tag_descriptor_date()),
            C::ReadTransducerInfo => {
                let mut out = u24_bytes(self.serial_number()).to_vec();
                out.push(self.kind.primary_unit());
                out.extend_from_slice(&self.upper_range.to_be_bytes());
                out.extend_from_slice(&self.lower_range.to_be_bytes());
                out.extend_from_slice(&self.min_span.to_be_bytes());
                CommandResult::ok(out)
            }
            C::ReadOutputInfo => {
                let mut out = vec![ALARM_HIGH, TRANSFER_LINEAR, self.kind.primary_unit()];
                out.extend_from_slice(&self.upper_range.to_be_bytes());
                out.extend_from_slice(&self.lower_range.to_be_bytes());
                out.extend_from_slice(&self.damping.to_be_bytes());
                out.push(WRITE_PROTECT_NONE);
                out.push(DISTRIBUTOR_NOT_USED);
                CommandResult::ok(out)
            }
            C::ReadSerialNumber => {
                CommandResult::ok(u24_bytes(self.serial_number()).to_vec())
            }
            C::WriteMessage => self.write_message(data),
            C::WriteTagDescriptorDate => self.write_tag_descriptor_date(data),
            C::WriteSerialNumber => self.write_serial_number(data),
            C::ReadLongTag => CommandResult::ok(pack_ascii(&self.long_tag, widths::LONG_TAG)),
            C::ReadUniqueIdByLongTag => {
                self.identity_if_matches(data, widths::LONG_TAG, |dev| dev.long_tag.as_str())
            }
            C::WriteLongTag => self.write_long_tag(data),
            C::ResetConfigChanged => {
                let previous = self.config_change_counter;
                self.config_change_counter = 0;
                info!("Device #{} configuration changed flag reset", self.polling_address);
                CommandResult::ok(previous.to_be_bytes().to_vec())
            }
            C::ReadAdditionalStatus => CommandResult::ok(self.additional_status()),
        };

        if let CommandStatus::InvalidData(code) = result.status {
            warn!(
                "Device #{} rejected command {} with response code {}",
                self.polling_address, command, code
            );
        }
        result
    }

    fn primary(&self) -> Variable {
        self.variables
            .get(VariableSlot::Primary)
            .unwrap_or(Variable::new(0.0, units::NOT_USED))
    }

    fn pv_out_of_limits(&self) -> bool {
        !self.in_limits(self.primary().value)
    }

    fn in_limits(&self, value: f32) -> bool {
        (self.lower_range..=self.upper_range).contains(&value)
    }

    fn touch_config_changed(&mut self) {
        self.config_change_counter = self.config_change_counter.wrapping_add(1);
    }

    fn write_polling_address(&mut self, data: &[u8]) -> CommandResult {
        let [address] = data else {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        };
        if *address > MAX_POLLING_ADDRESS {
            return CommandResult::rejected(INVALID_SELECTION);
        }

        info!(
            "Device {} polling address {} -> {}",
            self.unique_id, self.polling_address, address
        );
        self.polling_address = *address;
        self.touch_config_changed();
        CommandResult::ok(vec![*address])
    }

    fn read_device_variables(&self, data: &[u8]) -> CommandResult {
        if data.is_empty() {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        if data.len() > MAX_SLOTS_PER_REQUEST {
            return CommandResult::rejected(INVALID_SELECTION);
        }

        let mut out = Vec::with_capacity(data.len() * SlotReading::LEN);
        for &code in data {
            let slot = VariableSlot::from_code(code).and_then(|s| self.variables.get(s).map(|v| (s, v)));
            let (unit, value, status) = match slot {
                Some((VariableSlot::Primary, var)) if !self.in_limits(var.value) => {
                    (var.unit, var.value, SLOT_STATUS_OUT_OF_LIMITS)
                }
                Some((_, var)) => (var.unit, var.value, SLOT_STATUS_GOOD),
                None => (units::NOT_USED, f32::NAN, SLOT_STATUS_NOT_AVAILABLE),
            };
            out.push(code);
            out.push(unit);
            out.extend_from_slice(&value.to_be_bytes());
            out.push(status);
        }
        CommandResult::ok(out)
    }

    fn identity_if_matches(
        &self,
        data: &[u8],
        width: usize,
        field: impl Fn(&Self) -> &str,
    ) -> CommandResult {
        if data.len() != width {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        if unpack_ascii(data) != field(self) {
            return CommandResult::rejected(INVALID_SELECTION);
        }
        CommandResult::ok(self.identity().to_bytes())
    }

    fn tag_descriptor_date(&self) -> Vec<u8> {
        let mut out = pack_ascii(&self.tag, widths::TAG);
        out.extend_from_slice(&pack_ascii(&self.descriptor, widths::DESCRIPTOR));
        out.extend_from_slice(&self.date.to_bytes());
        out
    }

    fn write_message(&mut self, data: &[u8]) -> CommandResult {
        if data.len() != widths::MESSAGE {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        self.message = unpack_ascii(data);
        self.touch_config_changed();
        CommandResult::ok(pack_ascii(&self.message, widths::MESSAGE))
    }

    fn write_tag_descriptor_date(&mut self, data: &[u8]) -> CommandResult {
        if data.len() != widths::TAG_DESCRIPTOR_DATE {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        let desc_end = widths::TAG + widths::DESCRIPTOR;
        let Some(date) = Date::from_bytes(&data[desc_end..]) else {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        };

        self.tag = unpack_ascii(&data[..widths::TAG]);
        self.descriptor = unpack_ascii(&data[widths::TAG..desc_end]);
        self.date = date;
        self.touch_config_changed();
        CommandResult::ok(self.tag_descriptor_date())
    }

    fn write_serial_number(&mut self, data: &[u8]) -> CommandResult {
        if data.len() != widths::SERIAL_NUMBER {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        let Ok(number) = read_u24(data, 0, UniversalCommand::WriteSerialNumber.code()) else {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        };
        info!(
            "Device #{} serial number {} -> {}",
            self.polling_address, self.unique_id.device_id, number
        );
        self.unique_id.device_id = number;
        self.touch_config_changed();
        CommandResult::ok(u24_bytes(number).to_vec())
    }

    fn write_long_tag(&mut self, data: &[u8]) -> CommandResult {
        if data.len() != widths::LONG_TAG {
            return CommandResult::rejected(TOO_FEW_DATA_BYTES);
        }
        self.long_tag = unpack_ascii(data);
        self.touch_config_changed();
        CommandResult::ok(pack_ascii(&self.long_tag, widths::LONG_TAG))
    }

    fn additional_status(&self) -> Vec<u8> {
        let pv = self.primary().value;
        let mut out = vec![0; ADDITIONAL_STATUS_LEN];
        out[2] = OPERATING_MODE_NORMAL;
        out[3] = u8::from(self.pv_out_of_limits());
        // analog output saturated
        out[5] = u8::from(pv > self.upper_range);
        out
    }
}

fn check_width(field: &'static str, text: &str, max: usize) -> Result<(), DeviceError> {
    let len = text.chars().count();
    if len > max {
        Err(DeviceError::FieldTooLong { field, len, max })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hart_protocol::Reply;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn device(kind: DeviceKind, polling_address: u8) -> Device {
        Device::from_config(DeviceConfig {
            kind,
            polling_address,
            tag: "TAG-01".into(),
            long_tag: "PLANT A / LINE 1".into(),
            manufacturer_id: 0x4A,
            device_type: 0x10,
            serial_number: 30001,
            ..Default::default()
        })
        .unwrap()
    }

    fn parse(device: &mut Device, command: u8, data: &[u8]) -> Reply {
        let result = device.handle_command(command, data);
        assert_eq!(result.status, CommandStatus::Success);
        Reply::parse(command, &result.data).unwrap()
    }

    #[test]
    fn test_from_config_validation() {
        let err = Device::from_config(DeviceConfig {
            polling_address: 64,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, DeviceError::InvalidPollingAddress(64));

        let err = Device::from_config(DeviceConfig {
            serial_number: 0x0100_0000,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, DeviceError::InvalidDeviceId(0x0100_0000));

        let err = Device::from_config(DeviceConfig {
            tag: "TOO-LONG-TAG".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DeviceError::FieldTooLong { field: "tag", .. }));
    }

    #[test]
    fn test_unique_id_long_address() {
        let dev = device(DeviceKind::TransparencySensor, 7);
        assert_eq!(dev.unique_id().to_string(), "4A10007531");
        let long = dev.unique_id().long_address();
        assert_eq!(long.manufacturer_id, 0x0A);
        assert_eq!(long.device_type, 0x10);
        assert_eq!(long.device_id, 30001);
    }

    #[test]
    fn test_command_0_identity() {
        let mut dev = device(DeviceKind::FlowSensor, 5);
        let Reply::Identity(identity) = parse(&mut dev, 0, &[]) else {
            panic!("expected identity");
        };
        assert_eq!(identity.manufacturer_id, 0x4A);
        assert_eq!(identity.device_id, 30001);
        assert_eq!(identity.min_preambles, MIN_PREAMBLES);
        assert_eq!(UniqueId::from(identity), dev.unique_id());
    }

    #[test]
    fn test_command_1_is_idempotent() {
        let mut dev = device(DeviceKind::TemperatureSensor, 3);
        let first = dev.handle_command(1, &[]);
        let second = dev.handle_command(1, &[]);
        assert_eq!(first, second);
        assert_eq!(first.data.len(), 5);
        assert_eq!(first.data[0], units::DEGREES_CELSIUS);
        assert_eq!(dev.config_change_counter(), 0);
    }

    #[test]
    fn test_command_2_loop_current() {
        let mut dev = device(DeviceKind::TemperatureSensor, 0);
        let Reply::LoopCurrent { milliamps, percent } = parse(&mut dev, 2, &[]) else {
            panic!("expected loop current");
        };
        assert!((percent - 21.0).abs() < 1e-4);
        assert!((milliamps - (4.0 + 0.21 * 16.0)).abs() < 1e-4);

        let mut multidrop = device(DeviceKind::TemperatureSensor, 4);
        let Reply::LoopCurrent { milliamps, .. } = parse(&mut multidrop, 2, &[]) else {
            panic!("expected loop current");
        };
        assert_eq!(milliamps, 4.0);
    }

    #[test]
    fn test_command_3_lists_populated_slots() {
        let mut level = device(DeviceKind::LevelSensor, 1);
        let Reply::DynamicVariables { variables, .. } = parse(&mut level, 3, &[]) else {
            panic!("expected dynamic variables");
        };
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].unit, units::METERS);

        let mut flow = device(DeviceKind::FlowSensor, 5);
        let Reply::DynamicVariables { variables, .. } = parse(&mut flow, 3, &[]) else {
            panic!("expected dynamic variables");
        };
        let codes: Vec<u8> = variables.iter().map(|v| v.unit).collect();
        assert_eq!(
            codes,
            vec![
                units::CUBIC_METERS_PER_HOUR,
                units::CUBIC_METERS,
                units::METERS_PER_SECOND,
                units::HERTZ
            ]
        );
    }

    #[test]
    fn test_command_6_write_polling_address() {
        let mut dev = device(DeviceKind::PhSensor, 9);
        assert_eq!(
            parse(&mut dev, 6, &[12]),
            Reply::PollingAddress { address: 12 }
        );
        assert_eq!(dev.polling_address(), 12);
        assert_eq!(dev.config_change_counter(), 1);
        assert_ne!(dev.device_status() & STATUS_CONFIG_CHANGED, 0);

        let result = dev.handle_command(6, &[64]);
        assert_eq!(result.status, CommandStatus::InvalidData(INVALID_SELECTION));
        assert_eq!(dev.polling_address(), 12);

        let result = dev.handle_command(6, &[]);
        assert_eq!(result.status, CommandStatus::InvalidData(TOO_FEW_DATA_BYTES));
        assert_eq!(dev.config_change_counter(), 1);
    }

    #[test]
    fn test_command_7_and_8() {
        let mut dev = device(DeviceKind::FlowSensor, 0);
        assert_eq!(
            parse(&mut dev, 7, &[]),
            Reply::LoopConfiguration {
                polling_address: 0,
                loop_current_enabled: true
            }
        );
        assert_eq!(parse(&mut dev, 8, &[]), Reply::Classifications(vec![1, 0, 0, 0]));
    }

    #[test]
    fn test_command_9_device_variables() {
        let mut dev = device(DeviceKind::TemperatureSensor, 11);
        let Reply::DeviceVariables(slots) = parse(&mut dev, 9, &[0, 2, 3, 7]) else {
            panic!("expected device variables");
        };
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].unit, units::DEGREES_CELSIUS);
        assert_eq!(slots[0].status, SLOT_STATUS_GOOD);
        assert_eq!(slots[1].unit, units::OHMS);
        assert_eq!(slots[2].unit, units::NOT_USED);
        assert!(slots[2].value.is_nan());
        assert_eq!(slots[3].slot, 7);
        assert_eq!(slots[3].status, SLOT_STATUS_NOT_AVAILABLE);

        assert_eq!(
            dev.handle_command(9, &[]).status,
            CommandStatus::InvalidData(TOO_FEW_DATA_BYTES)
        );
        assert_eq!(
            dev.handle_command(9, &[0; 9]).status,
            CommandStatus::InvalidData(INVALID_SELECTION)
        );
    }

    #[test]
    fn test_command_11_and_21_match_tags() {
        let mut dev = device(DeviceKind::LevelSensor, 2);
        assert!(matches!(
            parse(&mut dev, 11, &pack_ascii("TAG-01", widths::TAG)),
            Reply::Identity(_)
        ));
        assert_eq!(
            dev.handle_command(11, &pack_ascii("OTHER", widths::TAG)).status,
            CommandStatus::InvalidData(INVALID_SELECTION)
        );
        assert!(matches!(
            parse(&mut dev, 21, &pack_ascii("PLANT A / LINE 1", widths::LONG_TAG)),
            Reply::Identity(_)
        ));
    }

    #[test]
    fn test_command_14_and_15_ranges() {
        let mut dev = device(DeviceKind::PhSensor, 8);
        let Reply::TransducerInfo {
            serial_number,
            unit,
            upper_limit,
            lower_limit,
            ..
        } = parse(&mut dev, 14, &[])
        else {
            panic!("expected transducer info");
        };
        assert_eq!(serial_number, 30001);
        assert_eq!(unit, units::PH);
        assert_eq!((lower_limit, upper_limit), (0.0, 14.0));

        let result = dev.handle_command(15, &[]);
        assert_eq!(result.data.len(), 17);
        assert_eq!(result.data[16], DISTRIBUTOR_NOT_USED);
        assert!(matches!(
            Reply::parse(15, &result.data).unwrap(),
            Reply::OutputInfo { unit: units::PH, damping, .. } if damping == 1.0
        ));
    }

    #[test]
    fn test_command_17_write_message() {
        let mut dev = device(DeviceKind::FlowSensor, 6);
        assert_eq!(
            dev.handle_command(17, b"SHORT").status,
            CommandStatus::InvalidData(TOO_FEW_DATA_BYTES)
        );
        assert_eq!(dev.message(), "READY");

        let request = pack_ascii("CALIBRATED 2025-08-24", widths::MESSAGE);
        let result = dev.handle_command(17, &request);
        assert_eq!(result.data, request);
        assert_eq!(
            parse(&mut dev, 12, &[]),
            Reply::Message("CALIBRATED 2025-08-24".into())
        );
    }

    #[test]
    fn test_command_18_write_tag_descriptor_date() {
        let mut dev = device(DeviceKind::TemperatureSensor, 12);
        let mut request = pack_ascii("TT-101", widths::TAG);
        request.extend_from_slice(&pack_ascii("REACTOR INLET", widths::DESCRIPTOR));
        request.extend_from_slice(&Date::new(1, 2, 2026).to_bytes());

        assert_eq!(
            dev.handle_command(18, &request[..27]).status,
            CommandStatus::InvalidData(TOO_FEW_DATA_BYTES)
        );
        assert_eq!(dev.tag(), "TAG-01");

        let result = dev.handle_command(18, &request);
        assert_eq!(result.data, request);
        assert_eq!(
            parse(&mut dev, 13, &[]),
            Reply::TagDescriptorDate {
                tag: "TT-101".into(),
                descriptor: "REACTOR INLET".into(),
                date: Date::new(1, 2, 2026),
            }
        );
    }

    #[test]
    fn test_command_19_renumbers_device() {
        let mut dev = device(DeviceKind::LevelSensor, 0);
        let before = dev.unique_id();
        assert_eq!(
            parse(&mut dev, 19, &[0x01, 0x02, 0x03]),
            Reply::SerialNumber(0x010203)
        );
        assert_eq!(dev.serial_number(), 0x010203);
        assert_eq!(parse(&mut dev, 16, &[]), Reply::SerialNumber(0x010203));

        let Reply::TransducerInfo { serial_number, .. } = parse(&mut dev, 14, &[]) else {
            panic!("expected transducer info");
        };
        assert_eq!(serial_number, 0x010203);

        let Reply::Identity(identity) = parse(&mut dev, 0, &[]) else {
            panic!("expected identity");
        };
        assert_eq!(identity.device_id, 0x010203);
        assert_eq!(
            dev.unique_id(),
            UniqueId {
                device_id: 0x010203,
                ..before
            }
        );
        assert_eq!(dev.unique_id().long_address().device_id, 0x010203);
        assert_eq!(dev.config_change_counter(), 1);
    }

    #[test]
    fn test_command_19_wrong_width_keeps_serial_number() {
        let mut dev = device(DeviceKind::LevelSensor, 0);
        for data in [&[0x01, 0x02][..], &[0x01, 0x02, 0x03, 0x04][..]] {
            assert_eq!(
                dev.handle_command(19, data).status,
                CommandStatus::InvalidData(TOO_FEW_DATA_BYTES)
            );
        }
        assert_eq!(dev.serial_number(), 30001);
        assert_eq!(dev.unique_id().device_id, 30001);
        assert_eq!(dev.config_change_counter(), 0);
    }


    #[test]
    fn test_command_22_and_38() {
        let mut dev = device(DeviceKind::PhSensor, 10);
        let request = pack_ascii("ANALYSER HOUSE 3", widths::LONG_TAG);
        assert_eq!(dev.handle_command(22, &request).data, request);
        assert_eq!(parse(&mut dev, 20, &[]), Reply::LongTag("ANALYSER HOUSE 3".into()));

        assert_eq!(parse(&mut dev, 38, &[]), Reply::ConfigChangeCounter(1));
        assert_eq!(dev.device_status() & STATUS_CONFIG_CHANGED, 0);
        assert_eq!(parse(&mut dev, 38, &[]), Reply::ConfigChangeCounter(0));
    }

    #[test]
    fn test_command_48_additional_status() {
        let mut dev = device(DeviceKind::TransparencySensor, 7);
        let Reply::AdditionalStatus(bytes) = parse(&mut dev, 48, &[]) else {
            panic!("expected additional status");
        };
        assert_eq!(bytes.len(), ADDITIONAL_STATUS_LEN);
        assert_eq!(bytes[2], OPERATING_MODE_NORMAL);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn test_unknown_command() {
        let mut dev = device(DeviceKind::LevelSensor, 0);
        let result = dev.handle_command(200, &[1, 2, 3]);
        assert_eq!(result.status, CommandStatus::CommandNotImplemented);
        assert_eq!(result.status.response_code(), COMMAND_NOT_IMPLEMENTED);
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_pv_out_of_limits_status() {
        let mut dev = Device::from_config(DeviceConfig {
            kind: DeviceKind::LevelSensor,
            base_value: Some(7.5),
            ..Default::default()
        })
        .unwrap();
        assert_ne!(dev.device_status() & STATUS_PV_OUT_OF_LIMITS, 0);
        let result = dev.handle_command(48, &[]);
        assert_eq!(result.data[3], 1);
        assert_eq!(result.data[5], 1);
    }

    #[test]
    fn test_advance_changes_readings_only_on_tick() {
        let mut dev = device(DeviceKind::FlowSensor, 5);
        let before = dev.handle_command(3, &[]);
        assert_eq!(dev.handle_command(3, &[]), before);

        let mut rng = StdRng::seed_from_u64(3);
        dev.advance(Duration::from_secs(10), &mut rng);
        assert_ne!(dev.handle_command(3, &[]), before);
    }

    fn any_kind() -> impl Strategy<Value = DeviceKind> {
        prop_oneof![
            Just(DeviceKind::LevelSensor),
            Just(DeviceKind::FlowSensor),
            Just(DeviceKind::TemperatureSensor),
            Just(DeviceKind::PhSensor),
            Just(DeviceKind::TransparencySensor),
        ]
    }

    proptest! {
        #[test]
        fn reads_never_change_replies(kind in any_kind(), command in any::<u8>(), data in prop::collection::vec(any::<u8>(), 0..40)) {
            let is_write = UniversalCommand::try_from(command).map(|c| c.is_write()).unwrap_or(false);
            prop_assume!(!is_write);

            let mut dev = device(kind, 3);
            let first = dev.handle_command(command, &data);
            let second = dev.handle_command(command, &data);
            prop_assert_eq!(first, second);
            prop_assert_eq!(dev.config_change_counter(), 0);
        }

        #[test]
        fn rejected_writes_leave_device_unchanged(command in prop::sample::select(vec![6u8, 17, 18, 19, 22]), len in 0usize..40) {
            let width = match command {
                6 => 1,
                17 => widths::MESSAGE,
                18 => widths::TAG_DESCRIPTOR_DATE,
                19 => widths::SERIAL_NUMBER,
                _ => widths::LONG_TAG,
            };
            prop_assume!(len != width);

            let mut dev = device(DeviceKind::FlowSensor, 5);
            let result = dev.handle_command(command, &vec![b'X'; len]);
            prop_assert_eq!(result.status, CommandStatus::InvalidData(TOO_FEW_DATA_BYTES));
            prop_assert_eq!(dev.config_change_counter(), 0);
            prop_assert_eq!(dev.polling_address(), 5);
            prop_assert_eq!(dev.message(), "READY");
            prop_assert_eq!(dev.tag(), "TAG-01");
            prop_assert_eq!(dev.serial_number(), 30001);
        }
    }
}
