//! Engineering unit codes used by the simulated devices

/// Cubic meters per hour
pub const CUBIC_METERS_PER_HOUR: u8 = 19;
/// Meters per second
pub const METERS_PER_SECOND: u8 = 21;
/// Degrees Celsius
pub const DEGREES_CELSIUS: u8 = 32;
/// Hertz
pub const HERTZ: u8 = 38;
/// Milliamperes
pub const MILLIAMPS: u8 = 39;
/// Kilo-ohms
pub const KILOHMS: u8 = 40;
/// Ohms
pub const OHMS: u8 = 41;
/// Cubic meters
pub const CUBIC_METERS: u8 = 43;
/// Meters
pub const METERS: u8 = 44;
/// Percent
pub const PERCENT: u8 = 57;
/// pH
pub const PH: u8 = 59;
/// Not used
pub const NOT_USED: u8 = 250;

/// Short symbol for a unit code
pub fn unit_symbol(code: u8) -> &'static str {
    match code {
        CUBIC_METERS_PER_HOUR => "m3/h",
        METERS_PER_SECOND => "m/s",
        DEGREES_CELSIUS => "degC",
        HERTZ => "Hz",
        MILLIAMPS => "mA",
        KILOHMS => "kOhm",
        OHMS => "Ohm",
        CUBIC_METERS => "m3",
        METERS => "m",
        PERCENT => "%",
        PH => "pH",
        NOT_USED => "-",
        _ => "?",
    }
}
