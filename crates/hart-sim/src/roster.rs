//! Default device roster
//!
//! Fifteen instruments on polling addresses 0..=14: five radar level
//! transmitters, two magnetic flow meters, one turbidity analyser, three
//! pH analysers and four temperature transmitters.

use crate::device::{DeviceConfig, DeviceKind};

struct Family {
    kind: DeviceKind,
    count: u8,
    tag_prefix: &'static str,
    model: &'static str,
    manufacturer: &'static str,
    manufacturer_id: u8,
    device_type: u8,
    serial_base: u32,
}

const FAMILIES: [Family; 5] = [
    Family {
        kind: DeviceKind::LevelSensor,
        count: 5,
        tag_prefix: "LVL",
        model: "VEGAPULS 64",
        manufacturer: "Vega",
        manufacturer_id: 0x3E,
        device_type: 0xE9,
        serial_base: 10000,
    },
    Family {
        kind: DeviceKind::FlowSensor,
        count: 2,
        tag_prefix: "FLW",
        model: "8732E",
        manufacturer: "Rosemount",
        manufacturer_id: 0x1A,
        device_type: 0x32,
        serial_base: 20005,
    },
    Family {
        kind: DeviceKind::TransparencySensor,
        count: 1,
        tag_prefix: "TRS",
        model: "InPro 8000",
        manufacturer: "Mettler",
        manufacturer_id: 0x4A,
        device_type: 0x10,
        serial_base: 30000,
    },
    Family {
        kind: DeviceKind::PhSensor,
        count: 3,
        tag_prefix: "PH",
        model: "Liquiline",
        manufacturer: "Endress+Hauser",
        manufacturer_id: 0x11,
        device_type: 0x15,
        serial_base: 40008,
    },
    Family {
        kind: DeviceKind::TemperatureSensor,
        count: 4,
        tag_prefix: "TEMP",
        model: "SITRANS TH",
        manufacturer: "Siemens",
        manufacturer_id: 0x2A,
        device_type: 0x06,
        serial_base: 50011,
    },
];

/// Nominal primary value for the `index`-th device (from 1) of a kind
fn base_value(kind: DeviceKind, index: u8) -> f32 {
    match kind {
        DeviceKind::LevelSensor => 2.0 + f32::from(index) * 0.5,
        DeviceKind::FlowSensor if index == 2 => 52.0,
        _ => kind.default_base(),
    }
}

/// Configurations of the fifteen default devices in polling address order
pub fn default_roster() -> Vec<DeviceConfig> {
    let mut configs = Vec::with_capacity(15);
    let mut address = 0u8;

    for family in &FAMILIES {
        for index in 1..=family.count {
            configs.push(DeviceConfig {
                kind: family.kind,
                polling_address: address,
                tag: format!("{}-{:03}", family.tag_prefix, index),
                descriptor: family.model.to_string(),
                model: family.model.to_string(),
                manufacturer: family.manufacturer.to_string(),
                manufacturer_id: family.manufacturer_id,
                device_type: family.device_type,
                serial_number: family.serial_base + u32::from(index),
                base_value: Some(base_value(family.kind, index)),
                ..Default::default()
            });
            address += 1;
        }
    }

    configs
}
