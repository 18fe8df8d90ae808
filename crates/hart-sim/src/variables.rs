//! Device variables and the process model behind them
//!
//! Every device carries up to four dynamic variables. Their values only
//! change when the host calls [`ProcessModel::advance`], so reading a
//! device never changes what it reports.

use std::time::Duration;

use hart_protocol::units;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::device::DeviceKind;

/// Dynamic variable slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableSlot {
    /// Primary variable (PV)
    Primary,
    /// Secondary variable (SV)
    Secondary,
    /// Tertiary variable (TV)
    Tertiary,
    /// Quaternary variable (QV)
    Quaternary,
}

impl VariableSlot {
    /// All slots in wire order
    pub const ALL: [VariableSlot; 4] = [
        VariableSlot::Primary,
        VariableSlot::Secondary,
        VariableSlot::Tertiary,
        VariableSlot::Quaternary,
    ];

    /// Slot code used by command 9
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a slot by its command 9 code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Short name ("PV", "SV", ...)
    pub fn name(self) -> &'static str {
        match self {
            Self::Primary => "PV",
            Self::Secondary => "SV",
            Self::Tertiary => "TV",
            Self::Quaternary => "QV",
        }
    }
}

/// A value with its engineering unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Current value
    pub value: f32,
    /// Unit code
    pub unit: u8,
}

impl Variable {
    /// Create a variable
    pub fn new(value: f32, unit: u8) -> Self {
        Self { value, unit }
    }
}

/// The populated slots of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    slots: [Option<Variable>; 4],
}

impl Variables {
    /// Variable in `slot`, if the device populates it
    pub fn get(&self, slot: VariableSlot) -> Option<Variable> {
        self.slots[slot as usize]
    }

    /// Replace the variable in `slot`
    pub fn set(&mut self, slot: VariableSlot, variable: Variable) {
        self.slots[slot as usize] = Some(variable);
    }

    /// Populated slots in wire order
    pub fn populated(&self) -> impl Iterator<Item = (VariableSlot, Variable)> + '_ {
        VariableSlot::ALL
            .iter()
            .filter_map(|&slot| self.get(slot).map(|v| (slot, v)))
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns true if no slot is populated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Initial reading of a flow totalizer, m3
const TOTALIZER_START: f64 = 12_345.67;
/// Flow to velocity factor for a DN100 pipe
const FLOW_TO_VELOCITY: f32 = 28.3;

/// Process behind a device's readings
///
/// Each kind samples its slots around a nominal value. Derived slots
/// (flow velocity, Pt100 resistance, photocurrent) follow the sampled
/// primary value; the flow totalizer integrates over elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    kind: DeviceKind,
    base: f32,
    totalizer: f64,
}

impl ProcessModel {
    /// Create a model around `base` (the nominal primary value)
    pub fn new(kind: DeviceKind, base: f32) -> Self {
        Self {
            kind,
            base,
            totalizer: TOTALIZER_START,
        }
    }

    /// Nominal primary value
    pub fn base(&self) -> f32 {
        self.base
    }

    /// Readings with every slot at its nominal value
    pub fn nominal(&self) -> Variables {
        self.readings(self.base, |center, _| center)
    }

    /// Resample every slot and integrate the totalizer over `elapsed`
    pub fn advance<R: Rng>(&mut self, elapsed: Duration, rng: &mut R) -> Variables {
        let (lower, upper) = self.kind.sensor_limits();
        let noise = self.kind.primary_noise();
        let primary = (self.base + rng.gen_range(-noise..=noise)).clamp(lower, upper);

        if self.kind == DeviceKind::FlowSensor && primary > 0.0 {
            self.totalizer += f64::from(primary) * elapsed.as_secs_f64() / 3600.0;
        }

        self.readings(primary, |center, spread| {
            center + rng.gen_range(-spread..=spread)
        })
    }

    /// Build the slot set from a primary value; `jitter(center, spread)`
    /// produces the secondary readings
    fn readings(&self, primary: f32, mut jitter: impl FnMut(f32, f32) -> f32) -> Variables {
        let mut vars = Variables::default();
        vars.set(
            VariableSlot::Primary,
            Variable::new(primary, self.kind.primary_unit()),
        );

        match self.kind {
            DeviceKind::LevelSensor => {}
            DeviceKind::FlowSensor => {
                vars.set(
                    VariableSlot::Secondary,
                    Variable::new(self.totalizer as f32, units::CUBIC_METERS),
                );
                vars.set(
                    VariableSlot::Tertiary,
                    Variable::new(primary / FLOW_TO_VELOCITY, units::METERS_PER_SECOND),
                );
                vars.set(
                    VariableSlot::Quaternary,
                    Variable::new(jitter(37.5, 0.1), units::HERTZ),
                );
            }
            DeviceKind::TemperatureSensor => {
                vars.set(
                    VariableSlot::Secondary,
                    Variable::new(jitter(25.0, 0.1), units::DEGREES_CELSIUS),
                );
                vars.set(
                    VariableSlot::Tertiary,
                    Variable::new(100.0 + 0.385 * primary, units::OHMS),
                );
            }
            DeviceKind::PhSensor => {
                vars.set(
                    VariableSlot::Secondary,
                    Variable::new(jitter(22.0, 0.5), units::DEGREES_CELSIUS),
                );
                vars.set(
                    VariableSlot::Tertiary,
                    Variable::new(jitter(120_000.0, 500.0), units::KILOHMS),
                );
                vars.set(
                    VariableSlot::Quaternary,
                    Variable::new(jitter(25.0, 0.5), units::KILOHMS),
                );
            }
            DeviceKind::TransparencySensor => {
                vars.set(
                    VariableSlot::Secondary,
                    Variable::new(jitter(500.0 * primary / 100.0, 2.0), units::MILLIAMPS),
                );
                vars.set(
                    VariableSlot::Tertiary,
                    Variable::new(jitter(20.0, 0.5), units::DEGREES_CELSIUS),
                );
            }
        }

        vars
    }
}
