//! Simulator session
//!
//! [`Simulator`] is the entry point for hosts: it owns the bus and the
//! master, scans the bus, sends commands and advances the simulated
//! process.

use std::time::Duration;

use hart_protocol::{Address, Frame, LongAddress, Reply, UniversalCommand};
use hart_sim::{Device, DeviceKind, UniqueId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimulatorConfig;
use crate::engine::{Bus, Outcome, Transaction};
use crate::error::BusError;
use crate::master::{CommandArgs, FrameFormat, Master, MasterSettings};

/// One device found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Polling address
    pub address: u8,
    /// Unique identifier reported by command 0
    pub unique_id: UniqueId,
    /// Sensor kind
    pub kind: DeviceKind,
    /// Tag
    pub tag: String,
    /// Model name
    pub model: String,
    /// Manufacturer name
    pub manufacturer: String,
}

/// A running bus simulation
#[derive(Debug)]
pub struct Simulator {
    bus: Bus,
    master: Master,
    rng: StdRng,
}

impl Simulator {
    /// Create a simulator and attach the configured devices
    pub fn new(config: SimulatorConfig) -> Result<Self, BusError> {
        let mut sim = Self {
            bus: Bus::new(),
            master: Master::with_settings(config.master)?,
            rng: StdRng::seed_from_u64(config.seed),
        };
        for device in config.devices {
            let address = device.polling_address;
            sim.register(address, Device::from_config(device)?)?;
        }
        info!("Simulator started with {} devices", sim.bus.registry().len());
        Ok(sim)
    }

    /// Attach a device at `address`
    pub fn register(&mut self, address: u8, device: Device) -> Result<(), BusError> {
        self.bus.register(address, device)
    }

    /// The bus
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The master
    pub fn master(&self) -> &Master {
        &self.master
    }

    /// Current master settings
    pub fn settings(&self) -> &MasterSettings {
        self.master.settings()
    }

    /// Set the number of preambles sent with each request
    pub fn set_preambles(&mut self, count: u8) -> Result<(), BusError> {
        self.master.set_preambles(count)
    }

    /// Select short or long frames
    pub fn set_frame_format(&mut self, format: FrameFormat) {
        self.master.set_frame_format(format);
    }

    /// Set or clear the primary master bit
    pub fn set_primary_master(&mut self, primary: bool) {
        self.master.set_primary_master(primary);
    }

    /// Identify every device on the bus
    ///
    /// Sends command 0 with a short frame to each registered device in
    /// registration order and records the reported identities for long
    /// frame addressing.
    pub fn scan(&mut self) -> Vec<ScanEntry> {
        let addresses: Vec<u8> = self
            .bus
            .registry()
            .list_all()
            .iter()
            .map(Device::polling_address)
            .collect();

        let entries: Vec<ScanEntry> = addresses
            .into_iter()
            .filter_map(|address| self.identify(address))
            .collect();

        info!("Scan found {} devices", entries.len());
        entries
    }

    /// Send a command to the device at `polling_address`
    ///
    /// In long frame mode the device's unique identifier is read with a
    /// short command 0 first if the master does not know it yet.
    pub fn send(
        &mut self,
        polling_address: u8,
        command: u8,
        args: CommandArgs,
    ) -> Result<Transaction, BusError> {
        if self.master.settings().frame_format == FrameFormat::Long
            && self.master.lookup(polling_address).is_none()
        {
            debug!("Probing polling address {} for its unique identifier", polling_address);
            self.identify(polling_address);
        }

        let request = self.master.build_request(polling_address, command, &args)?;
        Ok(self.run(&request))
    }

    /// Send a command to an explicit address
    pub fn send_to(
        &mut self,
        address: Address,
        command: u8,
        args: CommandArgs,
    ) -> Result<Transaction, BusError> {
        let request = self.master.build_request_to(address, command, &args)?;
        Ok(self.run(&request))
    }

    /// Send raw request bytes
    pub fn send_raw(&mut self, bytes: &[u8]) -> Transaction {
        let tx = self.bus.transact_bytes(bytes);
        self.observe(&tx);
        tx
    }

    /// Advance every device's process by `elapsed`
    pub fn tick(&mut self, elapsed: Duration) {
        for device in self.bus.registry_mut().devices_mut() {
            device.advance(elapsed, &mut self.rng);
        }
    }

    fn run(&mut self, request: &Frame) -> Transaction {
        let tx = self.bus.transact(request);
        self.observe(&tx);
        tx
    }

    /// Keep the master's directory in step with what went over the bus
    fn observe(&mut self, tx: &Transaction) {
        if tx.outcome != Outcome::Ok {
            return;
        }
        let (Some(request), Some(response)) = (&tx.request, &tx.response) else {
            return;
        };

        match UniversalCommand::try_from(request.command) {
            Ok(UniversalCommand::WritePollingAddress) => {
                let Some(&new_address) = response.data().first() else {
                    return;
                };
                match request.address {
                    Address::Short(old) => self.master.relocate(old.polling, new_address),
                    Address::Long(long) => self.master.learn(new_address, long),
                }
            }
            Ok(UniversalCommand::WriteSerialNumber) => {
                let Ok(Reply::SerialNumber(device_id)) =
                    Reply::parse(request.command, response.data())
                else {
                    return;
                };
                match request.address {
                    Address::Short(short) => {
                        if let Some(known) = self.master.lookup(short.polling) {
                            self.master
                                .learn(short.polling, LongAddress { device_id, ..known });
                        }
                    }
                    Address::Long(long) => {
                        self.master.renumber(long, LongAddress { device_id, ..long })
                    }
                }
            }
            Ok(
                UniversalCommand::ReadUniqueId
                | UniversalCommand::ReadUniqueIdByTag
                | UniversalCommand::ReadUniqueIdByLongTag,
            ) => {
                if let (Address::Short(short), Ok(Reply::Identity(identity))) =
                    (request.address, Reply::parse(request.command, response.data()))
                {
                    self.master.learn(short.polling, identity.long_address());
                }
            }
            _ => {}
        }
    }

    fn identify(&mut self, address: u8) -> Option<ScanEntry> {
        let request = Frame::request(
            Address::short(address),
            UniversalCommand::ReadUniqueId.code(),
            Vec::new(),
        )
        .with_preambles(self.master.settings().preamble_count)
        .with_primary_master(self.master.settings().primary_master);
        let tx = self.run(&request);

        if tx.outcome != Outcome::Ok {
            debug!("No identity at polling address {}: {}", address, tx.outcome.name());
            return None;
        }
        let identity = match Reply::parse(request.command, tx.response_data()) {
            Ok(Reply::Identity(identity)) => identity,
            Ok(other) => {
                warn!("Unexpected reply to command 0: {:?}", other);
                return None;
            }
            Err(e) => {
                warn!("Bad identity from polling address {}: {}", address, e);
                return None;
            }
        };

        let device = self.bus.registry().at_polling_address(address)?;
        Some(ScanEntry {
            address,
            unique_id: UniqueId::from(identity),
            kind: device.kind(),
            tag: device.tag().to_string(),
            model: device.model().to_string(),
            manufacturer: device.manufacturer().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> Simulator {
        Simulator::new(SimulatorConfig::default()).unwrap()
    }

    #[test]
    fn test_scan_learns_identities() {
        let mut sim = simulator();
        let entries = sim.scan();
        assert_eq!(entries.len(), 15);
        assert_eq!(entries[0].model, "VEGAPULS 64");
        assert_eq!(entries[7].unique_id.manufacturer_id, 0x4A);
        assert_eq!(
            sim.master().lookup(7),
            Some(LongAddress {
                manufacturer_id: 0x0A,
                device_type: 0x10,
                device_id: 30001,
            })
        );
    }

    #[test]
    fn test_long_send_probes_first() {
        let mut sim = simulator();
        sim.set_frame_format(FrameFormat::Long);

        let tx = sim.send(11, 1, CommandArgs::None).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert!(tx.request.unwrap().is_long_format());

        assert_eq!(
            sim.send(40, 1, CommandArgs::None),
            Err(BusError::UnknownDevice(40))
        );
    }

    #[test]
    fn test_directory_follows_address_change() {
        let mut sim = simulator();
        sim.scan();
        let long = sim.master().lookup(3).unwrap();

        let tx = sim.send(3, 6, CommandArgs::PollingAddress(40)).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert_eq!(sim.master().lookup(3), None);
        assert_eq!(sim.master().lookup(40), Some(long));

        sim.set_frame_format(FrameFormat::Long);
        let tx = sim.send(40, 6, CommandArgs::PollingAddress(41)).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert_eq!(sim.master().lookup(40), None);
        assert_eq!(sim.master().lookup(41), Some(long));
    }

    #[test]
    fn test_directory_follows_serial_number_change() {
        let mut sim = simulator();
        sim.scan();
        let long = sim.master().lookup(7).unwrap();

        let tx = sim.send(7, 19, CommandArgs::SerialNumber(31000)).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert_eq!(
            sim.master().lookup(7),
            Some(LongAddress {
                device_id: 31000,
                ..long
            })
        );

        sim.set_frame_format(FrameFormat::Long);
        let tx = sim.send(7, 19, CommandArgs::SerialNumber(32000)).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert_eq!(tx.request.unwrap().address, Address::long(0x0A, 0x10, 31000));
        assert_eq!(tx.response.unwrap().address, Address::long(0x0A, 0x10, 32000));

        let tx = sim.send(7, 1, CommandArgs::None).unwrap();
        assert_eq!(tx.outcome, Outcome::Ok);
        assert_eq!(tx.request.unwrap().address, Address::long(0x0A, 0x10, 32000));
    }

    #[test]
    fn test_tick_is_reproducible() {
        let mut a = simulator();
        let mut b = simulator();
        a.tick(Duration::from_secs(1));
        b.tick(Duration::from_secs(1));

        let read = |sim: &mut Simulator| sim.send(5, 3, CommandArgs::None).unwrap().response_bytes;
        assert_eq!(read(&mut a), read(&mut b));
    }
}
