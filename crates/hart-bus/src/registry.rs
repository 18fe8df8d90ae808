//! Slave registry
//!
//! Owns every device on the bus and resolves frame addresses to them.
//! Resolution always uses a device's current polling address, so a device
//! moved by command 6 is found at its new address immediately.

use hart_protocol::frame::MAX_POLLING_ADDRESS;
use hart_protocol::Address;
use hart_sim::Device;
use tracing::info;

use crate::error::BusError;

/// The set of devices attached to the bus
#[derive(Debug, Default)]
pub struct Registry {
    /// Devices in registration order
    devices: Vec<Device>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device at `address`
    ///
    /// The device is moved to `address` before it is stored.
    pub fn register(&mut self, address: u8, mut device: Device) -> Result<(), BusError> {
        if address > MAX_POLLING_ADDRESS {
            return Err(BusError::InvalidAddress(address));
        }
        if self.is_address_taken(address) {
            return Err(BusError::DuplicateAddress(address));
        }
        let long = device.unique_id().long_address();
        if self
            .devices
            .iter()
            .any(|d| d.unique_id().long_address() == long)
        {
            return Err(BusError::DuplicateUniqueId(device.unique_id().to_string()));
        }

        device.set_polling_address(address)?;
        info!(
            "Registered {} {} ({}) at polling address {}",
            device.manufacturer(),
            device.model(),
            device.tag(),
            address
        );
        self.devices.push(device);
        Ok(())
    }

    /// Device answering to `address`
    pub fn resolve(&self, address: &Address) -> Option<&Device> {
        self.position(address).map(|i| &self.devices[i])
    }

    /// Mutable access to the device answering to `address`
    pub(crate) fn resolve_mut(&mut self, address: &Address) -> Option<&mut Device> {
        self.position(address).map(move |i| &mut self.devices[i])
    }

    /// Device currently at `polling_address`
    pub fn at_polling_address(&self, polling_address: u8) -> Option<&Device> {
        self.resolve(&Address::short(polling_address))
    }

    /// Whether a device occupies `polling_address`
    pub fn is_address_taken(&self, polling_address: u8) -> bool {
        self.at_polling_address(polling_address).is_some()
    }

    /// All devices in registration order
    pub fn list_all(&self) -> &[Device] {
        &self.devices
    }

    /// Mutable iterator over all devices
    pub(crate) fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no device is registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn position(&self, address: &Address) -> Option<usize> {
        match address {
            Address::Short(short) => self
                .devices
                .iter()
                .position(|d| d.polling_address() == short.polling),
            Address::Long(long) => self
                .devices
                .iter()
                .position(|d| d.unique_id().long_address() == *long),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hart_sim::{DeviceConfig, DeviceKind};

    fn device(serial_number: u32) -> Device {
        Device::from_config(DeviceConfig {
            kind: DeviceKind::TemperatureSensor,
            manufacturer_id: 0x2A,
            device_type: 0x06,
            serial_number,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry.register(3, device(1)).unwrap();
        registry.register(0, device(2)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.resolve(&Address::short(3)).unwrap().serial_number(),
            1
        );
        assert!(registry.resolve(&Address::short(4)).is_none());

        let long = Address::long(0x2A, 0x06, 2);
        assert_eq!(registry.resolve(&long).unwrap().polling_address(), 0);
        assert!(registry.resolve(&Address::long(0x2A, 0x06, 3)).is_none());

        let order: Vec<u32> = registry.list_all().iter().map(|d| d.serial_number()).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_register_rejects_conflicts() {
        let mut registry = Registry::new();
        registry.register(1, device(1)).unwrap();

        assert_eq!(
            registry.register(64, device(2)),
            Err(BusError::InvalidAddress(64))
        );
        assert_eq!(
            registry.register(1, device(2)),
            Err(BusError::DuplicateAddress(1))
        );
        assert!(matches!(
            registry.register(2, device(1)),
            Err(BusError::DuplicateUniqueId(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_moves_device() {
        let mut registry = Registry::new();
        let dev = device(9);
        assert_eq!(dev.polling_address(), 0);
        registry.register(12, dev).unwrap();
        assert!(registry.is_address_taken(12));
        assert!(!registry.is_address_taken(0));
    }

    #[test]
    fn test_resolution_follows_address_change() {
        let mut registry = Registry::new();
        registry.register(5, device(1)).unwrap();

        let dev = registry.resolve_mut(&Address::short(5)).unwrap();
        dev.handle_command(6, &[20]);

        assert!(registry.resolve(&Address::short(5)).is_none());
        assert!(registry.resolve(&Address::short(20)).is_some());
    }
}
