//! Simulated board hardware, for running the firmware logic on a host.
use crate::{
    config::Messaging,
    hal::{BusInit, InputPins},
    port::Port,
};
use embedded_hal::blocking::i2c::WriteRead;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering::*},
    Arc,
};
use tmp102::Raw;

/// An I2C bus with a single simulated TMP102 on it.
///
/// Clones share the same device, so a test can hold on to one handle to
/// change the temperature while the driver owns another.
#[derive(Clone, Debug, Default)]
pub struct SimBus {
    device: Arc<Device>,
}

#[derive(Debug)]
struct Device {
    address: u8,
    centi_celsius: AtomicI32,
    faulty: AtomicBool,
    inits: AtomicUsize,
    transfers: AtomicUsize,
    faults: AtomicUsize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("no device acknowledged address {0:#04x}")]
    Nack(u8),
    #[error("unsupported register {0:#04x}")]
    Register(u8),
    #[error("bus fault")]
    Fault,
}

/// Expansion port GPIO that records how it was configured.
#[derive(Debug, Default)]
pub struct SimPins {
    configured: Mutex<Vec<Port>>,
}

/// A messaging client that goes online as soon as it is started.
#[derive(Debug, Default)]
pub struct SimMessaging {
    online: AtomicBool,
    starts: AtomicUsize,
}

// === impl SimBus ===

impl SimBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature the sensor will measure, in hundredths of a
    /// degree. Readings are truncated to the sensor's 0.0625 degree steps,
    /// and pinned to its -128 to 127.9375 degree range.
    pub fn set_temperature(&self, centi_celsius: i32) {
        self.device.centi_celsius.store(centi_celsius, Release);
    }

    /// While `faulty` is set, every transfer fails.
    pub fn set_faulty(&self, faulty: bool) {
        self.device.faulty.store(faulty, Release);
    }

    #[must_use]
    pub fn inits(&self) -> usize {
        self.device.inits.load(Acquire)
    }

    /// Returns the number of successful transfers so far.
    #[must_use]
    pub fn transfers(&self) -> usize {
        self.device.transfers.load(Acquire)
    }

    #[must_use]
    pub fn faults(&self) -> usize {
        self.device.faults.load(Acquire)
    }
}

impl BusInit for SimBus {
    fn init(&mut self) -> anyhow::Result<()> {
        self.device.inits.fetch_add(1, AcqRel);
        log::debug!("simulated I2C bus initialized");
        Ok(())
    }
}

impl WriteRead for SimBus {
    type Error = SimError;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), SimError> {
        let device = &self.device;
        if device.faulty.load(Acquire) {
            device.faults.fetch_add(1, AcqRel);
            return Err(SimError::Fault);
        }
        if address != device.address {
            return Err(SimError::Nack(address));
        }
        match bytes {
            [0x00] => {}
            [register, ..] => return Err(SimError::Register(*register)),
            [] => return Err(SimError::Register(0xff)),
        }

        let raw = Raw::from_centi_celsius(device.centi_celsius.load(Acquire)).to_bytes();
        for (dst, src) in buffer.iter_mut().zip(raw) {
            *dst = src;
        }
        device.transfers.fetch_add(1, AcqRel);
        Ok(())
    }
}

impl Default for Device {
    fn default() -> Self {
        Self {
            address: tmp102::DEFAULT_ADDRESS,
            // room temperature
            centi_celsius: AtomicI32::new(2100),
            faulty: AtomicBool::new(false),
            inits: AtomicUsize::new(0),
            transfers: AtomicUsize::new(0),
            faults: AtomicUsize::new(0),
        }
    }
}

// === impl SimPins ===

impl SimPins {
    /// Returns every port configured as an input, in order.
    #[must_use]
    pub fn configured(&self) -> Vec<Port> {
        self.configured.lock().clone()
    }
}

impl InputPins for SimPins {
    fn set_input(&self, port: Port) -> anyhow::Result<()> {
        log::debug!("port {port} interrupt pin set as input");
        self.configured.lock().push(port);
        Ok(())
    }
}

// === impl SimMessaging ===

impl SimMessaging {
    /// Returns how many times the client has been started.
    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Acquire)
    }
}

impl Messaging for SimMessaging {
    fn start(&self) -> anyhow::Result<()> {
        log::info!("messaging client started");
        self.starts.fetch_add(1, AcqRel);
        self.online.store(true, Release);
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        log::info!("messaging client stopped");
        self.online.store(false, Release);
        Ok(())
    }

    fn is_online(&self) -> bool {
        self.online.load(Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmp102::Tmp102;

    #[test]
    fn reads_like_a_tmp102() {
        let mut bus = SimBus::new();
        let sensor = Tmp102::default();
        bus.set_temperature(-1250);
        assert_eq!(sensor.read_centi_celsius(&mut bus).unwrap(), -1250);
        assert_eq!(bus.transfers(), 1);
    }

    #[test]
    fn extreme_temperatures_pin_to_sensor_range() {
        let mut bus = SimBus::new();
        let sensor = Tmp102::default();
        bus.set_temperature(i32::MAX);
        assert_eq!(sensor.read_centi_celsius(&mut bus).unwrap(), 12793);
        bus.set_temperature(i32::MIN);
        assert_eq!(sensor.read_centi_celsius(&mut bus).unwrap(), -12800);
    }

    #[test]
    fn rejects_other_addresses() {
        let mut bus = SimBus::new();
        let mut buf = [0u8; 2];
        assert_eq!(
            bus.write_read(0x49, &[0x00], &mut buf),
            Err(SimError::Nack(0x49))
        );
        assert_eq!(bus.transfers(), 0);
    }

    #[test]
    fn fault_injection() {
        let mut bus = SimBus::new();
        let handle = bus.clone();
        handle.set_faulty(true);
        assert!(Tmp102::default().read_raw(&mut bus).is_err());
        assert_eq!(handle.faults(), 1);
        assert_eq!(handle.transfers(), 0);
    }
}
