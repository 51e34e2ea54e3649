use crate::{
    driver::Driver,
    port::{Port, Ports},
};
use parking_lot::Mutex;
use serde::{ser::SerializeSeq, Serialize, Serializer};
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering::*},
};

/// The default number of drivers a [`Registry`] can hold.
pub const MAX_DRIVERS: usize = 4;

/// The set of clickboard drivers built into the firmware, and which port
/// each one is active on.
///
/// Drivers are registered once, at startup, while the registry is still
/// uniquely owned; after that the list is fixed and only the active ports
/// change. Every port is owned by at most one active driver, and every driver
/// is active on at most one port.
pub struct Registry<const SIZE: usize = MAX_DRIVERS> {
    descriptors: Mutex<heapless::Vec<Descriptor, SIZE>>,
    /// Set once `init_all` has brought the drivers up.
    started: AtomicBool,
}

/// A handle to a driver in a [`Registry`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DriverId(usize);

/// A snapshot of a driver's port bindings.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Status {
    pub name: &'static str,
    pub available: Ports,
    pub active: Ports,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("cannot register {name}: all driver slots are in use")]
    Full { name: &'static str },
    #[error("no driver registered as {0:?}")]
    UnknownDriver(DriverId),
    #[error("{name} is not available on port {port}")]
    Unavailable { name: &'static str, port: Port },
    #[error("{name} is already active on port {port}")]
    AlreadyActive { name: &'static str, port: Port },
    #[error("{name} is not active")]
    Inactive { name: &'static str },
    #[error("{name} and {other} are both active on port {port}")]
    PortConflict {
        name: &'static str,
        other: &'static str,
        port: Port,
    },
}

struct Descriptor {
    name: &'static str,
    driver: Box<dyn Driver>,
    available: Ports,
    active: Ports,
}

impl<const SIZE: usize> Registry<SIZE> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            descriptors: parking_lot::const_mutex(heapless::Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Adds a driver to the registry.
    ///
    /// `available` is the set of ports the board can be plugged into, and
    /// `active` is the port it should be brought up on by
    /// [`init_all`](Self::init_all), if any.
    pub fn register(
        &mut self,
        name: &'static str,
        available: Ports,
        active: Option<Port>,
        driver: impl Driver + 'static,
    ) -> Result<DriverId, Error> {
        if let Some(port) = active {
            if !available.contains(port) {
                return Err(Error::Unavailable { name, port });
            }
        }

        let descriptors = self.descriptors.get_mut();
        let id = DriverId(descriptors.len());
        descriptors
            .push(Descriptor {
                name,
                driver: Box::new(driver),
                available,
                active: active.map(Port::mask).unwrap_or(Ports::NONE),
            })
            .map_err(|_| Error::Full { name })?;
        log::debug!("registered {name} (available: {available:?}, active: {active:?})");
        Ok(id)
    }

    /// Brings up every driver that was registered as active.
    ///
    /// This runs once at startup, before any requests are served. No two
    /// drivers may start out active on the same port; if they do, nothing is
    /// initialized, and a later call may try again. Once startup has
    /// succeeded, further calls do nothing.
    pub fn init_all(&self) -> Result<(), Error> {
        let mut descriptors = self.descriptors.lock();
        // only read and written with the descriptors locked
        if self.started.load(Acquire) {
            log::debug!("drivers already started");
            return Ok(());
        }

        for (i, descriptor) in descriptors.iter().enumerate() {
            for port in descriptor.active.iter() {
                if let Some(other) = descriptors[..i].iter().find(|d| d.active.contains(port)) {
                    return Err(Error::PortConflict {
                        name: descriptor.name,
                        other: other.name,
                        port,
                    });
                }
            }
        }

        for descriptor in descriptors.iter_mut() {
            if let Some(port) = descriptor.active.single() {
                descriptor.init(port);
            }
        }

        self.started.store(true, Release);
        Ok(())
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<DriverId> {
        self.descriptors
            .lock()
            .iter()
            .position(|d| d.name == name)
            .map(DriverId)
    }

    #[must_use]
    pub fn find_active_on_port(&self, port: Port) -> Option<DriverId> {
        find_active_on_port(&self.descriptors.lock(), port)
    }

    /// Activates a driver on `port`.
    ///
    /// Whichever driver currently occupies `port` is deactivated first. If
    /// this driver is already active on another port, it is deactivated there
    /// before being brought up on `port`.
    pub fn activate(&self, id: DriverId, port: Port) -> Result<(), Error> {
        let mut descriptors = self.descriptors.lock();
        let descriptor = descriptors.get(id.0).ok_or(Error::UnknownDriver(id))?;
        let name = descriptor.name;
        if !descriptor.available.contains(port) {
            return Err(Error::Unavailable { name, port });
        }
        if descriptor.active.contains(port) {
            return Err(Error::AlreadyActive { name, port });
        }

        if let Some(DriverId(occupant)) = find_active_on_port(&descriptors, port) {
            let occupant = &mut descriptors[occupant];
            log::info!("{} is active on port {port}, deactivating it for {name}", occupant.name);
            // already known to be active
            let _ = occupant.deactivate();
        }

        let descriptor = &mut descriptors[id.0];
        if !descriptor.active.is_empty() {
            // a driver only runs on one port at a time.
            let _ = descriptor.deactivate();
        }

        descriptor.active = port.mask();
        descriptor.init(port);
        Ok(())
    }

    /// Deactivates a driver. Fails if the driver is not active.
    pub fn deactivate(&self, id: DriverId) -> Result<(), Error> {
        let mut descriptors = self.descriptors.lock();
        descriptors
            .get_mut(id.0)
            .ok_or(Error::UnknownDriver(id))?
            .deactivate()
    }

    /// Deactivates whichever driver is active on `port`, returning it, or
    /// `None` if the port was already free.
    ///
    /// The lookup and the deactivation happen under the same lock, so a
    /// driver that concurrently moves to another port is left alone.
    pub fn deactivate_port(&self, port: Port) -> Result<Option<DriverId>, Error> {
        let mut descriptors = self.descriptors.lock();
        let Some(id) = find_active_on_port(&descriptors, port) else {
            return Ok(None);
        };
        descriptors[id.0].deactivate()?;
        Ok(Some(id))
    }

    #[must_use]
    pub fn status(&self, id: DriverId) -> Option<Status> {
        self.descriptors.lock().get(id.0).map(Descriptor::status)
    }

    #[must_use]
    pub fn statuses(&self) -> heapless::Vec<Status, SIZE> {
        self.descriptors.lock().iter().map(Descriptor::status).collect()
    }

    #[must_use]
    pub fn name(&self, id: DriverId) -> Option<&'static str> {
        self.descriptors.lock().get(id.0).map(|d| d.name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        SIZE
    }
}

fn find_active_on_port(descriptors: &[Descriptor], port: Port) -> Option<DriverId> {
    descriptors
        .iter()
        .position(|d| d.active.contains(port))
        .map(DriverId)
}

impl<const SIZE: usize> Default for Registry<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> fmt::Debug for Registry<SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.statuses().iter()).finish()
    }
}

impl<const SIZE: usize> Serialize for Registry<SIZE> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let statuses = self.statuses();
        let mut seq = serializer.serialize_seq(Some(statuses.len()))?;
        for status in &statuses {
            seq.serialize_element(status)?;
        }
        seq.end()
    }
}

// === impl Descriptor ===

impl Descriptor {
    fn status(&self) -> Status {
        Status {
            name: self.name,
            available: self.available,
            active: self.active,
        }
    }

    fn init(&mut self, port: Port) {
        log::info!("activating {} on port {port}", self.name);
        // the port stays claimed even if the driver fails to come up, so that
        // it can still be deactivated and re-activated later.
        if let Err(error) = self.driver.init(self.name, port) {
            log::warn!("failed to initialize {} on port {port}: {error:?}", self.name);
        }
    }

    fn deactivate(&mut self) -> Result<(), Error> {
        if self.active.is_empty() {
            return Err(Error::Inactive { name: self.name });
        }

        log::info!("deactivating {}", self.name);
        if let Err(error) = self.driver.deinit() {
            log::warn!("failed to deinitialize {}: {error:?}", self.name);
        }
        self.active = Ports::NONE;
        Ok(())
    }
}
