use crate::hal::BusInit;
use anyhow::Context;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering::*},
    time::Duration,
};

/// An I2C bus shared between every driver whose board is wired to it.
///
/// Both expansion ports sit on the same bus, so drivers never own the bus
/// driver. Instead, they borrow it for a single transfer at a time using
/// [`SharedBus::try_with`], which gives up if the bus stays busy for longer
/// than a bounded wait.
pub struct SharedBus<I2C> {
    bus: Mutex<I2C>,
    initialized: AtomicBool,
}

/// Returned when the bus lock could not be acquired in time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("I2C bus still busy after {0:?}")]
pub struct Busy(pub Duration);

impl<I2C> SharedBus<I2C> {
    #[must_use]
    pub fn new(bus: I2C) -> Self {
        Self {
            bus: Mutex::new(bus),
            initialized: AtomicBool::new(false),
        }
    }

    /// Runs `f` with exclusive access to the bus, waiting at most `timeout`
    /// for the bus to become free.
    ///
    /// The lock is released as soon as `f` returns, or if it panics, so `f`
    /// should perform one transfer and nothing else.
    pub fn try_with<R>(&self, timeout: Duration, f: impl FnOnce(&mut I2C) -> R) -> Result<R, Busy> {
        let mut bus = self.bus.try_lock_for(timeout).ok_or(Busy(timeout))?;
        Ok(f(&mut bus))
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Acquire)
    }
}

impl<I2C: BusInit> SharedBus<I2C> {
    /// Initializes the bus driver, unless a previous call already has.
    ///
    /// Every driver calls this when it is brought up; only the first call
    /// touches the hardware. If initialization fails, the next call tries
    /// again.
    pub fn init(&self) -> anyhow::Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let mut bus = self.bus.lock();
        // someone else may have initialized the bus while we were waiting for
        // the lock.
        if self.is_initialized() {
            return Ok(());
        }

        bus.init().context("failed to initialize I2C bus")?;
        self.initialized.store(true, Release);
        log::info!("initialized shared I2C bus");
        Ok(())
    }
}

impl<I2C> fmt::Debug for SharedBus<I2C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBus")
            .field("locked", &self.bus.is_locked())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
