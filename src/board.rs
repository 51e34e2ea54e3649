//! The clickboard drivers built into the firmware, and their startup.
use crate::{
    bus::SharedBus,
    config::{self, Messaging},
    hal::{BusInit, InputPins},
    http::Handlers,
    port::{Port, Ports},
    registry::Registry,
    thermo3::{self, Thermo3},
};
use anyhow::Context;
use embedded_hal::blocking::i2c::WriteRead;
use std::{fmt, sync::Arc};

/// Everything the request transport needs once the board is up.
#[derive(Debug)]
pub struct Board<I2C> {
    pub registry: Arc<Registry>,
    pub handlers: Arc<Handlers>,
    pub bus: Arc<SharedBus<I2C>>,
}

#[derive(Clone, Default)]
pub struct Settings {
    pub thermo3: thermo3::Config,
    pub messaging: Option<Arc<dyn Messaging>>,
}

/// Registers every driver, brings up the ones that start out active, and
/// installs the `config` handler.
///
/// The Thermo 3 click fits either port and starts out on port 2.
pub fn bringup<I2C>(
    i2c: I2C,
    pins: Arc<dyn InputPins>,
    settings: Settings,
) -> anyhow::Result<Board<I2C>>
where
    I2C: WriteRead + BusInit + Send + 'static,
    I2C::Error: fmt::Debug,
{
    let bus = Arc::new(SharedBus::new(i2c));
    let handlers = Arc::new(Handlers::new());

    let mut registry: Registry = Registry::new();
    registry
        .register(
            thermo3::NAME,
            Ports::ALL,
            Some(Port::TWO),
            Thermo3::new(bus.clone(), pins, handlers.clone(), settings.thermo3),
        )
        .context("failed to register thermo3")?;
    let registry = Arc::new(registry);

    config::init(registry.clone(), &handlers, settings.messaging)?;
    log::info!("clickboards are go! {registry:?}");

    Ok(Board {
        registry,
        handlers,
        bus,
    })
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("thermo3", &self.thermo3)
            .field("messaging", &self.messaging.is_some())
            .finish()
    }
}
