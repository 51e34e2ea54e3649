//! Driver for the Thermo 3 click, a TMP102 temperature sensor board.
//!
//! While the board is active, a background task samples the sensor over the
//! shared I2C bus and tracks the highest and lowest temperatures seen. The
//! board's request handler reports them, and resets them when the request
//! carries a `clear` parameter.
use crate::{
    bus::{Busy, SharedBus},
    driver::Driver,
    hal::{BusInit, InputPins},
    http::{self, Handler, Handlers},
    port::Port,
    query::QueryParams,
    units::CentiCelsius,
};
use anyhow::Context;
use embedded_hal::blocking::i2c::WriteRead;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        mpsc::{self, RecvTimeoutError, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tmp102::Tmp102;

mod samples;
pub use self::samples::{Extremum, Report, Samples};

pub const NAME: &str = "thermo3";

const STACK_SIZE: usize = 64 * 1024;

pub struct Thermo3<I2C> {
    shared: Arc<Shared<I2C>>,
    pins: Arc<dyn InputPins>,
    handlers: Arc<Handlers>,
    task: Option<Task>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// How often the sampling task reads the sensor.
    pub poll_interval: Duration,
    /// How long a read waits for the shared bus before giving up.
    pub lock_timeout: Duration,
    /// Correction added to every reading, in hundredths of a degree.
    pub offset: i32,
    /// How often the sampling task logs the current readings.
    pub log_interval: Duration,
    pub address: u8,
}

struct Shared<I2C> {
    bus: Arc<SharedBus<I2C>>,
    sensor: Tmp102,
    config: Config,
    samples: Mutex<Samples>,
}

struct Task {
    name: &'static str,
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

struct RequestHandler<I2C>(Arc<Shared<I2C>>);

// === impl Config ===

impl Config {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    // the sensor reads about 2 degrees warm on the board.
    pub const DEFAULT_OFFSET: i32 = -200;
    pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            lock_timeout: Self::DEFAULT_POLL_INTERVAL,
            offset: Self::DEFAULT_OFFSET,
            log_interval: Self::DEFAULT_LOG_INTERVAL,
            address: tmp102::DEFAULT_ADDRESS,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(self, lock_timeout: Duration) -> Self {
        Self {
            lock_timeout,
            ..self
        }
    }

    #[must_use]
    pub const fn with_offset(self, offset: i32) -> Self {
        Self { offset, ..self }
    }

    #[must_use]
    pub const fn with_log_interval(self, log_interval: Duration) -> Self {
        Self {
            log_interval,
            ..self
        }
    }

    #[must_use]
    pub const fn with_address(self, address: u8) -> Self {
        Self { address, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// === impl Thermo3 ===

impl<I2C> Thermo3<I2C>
where
    I2C: WriteRead + BusInit + Send + 'static,
    I2C::Error: fmt::Debug,
{
    #[must_use]
    pub fn new(
        bus: Arc<SharedBus<I2C>>,
        pins: Arc<dyn InputPins>,
        handlers: Arc<Handlers>,
        config: Config,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                sensor: Tmp102::new(config.address),
                config,
                samples: Mutex::new(Samples::new(Instant::now())),
            }),
            pins,
            handlers,
            task: None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Returns the readings as they would be reported right now.
    #[must_use]
    pub fn report(&self) -> Report {
        self.shared.samples.lock().report(Instant::now())
    }
}

impl<I2C> Driver for Thermo3<I2C>
where
    I2C: WriteRead + BusInit + Send + 'static,
    I2C::Error: fmt::Debug,
{
    fn init(&mut self, name: &'static str, port: Port) -> anyhow::Result<()> {
        anyhow::ensure!(self.task.is_none(), "{NAME} is already running");
        log::info!(target: NAME, "bringing up {NAME} on port {port} as /{name}");

        self.pins
            .set_input(port)
            .with_context(|| format!("failed to configure the interrupt pin on port {port}"))?;
        self.shared.bus.init()?;
        *self.shared.samples.lock() = Samples::new(Instant::now());

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = self.shared.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .stack_size(STACK_SIZE)
            .spawn(move || shared.run(stop_rx))
            .context("failed to spawn sampling task")?;
        let task = Task {
            name,
            stop: stop_tx,
            thread,
        };

        let handler = Arc::new(RequestHandler(self.shared.clone()));
        if let Err(error) = self.handlers.add(name, handler) {
            task.stop();
            return Err(error);
        }

        self.task = Some(task);
        Ok(())
    }

    fn deinit(&mut self) -> anyhow::Result<()> {
        let Some(task) = self.task.take() else {
            anyhow::bail!("{NAME} is not running");
        };
        log::info!(target: NAME, "shutting down {NAME} (/{})", task.name);
        self.handlers.remove(task.name);
        task.stop();
        *self.shared.samples.lock() = Samples::new(Instant::now());
        Ok(())
    }
}

impl<I2C> Drop for Thermo3<I2C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.handlers.remove(task.name);
            task.stop();
        }
    }
}

impl<I2C> fmt::Debug for Thermo3<I2C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thermo3")
            .field("config", &self.shared.config)
            .field("bus", &self.shared.bus)
            .field("running", &self.task.as_ref().map(|task| task.name))
            .finish()
    }
}

// === impl Shared ===

impl<I2C> Shared<I2C>
where
    I2C: WriteRead,
    I2C::Error: fmt::Debug,
{
    /// Takes one corrected reading, waiting at most the configured lock
    /// timeout for the bus.
    fn read(&self) -> anyhow::Result<i32> {
        let reading = self
            .bus
            .try_with(self.config.lock_timeout, |i2c| {
                self.sensor.read_centi_celsius(i2c)
            })?
            .map_err(|error| anyhow::anyhow!("failed to read temperature: {error}"))?;
        Ok(reading + self.config.offset)
    }

    fn run(&self, stop: mpsc::Receiver<()>) {
        let Config {
            poll_interval,
            lock_timeout,
            offset,
            log_interval,
            ..
        } = self.config;
        log::debug!(target: NAME, "sampling every {poll_interval:?}");
        let mut last_log = Instant::now();

        loop {
            let reading = self
                .bus
                .try_with(lock_timeout, |i2c| self.sensor.read_centi_celsius(i2c));
            match reading {
                Ok(Ok(reading)) => {
                    let now = Instant::now();
                    let mut samples = self.samples.lock();
                    samples.record(reading + offset, now);
                    if now.saturating_duration_since(last_log) >= log_interval {
                        log::info!(
                            target: NAME,
                            "current: {}, high: {}, low: {}",
                            CentiCelsius(samples.current()),
                            CentiCelsius(samples.high().value),
                            CentiCelsius(samples.low().value),
                        );
                        last_log = now;
                    }
                }
                // a bad transfer tells us nothing about the temperature, so
                // the samples are left alone.
                Ok(Err(error)) => {
                    log::warn!(target: NAME, "failed to read temperature: {error}");
                }
                Err(Busy(waited)) => {
                    log::debug!(target: NAME, "bus busy for {waited:?}, skipping sample");
                    match stop.try_recv() {
                        Err(TryRecvError::Empty) => continue,
                        _ => break,
                    }
                }
            }

            match stop.recv_timeout(poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                // either we were told to stop, or the driver is gone
                _ => break,
            }
        }

        log::debug!(target: NAME, "sampling task stopped");
    }
}

// === impl Task ===

impl Task {
    fn stop(self) {
        // the task may already have exited, in which case it's not listening.
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            log::error!(target: NAME, "sampling task for /{} panicked", self.name);
        }
    }
}

// === impl RequestHandler ===

impl<I2C> Handler for RequestHandler<I2C>
where
    I2C: WriteRead + Send,
    I2C::Error: fmt::Debug,
{
    fn handle(&self, params: &QueryParams<'_>, buf: &mut [u8]) -> anyhow::Result<usize> {
        let shared = &self.0;
        if params.contains("clear") {
            let reading = shared.read();
            let now = Instant::now();
            let mut samples = shared.samples.lock();
            let reading = match reading {
                Ok(reading) => reading,
                Err(error) => {
                    log::warn!(target: NAME, "clear: {error:#}, using the last reading");
                    samples.current()
                }
            };
            samples.resync(reading, now);
            log::info!(target: NAME, "cleared high/low at {}", CentiCelsius(reading));
        }

        let report = shared.samples.lock().report(Instant::now());
        http::write_json(buf, &report)
    }
}
