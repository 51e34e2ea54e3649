use crate::port::Port;

/// The capabilities every clickboard driver exposes to the
/// [`Registry`](crate::registry::Registry).
///
/// The registry guarantees that `init` is only called for a port the driver
/// is available on, and that no other driver is active on that port at the
/// same time.
pub trait Driver: Send {
    /// Brings the board up on `port`, under `name`.
    ///
    /// Drivers with a request handler register it under `name`. Calling `init`
    /// on a driver that is already running fails.
    fn init(&mut self, name: &'static str, port: Port) -> anyhow::Result<()>;

    /// Shuts the board down, so that it can be initialized again later,
    /// possibly on a different port. Fails if the driver is not running.
    fn deinit(&mut self) -> anyhow::Result<()>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn init(&mut self, name: &'static str, port: Port) -> anyhow::Result<()> {
        (**self).init(name, port)
    }

    fn deinit(&mut self) -> anyhow::Result<()> {
        (**self).deinit()
    }
}
