//! The `config` request handler, which binds drivers to ports at runtime.
//!
//! `/config?port1=thermo3` activates the `thermo3` driver on port 1, evicting
//! whatever was there; `/config?port2=none` frees port 2. Every response
//! lists each driver's available and active ports.
use crate::{
    http::{self, Handler, Handlers},
    port::{Port, NUM_PORTS},
    query::QueryParams,
    registry::{Registry, MAX_DRIVERS},
};
use anyhow::Context;
use serde::Serialize;
use std::{fmt, sync::Arc};

pub const NAME: &str = "config";

/// The query key for each port, in port order.
pub const PORT_KEYS: [&str; NUM_PORTS as usize] = ["port1", "port2"];

/// The port key value that frees a port.
pub const NONE: &str = "none";

pub const MQTT_KEY: &str = "mqtt_active";

/// The messaging (MQTT) client, which can be switched on and off through the
/// config handler.
pub trait Messaging: Send + Sync {
    fn start(&self) -> anyhow::Result<()>;
    fn stop(&self) -> anyhow::Result<()>;
    fn is_online(&self) -> bool;
}

pub struct ConfigHandler<const SIZE: usize = MAX_DRIVERS> {
    registry: Arc<Registry<SIZE>>,
    messaging: Option<Arc<dyn Messaging>>,
}

#[derive(Serialize)]
struct Response<'a, const SIZE: usize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    mqtt_online: Option<u8>,
    clickboards: &'a Registry<SIZE>,
}

/// Brings up every driver registered as active, then installs the config
/// handler.
pub fn init<const SIZE: usize>(
    registry: Arc<Registry<SIZE>>,
    handlers: &Handlers,
    messaging: Option<Arc<dyn Messaging>>,
) -> anyhow::Result<()> {
    registry
        .init_all()
        .context("failed to bring up clickboards")?;
    handlers.add(NAME, Arc::new(ConfigHandler::new(registry, messaging)))
}

// === impl ConfigHandler ===

impl<const SIZE: usize> ConfigHandler<SIZE> {
    #[must_use]
    pub fn new(registry: Arc<Registry<SIZE>>, messaging: Option<Arc<dyn Messaging>>) -> Self {
        Self {
            registry,
            messaging,
        }
    }

    /// Applies the port and messaging settings in `params`.
    ///
    /// Bad settings are logged and skipped; the rest of the request is still
    /// applied.
    pub fn apply(&self, params: &QueryParams<'_>) {
        for (key, port) in PORT_KEYS.iter().zip(Port::all()) {
            match params.value(key) {
                None => {}
                Some(NONE) => self.free(port),
                Some(name) => self.activate(name, port),
            }
        }

        let Some(messaging) = &self.messaging else {
            return;
        };
        if params.contains(MQTT_KEY) {
            let result = if params.value(MQTT_KEY) == Some("true") {
                messaging.start()
            } else {
                messaging.stop()
            };
            if let Err(error) = result {
                log::warn!("{MQTT_KEY}: {error:?}");
            }
        }
    }

    fn activate(&self, name: &str, port: Port) {
        let Some(id) = self.registry.find_by_name(name) else {
            log::warn!("port {port}: no clickboard named {name:?}");
            return;
        };
        if let Err(error) = self.registry.activate(id, port) {
            log::warn!("port {port}: {error}");
        }
    }

    fn free(&self, port: Port) {
        match self.registry.deactivate_port(port) {
            Ok(Some(_)) => {}
            Ok(None) => log::debug!("port {port} is already free"),
            Err(error) => log::warn!("port {port}: {error}"),
        }
    }
}

impl<const SIZE: usize> Handler for ConfigHandler<SIZE> {
    fn handle(&self, params: &QueryParams<'_>, buf: &mut [u8]) -> anyhow::Result<usize> {
        self.apply(params);
        let response = Response {
            mqtt_online: self
                .messaging
                .as_ref()
                .map(|messaging| u8::from(messaging.is_online())),
            clickboards: &self.registry,
        };
        http::write_json(buf, &response)
    }
}

impl<const SIZE: usize> fmt::Debug for ConfigHandler<SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigHandler")
            .field("registry", &self.registry)
            .field("messaging", &self.messaging.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::RESPONSE_BUF_LEN,
        port::Ports,
        registry::tests::{assert_invariants, Event, Events, FakeDriver},
        sim::SimMessaging,
    };
    use std::{sync::Barrier, thread};

    struct Fixture {
        events: Events,
        registry: Arc<Registry>,
        handlers: Handlers,
        messaging: Arc<SimMessaging>,
    }

    impl Fixture {
        /// `a` can go anywhere and starts out on port 2; `b` only fits port 1.
        fn new(with_messaging: bool) -> Self {
            let events = Events::default();
            let mut registry: Registry = Registry::new();
            registry
                .register("a", Ports::ALL, Some(Port::TWO), FakeDriver::new(&events))
                .unwrap();
            registry
                .register("b", Port::ONE.mask(), None, FakeDriver::new(&events))
                .unwrap();
            let registry = Arc::new(registry);

            let messaging = Arc::new(SimMessaging::default());
            let handlers = Handlers::new();
            let dyn_messaging: Option<Arc<dyn Messaging>> = if with_messaging {
                Some(messaging.clone())
            } else {
                None
            };
            init(registry.clone(), &handlers, dyn_messaging).unwrap();

            Self {
                events,
                registry,
                handlers,
                messaging,
            }
        }

        fn request(&self, query: &str) -> String {
            let mut buf = [0u8; RESPONSE_BUF_LEN];
            let len = self.handlers.handle(NAME, query, &mut buf).unwrap();
            String::from_utf8(buf[..len].to_vec()).unwrap()
        }

        fn drain(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock())
        }

        fn active(&self, name: &str) -> Ports {
            let id = self.registry.find_by_name(name).unwrap();
            self.registry.status(id).unwrap().active
        }
    }

    #[test]
    fn init_brings_up_active_drivers() {
        let fixture = Fixture::new(false);
        assert!(fixture.handlers.contains(NAME));
        assert_eq!(fixture.drain(), vec![Event::Init("a", Port::TWO)]);
        assert_eq!(
            fixture.request(""),
            r#"{"clickboards":[{"name":"a","available":3,"active":2},{"name":"b","available":1,"active":0}]}"#
        );
    }

    #[test]
    fn port_key_activates_driver() {
        let fixture = Fixture::new(false);
        fixture.drain();

        fixture.request("port1=b");
        assert_eq!(fixture.drain(), vec![Event::Init("b", Port::ONE)]);
        assert_eq!(fixture.active("b"), Port::ONE.mask());
        assert_eq!(fixture.active("a"), Port::TWO.mask());
    }

    #[test]
    fn activation_evicts_and_moves() {
        let fixture = Fixture::new(false);
        fixture.request("port1=b");
        fixture.drain();

        // `a` moves from port 2 to port 1, evicting `b`
        fixture.request("port1=a");
        assert_eq!(
            fixture.drain(),
            vec![
                Event::Deinit("b"),
                Event::Deinit("a"),
                Event::Init("a", Port::ONE),
            ]
        );
        assert_eq!(fixture.active("a"), Port::ONE.mask());
        assert!(fixture.active("b").is_empty());
        assert_eq!(fixture.registry.find_active_on_port(Port::TWO), None);
    }

    #[test]
    fn none_frees_port() {
        let fixture = Fixture::new(false);
        fixture.drain();

        let response = fixture.request("port2=none");
        assert_eq!(fixture.drain(), vec![Event::Deinit("a")]);
        assert!(fixture.active("a").is_empty());
        assert!(response.contains(r#"{"name":"a","available":3,"active":0}"#));

        // freeing an empty port is fine
        fixture.request("port2=none&port1=none");
        assert!(fixture.drain().is_empty());
    }

    #[test]
    fn freeing_a_port_races_with_moving_its_driver() {
        let fixture = Fixture::new(false);
        let barrier = Barrier::new(2);

        for _ in 0..200 {
            fixture.request("port1=a");
            assert_eq!(fixture.active("a"), Port::ONE.mask());

            // whichever request goes first, `a` must end up on port 2: freeing
            // port 1 must never take down `a` after it has moved away.
            thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    fixture.request("port1=none");
                });
                scope.spawn(|| {
                    barrier.wait();
                    fixture.request("port2=a");
                });
            });

            assert_eq!(fixture.active("a"), Port::TWO.mask());
            assert_eq!(fixture.registry.find_active_on_port(Port::ONE), None);
            assert_invariants(&*fixture.registry);
        }
    }

    #[test]
    fn bad_settings_are_skipped() {
        let fixture = Fixture::new(false);
        fixture.drain();

        // `b` does not fit port 2, `c` does not exist, and a key without a
        // value is ignored, but port 1 is still applied.
        fixture.request("port2=b&port1=c&port1");
        fixture.request("port2&port1=a");
        assert_eq!(
            fixture.drain(),
            vec![Event::Deinit("a"), Event::Init("a", Port::ONE)]
        );
    }

    #[test]
    fn applies_both_ports() {
        let fixture = Fixture::new(false);
        fixture.drain();

        fixture.request("port2=none&port1=b");
        assert_eq!(
            fixture.drain(),
            vec![Event::Init("b", Port::ONE), Event::Deinit("a")]
        );
    }

    #[test]
    fn mqtt_active() {
        let fixture = Fixture::new(true);
        assert!(fixture.request("").starts_with(r#"{"mqtt_online":0,"#));

        assert!(fixture
            .request("mqtt_active=true")
            .starts_with(r#"{"mqtt_online":1,"#));
        assert_eq!(fixture.messaging.starts(), 1);

        assert!(fixture
            .request("mqtt_active=false")
            .starts_with(r#"{"mqtt_online":0,"#));

        fixture.request("mqtt_active=true");
        assert!(fixture
            .request("mqtt_active=yes")
            .starts_with(r#"{"mqtt_online":0,"#));
        assert_eq!(fixture.messaging.starts(), 2);
    }

    #[test]
    fn mqtt_without_messaging() {
        let fixture = Fixture::new(false);
        let response = fixture.request("mqtt_active=true");
        assert!(!response.contains("mqtt_online"));
        assert_eq!(fixture.messaging.starts(), 0);
    }
}
