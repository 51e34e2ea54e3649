//! Name-keyed request handlers.
//!
//! The HTTP transport itself lives outside this crate: it hands each request
//! to [`Handlers::handle_uri`] along with a response buffer, and sends back
//! however many bytes the handler wrote.
use crate::query::QueryParams;
use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;
use std::{fmt, io::Cursor, sync::Arc};

/// The maximum number of handlers that may be registered at once.
pub const MAX_HANDLERS: usize = 8;

/// The size of the response buffer the transport gives each handler.
pub const RESPONSE_BUF_LEN: usize = 512;

pub trait Handler: Send + Sync {
    /// Handles a request, writing the response body into `buf`.
    ///
    /// Returns the number of bytes written.
    fn handle(&self, params: &QueryParams<'_>, buf: &mut [u8]) -> anyhow::Result<usize>;
}

pub struct Handlers {
    handlers: Mutex<heapless::Vec<(&'static str, Arc<dyn Handler>), MAX_HANDLERS>>,
}

impl Handlers {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: parking_lot::const_mutex(heapless::Vec::new()),
        }
    }

    /// Registers `handler` under `name`, replacing any handler already
    /// registered under that name.
    pub fn add(&self, name: &'static str, handler: Arc<dyn Handler>) -> anyhow::Result<()> {
        let mut handlers = self.handlers.lock();
        if let Some(slot) = handlers.iter_mut().find(|(n, _)| *n == name) {
            log::debug!("replacing handler for /{name}");
            slot.1 = handler;
            return Ok(());
        }

        if handlers.push((name, handler)).is_err() {
            anyhow::bail!("cannot add handler for /{name}: all {MAX_HANDLERS} handler slots are in use");
        }
        log::debug!("added handler for /{name}");
        Ok(())
    }

    /// Removes the handler registered under `name`, returning whether there
    /// was one.
    pub fn remove(&self, name: &str) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(idx) = handlers.iter().position(|(n, _)| *n == name) else {
            return false;
        };
        handlers.swap_remove(idx);
        log::debug!("removed handler for /{name}");
        true
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses `query` and passes it to the handler registered under `name`.
    pub fn handle(&self, name: &str, query: &str, buf: &mut [u8]) -> anyhow::Result<usize> {
        // the table lock must not be held while the handler runs: handlers may
        // activate drivers, which register handlers of their own.
        let handler = self
            .get(name)
            .with_context(|| format!("no handler for /{name}"))?;
        let params = QueryParams::parse(query);
        log::trace!("/{name}: {params:?}");
        handler
            .handle(&params, buf)
            .with_context(|| format!("handling /{name}"))
    }

    /// Handles a request URI of the form `/name?query`.
    pub fn handle_uri(&self, uri: &str, buf: &mut [u8]) -> anyhow::Result<usize> {
        let uri = uri.trim_start_matches('/');
        let (name, query) = uri.split_once('?').unwrap_or((uri, ""));
        self.handle(name, query, buf)
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .lock()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, handler)| handler.clone())
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.lock().iter().map(|(name, _)| name))
            .finish()
    }
}

impl<F> Handler for F
where
    F: Fn(&QueryParams<'_>, &mut [u8]) -> anyhow::Result<usize> + Send + Sync,
{
    fn handle(&self, params: &QueryParams<'_>, buf: &mut [u8]) -> anyhow::Result<usize> {
        self(params, buf)
    }
}

/// Serializes `value` as JSON into `buf`, returning the number of bytes
/// written.
pub fn write_json<T: Serialize + ?Sized>(buf: &mut [u8], value: &T) -> anyhow::Result<usize> {
    let capacity = buf.len();
    let mut cursor = Cursor::new(buf);
    serde_json::to_writer(&mut cursor, value)
        .with_context(|| format!("response does not fit in {capacity} bytes"))?;
    Ok(cursor.position() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> Arc<dyn Handler> {
        Arc::new(|params: &QueryParams<'_>, buf: &mut [u8]| {
            let keys: Vec<&str> = params.iter().map(|param| param.key).collect();
            write_json(buf, &keys)
        })
    }

    #[test]
    fn dispatches_by_name() {
        let handlers = Handlers::new();
        handlers.add("echo", echo_handler()).unwrap();

        let mut buf = [0u8; 64];
        let len = handlers.handle("echo", "a=1&b", &mut buf).unwrap();
        assert_eq!(&buf[..len], br#"["a","b"]"#);

        let len = handlers.handle_uri("/echo?clear", &mut buf).unwrap();
        assert_eq!(&buf[..len], br#"["clear"]"#);

        let len = handlers.handle_uri("/echo", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"[]");
    }

    #[test]
    fn unknown_handler() {
        let handlers = Handlers::new();
        let mut buf = [0u8; 16];
        assert!(handlers.handle("nope", "", &mut buf).is_err());
    }

    #[test]
    fn add_replaces_and_remove() {
        let handlers = Handlers::new();
        handlers.add("echo", echo_handler()).unwrap();
        handlers
            .add(
                "echo",
                Arc::new(|_: &QueryParams<'_>, buf: &mut [u8]| write_json(buf, "replaced")),
            )
            .unwrap();
        assert_eq!(handlers.len(), 1);

        let mut buf = [0u8; 16];
        let len = handlers.handle("echo", "", &mut buf).unwrap();
        assert_eq!(&buf[..len], br#""replaced""#);

        assert!(handlers.remove("echo"));
        assert!(!handlers.remove("echo"));
        assert!(!handlers.contains("echo"));
        assert!(handlers.is_empty());
    }

    #[test]
    fn table_is_bounded() {
        const NAMES: [&str; MAX_HANDLERS + 1] = ["a", "b", "c", "d", "e", "f", "g", "h", "i"];
        let handlers = Handlers::new();
        for &name in &NAMES[..MAX_HANDLERS] {
            handlers.add(name, echo_handler()).unwrap();
        }
        assert!(handlers.add(NAMES[MAX_HANDLERS], echo_handler()).is_err());
        // replacing an existing handler still works when the table is full
        handlers.add("a", echo_handler()).unwrap();
    }

    #[test]
    fn write_json_respects_capacity() {
        let mut buf = [0u8; 8];
        assert!(write_json(&mut buf, "this does not fit").is_err());
        assert_eq!(write_json(&mut buf, &42).unwrap(), 2);
        assert_eq!(&buf[..2], b"42");
    }
}
