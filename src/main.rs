//! Runs the clickboard stack against simulated hardware.
//!
//! Each line read from stdin is handled as a request URI, such as
//! `/config?port1=thermo3` or `/thermo3?clear`, and the response is printed.
use anyhow::Context;
use clickboards::{
    board::{self, Settings},
    http::RESPONSE_BUF_LEN,
    logger,
    sim::{SimBus, SimMessaging, SimPins},
};
use std::{
    io::{self, BufRead},
    sync::Arc,
};

fn main() -> anyhow::Result<()> {
    logger::init().context("failed to install logger")?;
    log::info!("clickboards is go!");

    let settings = Settings {
        messaging: Some(Arc::new(SimMessaging::default())),
        ..Default::default()
    };
    let board = board::bringup(SimBus::new(), Arc::new(SimPins::default()), settings)
        .context("failed to bring up board")?;

    let mut buf = [0u8; RESPONSE_BUF_LEN];
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read request")?;
        let uri = line.trim();
        if uri.is_empty() {
            continue;
        }

        match board.handlers.handle_uri(uri, &mut buf) {
            Ok(len) => println!("{}", String::from_utf8_lossy(&buf[..len])),
            Err(error) => log::warn!("{uri}: {error:#}"),
        }
    }

    Ok(())
}
