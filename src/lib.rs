#![doc = include_str!("../docs/README.md")]
pub mod board;
pub mod bus;
pub mod config;
pub mod driver;
pub mod hal;
pub mod http;
pub mod logger;
pub mod port;
pub mod query;
pub mod registry;
pub mod sim;
pub mod thermo3;
pub mod units;

pub use self::{
    driver::Driver,
    port::{Port, Ports},
    registry::Registry,
};
