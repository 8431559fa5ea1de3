//! Polls EPEVER solar charge controllers over RS485 and decodes their telemetry.
//!
//! The [`EpeverController`] runs a round-robin schedule over the controller's input register
//! blocks, one small group per tick, and keeps the decoded values in a [`TelemetrySnapshot`].
//! Upstream bridges talk to it through the [`PolledController`] trait only.
//!
//! [`EpeverController`]: controller/struct.EpeverController.html
//! [`TelemetrySnapshot`]: data/struct.TelemetrySnapshot.html
//! [`PolledController`]: controller/trait.PolledController.html

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate chrono;
extern crate clap;
extern crate serde;
extern crate serde_json;
extern crate tokio;
extern crate tokio_modbus;
extern crate tokio_serial;
#[cfg(feature = "gpio")]
extern crate rppal;

pub mod errors;
pub mod constants;
pub mod data;
pub mod status;
pub mod registers;
pub mod scheduler;
pub mod transceiver;
pub mod transaction;
pub mod rtu;
pub mod controller;
mod num_utils;
#[cfg(test)]
mod sim;
