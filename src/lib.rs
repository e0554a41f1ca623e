//! Environment monitor library.
//!
//! Reads temperature, humidity and gas concentration, persists each
//! reading to MySQL and drives a relay from threshold rules. Everything
//! hardware- or network-facing sits behind the port traits in
//! [`app::ports`], so the loop and the controller run unchanged in host
//! tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod retry;
pub mod sensors;
pub mod shutdown;
pub mod store;
