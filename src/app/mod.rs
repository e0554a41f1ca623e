//! Application core: the monitor loop and the ports it talks through.
//!
//! Nothing in here touches hardware or the network. All interaction goes
//! through the **port traits** defined in [`ports`], keeping this layer
//! testable with mock adapters.

pub mod events;
pub mod ports;
pub mod reading;
pub mod service;
