//! Relay control policy.

pub mod threshold;

pub use threshold::{ActuatorCommand, ControlState, ThresholdController, Thresholds};
