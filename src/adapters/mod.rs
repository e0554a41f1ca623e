//! Adapters: concrete implementations of the port traits that do not
//! drive hardware.
//!
//! | Adapter    | Implements | Connects to              |
//! |------------|------------|--------------------------|
//! | `log_sink` | EventSink  | `log` facade             |
//! | `signal`   | -          | SIGINT / SIGTERM         |
//! | `time`     | Clock      | system clock, or manual  |

pub mod log_sink;
pub mod signal;
pub mod time;
