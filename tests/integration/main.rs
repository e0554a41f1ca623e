//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host with no real hardware
//! or database.

mod mock_hw;
mod monitor_tests;
mod reader_tests;
mod store_tests;
