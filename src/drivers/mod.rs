//! Output drivers: sysfs GPIO lines and the relay on top of them.

pub mod relay;
pub mod sysfs_gpio;
