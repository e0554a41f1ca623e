//! GPIO output line through the legacy `/sys/class/gpio` interface.
//!
//! ```text
//! /sys/class/gpio/export            write "527" to claim the line
//! /sys/class/gpio/gpio527/direction "out" / "high" / "low"
//! /sys/class/gpio/gpio527/value     "0" / "1"
//! ```
//!
//! On recent kernels the sysfs number is the chip base plus the BCM
//! offset (base 512 on Pi 4/5 with 6.6 kernels, 0 on older ones).
//! A line exported by this handle is unexported again on drop; a line that
//! was already exported is left as found.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin, StatefulOutputPin};
use log::{debug, info, warn};

use crate::error::ActuatorError;

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev applies permissions shortly after export.
const EXPORT_SETTLE: Duration = Duration::from_millis(100);
const EXPORT_POLLS: u32 = 10;

#[derive(Debug, thiserror::Error)]
#[error("sysfs GPIO {line}: {source}")]
pub struct SysfsGpioError {
    line: u32,
    #[source]
    source: io::Error,
}

impl digital::Error for SysfsGpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SysfsPin {
    root: PathBuf,
    line: u32,
    value_path: PathBuf,
    exported_here: bool,
}

impl SysfsPin {
    /// Claim sysfs line `line` as an output.
    ///
    /// A line already configured as an output keeps its level, so a
    /// restart does not glitch whatever it drives. Otherwise it starts at
    /// `initial_high`.
    pub fn output(root: impl AsRef<Path>, line: u32, initial_high: bool) -> Result<Self, ActuatorError> {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(format!("gpio{line}"));
        let init_err = |what: &str, e: io::Error| ActuatorError::Init(format!("gpio{line}: {what}: {e}"));

        let exported_here = if dir.is_dir() {
            debug!("gpio{} already exported", line);
            false
        } else {
            fs::write(root.join("export"), line.to_string()).map_err(|e| init_err("export", e))?;
            true
        };

        let direction_path = dir.join("direction");
        let current = wait_readable(&direction_path).map_err(|e| init_err("direction", e))?;
        if current.trim() != "out" {
            // "high"/"low" switch to output with the level applied atomically.
            let dir_value = if initial_high { "high" } else { "low" };
            fs::write(&direction_path, dir_value).map_err(|e| init_err("direction", e))?;
        }

        info!("gpio{} configured as output", line);
        Ok(Self {
            root,
            line,
            value_path: dir.join("value"),
            exported_here,
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn write_level(&self, high: bool) -> Result<(), SysfsGpioError> {
        fs::write(&self.value_path, if high { "1" } else { "0" }).map_err(|source| SysfsGpioError {
            line: self.line,
            source,
        })
    }

    fn read_level(&self) -> Result<bool, SysfsGpioError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|source| SysfsGpioError {
            line: self.line,
            source,
        })?;
        Ok(raw.trim() == "1")
    }
}

/// Read `path`, polling briefly while udev is still fixing up permissions.
fn wait_readable(path: &Path) -> io::Result<String> {
    let mut last = None;
    for _ in 0..EXPORT_POLLS {
        match fs::read_to_string(path) {
            Ok(s) => return Ok(s),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) => {
                last = Some(e);
                thread::sleep(EXPORT_SETTLE);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
}

impl ErrorType for SysfsPin {
    type Error = SysfsGpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

impl StatefulOutputPin for SysfsPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        self.read_level().map(|high| !high)
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if !self.exported_here {
            return;
        }
        match fs::write(self.root.join("unexport"), self.line.to_string()) {
            Ok(()) => debug!("gpio{} unexported", self.line),
            Err(e) => warn!("gpio{} unexport failed: {}", self.line, e),
        }
    }
}
