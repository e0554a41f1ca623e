//! Pin numbering for the Raspberry Pi 40-pin header.
//!
//! Every hardware handle is given an explicit [`PinNumbering`] with its pin
//! number; there is no process-wide mode. Everything is resolved to the
//! BCM (SoC GPIO) number, which is what the kernel uses.

use serde::Deserialize;

use crate::error::ConfigError;

/// Relay coil driver, BCM numbering.
pub const RELAY_BCM: u8 = 15;

/// Highest GPIO exposed on the header.
const MAX_BCM: u8 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinNumbering {
    /// SoC GPIO numbers (`GPIO15`).
    #[default]
    Bcm,
    /// Physical header positions (`pin 10`).
    Board,
}

/// Physical header pin → BCM GPIO. Power and ground pins are absent.
const BOARD_TO_BCM: [(u8, u8); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

impl PinNumbering {
    /// Resolve `pin` in this numbering to a BCM GPIO number.
    pub fn to_bcm(self, pin: u8) -> Result<u8, ConfigError> {
        match self {
            Self::Bcm if pin <= MAX_BCM => Ok(pin),
            Self::Bcm => Err(ConfigError::invalid(
                "hardware.relay_pin",
                format!("GPIO{pin} is not on the header (0-{MAX_BCM})"),
            )),
            Self::Board => BOARD_TO_BCM
                .iter()
                .find(|(board, _)| *board == pin)
                .map(|&(_, bcm)| bcm)
                .ok_or_else(|| {
                    ConfigError::invalid(
                        "hardware.relay_pin",
                        format!("header pin {pin} is not a GPIO"),
                    )
                }),
        }
    }
}
