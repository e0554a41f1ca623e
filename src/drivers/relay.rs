//! Relay driver over any embedded-hal stateful output pin.
//!
//! Most hobby relay boards pull the coil in when the input is driven low;
//! set `active_low` for those. Dropping the relay switches it off.

use embedded_hal::digital::StatefulOutputPin;
use log::{info, warn};

use crate::app::ports::Actuator;
use crate::error::ActuatorError;

pub struct Relay<P: StatefulOutputPin> {
    pin: P,
    active_low: bool,
    on: bool,
}

impl<P: StatefulOutputPin> Relay<P> {
    /// Wrap `pin`. The initial state is read back from the pin, not assumed.
    pub fn new(mut pin: P, active_low: bool) -> Result<Self, ActuatorError> {
        let high = pin
            .is_set_high()
            .map_err(|e| ActuatorError::Init(format!("{e:?}")))?;
        let on = high != active_low;
        info!(
            "relay ready ({}), currently {}",
            if active_low { "active-low" } else { "active-high" },
            if on { "ON" } else { "OFF" }
        );
        Ok(Self {
            pin,
            active_low,
            on,
        })
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorError> {
        if self.is_on() == on {
            return Ok(());
        }
        let result = if on != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|e| ActuatorError::GpioWriteFailed(format!("{e:?}")))?;
        self.on = on;
        Ok(())
    }
}

impl<P: StatefulOutputPin> Actuator for Relay<P> {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        self.drive(true)
    }

    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        self.drive(false)
    }

    /// Reads the pin back so an external reset is noticed. Falls back to
    /// the last commanded state if the read fails.
    fn is_on(&mut self) -> bool {
        match self.pin.is_set_high() {
            Ok(high) => self.on = high != self.active_low,
            Err(e) => warn!("relay read-back failed, assuming {}: {:?}", self.on, e),
        }
        self.on
    }
}

impl<P: StatefulOutputPin> Drop for Relay<P> {
    fn drop(&mut self) {
        // Something else may have switched it on since the last tick.
        if self.is_on() {
            match self.drive(false) {
                Ok(()) => info!("relay switched off on release"),
                Err(e) => warn!("relay release failed: {}", e),
            }
        }
    }
}
