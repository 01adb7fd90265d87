// SPDX-License-Identifier: Apache-2.0

//! Status indicator driven by the serial interrupt handler
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};

/// All states for the status LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusLedStates {
    /// Off
    Normal,
    /// Lit. Received bytes were dropped and not yet acknowledged.
    Overrun,
}

/// Overrun indicator on a single active-high pin
pub struct StatusLed<P> {
    /// Current LED state
    state: StatusLedStates,
    /// Output pin driving the LED
    pin: P,
}

impl<P: OutputPin> StatusLed<P> {
    /// Take ownership of `pin` and drive it low.
    pub fn init(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self {
            state: StatusLedStates::Normal,
            pin,
        })
    }

    /// Current LED state
    pub fn state(&self) -> StatusLedStates {
        self.state
    }

    /// Light the LED. Does nothing if it is already lit.
    pub fn set_overrun(&mut self) -> Result<(), P::Error> {
        self.set(StatusLedStates::Overrun)
    }

    /// Turn the LED off. Does nothing if it is already off.
    pub fn set_normal(&mut self) -> Result<(), P::Error> {
        self.set(StatusLedStates::Normal)
    }

    /// Release the pin
    pub fn free(self) -> P {
        self.pin
    }

    /// Drive the pin for `state` if it differs from the current one
    fn set(&mut self, state: StatusLedStates) -> Result<(), P::Error> {
        if self.state == state {
            return Ok(());
        }

        let level = match state {
            StatusLedStates::Normal => PinState::Low,
            StatusLedStates::Overrun => PinState::High,
        };
        self.pin.set_state(level)?;
        self.state = state;
        Ok(())
    }
}

/// Stand-in pin for a serial port without a status LED
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatusLed;

impl ErrorType for NoStatusLed {
    type Error = Infallible;
}

impl OutputPin for NoStatusLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pin that records its level and every transition
    #[derive(Default)]
    struct RecordingPin {
        high: bool,
        transitions: usize,
    }

    impl ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.transitions += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.transitions += 1;
            Ok(())
        }
    }

    #[test]
    fn init_drives_low() {
        let led = StatusLed::init(RecordingPin {
            high: true,
            transitions: 0,
        })
        .unwrap();
        assert_eq!(led.state(), StatusLedStates::Normal);
        let pin = led.free();
        assert!(!pin.high);
        assert_eq!(pin.transitions, 1);
    }

    #[test]
    fn repeated_states_do_not_toggle_pin() {
        let mut led = StatusLed::init(RecordingPin::default()).unwrap();
        led.set_overrun().unwrap();
        led.set_overrun().unwrap();
        assert_eq!(led.state(), StatusLedStates::Overrun);
        led.set_normal().unwrap();
        led.set_normal().unwrap();
        assert_eq!(led.state(), StatusLedStates::Normal);

        let pin = led.free();
        assert!(!pin.high);
        // init, overrun, normal
        assert_eq!(pin.transitions, 3);
    }
}
