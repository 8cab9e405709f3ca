//! GPIO binary output
//!
//! Drives a clamp valve, relay or lamp from a GPIO pin, directly or via a
//! driver transistor. Valve boards are often active-low.

use embedded_hal::digital::OutputPin;
use kerfline_core::traits::BinaryOutput;

/// GPIO binary output
///
/// The pin can be configured as active-high (default) or active-low.
pub struct GpioOutput<P> {
    pin: P,
    /// If true, output active = pin LOW
    inverted: bool,
    /// Current logical state
    active: bool,
}

impl<P: OutputPin> GpioOutput<P> {
    /// Create a new output, driven to `initial`
    pub fn new(pin: P, inverted: bool, initial: bool) -> Self {
        let mut output = Self {
            pin,
            inverted,
            active: !initial,
        };
        output.drive(initial);
        output
    }

    /// Active-high output, initially inactive
    pub fn active_high(pin: P) -> Self {
        Self::new(pin, false, false)
    }

    /// Active-low output, initially inactive
    pub fn active_low(pin: P) -> Self {
        Self::new(pin, true, false)
    }

    fn drive(&mut self, active: bool) {
        // Pin errors are not recoverable here; the logical state still
        // tracks the command
        let _ = if active != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        self.active = active;
    }
}

impl<P: OutputPin> BinaryOutput for GpioOutput<P> {
    fn set(&mut self, active: bool) {
        if active != self.active {
            self.drive(active);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Mock GPIO pin that counts writes
    struct MockPin {
        high: bool,
        writes: u32,
    }

    impl MockPin {
        fn new() -> Self {
            Self {
                high: false,
                writes: 0,
            }
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_active_high_output() {
        let mut out = GpioOutput::active_high(MockPin::new());

        assert!(!out.is_active());
        assert!(!out.pin.high);

        out.extend();
        assert!(out.is_active());
        assert!(out.pin.high);

        out.retract();
        assert!(!out.is_active());
        assert!(!out.pin.high);
    }

    #[test]
    fn test_active_low_output() {
        let mut out = GpioOutput::active_low(MockPin::new());

        // Inactive drives the pin high
        assert!(!out.is_active());
        assert!(out.pin.high);

        out.on();
        assert!(out.is_active());
        assert!(!out.pin.high);

        out.toggle();
        assert!(!out.is_active());
        assert!(out.pin.high);
    }

    #[test]
    fn test_repeated_commands_do_not_rewrite() {
        let mut out = GpioOutput::new(MockPin::new(), true, true);
        assert!(out.is_active());
        let writes = out.pin.writes;

        out.extend();
        out.extend();
        assert_eq!(out.pin.writes, writes);

        out.retract();
        assert_eq!(out.pin.writes, writes + 1);
    }

    #[test]
    fn test_output_trait() {
        fn check_output<O: BinaryOutput>(o: &mut O) {
            assert!(!o.is_active());
            o.set(true);
            assert!(o.is_active());
        }

        let mut out = GpioOutput::active_high(MockPin::new());
        check_output(&mut out);
    }
}
