//! Debounced digital input
//!
//! A raw pin level only becomes the stable level after it has held steady
//! for the debounce interval. Edges are reported for exactly one update,
//! the one in which the stable level changed.

use embedded_hal::digital::InputPin;
use kerfline_core::scheduler::elapsed;
use kerfline_core::traits::DigitalInput;

/// Debounced input over an `embedded-hal` pin
pub struct DebouncedInput<P> {
    pin: P,
    /// If true, input active = pin LOW (pull-up sensors)
    inverted: bool,
    interval_ms: u32,
    /// Last raw logical sample and when it was first seen
    raw: bool,
    raw_since_ms: u64,
    stable: bool,
    rose: bool,
    fell: bool,
}

impl<P: InputPin> DebouncedInput<P> {
    /// Create a debounced input
    ///
    /// The stable level is seeded from the pin so a switch already held at
    /// power-up reads active without producing an edge.
    pub fn new(mut pin: P, inverted: bool, interval_ms: u32) -> Self {
        let level = Self::sample(&mut pin, inverted).unwrap_or(false);
        Self {
            pin,
            inverted,
            interval_ms,
            raw: level,
            raw_since_ms: 0,
            stable: level,
            rose: false,
            fell: false,
        }
    }

    /// Active-high input (switch to VCC with pull-down)
    pub fn active_high(pin: P, interval_ms: u32) -> Self {
        Self::new(pin, false, interval_ms)
    }

    /// Active-low input (open-collector sensor with pull-up)
    pub fn active_low(pin: P, interval_ms: u32) -> Self {
        Self::new(pin, true, interval_ms)
    }

    fn sample(pin: &mut P, inverted: bool) -> Option<bool> {
        pin.is_high().ok().map(|high| high != inverted)
    }
}

impl<P: InputPin> DigitalInput for DebouncedInput<P> {
    fn update(&mut self, now_ms: u64) {
        self.rose = false;
        self.fell = false;

        // A failed read leaves the last sample in place
        if let Some(level) = Self::sample(&mut self.pin, self.inverted) {
            if level != self.raw {
                self.raw = level;
                self.raw_since_ms = now_ms;
            }
        }

        if self.raw != self.stable && elapsed(now_ms, self.raw_since_ms) >= self.interval_ms as u64
        {
            self.stable = self.raw;
            self.rose = self.stable;
            self.fell = !self.stable;
        }
    }

    fn level(&self) -> bool {
        self.stable
    }

    fn rose(&self) -> bool {
        self.rose
    }

    fn fell(&self) -> bool {
        self.fell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Mock input pin for testing
    struct MockPin {
        high: bool,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    fn input(high: bool, inverted: bool) -> DebouncedInput<MockPin> {
        DebouncedInput::new(MockPin { high }, inverted, 5)
    }

    #[test]
    fn test_seeded_level_has_no_edge() {
        let mut sw = input(true, false);
        assert!(sw.level());
        sw.update(0);
        assert!(sw.level());
        assert!(!sw.rose());
        assert!(!sw.fell());
    }

    #[test]
    fn test_rise_after_interval() {
        let mut sw = input(false, false);
        sw.update(0);

        sw.pin.high = true;
        sw.update(10);
        assert!(!sw.level());
        sw.update(14);
        assert!(!sw.level());

        sw.update(15);
        assert!(sw.level());
        assert!(sw.rose());
        assert!(!sw.fell());

        // Edge lasts a single update
        sw.update(16);
        assert!(sw.level());
        assert!(!sw.rose());
    }

    #[test]
    fn test_bounce_is_filtered() {
        let mut sw = input(false, false);
        for t in 0..20u64 {
            sw.pin.high = t % 2 == 0;
            sw.update(t);
            assert!(!sw.level());
            assert!(!sw.rose());
        }
    }

    #[test]
    fn test_fall() {
        let mut sw = input(true, false);
        sw.pin.high = false;
        sw.update(100);
        sw.update(105);
        assert!(!sw.level());
        assert!(sw.fell());
        assert!(!sw.rose());
    }

    #[test]
    fn test_active_low_sensor() {
        let mut sensor = input(false, true);
        // Pin low means the sensor is active
        assert!(sensor.level());

        sensor.pin.high = true;
        sensor.update(0);
        sensor.update(5);
        assert!(!sensor.level());
        assert!(sensor.fell());
    }
}
