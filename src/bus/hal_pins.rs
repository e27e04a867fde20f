//! Portable pin backend
//!
//! Drives every bus line through its own `embedded_hal` output pin. Slower
//! than whole-port writes but independent of how the MCU groups its pins.

use super::{BusControl, BusLines};
use crate::chip::{ChipId, CHIP_COUNT};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Indicator LED pins and their polarity.
pub struct Indicators<P> {
    pins: [P; CHIP_COUNT],
    active_low: bool,
}

impl<P> Indicators<P> {
    /// One LED per chip.
    pub fn new(pins: [P; CHIP_COUNT], active_low: bool) -> Self {
        Indicators { pins, active_low }
    }
}

/// Bus backend over individual output pins.
///
/// Pin errors are dropped: a bus write has no failure path, and the GPIO
/// implementations this targets are infallible.
pub struct HalPins<P, D> {
    data: [P; 8],
    bc1: P,
    bdir: P,
    select: [P; 3],
    indicators: Option<Indicators<P>>,
    delay: D,
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    let _ = pin.set_state(high.into());
}

impl<P: OutputPin, D: DelayNs> HalPins<P, D> {
    /// Take ownership of the bus pins (data LSB first) and a delay source.
    pub fn new(data: [P; 8], bc1: P, bdir: P, select: [P; 3], delay: D) -> Self {
        HalPins {
            data,
            bc1,
            bdir,
            select,
            indicators: None,
            delay,
        }
    }

    /// Attach per-chip activity LEDs.
    pub fn with_indicators(mut self, indicators: Indicators<P>) -> Self {
        self.indicators = Some(indicators);
        self
    }

    /// Release all pins and the delay source.
    #[allow(clippy::type_complexity)]
    pub fn release(self) -> ([P; 8], P, P, [P; 3], Option<Indicators<P>>, D) {
        (
            self.data,
            self.bc1,
            self.bdir,
            self.select,
            self.indicators,
            self.delay,
        )
    }
}

impl<P: OutputPin, D: DelayNs> BusLines for HalPins<P, D> {
    fn set_select(&mut self, code: u8) {
        for (bit, pin) in self.select.iter_mut().enumerate() {
            drive(pin, code & (1 << bit) != 0);
        }
    }

    fn set_data(&mut self, value: u8) {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            drive(pin, value & (1 << bit) != 0);
        }
    }

    fn set_control(&mut self, control: BusControl) {
        if control.bdir() {
            drive(&mut self.bc1, control.bc1());
            drive(&mut self.bdir, true);
        } else {
            drive(&mut self.bdir, false);
            drive(&mut self.bc1, control.bc1());
        }
    }

    fn latch_delay(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn set_indicator(&mut self, chip: ChipId, on: bool) {
        if let Some(indicators) = self.indicators.as_mut() {
            let level = on != indicators.active_low;
            drive(&mut indicators.pins[chip.index()], level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, SelectWiring};
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    /// Pin that logs its transitions into a shared wire log.
    struct LogPin {
        name: &'static str,
        log: Rc<RefCell<Vec<(&'static str, bool)>>>,
    }

    impl embedded_hal::digital::ErrorType for LogPin {
        type Error = Infallible;
    }

    impl OutputPin for LogPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push((self.name, false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push((self.name, true));
            Ok(())
        }
    }

    struct CountingDelay(Rc<RefCell<u32>>);

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            *self.0.borrow_mut() += ns;
        }
    }

    const DATA_NAMES: [&str; 8] = ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7"];

    fn board() -> (
        HalPins<LogPin, CountingDelay>,
        Rc<RefCell<Vec<(&'static str, bool)>>>,
        Rc<RefCell<u32>>,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let waited = Rc::new(RefCell::new(0));
        let pin = |name| LogPin {
            name,
            log: Rc::clone(&log),
        };
        let lines = HalPins::new(
            DATA_NAMES.map(pin),
            pin("bc1"),
            pin("bdir"),
            ["sel_a", "sel_b", "sel_c"].map(pin),
            CountingDelay(Rc::clone(&waited)),
        )
        .with_indicators(Indicators::new(["led0", "led1", "led2"].map(pin), true));
        (lines, log, waited)
    }

    #[test]
    fn test_bc1_rises_before_and_falls_after_bdir() {
        let (lines, log, _) = board();
        let mut bus = Bus::new(lines, SelectWiring::Direct);
        log.borrow_mut().clear();
        bus.write(ChipId::YM0, 0x08, 0x0F);

        let control: Vec<_> = log
            .borrow()
            .iter()
            .filter(|(name, _)| *name == "bc1" || *name == "bdir")
            .copied()
            .collect();
        assert_eq!(
            control,
            vec![
                ("bc1", true),
                ("bdir", true),
                ("bdir", false),
                ("bc1", false),
                ("bc1", false),
                ("bdir", true),
                ("bdir", false),
                ("bc1", false),
            ]
        );
    }

    #[test]
    fn test_latch_delay_reaches_delay_source() {
        let (lines, _, waited) = board();
        let mut bus = Bus::new(lines, SelectWiring::Direct);
        bus.write(ChipId::YM1, 0x00, 0x10);
        assert_eq!(*waited.borrow(), 2 * crate::bus::LATCH_DELAY_NS);
    }

    #[test]
    fn test_data_and_select_bits() {
        let (mut lines, log, _) = board();
        lines.set_data(0b1000_0001);
        lines.set_select(0b101);

        let log = log.borrow();
        assert!(log.contains(&("d0", true)));
        assert!(log.contains(&("d1", false)));
        assert!(log.contains(&("d7", true)));
        assert!(log.contains(&("sel_a", true)));
        assert!(log.contains(&("sel_b", false)));
        assert!(log.contains(&("sel_c", true)));
    }

    #[test]
    fn test_indicator_polarity() {
        let (mut lines, log, _) = board();
        lines.set_indicator(ChipId::YM2, true);
        assert_eq!(log.borrow().last(), Some(&("led2", false)));
    }
}
