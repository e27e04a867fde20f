//! Parallel Bus Driver
//!
//! Addresses one of three chips through a 3-line select decoder and runs the
//! YM2149 two-phase write cycle (address latch, then data latch) over a
//! shared 8-bit data bus and the BDIR/BC1 control lines.
//!
//! The protocol lives in [`Bus`]; the physical signalling lives behind the
//! [`BusLines`] trait so the frame decoder and scheduler never see which
//! backend is wired in:
//! - [`port_io::PortLines`] (`port-io` feature): cycle-exact whole-port writes
//! - [`hal_pins::HalPins`] (`hal-pins` feature): portable per-pin writes
//! - [`recording::RecordingLines`]: simulated chips for tests and the host bench

#[cfg(feature = "hal-pins")]
pub mod hal_pins;
#[cfg(feature = "port-io")]
pub mod port_io;
pub mod recording;

use crate::chip::{ChipId, CHIP_COUNT};
use serde::{Deserialize, Serialize};

/// Minimum time each latch strobe is held, in nanoseconds.
///
/// The YM2149 needs a few hundred nanoseconds of BDIR high to latch either
/// phase. Backends realize this with `DelayNs`, never with a counted loop.
pub const LATCH_DELAY_NS: u32 = 250;

/// Register address bits the chip decodes during the address phase.
pub const ADDRESS_MASK: u8 = 0x1F;

/// PSG bus mode as decoded from BDIR/BC1 (BC2 tied high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusControl {
    /// BDIR=0, BC1=0: chip ignores the bus
    #[default]
    Inactive,
    /// BDIR=1, BC1=1: chip latches the register address
    LatchAddress,
    /// BDIR=1, BC1=0: chip latches data into the addressed register
    Write,
}

impl BusControl {
    /// Level of the BDIR line in this mode.
    #[inline]
    pub fn bdir(self) -> bool {
        !matches!(self, BusControl::Inactive)
    }

    /// Level of the BC1 line in this mode.
    #[inline]
    pub fn bc1(self) -> bool {
        matches!(self, BusControl::LatchAddress)
    }
}

/// Signal-level access to the board wiring.
///
/// Implementations must make every `set_control` transition without passing
/// through [`BusControl::Write`] on the way: when BDIR rises it rises after
/// BC1, when BDIR falls it falls before BC1.
pub trait BusLines {
    /// Drive the 3-bit chip select code.
    fn set_select(&mut self, code: u8);

    /// Drive the 8-bit data bus.
    fn set_data(&mut self, value: u8);

    /// Drive BDIR/BC1 to the given bus mode.
    fn set_control(&mut self, control: BusControl);

    /// Hold the current line state for at least `ns` nanoseconds.
    fn latch_delay(&mut self, ns: u32);

    /// Drive a chip's activity indicator. Boards without indicators ignore it.
    fn set_indicator(&mut self, _chip: ChipId, _on: bool) {}
}

/// How chip numbers map onto the select decoder inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectWiring {
    /// Chip N is selected by code N
    Direct,
    /// Decoder wired in reverse: chip N is selected by code 2 - N
    #[default]
    Reversed,
}

impl SelectWiring {
    /// Select code that addresses `chip`.
    pub fn select_code(self, chip: ChipId) -> u8 {
        match self {
            SelectWiring::Direct => chip.get(),
            SelectWiring::Reversed => (CHIP_COUNT as u8 - 1) - chip.get(),
        }
    }

    /// Chip addressed by a select code, if any.
    pub fn chip_for_code(self, code: u8) -> Option<ChipId> {
        ChipId::ALL
            .into_iter()
            .find(|&chip| self.select_code(chip) == code & 0x07)
    }
}

/// YM2149 bus protocol driver with selection and address-latch caches.
#[derive(Debug)]
pub struct Bus<L> {
    lines: L,
    wiring: SelectWiring,
    /// Chip the decoder currently addresses (`None` until the first pulse)
    selected: Option<ChipId>,
    /// Register each chip last latched during an address phase
    latched: [Option<u8>; CHIP_COUNT],
}

impl<L: BusLines> Bus<L> {
    /// Create a driver and park the control lines in the inactive mode.
    pub fn new(mut lines: L, wiring: SelectWiring) -> Self {
        lines.set_control(BusControl::Inactive);
        Bus {
            lines,
            wiring,
            selected: None,
            latched: [None; CHIP_COUNT],
        }
    }

    /// Address `chip`, pulsing the select lines only if it is not already
    /// the selected chip.
    pub fn select_chip(&mut self, chip: ChipId) {
        if self.selected != Some(chip) {
            self.lines.set_select(self.wiring.select_code(chip));
            self.selected = Some(chip);
        }
    }

    /// Full two-phase register write.
    pub fn write(&mut self, chip: ChipId, register: u8, value: u8) {
        let register = register & ADDRESS_MASK;
        self.select_chip(chip);

        // Address phase
        self.lines.set_data(register);
        self.lines.set_control(BusControl::LatchAddress);
        self.lines.latch_delay(LATCH_DELAY_NS);
        self.lines.set_control(BusControl::Inactive);
        self.latched[chip.index()] = Some(register);

        // Data phase
        self.strobe_data(value);
    }

    /// Data-phase-only write into the register `chip` already has latched.
    ///
    /// Only valid when the caller is re-writing the same register as the
    /// previous write to this chip; see [`Bus::poke`] for the checked form.
    pub fn write_fast(&mut self, chip: ChipId, value: u8) {
        debug_assert!(
            self.latched[chip.index()].is_some(),
            "write_fast on {chip} without a latched register"
        );
        self.select_chip(chip);
        self.strobe_data(value);
    }

    /// Write `value` to `register`, skipping the address phase when the chip
    /// still has that register latched.
    pub fn poke(&mut self, chip: ChipId, register: u8, value: u8) {
        if self.latched[chip.index()] == Some(register & ADDRESS_MASK) {
            self.write_fast(chip, value);
        } else {
            self.write(chip, register, value);
        }
    }

    fn strobe_data(&mut self, value: u8) {
        self.lines.set_data(value);
        self.lines.set_control(BusControl::Write);
        self.lines.latch_delay(LATCH_DELAY_NS);
        self.lines.set_control(BusControl::Inactive);
    }

    /// Drive a chip's activity indicator.
    pub fn set_indicator(&mut self, chip: ChipId, on: bool) {
        self.lines.set_indicator(chip, on);
    }

    /// Chip currently addressed by the decoder.
    pub fn selected(&self) -> Option<ChipId> {
        self.selected
    }

    /// Register `chip` has latched, if any write reached it yet.
    pub fn latched_register(&self, chip: ChipId) -> Option<u8> {
        self.latched[chip.index()]
    }

    /// Select decoder wiring in use.
    pub fn wiring(&self) -> SelectWiring {
        self.wiring
    }

    /// Borrow the backend.
    pub fn lines(&self) -> &L {
        &self.lines
    }

    /// Mutably borrow the backend.
    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    /// Release the backend.
    pub fn into_lines(self) -> L {
        self.lines
    }
}
