//! Simulated bus
//!
//! A [`BusLines`] backend with three virtual chips behind it. Control-line
//! transitions are decoded exactly as a YM2149 would see them, so tests can
//! assert on the register writes that actually landed rather than on the
//! calls that were made.

use super::{Bus, BusControl, BusLines, SelectWiring, ADDRESS_MASK, LATCH_DELAY_NS};
use crate::chip::{ChipId, CHIP_COUNT};

/// Register count of a simulated chip (R0-R15).
const REGISTER_FILE: usize = 16;

/// A write as latched by a simulated chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWrite {
    /// Chip that latched the data
    pub chip: ChipId,
    /// Register it landed in
    pub register: u8,
    /// Value latched
    pub value: u8,
    /// Whether the write skipped the address phase
    pub fast: bool,
}

/// Protocol faults the simulated chips can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// A latch strobe ended before the minimum hold time
    ShortStrobe {
        /// Nanoseconds the strobe was held
        held_ns: u32,
    },
    /// Data strobed into a chip that never latched an address
    WriteWithoutAddress {
        /// Chip that saw the strobe
        chip: ChipId,
    },
    /// A strobe while the select code decodes to no chip
    NoChipSelected,
}

/// Simulated three-chip bus.
#[derive(Debug, Clone)]
pub struct RecordingLines {
    wiring: SelectWiring,
    select_code: Option<u8>,
    data: u8,
    control: BusControl,
    strobe_held_ns: u32,
    address_phase_seen: bool,
    latched: [Option<u8>; CHIP_COUNT],
    registers: [[u8; REGISTER_FILE]; CHIP_COUNT],
    indicators: [bool; CHIP_COUNT],
    writes: Vec<BusWrite>,
    record_writes: bool,
    select_pulses: usize,
    faults: Vec<BusFault>,
}

impl RecordingLines {
    /// Simulated chips behind a decoder with the given wiring.
    pub fn new(wiring: SelectWiring) -> Self {
        RecordingLines {
            wiring,
            select_code: None,
            data: 0,
            control: BusControl::Inactive,
            strobe_held_ns: 0,
            address_phase_seen: false,
            latched: [None; CHIP_COUNT],
            registers: [[0; REGISTER_FILE]; CHIP_COUNT],
            indicators: [false; CHIP_COUNT],
            writes: Vec::new(),
            record_writes: true,
            select_pulses: 0,
            faults: Vec::new(),
        }
    }

    /// Bus driver over these simulated chips, using the same decoder wiring.
    pub fn into_bus(self) -> Bus<Self> {
        let wiring = self.wiring;
        Bus::new(self, wiring)
    }

    /// Stop (or resume) keeping the write log. Register images and fault
    /// tracking stay live either way.
    pub fn set_record_writes(&mut self, record: bool) {
        self.record_writes = record;
    }

    /// Writes latched so far, in bus order.
    pub fn writes(&self) -> &[BusWrite] {
        &self.writes
    }

    /// Drain the write log.
    pub fn take_writes(&mut self) -> Vec<BusWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Number of select-line updates seen.
    pub fn select_pulses(&self) -> usize {
        self.select_pulses
    }

    /// Protocol faults observed so far.
    pub fn faults(&self) -> &[BusFault] {
        &self.faults
    }

    /// Current value of one register of a simulated chip.
    pub fn register(&self, chip: ChipId, register: u8) -> u8 {
        self.registers[chip.index()][(register & 0x0F) as usize]
    }

    /// Full register image of a simulated chip.
    pub fn registers(&self, chip: ChipId) -> &[u8; REGISTER_FILE] {
        &self.registers[chip.index()]
    }

    /// State of a chip's indicator.
    pub fn indicator(&self, chip: ChipId) -> bool {
        self.indicators[chip.index()]
    }

    /// Reset counters and logs, keeping register images.
    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.faults.clear();
        self.select_pulses = 0;
    }

    fn selected_chip(&self) -> Option<ChipId> {
        self.select_code
            .and_then(|code| self.wiring.chip_for_code(code))
    }

    fn end_strobe(&mut self, strobe: BusControl) {
        if self.strobe_held_ns < LATCH_DELAY_NS {
            self.faults.push(BusFault::ShortStrobe {
                held_ns: self.strobe_held_ns,
            });
        }
        let Some(chip) = self.selected_chip() else {
            self.faults.push(BusFault::NoChipSelected);
            return;
        };

        match strobe {
            BusControl::LatchAddress => {
                self.latched[chip.index()] = Some(self.data & ADDRESS_MASK);
                self.address_phase_seen = true;
            }
            BusControl::Write => {
                let Some(register) = self.latched[chip.index()] else {
                    self.faults.push(BusFault::WriteWithoutAddress { chip });
                    return;
                };
                // Addresses above R15 are not decoded by the chip
                if (register as usize) < REGISTER_FILE {
                    self.registers[chip.index()][register as usize] = self.data;
                }
                let write = BusWrite {
                    chip,
                    register,
                    value: self.data,
                    fast: !self.address_phase_seen,
                };
                log::trace!(
                    "{} R{} <= {:02X}{}",
                    chip,
                    register,
                    self.data,
                    if write.fast { " (fast)" } else { "" }
                );
                if self.record_writes {
                    self.writes.push(write);
                }
                self.address_phase_seen = false;
            }
            BusControl::Inactive => {}
        }
    }
}

impl BusLines for RecordingLines {
    fn set_select(&mut self, code: u8) {
        self.select_code = Some(code & 0x07);
        self.select_pulses += 1;
        // Latched addresses belong to the chips; only the phase pairing resets
        self.address_phase_seen = false;
    }

    fn set_data(&mut self, value: u8) {
        self.data = value;
    }

    fn set_control(&mut self, control: BusControl) {
        let previous = self.control;
        self.control = control;
        if previous == control {
            return;
        }
        if previous != BusControl::Inactive {
            self.end_strobe(previous);
        }
        self.strobe_held_ns = 0;
    }

    fn latch_delay(&mut self, ns: u32) {
        self.strobe_held_ns = self.strobe_held_ns.saturating_add(ns);
    }

    fn set_indicator(&mut self, chip: ChipId, on: bool) {
        self.indicators[chip.index()] = on;
    }
}
