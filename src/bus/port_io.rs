//! Cycle-exact port backend
//!
//! Drives the bus through whole 8-bit GPIO port writes instead of one call
//! per pin. The reference board scatters the data bus over five ports, so a
//! byte becomes one masked update per port; the mapping is a pure function
//! and is tested on its own.
//!
//! Board wiring:
//! ```text
//! D0 PD1   D1 PD0   D2 PD4   D3 PC6   D4 PD7   D5 PE6   D6 PB4   D7 PB5
//! BC1 PB6  BDIR PF5  SEL_A PF4  SEL_B PF6  SEL_C PF7
//! LED0 PB1  LED1 PB3  LED2 PB2 (active low)
//! ```

use super::{BusControl, BusLines};
use crate::chip::{ChipId, CHIP_COUNT};
use embedded_hal::delay::DelayNs;

/// GPIO ports used by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// Port B
    B,
    /// Port C
    C,
    /// Port D
    D,
    /// Port E
    E,
    /// Port F
    F,
}

/// Read-modify-write access to the MCU's output port registers.
pub trait PortIo {
    /// `port = (port & !clear) | set`
    fn modify(&mut self, port: Port, clear: u8, set: u8);
}

/// One masked port update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortUpdate {
    /// Target port
    pub port: Port,
    /// Bits owned by this update (cleared before `set` is applied)
    pub clear: u8,
    /// Bits driven high
    pub set: u8,
}

const BC1_BIT: u8 = 1 << 6; // PB6
const BDIR_BIT: u8 = 1 << 5; // PF5
const SEL_BITS: [u8; 3] = [1 << 4, 1 << 6, 1 << 7]; // PF4, PF6, PF7
const LED_BITS: [u8; CHIP_COUNT] = [1 << 1, 1 << 3, 1 << 2]; // PB1, PB3, PB2

/// (data bit, port, port bit) for every data line.
const DATA_WIRING: [(u8, Port, u8); 8] = [
    (0, Port::D, 1),
    (1, Port::D, 0),
    (2, Port::D, 4),
    (3, Port::C, 6),
    (4, Port::D, 7),
    (5, Port::E, 6),
    (6, Port::B, 4),
    (7, Port::B, 5),
];

const DATA_PORTS: [Port; 4] = [Port::D, Port::C, Port::E, Port::B];

/// Scatter a data byte into one masked update per port.
pub fn scatter_data(value: u8) -> [PortUpdate; 4] {
    DATA_PORTS.map(|port| {
        let mut update = PortUpdate {
            port,
            clear: 0,
            set: 0,
        };
        for &(bit, wired_port, port_bit) in DATA_WIRING.iter() {
            if wired_port == port {
                update.clear |= 1 << port_bit;
                if value & (1 << bit) != 0 {
                    update.set |= 1 << port_bit;
                }
            }
        }
        update
    })
}

/// Port F update driving a 3-bit select code.
pub fn select_update(code: u8) -> PortUpdate {
    let mut set = 0;
    for (bit, &mask) in SEL_BITS.iter().enumerate() {
        if code & (1 << bit) != 0 {
            set |= mask;
        }
    }
    PortUpdate {
        port: Port::F,
        clear: SEL_BITS[0] | SEL_BITS[1] | SEL_BITS[2],
        set,
    }
}

/// Bus backend built on whole-port writes.
pub struct PortLines<P, D> {
    ports: P,
    delay: D,
}

impl<P: PortIo, D: DelayNs> PortLines<P, D> {
    /// Wrap the port registers and a calibrated delay source.
    pub fn new(ports: P, delay: D) -> Self {
        PortLines { ports, delay }
    }

    /// Borrow the port registers.
    pub fn ports(&self) -> &P {
        &self.ports
    }

    fn apply(&mut self, update: PortUpdate) {
        self.ports.modify(update.port, update.clear, update.set);
    }

    fn set_bc1(&mut self, high: bool) {
        let set = if high { BC1_BIT } else { 0 };
        self.ports.modify(Port::B, BC1_BIT, set);
    }

    fn set_bdir(&mut self, high: bool) {
        let set = if high { BDIR_BIT } else { 0 };
        self.ports.modify(Port::F, BDIR_BIT, set);
    }
}

impl<P: PortIo, D: DelayNs> BusLines for PortLines<P, D> {
    fn set_select(&mut self, code: u8) {
        self.apply(select_update(code));
    }

    fn set_data(&mut self, value: u8) {
        for update in scatter_data(value) {
            self.apply(update);
        }
    }

    fn set_control(&mut self, control: BusControl) {
        if control.bdir() {
            self.set_bc1(control.bc1());
            self.set_bdir(true);
        } else {
            self.set_bdir(false);
            self.set_bc1(control.bc1());
        }
    }

    fn latch_delay(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn set_indicator(&mut self, chip: ChipId, on: bool) {
        let mask = LED_BITS[chip.index()];
        // LEDs sink current: low = lit
        let set = if on { 0 } else { mask };
        self.ports.modify(Port::B, mask, set);
    }
}
