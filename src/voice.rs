//! Voice Register Model
//!
//! The chips are write-only, so every read-modify-write helper (one GPIO
//! pin, one mixer bit, the envelope-enable bit of a level register) works
//! against a per-chip shadow that always holds the last value physically
//! written. [`Voices`] is the setter surface handed to the MIDI and patch
//! collaborators; it borrows the bus and the shadow together so the two
//! cannot drift apart.

use crate::bus::{Bus, BusLines};
use crate::chip::{Channel, ChipId, Voice, CHIP_COUNT, VOICE_COUNT};
use crate::registers::{EnvelopeShape, MixerFlags, Register};

/// Master clock of the reference board, in Hz.
pub const DEFAULT_MASTER_CLOCK_HZ: u32 = 500_000;

/// Tone period is 12 bits wide.
pub const TONE_PERIOD_MAX: u16 = 0x0FFF;

/// Noise period is 5 bits wide.
pub const NOISE_PERIOD_MAX: u8 = 0x1F;

const TONE_DIVIDER: f32 = 16.0;
const ENVELOPE_DIVIDER: f32 = 256.0;

/// One of the two 8-bit GPIO ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioPort {
    /// Port A (R14)
    A,
    /// Port B (R15)
    B,
}

impl GpioPort {
    fn register(self) -> Register {
        match self {
            GpioPort::A => Register::PortA,
            GpioPort::B => Register::PortB,
        }
    }
}

/// Which sources a voice feeds into the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseMode {
    /// Tone and noise both audible
    #[default]
    ToneAndNoise,
    /// Tone only
    ToneOnly,
    /// Noise only
    NoiseOnly,
    /// Neither
    Off,
}

impl NoiseMode {
    /// Collaborator-facing mode number. Unknown numbers mean tone and noise.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => NoiseMode::ToneOnly,
            2 => NoiseMode::NoiseOnly,
            3 => NoiseMode::Off,
            _ => NoiseMode::ToneAndNoise,
        }
    }

    /// Collaborator-facing mode number.
    pub fn index(self) -> u8 {
        match self {
            NoiseMode::ToneAndNoise => 0,
            NoiseMode::ToneOnly => 1,
            NoiseMode::NoiseOnly => 2,
            NoiseMode::Off => 3,
        }
    }
}

/// Last written values of the registers that get read-modify-written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipShadow {
    /// R7
    pub mixer: MixerFlags,
    /// R14
    pub port_a: u8,
    /// R15
    pub port_b: u8,
    /// R8-R10, including the envelope-mode bit
    pub levels: [u8; VOICE_COUNT],
    /// Activity indicator state
    pub indicator: bool,
}

impl Default for ChipShadow {
    fn default() -> Self {
        ChipShadow {
            mixer: MixerFlags::POWER_ON,
            port_a: 0,
            port_b: 0,
            levels: [0; VOICE_COUNT],
            indicator: false,
        }
    }
}

impl ChipShadow {
    /// Shadowed value of `register`, if it is one of the shadowed registers.
    pub fn get(&self, register: u8) -> Option<u8> {
        match Register::from_addr(register)? {
            Register::Mixer => Some(self.mixer.bits()),
            Register::LevelA => Some(self.levels[0]),
            Register::LevelB => Some(self.levels[1]),
            Register::LevelC => Some(self.levels[2]),
            Register::PortA => Some(self.port_a),
            Register::PortB => Some(self.port_b),
            _ => None,
        }
    }

    fn record(&mut self, register: u8, value: u8) {
        match Register::from_addr(register) {
            Some(Register::Mixer) => self.mixer = MixerFlags::from_register(value),
            Some(Register::LevelA) => self.levels[0] = value,
            Some(Register::LevelB) => self.levels[1] = value,
            Some(Register::LevelC) => self.levels[2] = value,
            Some(Register::PortA) => self.port_a = value,
            Some(Register::PortB) => self.port_b = value,
            _ => {}
        }
    }
}

/// Shadow state of all chips plus the clock used for pitch conversion.
#[derive(Debug, Clone)]
pub struct RegisterShadow {
    chips: [ChipShadow; CHIP_COUNT],
    master_clock_hz: u32,
}

impl RegisterShadow {
    /// Power-on shadows for a board clocked at `master_clock_hz`.
    pub fn new(master_clock_hz: u32) -> Self {
        RegisterShadow {
            chips: [ChipShadow::default(); CHIP_COUNT],
            master_clock_hz,
        }
    }

    /// Shadow of one chip.
    pub fn chip(&self, chip: ChipId) -> &ChipShadow {
        &self.chips[chip.index()]
    }

    /// Master clock in Hz.
    pub fn master_clock_hz(&self) -> u32 {
        self.master_clock_hz
    }
}

impl Default for RegisterShadow {
    fn default() -> Self {
        Self::new(DEFAULT_MASTER_CLOCK_HZ)
    }
}

/// Equal-tempered frequency of a (fractional) MIDI note, A4 = 69 = 440 Hz.
pub fn note_to_hz(note: f32) -> f32 {
    440.0 * 2f32.powf((note - 69.0) / 12.0)
}

/// Tone divider for a pitch: round(clock / (16 × f)), clamped to 12 bits.
pub fn tone_period(note: f32, master_clock_hz: u32) -> u16 {
    let period = (master_clock_hz as f32 / (TONE_DIVIDER * note_to_hz(note))).round();
    (period as u16).min(TONE_PERIOD_MAX)
}

/// Envelope divider for a pitch: round(clock / (256 × f)).
pub fn envelope_period(note: f32, master_clock_hz: u32) -> u16 {
    (master_clock_hz as f32 / (ENVELOPE_DIVIDER * note_to_hz(note))).round() as u16
}

/// Approximate noise period for a note. The noise generator has no pitch
/// of its own, so higher notes just map linearly onto shorter periods.
pub fn noise_period(note: f32) -> u8 {
    (31.0 - note / 4.0).clamp(0.0, NOISE_PERIOD_MAX as f32) as u8
}

/// Setter view over the bus and the register shadows.
pub struct Voices<'a, L> {
    bus: &'a mut Bus<L>,
    shadow: &'a mut RegisterShadow,
}

impl<'a, L: BusLines> Voices<'a, L> {
    /// Borrow the bus and shadows together.
    pub fn new(bus: &'a mut Bus<L>, shadow: &'a mut RegisterShadow) -> Self {
        Voices { bus, shadow }
    }

    /// Shadow of one chip.
    pub fn shadow(&self, chip: ChipId) -> &ChipShadow {
        self.shadow.chip(chip)
    }

    /// Raw register write that keeps the shadow in step.
    pub fn write_register(&mut self, chip: ChipId, register: u8, value: u8) {
        self.shadow.chips[chip.index()].record(register, value);
        self.bus.write(chip, register, value);
    }

    /// Write only the bits in `mask`. Shadowed registers keep their other
    /// bits; the rest get them cleared.
    pub fn write_masked(&mut self, chip: ChipId, register: u8, value: u8, mask: u8) {
        let keep = self
            .shadow(chip)
            .get(register)
            .map_or(0, |current| current & !mask);
        self.write_register(chip, register, (value & mask) | keep);
    }

    /// Drive a voice's amplitude register, skipping the address phase when
    /// the chip still has it latched.
    pub fn poke_level(&mut self, chip: ChipId, voice: Voice, level: u8) {
        self.shadow.chips[chip.index()].levels[voice.index()] = level;
        self.bus.poke(chip, voice.level_register(), level);
    }

    /// Set one GPIO pin (0-7 port A, 8-15 port B).
    pub fn set_pin(&mut self, chip: ChipId, pin: u8, value: bool) {
        let pin = pin & 0x0F;
        let port = if pin >= 8 { GpioPort::B } else { GpioPort::A };
        let mask = 1 << (pin & 0x07);
        let current = self.port(chip, port);
        let next = if value { current | mask } else { current & !mask };
        self.set_port(chip, port, next);
    }

    /// Last written level of one GPIO pin.
    pub fn pin(&self, chip: ChipId, pin: u8) -> bool {
        let pin = pin & 0x0F;
        let port = if pin >= 8 { GpioPort::B } else { GpioPort::A };
        self.port(chip, port) & (1 << (pin & 0x07)) != 0
    }

    /// Write a whole GPIO port.
    pub fn set_port(&mut self, chip: ChipId, port: GpioPort, value: u8) {
        self.write_register(chip, port.register().addr(), value);
    }

    /// Last written value of a GPIO port.
    pub fn port(&self, chip: ChipId, port: GpioPort) -> u8 {
        let shadow = self.shadow(chip);
        match port {
            GpioPort::A => shadow.port_a,
            GpioPort::B => shadow.port_b,
        }
    }

    /// Configure port directions (true = output) in the mixer's top bits.
    pub fn set_port_io(&mut self, chip: ChipId, port_a_out: bool, port_b_out: bool) {
        let mut mixer = self.shadow(chip).mixer;
        mixer.set(MixerFlags::PORT_A_OUT, port_a_out);
        mixer.set(MixerFlags::PORT_B_OUT, port_b_out);
        self.write_register(chip, Register::Mixer.addr(), mixer.bits());
    }

    /// Drive a chip's activity indicator.
    pub fn set_indicator(&mut self, chip: ChipId, on: bool) {
        self.shadow.chips[chip.index()].indicator = on;
        self.bus.set_indicator(chip, on);
    }

    /// Current indicator state.
    pub fn indicator(&self, chip: ChipId) -> bool {
        self.shadow(chip).indicator
    }

    /// Tune a channel to a (fractional) MIDI note.
    pub fn set_note(&mut self, chip: ChipId, channel: Channel, note: f32) {
        let clock = self.shadow.master_clock_hz;
        let period = match channel {
            Channel::Tone(_) => tone_period(note, clock),
            Channel::Noise => noise_period(note) as u16,
            Channel::Envelope => envelope_period(note, clock),
        };
        self.set_tone(chip, channel, period);
    }

    /// Tune a channel to a frequency in Hz. Zero is ignored.
    pub fn set_freq(&mut self, chip: ChipId, channel: Channel, freq_hz: u32) {
        if freq_hz == 0 {
            return;
        }
        let divider = match channel {
            Channel::Envelope => ENVELOPE_DIVIDER,
            _ => TONE_DIVIDER,
        };
        let period = (self.shadow.master_clock_hz as f32 / freq_hz as f32 / divider).round();
        self.set_tone(chip, channel, period as u16);
    }

    /// Write a raw period: 12-bit tone, 5-bit noise or 16-bit envelope.
    pub fn set_tone(&mut self, chip: ChipId, channel: Channel, period: u16) {
        match channel {
            Channel::Tone(voice) => {
                let register = voice.tone_register();
                self.write_register(chip, register, (period & 0xFF) as u8);
                self.write_register(chip, register + 1, ((period >> 8) & 0x0F) as u8);
            }
            Channel::Noise => {
                self.write_register(
                    chip,
                    Register::NoisePeriod.addr(),
                    period as u8 & NOISE_PERIOD_MAX,
                );
            }
            Channel::Envelope => {
                let [lo, hi] = period.to_le_bytes();
                self.write_register(chip, Register::EnvelopePeriodLo.addr(), lo);
                self.write_register(chip, Register::EnvelopePeriodHi.addr(), hi);
            }
        }
    }

    /// Set a voice's 4-bit volume, keeping its envelope-enable bit.
    pub fn set_volume(&mut self, chip: ChipId, voice: Voice, volume: u8) {
        let level = (self.shadow(chip).levels[voice.index()] & 0x10) | (volume & 0x0F);
        self.write_register(chip, voice.level_register(), level);
    }

    /// Route a voice's amplitude from the envelope generator (or back to
    /// its fixed volume), keeping the volume bits.
    pub fn set_env(&mut self, chip: ChipId, voice: Voice, enabled: bool) {
        let volume = self.shadow(chip).levels[voice.index()] & 0x0F;
        let level = volume | if enabled { 0x10 } else { 0 };
        self.write_register(chip, voice.level_register(), level);
    }

    /// Write the envelope shape. A zero is written first so the envelope
    /// generator restarts even when the shape is unchanged.
    pub fn set_env_shape(&mut self, chip: ChipId, shape: EnvelopeShape) {
        self.write_register(chip, Register::EnvelopeShape.addr(), 0);
        self.write_register(chip, Register::EnvelopeShape.addr(), shape.bits());
    }

    /// Choose which sources a voice feeds into the mixer.
    pub fn set_noise(&mut self, chip: ChipId, voice: Voice, mode: NoiseMode) {
        let tone = MixerFlags::tone_bit(voice.index());
        let noise = MixerFlags::noise_bit(voice.index());
        let mut mixer = self.shadow(chip).mixer;
        mixer.remove(tone | noise);
        match mode {
            NoiseMode::ToneAndNoise => {}
            NoiseMode::ToneOnly => mixer.insert(noise),
            NoiseMode::NoiseOnly => mixer.insert(tone),
            NoiseMode::Off => mixer.insert(tone | noise),
        }
        self.write_register(chip, Register::Mixer.addr(), mixer.bits());
    }

    /// Zero all three volumes and silence every tone and noise source in a
    /// single mixer write. Port directions are kept.
    pub fn mute(&mut self, chip: ChipId) {
        for voice in Voice::ALL {
            self.write_register(chip, voice.level_register(), 0);
        }
        let mixer = (self.shadow(chip).mixer & MixerFlags::PORT_DIRECTION)
            | MixerFlags::ALL_TONE
            | MixerFlags::ALL_NOISE;
        self.write_register(chip, Register::Mixer.addr(), mixer.bits());
    }

    /// Start-up sequence: both ports to output, pin A0 high, indicator off,
    /// chip muted.
    pub fn begin(&mut self) {
        for chip in ChipId::ALL {
            self.set_port_io(chip, true, true);
            self.set_pin(chip, 0, true);
            self.set_indicator(chip, false);
            self.mute(chip);
        }
    }
}
