//! YM2149 register map
//!
//! Addresses R0-R15, the write masks applied to streamed values, and bitflag
//! views of the mixer (R7) and envelope shape (R13).

use bitflags::bitflags;

/// Number of sound registers carried by a serial frame (R0-R13).
pub const SOUND_REGISTER_COUNT: usize = 14;

/// Physically significant bits of each sound register.
///
/// Applied to every streamed value before it reaches the bus; bits outside
/// the mask are never driven from a frame.
pub const WRITE_MASK: [u8; SOUND_REGISTER_COUNT] = [
    0xFF, 0x0F, // R0,R1   A period
    0xFF, 0x0F, // R2,R3   B period
    0xFF, 0x0F, // R4,R5   C period
    0x1F, //       R6      noise period
    0x3F, //       R7      mixer (port direction bits excluded)
    0x1F, //       R8      A level + envelope mode
    0x1F, //       R9      B level + envelope mode
    0x1F, //       R10     C level + envelope mode
    0xFF, 0xFF, // R11,R12 envelope period
    0x0F, //       R13     envelope shape
];

/// Register address on the chip's internal bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// R0
    ToneALo = 0,
    /// R1
    ToneAHi,
    /// R2
    ToneBLo,
    /// R3
    ToneBHi,
    /// R4
    ToneCLo,
    /// R5
    ToneCHi,
    /// R6, 5-bit noise period
    NoisePeriod,
    /// R7, tone/noise disables and port direction
    Mixer,
    /// R8, voice A volume and envelope mode
    LevelA,
    /// R9
    LevelB,
    /// R10
    LevelC,
    /// R11
    EnvelopePeriodLo,
    /// R12
    EnvelopePeriodHi,
    /// R13
    EnvelopeShape,
    /// R14, GPIO port A
    PortA,
    /// R15, GPIO port B
    PortB,
}

impl Register {
    /// Every register in address order.
    pub const ALL: [Register; 16] = [
        Register::ToneALo,
        Register::ToneAHi,
        Register::ToneBLo,
        Register::ToneBHi,
        Register::ToneCLo,
        Register::ToneCHi,
        Register::NoisePeriod,
        Register::Mixer,
        Register::LevelA,
        Register::LevelB,
        Register::LevelC,
        Register::EnvelopePeriodLo,
        Register::EnvelopePeriodHi,
        Register::EnvelopeShape,
        Register::PortA,
        Register::PortB,
    ];

    /// Register at a bus address. Addresses above R15 are not decoded.
    pub fn from_addr(addr: u8) -> Option<Self> {
        Self::ALL.get(addr as usize).copied()
    }

    /// Bus address.
    pub fn addr(self) -> u8 {
        self as u8
    }
}

bitflags! {
    /// R7 as flags.
    ///
    /// Tone and noise bits are active-low enables: a set bit silences that
    /// source. The top two bits select the GPIO port direction (1 = output).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MixerFlags: u8 {
        /// Channel A tone disable
        const CH_A_TONE = 0x01;
        /// Channel B tone disable
        const CH_B_TONE = 0x02;
        /// Channel C tone disable
        const CH_C_TONE = 0x04;
        /// Channel A noise disable
        const CH_A_NOISE = 0x08;
        /// Channel B noise disable
        const CH_B_NOISE = 0x10;
        /// Channel C noise disable
        const CH_C_NOISE = 0x20;
        /// I/O port A is an output
        const PORT_A_OUT = 0x40;
        /// I/O port B is an output
        const PORT_B_OUT = 0x80;

        /// All three tone disables
        const ALL_TONE = Self::CH_A_TONE.bits() | Self::CH_B_TONE.bits() | Self::CH_C_TONE.bits();
        /// All three noise disables
        const ALL_NOISE = Self::CH_A_NOISE.bits() | Self::CH_B_NOISE.bits() | Self::CH_C_NOISE.bits();
        /// Both port direction bits
        const PORT_DIRECTION = Self::PORT_A_OUT.bits() | Self::PORT_B_OUT.bits();
    }
}

impl MixerFlags {
    /// Power-on mixer image: noise off on every voice, tones on, ports in.
    pub const POWER_ON: MixerFlags = MixerFlags::ALL_NOISE;

    /// Flags from a raw R7 value.
    pub fn from_register(value: u8) -> Self {
        MixerFlags::from_bits_truncate(value)
    }

    /// Tone disable bit for a voice index (0..=2).
    pub fn tone_bit(voice: usize) -> Self {
        MixerFlags::from_bits_truncate(1 << voice)
    }

    /// Noise disable bit for a voice index (0..=2).
    pub fn noise_bit(voice: usize) -> Self {
        MixerFlags::from_bits_truncate(1 << (voice + 3))
    }

    /// Whether a voice's tone reaches the output.
    pub fn is_tone_enabled(&self, voice: usize) -> bool {
        !self.contains(Self::tone_bit(voice))
    }

    /// Whether a voice's noise reaches the output.
    pub fn is_noise_enabled(&self, voice: usize) -> bool {
        !self.contains(Self::noise_bit(voice))
    }
}

bitflags! {
    /// R13 as flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnvelopeShape: u8 {
        /// Hold the final level
        const HOLD = 0x01;
        /// Alternate direction each cycle
        const ALTERNATE = 0x02;
        /// Start rising instead of falling
        const ATTACK = 0x04;
        /// Keep cycling after the first period
        const CONTINUE = 0x08;
    }
}

impl EnvelopeShape {
    /// Build a shape from the four individual control bits.
    pub fn from_parts(cont: bool, attack: bool, alternate: bool, hold: bool) -> Self {
        let mut shape = EnvelopeShape::empty();
        shape.set(EnvelopeShape::CONTINUE, cont);
        shape.set(EnvelopeShape::ATTACK, attack);
        shape.set(EnvelopeShape::ALTERNATE, alternate);
        shape.set(EnvelopeShape::HOLD, hold);
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conversion() {
        for (addr, register) in Register::ALL.iter().enumerate() {
            assert_eq!(register.addr() as usize, addr);
            assert_eq!(Register::from_addr(addr as u8), Some(*register));
        }
        assert_eq!(Register::from_addr(0x10), None);
    }

    #[test]
    fn test_write_mask_layout() {
        assert_eq!(WRITE_MASK[Register::ToneAHi.addr() as usize], 0x0F);
        assert_eq!(WRITE_MASK[Register::NoisePeriod.addr() as usize], 0x1F);
        assert_eq!(WRITE_MASK[Register::Mixer.addr() as usize], 0x3F);
        assert_eq!(WRITE_MASK[Register::EnvelopePeriodHi.addr() as usize], 0xFF);
        assert_eq!(WRITE_MASK[Register::EnvelopeShape.addr() as usize], 0x0F);
    }

    #[test]
    fn test_mixer_flags() {
        let flags = MixerFlags::from_register(0x00);
        assert!(flags.is_tone_enabled(0));
        assert!(flags.is_noise_enabled(2));

        let flags = MixerFlags::from_register(0xFF);
        assert!(!flags.is_tone_enabled(1));
        assert!(flags.contains(MixerFlags::PORT_DIRECTION));
    }

    #[test]
    fn test_envelope_shape_bits() {
        let shape = EnvelopeShape::from_parts(true, true, false, false);
        assert_eq!(shape.bits(), 0x0C);
        assert_eq!(EnvelopeShape::from_parts(false, false, true, true).bits(), 0x03);
    }
}
