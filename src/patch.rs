//! Voice patch block
//!
//! Fixed-size parameter block exchanged with patch storage. Layout:
//!
//! ```text
//! 0-1  tone period (LE, 12 bits)    6-7  envelope period (LE)
//! 2    noise period (5 bits)        8    envelope shape (4 bits)
//! 3    mixer mode (0-3)             9    GPIO port A
//! 4    volume (4 bits)              10   GPIO port B
//! 5    envelope enable (0/1)
//! ```

use crate::bus::BusLines;
use crate::chip::{Channel, ChipId, Voice};
use crate::registers::EnvelopeShape;
use crate::voice::{GpioPort, NoiseMode, Voices};
use crate::{Result, SynthError};

/// Size of one encoded patch.
pub const PATCH_SIZE: usize = 11;

/// One voice configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Patch {
    /// Tone divider (12 bits)
    pub tone_period: u16,
    /// Noise divider (5 bits, chip-wide)
    pub noise_period: u8,
    /// Mixer routing for the voice
    pub noise_mode: NoiseMode,
    /// Fixed volume (4 bits)
    pub volume: u8,
    /// Amplitude follows the envelope generator
    pub envelope: bool,
    /// Envelope divider (chip-wide)
    pub envelope_period: u16,
    /// Envelope shape (chip-wide)
    pub envelope_shape: EnvelopeShape,
    /// GPIO port A
    pub port_a: u8,
    /// GPIO port B
    pub port_b: u8,
}

impl Patch {
    /// Decode a stored block. Out-of-range fields are masked to their
    /// register widths.
    pub fn from_bytes(bytes: &[u8; PATCH_SIZE]) -> Self {
        Patch {
            tone_period: u16::from_le_bytes([bytes[0], bytes[1]]) & 0x0FFF,
            noise_period: bytes[2] & 0x1F,
            noise_mode: NoiseMode::from_index(bytes[3]),
            volume: bytes[4] & 0x0F,
            envelope: bytes[5] != 0,
            envelope_period: u16::from_le_bytes([bytes[6], bytes[7]]),
            envelope_shape: EnvelopeShape::from_bits_truncate(bytes[8]),
            port_a: bytes[9],
            port_b: bytes[10],
        }
    }

    /// Decode from a slice that must hold exactly one block.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let block: &[u8; PATCH_SIZE] = bytes.try_into().map_err(|_| {
            SynthError::Other(format!(
                "patch block must be {PATCH_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(block))
    }

    /// Encode for storage.
    pub fn to_bytes(&self) -> [u8; PATCH_SIZE] {
        let [tone_lo, tone_hi] = (self.tone_period & 0x0FFF).to_le_bytes();
        let [env_lo, env_hi] = self.envelope_period.to_le_bytes();
        [
            tone_lo,
            tone_hi,
            self.noise_period & 0x1F,
            self.noise_mode.index(),
            self.volume & 0x0F,
            self.envelope as u8,
            env_lo,
            env_hi,
            self.envelope_shape.bits(),
            self.port_a,
            self.port_b,
        ]
    }
}

impl<L: BusLines> Voices<'_, L> {
    /// Apply a whole patch to one voice. Noise period, envelope and ports
    /// are chip-wide and affect the other voices too.
    pub fn apply_patch(&mut self, chip: ChipId, voice: Voice, patch: &Patch) {
        self.set_tone(chip, Channel::Tone(voice), patch.tone_period);
        self.set_tone(chip, Channel::Noise, patch.noise_period as u16);
        self.set_noise(chip, voice, patch.noise_mode);
        self.set_volume(chip, voice, patch.volume);
        self.set_env(chip, voice, patch.envelope);
        self.set_tone(chip, Channel::Envelope, patch.envelope_period);
        self.set_env_shape(chip, patch.envelope_shape);
        self.set_port(chip, GpioPort::A, patch.port_a);
        self.set_port(chip, GpioPort::B, patch.port_b);
    }
}
