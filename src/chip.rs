//! Chip and voice addressing
//!
//! Bounded index types for the three PSGs on the bus and their voices. Every
//! per-chip or per-voice table in the crate is indexed through these, so an
//! out-of-range index cannot be formed once a raw id has been validated.

use std::fmt;

/// Number of YM2149 chips sharing the bus.
pub const CHIP_COUNT: usize = 3;

/// Number of tone voices per chip.
pub const VOICE_COUNT: usize = 3;

/// Index of one physical chip on the bus (0..=2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChipId(u8);

impl ChipId {
    /// First chip
    pub const YM0: ChipId = ChipId(0);
    /// Second chip
    pub const YM1: ChipId = ChipId(1);
    /// Third chip
    pub const YM2: ChipId = ChipId(2);

    /// All chips in bus order.
    pub const ALL: [ChipId; CHIP_COUNT] = [ChipId::YM0, ChipId::YM1, ChipId::YM2];

    /// Validate a raw chip id. Returns `None` for ids >= 3.
    pub fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHIP_COUNT {
            Some(ChipId(id))
        } else {
            None
        }
    }

    /// Raw chip number.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Table index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YM{}", self.0)
    }
}

/// One of the three tone voices of a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Voice {
    /// Voice A
    A = 0,
    /// Voice B
    B = 1,
    /// Voice C
    C = 2,
}

impl Voice {
    /// All voices in register order.
    pub const ALL: [Voice; VOICE_COUNT] = [Voice::A, Voice::B, Voice::C];

    /// Convert a raw voice number (0=A, 1=B, 2=C).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Voice::A),
            1 => Some(Voice::B),
            2 => Some(Voice::C),
            _ => None,
        }
    }

    /// Table index.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Low byte register of this voice's 12-bit tone period.
    #[inline]
    pub fn tone_register(self) -> u8 {
        (self as u8) * 2
    }

    /// Amplitude (level) register of this voice.
    #[inline]
    pub fn level_register(self) -> u8 {
        0x08 + self as u8
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Voice::A => "A",
            Voice::B => "B",
            Voice::C => "C",
        };
        f.write_str(name)
    }
}

/// Pitch target used by the note/period setters.
///
/// The MIDI layer addresses these by number: 0..=2 are the tone voices,
/// 3 is the noise generator and 4 the envelope generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// A tone voice
    Tone(Voice),
    /// The shared noise generator (5-bit period)
    Noise,
    /// The shared envelope generator (16-bit period)
    Envelope,
}

impl Channel {
    /// Convert the collaborator-facing channel number.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0..=2 => Voice::from_index(index).map(Channel::Tone),
            3 => Some(Channel::Noise),
            4 => Some(Channel::Envelope),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_id_bounds() {
        assert_eq!(ChipId::new(0), Some(ChipId::YM0));
        assert_eq!(ChipId::new(2), Some(ChipId::YM2));
        assert_eq!(ChipId::new(3), None);
        assert_eq!(ChipId::new(0xFF), None);
    }

    #[test]
    fn test_voice_registers() {
        assert_eq!(Voice::A.tone_register(), 0x00);
        assert_eq!(Voice::C.tone_register(), 0x04);
        assert_eq!(Voice::B.level_register(), 0x09);
    }

    #[test]
    fn test_channel_numbers() {
        assert_eq!(Channel::from_index(1), Some(Channel::Tone(Voice::B)));
        assert_eq!(Channel::from_index(3), Some(Channel::Noise));
        assert_eq!(Channel::from_index(4), Some(Channel::Envelope));
        assert_eq!(Channel::from_index(5), None);
    }
}
