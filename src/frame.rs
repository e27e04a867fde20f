//! Frame Decoder
//!
//! Wire format, one frame per fixed-size read, no delimiter:
//!
//! ```text
//! offset 0      chip id (0-2)
//! offset 1-14   R0-R13, masked per register before writing
//! offset 15-16  effect count bytes (slot 1, slot 2), never written
//! ```
//!
//! Two effect slots reuse spare register bits, as in YM5 dumps:
//! - Slot 1 (timer-synth): voice in R1[5:4], prescaler in R6[7:5], count in byte 15
//! - Slot 2 (sample): voice in R3[5:4], prescaler in R8[7:5], count in byte 16,
//!   sample id in the selected voice's level register [4:0]

use crate::bus::BusLines;
use crate::chip::{ChipId, Voice};
use crate::effects::{reload_ticks, EffectPersistence, EffectState, SampleBank, MAX_LEVEL};
use crate::registers::{SOUND_REGISTER_COUNT, WRITE_MASK};
use crate::voice::Voices;
use std::io::{self, Read};
use thiserror::Error;

/// Bytes per frame: chip id + 14 registers + 2 count bytes.
pub const FRAME_LEN: usize = 1 + PAYLOAD_LEN;

/// Payload bytes per frame.
pub const PAYLOAD_LEN: usize = 16;

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Read did not produce exactly one frame
    #[error("frame of {0} bytes, expected 17")]
    BadLength(usize),
    /// Chip id outside 0-2
    #[error("chip id {0} out of range")]
    BadChip(u8),
}

/// Result of handing one read to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Registers written and effect slots decoded
    Applied {
        /// Target chip
        chip: ChipId,
    },
    /// Nothing written
    Discarded(FrameError),
}

/// Decoded effect slot parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectSlot {
    /// Voice whose amplitude register the effect drives
    pub voice: Voice,
    /// 3-bit prescaler code
    pub prescaler: u8,
    /// Count byte
    pub count: u8,
}

impl EffectSlot {
    /// Decode one slot. A zero voice selector means no effect.
    pub fn decode(flag: u8, timer: u8, count: u8) -> Option<Self> {
        let selector = (flag >> 4) & 0x03;
        let voice = Voice::from_index(selector.checked_sub(1)?)?;
        Some(EffectSlot {
            voice,
            prescaler: (timer >> 5) & 0x07,
            count,
        })
    }

    /// Countdown reload in base ticks.
    pub fn reload_ticks(&self) -> u16 {
        reload_ticks(self.prescaler, self.count)
    }
}

/// A length- and chip-validated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    chip: ChipId,
    payload: [u8; PAYLOAD_LEN],
}

impl Frame {
    /// Validate one read.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes: &[u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| FrameError::BadLength(bytes.len()))?;
        let chip = ChipId::new(bytes[0]).ok_or(FrameError::BadChip(bytes[0]))?;
        let mut payload = [0; PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[1..]);
        Ok(Frame { chip, payload })
    }

    /// Target chip.
    pub fn chip(&self) -> ChipId {
        self.chip
    }

    /// Raw (unmasked) R0-R13.
    pub fn registers(&self) -> &[u8] {
        &self.payload[..SOUND_REGISTER_COUNT]
    }

    /// Slot 1 (timer-synth) parameters.
    pub fn timer_synth_slot(&self) -> Option<EffectSlot> {
        EffectSlot::decode(self.payload[1], self.payload[6], self.payload[14])
    }

    /// Slot 2 (sample playback) parameters.
    pub fn sample_slot(&self) -> Option<EffectSlot> {
        EffectSlot::decode(self.payload[3], self.payload[8], self.payload[15])
    }

    /// Sample id carried by a voice's level register.
    pub fn sample_id(&self, voice: Voice) -> u8 {
        self.payload[voice.level_register() as usize] & 0x1F
    }
}

/// Applies frames to the chips and the effect state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder {
    persistence: EffectPersistence,
}

impl FrameDecoder {
    /// Decoder with the given timer-synth deactivation policy.
    pub fn new(persistence: EffectPersistence) -> Self {
        FrameDecoder { persistence }
    }

    /// Validate and apply one read. Invalid reads perform no writes.
    pub fn apply<L: BusLines>(
        &self,
        bytes: &[u8],
        voices: &mut Voices<'_, L>,
        effects: &mut EffectState,
        bank: &SampleBank,
    ) -> FrameOutcome {
        match Frame::parse(bytes) {
            Ok(frame) => {
                self.apply_frame(&frame, voices, effects, bank);
                FrameOutcome::Applied { chip: frame.chip() }
            }
            Err(err) => {
                log::debug!("dropping frame: {err}");
                FrameOutcome::Discarded(err)
            }
        }
    }

    /// Write a validated frame, then decode its effect slots. The register
    /// writes land first so an effect's amplitude writes always follow the
    /// frame's own.
    pub fn apply_frame<L: BusLines>(
        &self,
        frame: &Frame,
        voices: &mut Voices<'_, L>,
        effects: &mut EffectState,
        bank: &SampleBank,
    ) {
        let chip = frame.chip();
        let lit = voices.indicator(chip);
        voices.set_indicator(chip, !lit);

        let masked = frame.registers().iter().zip(WRITE_MASK.iter());
        for (register, (&value, &mask)) in masked.enumerate() {
            voices.write_masked(chip, register as u8, value, mask);
        }

        match frame.timer_synth_slot() {
            Some(slot) => {
                let level = (slot.count & 0x1F).min(MAX_LEVEL);
                effects.arm_timer_synth(
                    chip,
                    slot.voice,
                    level,
                    slot.reload_ticks(),
                    self.persistence,
                );
            }
            None if self.persistence == EffectPersistence::ClearOnZero => {
                effects.disarm_timer_synth(chip);
            }
            None => {}
        }

        if let Some(slot) = frame.sample_slot() {
            let sample_id = frame.sample_id(slot.voice);
            effects.arm_sample(chip, slot.voice, sample_id, bank, slot.reload_ticks());
        }
    }
}

/// Running frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames written to a chip
    pub applied: u64,
    /// Reads dropped for their length
    pub bad_length: u64,
    /// Frames dropped for their chip id
    pub bad_chip: u64,
}

impl FrameStats {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Applied { .. } => self.applied += 1,
            FrameOutcome::Discarded(FrameError::BadLength(_)) => self.bad_length += 1,
            FrameOutcome::Discarded(FrameError::BadChip(_)) => self.bad_chip += 1,
        }
    }
}

/// One frame-sized read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    /// A full frame arrived
    Frame([u8; FRAME_LEN]),
    /// The link went quiet mid-frame; the bytes are dropped
    Partial(usize),
    /// End of input
    Closed,
}

/// Fixed-size frame reads over a byte stream.
///
/// Every attempt starts from an empty buffer: bytes of a frame cut short by
/// a timeout are never glued onto the next one.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a serial port, pipe or file.
    pub fn new(inner: R) -> Self {
        FrameReader { inner }
    }

    /// Read until a full frame, a timeout or end of input.
    pub fn read_frame(&mut self) -> io::Result<FrameRead> {
        let mut buf = [0u8; FRAME_LEN];
        let mut filled = 0;
        while filled < FRAME_LEN {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(FrameRead::Closed),
                Ok(0) => return Ok(FrameRead::Partial(filled)),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Ok(FrameRead::Partial(filled));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(FrameRead::Frame(buf))
    }

    /// Release the stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::recording::RecordingLines;
    use crate::bus::SelectWiring;
    use crate::voice::RegisterShadow;
    use std::collections::VecDeque;

    fn frame_bytes(chip: u8, payload: [u8; PAYLOAD_LEN]) -> Vec<u8> {
        let mut bytes = vec![chip];
        bytes.extend_from_slice(&payload);
        bytes
    }

    #[test]
    fn test_parse_rejects_length_and_chip() {
        assert_eq!(Frame::parse(&[0; 16]), Err(FrameError::BadLength(16)));
        assert_eq!(Frame::parse(&[0; 18]), Err(FrameError::BadLength(18)));
        assert_eq!(
            Frame::parse(&frame_bytes(3, [0; PAYLOAD_LEN])),
            Err(FrameError::BadChip(3))
        );
        let frame = Frame::parse(&frame_bytes(2, [0; PAYLOAD_LEN])).unwrap();
        assert_eq!(frame.chip(), ChipId::YM2);
    }

    #[test]
    fn test_slot_decode() {
        // Voice selector 2 (B), prescaler 3, count 9
        let slot = EffectSlot::decode(0x20, 3 << 5, 9).unwrap();
        assert_eq!(slot.voice, Voice::B);
        assert_eq!(slot.prescaler, 3);
        assert_eq!(slot.reload_ticks(), 160);

        assert_eq!(EffectSlot::decode(0x0F, 0xFF, 9), None);
        // Only bits 5:4 select the voice
        assert_eq!(EffectSlot::decode(0xC0, 0, 0), None);
        assert_eq!(EffectSlot::decode(0xF0, 0, 0).map(|s| s.voice), Some(Voice::C));
    }

    #[test]
    fn test_sample_slot_reads_level_register() {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[3] = 0x30; // voice C
        payload[8] = 2 << 5;
        payload[10] = 0xE7;
        payload[15] = 4;
        let frame = Frame::parse(&frame_bytes(0, payload)).unwrap();
        let slot = frame.sample_slot().unwrap();
        assert_eq!(slot.voice, Voice::C);
        assert_eq!(slot.reload_ticks(), 50);
        assert_eq!(frame.sample_id(slot.voice), 0x07);
    }

    #[test]
    fn test_apply_writes_masked_registers_in_order() {
        let mut bus = RecordingLines::new(SelectWiring::Reversed).into_bus();
        let mut shadow = RegisterShadow::default();
        let mut effects = EffectState::new();
        let bank = SampleBank::new();
        let decoder = FrameDecoder::default();

        let bytes = frame_bytes(1, [0xFF; PAYLOAD_LEN]);
        let outcome = decoder.apply(
            &bytes,
            &mut Voices::new(&mut bus, &mut shadow),
            &mut effects,
            &bank,
        );
        assert_eq!(outcome, FrameOutcome::Applied { chip: ChipId::YM1 });

        let writes = bus.lines().writes();
        assert_eq!(writes.len(), SOUND_REGISTER_COUNT);
        for (i, write) in writes.iter().enumerate() {
            assert_eq!(write.register as usize, i);
            assert_eq!(write.chip, ChipId::YM1);
        }
        assert_eq!(bus.lines().register(ChipId::YM1, 1), 0x0F);
        assert_eq!(bus.lines().register(ChipId::YM1, 7), 0x3F);
        assert!(bus.lines().indicator(ChipId::YM1));
    }

    #[test]
    fn test_indicator_toggles_per_frame() {
        let mut bus = RecordingLines::new(SelectWiring::Direct).into_bus();
        let mut shadow = RegisterShadow::default();
        let mut effects = EffectState::new();
        let bank = SampleBank::new();
        let decoder = FrameDecoder::default();
        let bytes = frame_bytes(0, [0; PAYLOAD_LEN]);

        for expected in [true, false, true] {
            decoder.apply(&bytes, &mut Voices::new(&mut bus, &mut shadow), &mut effects, &bank);
            assert_eq!(bus.lines().indicator(ChipId::YM0), expected);
        }
    }

    #[test]
    fn test_zero_flag_clears_timer_synth() {
        let mut bus = RecordingLines::new(SelectWiring::Direct).into_bus();
        let mut shadow = RegisterShadow::default();
        let mut effects = EffectState::new();
        let bank = SampleBank::new();

        let mut armed = [0u8; PAYLOAD_LEN];
        armed[1] = 0x10;
        armed[14] = 20;
        let armed = frame_bytes(2, armed);
        let idle = frame_bytes(2, [0; PAYLOAD_LEN]);

        let clear = FrameDecoder::new(EffectPersistence::ClearOnZero);
        clear.apply(&armed, &mut Voices::new(&mut bus, &mut shadow), &mut effects, &bank);
        let state = effects.timer_synth(ChipId::YM2, Voice::A);
        assert!(state.is_active());
        assert_eq!(state.level(), 15);
        clear.apply(&idle, &mut Voices::new(&mut bus, &mut shadow), &mut effects, &bank);
        assert!(!effects.timer_synth(ChipId::YM2, Voice::A).is_active());

        let persist = FrameDecoder::new(EffectPersistence::Persist);
        persist.apply(&armed, &mut Voices::new(&mut bus, &mut shadow), &mut effects, &bank);
        persist.apply(&idle, &mut Voices::new(&mut bus, &mut shadow), &mut effects, &bank);
        assert!(effects.timer_synth(ChipId::YM2, Voice::A).is_active());
    }

    #[test]
    fn test_frame_stats() {
        let mut stats = FrameStats::default();
        stats.record(&FrameOutcome::Applied { chip: ChipId::YM0 });
        stats.record(&FrameOutcome::Discarded(FrameError::BadChip(9)));
        stats.record(&FrameOutcome::Discarded(FrameError::BadLength(3)));
        stats.record(&FrameOutcome::Discarded(FrameError::BadLength(0)));
        assert_eq!(
            stats,
            FrameStats {
                applied: 1,
                bad_length: 2,
                bad_chip: 1,
            }
        );
    }

    /// Replays scripted read results.
    struct ScriptedPort(VecDeque<io::Result<Vec<u8>>>);

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len());
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    #[test]
    fn test_reader_assembles_chunks() {
        let port = ScriptedPort(VecDeque::from(vec![
            Ok(vec![1; 5]),
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(vec![2; 12]),
        ]));
        let mut reader = FrameReader::new(port);
        let read = reader.read_frame().unwrap();
        let mut expected = [2u8; FRAME_LEN];
        expected[..5].fill(1);
        assert_eq!(read, FrameRead::Frame(expected));
        assert_eq!(reader.read_frame().unwrap(), FrameRead::Closed);
    }

    #[test]
    fn test_reader_drops_partial_frames() {
        let port = ScriptedPort(VecDeque::from(vec![
            Ok(vec![0; 9]),
            Err(io::Error::from(io::ErrorKind::TimedOut)),
            Ok(vec![7; FRAME_LEN]),
        ]));
        let mut reader = FrameReader::new(port);
        assert_eq!(reader.read_frame().unwrap(), FrameRead::Partial(9));
        assert_eq!(reader.read_frame().unwrap(), FrameRead::Frame([7; FRAME_LEN]));
    }

    #[test]
    fn test_reader_passes_real_errors() {
        let port = ScriptedPort(VecDeque::from(vec![Err(io::Error::from(
            io::ErrorKind::BrokenPipe,
        ))]));
        let mut reader = FrameReader::new(port);
        assert!(reader.read_frame().is_err());
    }
}
