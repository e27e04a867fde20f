//! Effect State Model
//!
//! Per-(chip, voice) state for the two amplitude-register effects:
//! - Timer-synth: the voice's amplitude toggles between a fixed level and
//!   zero every time a countdown expires (square-wave gating).
//! - Sample playback: every expiry pushes the next 4-bit sample value into
//!   the amplitude register until the sample runs out.
//!
//! Countdowns are kept in base scheduler ticks. Timer rates arrive as a
//! 3-bit prescaler code and an 8-bit count, exactly as an MFP timer would be
//! programmed, and become `(count + 1) × PRESCALER[code]` ticks.

use crate::chip::{ChipId, Voice, CHIP_COUNT, VOICE_COUNT};
use crate::{Result, SynthError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tick multiplier for each 3-bit prescaler code.
pub const PRESCALER: [u16; 8] = [4, 4, 10, 16, 50, 64, 100, 200];

/// Number of sample slots addressable by a 5-bit sample id.
pub const SAMPLE_SLOTS: usize = 32;

/// Loudest value an amplitude register takes from an effect.
pub const MAX_LEVEL: u8 = 15;

/// Reload period in base ticks for a prescaler code and count byte.
pub fn reload_ticks(prescaler: u8, count: u8) -> u16 {
    (count as u16 + 1) * PRESCALER[(prescaler & 0x07) as usize]
}

/// What a zero slot-1 flag on a later frame does to armed timer-synth voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectPersistence {
    /// A zero flag disarms the chip's timer-synth voices, and arming one
    /// voice disarms the chip's others
    #[default]
    ClearOnZero,
    /// Armed voices run until re-armed with new parameters
    Persist,
}

/// Common countdown used by both effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Countdown {
    reload: u16,
    phase: u16,
}

impl Countdown {
    fn armed(reload: u16) -> Self {
        let reload = reload.max(1);
        Countdown {
            reload,
            phase: reload,
        }
    }

    /// Consume `ticks` base ticks, reloading on every expiry. `expire` runs
    /// once per expiry and stops the countdown early by returning `false`.
    fn advance(&mut self, ticks: u16, mut expire: impl FnMut() -> bool) {
        let mut remaining = ticks;
        while remaining >= self.phase {
            remaining -= self.phase;
            self.phase = self.reload;
            if !expire() {
                return;
            }
        }
        self.phase -= remaining;
    }
}

/// Square-wave amplitude gating on one voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSynthState {
    active: bool,
    level: u8,
    countdown: Countdown,
    toggle: bool,
}

impl TimerSynthState {
    /// Arm with a level (clamped to 15) and a reload period in ticks. The
    /// countdown restarts and the output starts low.
    pub fn arm(&mut self, level: u8, reload_ticks: u16) {
        self.active = true;
        self.level = level.min(MAX_LEVEL);
        self.countdown = Countdown::armed(reload_ticks);
        self.toggle = false;
    }

    /// Stop gating.
    pub fn disarm(&mut self) {
        self.active = false;
    }

    /// Advance by `ticks` base ticks, flipping the toggle on every expiry.
    pub fn advance(&mut self, ticks: u16) {
        if !self.active {
            return;
        }
        let toggle = &mut self.toggle;
        self.countdown.advance(ticks, || {
            *toggle = !*toggle;
            true
        });
    }

    /// Amplitude this voice currently wants.
    pub fn amplitude(&self) -> u8 {
        if self.toggle {
            self.level
        } else {
            0
        }
    }

    /// Whether gating is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Gate level (0-15).
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Reload period in ticks.
    pub fn reload_ticks(&self) -> u16 {
        self.countdown.reload
    }

    /// Ticks left until the next toggle.
    pub fn phase_countdown(&self) -> u16 {
        self.countdown.phase
    }

    /// Whether the output is currently at `level`.
    pub fn toggle(&self) -> bool {
        self.toggle
    }
}

/// 4-bit sample streamed through one voice's amplitude register.
#[derive(Debug, Clone)]
pub struct SamplePlaybackState {
    active: bool,
    sample_id: u8,
    data: Arc<[u8]>,
    pos: usize,
    current: Option<u8>,
    /// `current` changed and has not reached the register yet
    pending: bool,
    countdown: Countdown,
}

impl Default for SamplePlaybackState {
    fn default() -> Self {
        SamplePlaybackState {
            active: false,
            sample_id: 0,
            data: Arc::from([]),
            pos: 0,
            current: None,
            pending: false,
            countdown: Countdown::default(),
        }
    }
}

impl SamplePlaybackState {
    /// Start `data` (sample `sample_id`) from its first byte. An empty
    /// sample leaves the voice idle.
    pub fn arm(&mut self, sample_id: u8, data: Arc<[u8]>, reload_ticks: u16) {
        self.sample_id = sample_id & 0x1F;
        self.active = !data.is_empty();
        self.data = data;
        self.pos = 0;
        self.current = None;
        self.pending = false;
        self.countdown = Countdown::armed(reload_ticks);
    }

    /// Stop playback.
    pub fn disarm(&mut self) {
        self.active = false;
        self.current = None;
        self.pending = false;
    }

    /// Advance by `ticks` base ticks. Each expiry moves the cursor one byte;
    /// the voice goes idle once the cursor reaches the sample length.
    pub fn advance(&mut self, ticks: u16) {
        if !self.active {
            return;
        }
        let Self {
            active,
            data,
            pos,
            current,
            pending,
            countdown,
            ..
        } = self;
        countdown.advance(ticks, || {
            if let Some(&byte) = data.get(*pos) {
                *current = Some(byte & 0x0F);
                *pos += 1;
                *pending = true;
            }
            if *pos >= data.len() {
                *active = false;
            }
            *active
        });
    }

    /// Low nibble of the byte most recently reached by the cursor. `None`
    /// before the first expiry, and once playback is over and its last
    /// value has been written.
    pub fn amplitude(&self) -> Option<u8> {
        if self.active || self.pending {
            self.current
        } else {
            None
        }
    }

    /// The voice's amplitude register was written this activation, with
    /// this sample's value or one that overrides it.
    pub fn settle(&mut self) {
        self.pending = false;
    }

    /// Whether playback is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sample slot being played.
    pub fn sample_id(&self) -> u8 {
        self.sample_id
    }

    /// Cursor advances so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reload period in ticks.
    pub fn reload_ticks(&self) -> u16 {
        self.countdown.reload
    }

    /// Ticks left until the next cursor advance.
    pub fn phase_countdown(&self) -> u16 {
        self.countdown.phase
    }
}

/// Both effects for every chip and voice.
#[derive(Debug, Clone, Default)]
pub struct EffectState {
    timer_synth: [[TimerSynthState; VOICE_COUNT]; CHIP_COUNT],
    samples: [[SamplePlaybackState; VOICE_COUNT]; CHIP_COUNT],
}

impl EffectState {
    /// All voices idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer-synth state of one voice.
    pub fn timer_synth(&self, chip: ChipId, voice: Voice) -> &TimerSynthState {
        &self.timer_synth[chip.index()][voice.index()]
    }

    /// Mutable timer-synth state of one voice.
    pub fn timer_synth_mut(&mut self, chip: ChipId, voice: Voice) -> &mut TimerSynthState {
        &mut self.timer_synth[chip.index()][voice.index()]
    }

    /// Sample state of one voice.
    pub fn sample(&self, chip: ChipId, voice: Voice) -> &SamplePlaybackState {
        &self.samples[chip.index()][voice.index()]
    }

    /// Mutable sample state of one voice.
    pub fn sample_mut(&mut self, chip: ChipId, voice: Voice) -> &mut SamplePlaybackState {
        &mut self.samples[chip.index()][voice.index()]
    }

    /// Arm timer-synth on `voice`. Under [`EffectPersistence::ClearOnZero`]
    /// the chip's other timer-synth voices are disarmed.
    pub fn arm_timer_synth(
        &mut self,
        chip: ChipId,
        voice: Voice,
        level: u8,
        reload_ticks: u16,
        persistence: EffectPersistence,
    ) {
        if persistence == EffectPersistence::ClearOnZero {
            self.disarm_timer_synth(chip);
        }
        log::trace!("{chip} voice {voice}: timer-synth level {level} every {reload_ticks} ticks");
        self.timer_synth_mut(chip, voice).arm(level, reload_ticks);
    }

    /// Disarm every timer-synth voice on `chip`.
    pub fn disarm_timer_synth(&mut self, chip: ChipId) {
        for state in self.timer_synth[chip.index()].iter_mut() {
            state.disarm();
        }
    }

    /// Start sample `sample_id` from `bank` on `voice`.
    pub fn arm_sample(
        &mut self,
        chip: ChipId,
        voice: Voice,
        sample_id: u8,
        bank: &SampleBank,
        reload_ticks: u16,
    ) {
        let data = bank.get(sample_id);
        log::trace!(
            "{chip} voice {voice}: sample {sample_id} ({} bytes) every {reload_ticks} ticks",
            data.len()
        );
        self.sample_mut(chip, voice).arm(sample_id, data, reload_ticks);
    }

    /// Disarm both effects on every voice of `chip`.
    pub fn clear_chip(&mut self, chip: ChipId) {
        for voice in Voice::ALL {
            self.timer_synth_mut(chip, voice).disarm();
            self.sample_mut(chip, voice).disarm();
        }
    }

    /// Whether any effect is running on `voice`.
    pub fn is_armed(&self, chip: ChipId, voice: Voice) -> bool {
        self.timer_synth(chip, voice).is_active() || self.sample(chip, voice).is_active()
    }
}

/// Sample table addressed by 5-bit sample ids. A slot's length is the
/// length of its data; empty slots play nothing.
#[derive(Debug, Clone)]
pub struct SampleBank {
    slots: [Arc<[u8]>; SAMPLE_SLOTS],
}

impl Default for SampleBank {
    fn default() -> Self {
        SampleBank {
            slots: std::array::from_fn(|_| Arc::from([])),
        }
    }
}

impl SampleBank {
    /// Bank with every slot empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample. Only the low nibble of each byte is ever played.
    pub fn insert(&mut self, id: u8, data: impl Into<Arc<[u8]>>) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or_else(|| SynthError::SampleError(format!("sample id {id} out of range")))?;
        *slot = data.into();
        Ok(())
    }

    /// Sample in slot `id` (masked to 5 bits).
    pub fn get(&self, id: u8) -> Arc<[u8]> {
        Arc::clone(&self.slots[(id & 0x1F) as usize])
    }

    /// Length table entry of slot `id`.
    pub fn len(&self, id: u8) -> usize {
        self.slots[(id & 0x1F) as usize].len()
    }

    /// Whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_empty())
    }
}
