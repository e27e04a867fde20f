//! Effect Scheduler
//!
//! One call to [`EffectScheduler::activate`] is one periodic activation: it
//! advances every armed countdown and performs the amplitude writes that
//! realize the effects. The body is bounded (at most nine writes) and never
//! blocks; the caller owns the timing and the critical section.
//!
//! Two activation rates:
//! - [`TickMode::EveryTick`]: one base tick per activation, every armed
//!   voice written every time.
//! - [`TickMode::Batched`]: eight base ticks per activation and a single
//!   write, rotating over the nine chip×voice combinations. The rotation
//!   has eight slots, so each pass skips one combination and the skipped
//!   one moves on by one every pass.

use crate::bus::BusLines;
use crate::chip::{ChipId, Voice, CHIP_COUNT, VOICE_COUNT};
use crate::effects::EffectState;
use crate::voice::Voices;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base countdown tick, in microseconds.
pub const BASE_TICK_US: u64 = 4;

/// Chip×voice combinations sharing the rotation.
pub const COMBINATIONS: usize = CHIP_COUNT * VOICE_COUNT;

/// Slots in one batched rotation.
pub const ROTATION_SLOTS: usize = 8;

/// Activation rate of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickMode {
    /// 4 µs activations, every armed voice written each time
    EveryTick,
    /// 32 µs activations, one round-robin write each time
    #[default]
    Batched,
}

impl TickMode {
    /// Base ticks consumed per activation.
    pub fn ticks_per_activation(self) -> u16 {
        match self {
            TickMode::EveryTick => 1,
            TickMode::Batched => 8,
        }
    }

    /// Time between activations.
    pub fn period(self) -> Duration {
        Duration::from_micros(BASE_TICK_US * self.ticks_per_activation() as u64)
    }
}

/// Amplitude a voice should carry now. Timer-synth wins over a sample
/// sharing the same register.
pub fn voice_amplitude(effects: &EffectState, chip: ChipId, voice: Voice) -> Option<u8> {
    let synth = effects.timer_synth(chip, voice);
    if synth.is_active() {
        Some(synth.amplitude())
    } else {
        effects.sample(chip, voice).amplitude()
    }
}

fn combination(index: usize) -> (ChipId, Voice) {
    (ChipId::ALL[index / VOICE_COUNT], Voice::ALL[index % VOICE_COUNT])
}

/// Periodic effect driver.
#[derive(Debug, Clone)]
pub struct EffectScheduler {
    mode: TickMode,
    slot: usize,
    pass: usize,
    activations: u64,
    writes: u64,
}

impl EffectScheduler {
    /// Scheduler for the given activation rate.
    pub fn new(mode: TickMode) -> Self {
        EffectScheduler {
            mode,
            slot: 0,
            pass: 0,
            activations: 0,
            writes: 0,
        }
    }

    /// Activation rate.
    pub fn mode(&self) -> TickMode {
        self.mode
    }

    /// Activations run so far.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Amplitude writes performed so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Run one activation. Returns the number of amplitude writes made.
    pub fn activate<L: BusLines>(
        &mut self,
        voices: &mut Voices<'_, L>,
        effects: &mut EffectState,
    ) -> usize {
        self.activations += 1;
        let ticks = self.mode.ticks_per_activation();
        for index in 0..COMBINATIONS {
            let (chip, voice) = combination(index);
            effects.timer_synth_mut(chip, voice).advance(ticks);
            effects.sample_mut(chip, voice).advance(ticks);
        }

        let written = match self.mode {
            TickMode::EveryTick => (0..COMBINATIONS)
                .filter(|&index| self.write_combination(index, voices, effects))
                .count(),
            TickMode::Batched => {
                let index = self.next_combination();
                self.write_combination(index, voices, effects) as usize
            }
        };
        self.writes += written as u64;
        written
    }

    /// Advance the rotation and return the combination it lands on.
    fn next_combination(&mut self) -> usize {
        let index = (self.pass + self.slot) % COMBINATIONS;
        self.slot += 1;
        if self.slot == ROTATION_SLOTS {
            self.slot = 0;
            self.pass = (self.pass + 1) % COMBINATIONS;
        }
        index
    }

    /// Write one voice's amplitude if any effect owns it. A sample's last
    /// value stays owed until this lands, however long the rotation takes
    /// to come back round.
    fn write_combination<L: BusLines>(
        &self,
        index: usize,
        voices: &mut Voices<'_, L>,
        effects: &mut EffectState,
    ) -> bool {
        let (chip, voice) = combination(index);
        match voice_amplitude(effects, chip, voice) {
            Some(level) => {
                voices.poke_level(chip, voice, level);
                effects.sample_mut(chip, voice).settle();
                true
            }
            None => false,
        }
    }
}

impl Default for EffectScheduler {
    fn default() -> Self {
        Self::new(TickMode::default())
    }
}
