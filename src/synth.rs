//! Shared synth state and the scheduler runtime
//!
//! [`Synth`] owns everything the frame path and the effect scheduler both
//! touch: the bus (with its selection and latch caches), the register
//! shadows, the effect state and the sample bank. It is shared between the
//! two contexts as a [`SharedSynth`]; holding its mutex is the critical
//! section, so one full register write, one frame or one scheduler
//! activation always runs to completion before the other side gets the bus.

use crate::bus::{Bus, BusLines};
use crate::chip::ChipId;
use crate::config::SynthConfig;
use crate::effects::{EffectState, SampleBank};
use crate::frame::{FrameDecoder, FrameOutcome, FrameStats};
use crate::scheduler::EffectScheduler;
use crate::voice::{RegisterShadow, Voices};
use crate::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Synth shared between the frame loop and the tick runner.
pub type SharedSynth<L> = Arc<Mutex<Synth<L>>>;

/// All per-chip and per-voice state plus the bus it drives.
pub struct Synth<L> {
    bus: Bus<L>,
    shadow: RegisterShadow,
    effects: EffectState,
    samples: SampleBank,
    decoder: FrameDecoder,
    scheduler: EffectScheduler,
    stats: FrameStats,
}

impl<L: BusLines> Synth<L> {
    /// Build a synth over `lines`. Nothing is written until [`Synth::begin`].
    pub fn new(lines: L, config: &SynthConfig) -> Self {
        Synth {
            bus: Bus::new(lines, config.select_wiring),
            shadow: RegisterShadow::new(config.master_clock_hz),
            effects: EffectState::new(),
            samples: SampleBank::new(),
            decoder: FrameDecoder::new(config.effect_persistence),
            scheduler: EffectScheduler::new(config.tick_mode),
            stats: FrameStats::default(),
        }
    }

    /// Replace the sample bank.
    pub fn with_samples(mut self, samples: SampleBank) -> Self {
        self.samples = samples;
        self
    }

    /// Wrap for sharing with a [`TickRunner`].
    pub fn into_shared(self) -> SharedSynth<L> {
        Arc::new(Mutex::new(self))
    }

    /// Put every chip into its start-up state and drop all effects.
    pub fn begin(&mut self) {
        self.effects = EffectState::new();
        self.voices().begin();
        log::info!(
            "synth ready: {:?} wiring, {} Hz clock",
            self.bus.wiring(),
            self.shadow.master_clock_hz()
        );
    }

    /// Setter view for the MIDI and patch collaborators.
    pub fn voices(&mut self) -> Voices<'_, L> {
        Voices::new(&mut self.bus, &mut self.shadow)
    }

    /// Silence a chip and stop its effects, so the scheduler cannot bring
    /// the voices back.
    pub fn mute(&mut self, chip: ChipId) {
        self.effects.clear_chip(chip);
        self.voices().mute(chip);
    }

    /// Decode and apply one frame-sized read.
    pub fn apply_frame(&mut self, bytes: &[u8]) -> FrameOutcome {
        let mut voices = Voices::new(&mut self.bus, &mut self.shadow);
        let outcome = self
            .decoder
            .apply(bytes, &mut voices, &mut self.effects, &self.samples);
        self.stats.record(&outcome);
        outcome
    }

    /// Run one scheduler activation. Returns the number of amplitude writes.
    pub fn tick(&mut self) -> usize {
        let mut voices = Voices::new(&mut self.bus, &mut self.shadow);
        self.scheduler.activate(&mut voices, &mut self.effects)
    }

    /// Effect state.
    pub fn effects(&self) -> &EffectState {
        &self.effects
    }

    /// Mutable effect state.
    pub fn effects_mut(&mut self) -> &mut EffectState {
        &mut self.effects
    }

    /// Sample bank.
    pub fn samples(&self) -> &SampleBank {
        &self.samples
    }

    /// Register shadows.
    pub fn shadow(&self) -> &RegisterShadow {
        &self.shadow
    }

    /// Bus driver.
    pub fn bus(&self) -> &Bus<L> {
        &self.bus
    }

    /// Bus backend.
    pub fn lines(&self) -> &L {
        self.bus.lines()
    }

    /// Mutable bus backend.
    pub fn lines_mut(&mut self) -> &mut L {
        self.bus.lines_mut()
    }

    /// Scheduler.
    pub fn scheduler(&self) -> &EffectScheduler {
        &self.scheduler
    }

    /// Frame counters.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

/// Sleep only when the next activation is further away than this; spin
/// for the rest.
const SPIN_WINDOW: Duration = Duration::from_millis(2);

/// Activations the runner may fall behind before it drops them.
const MAX_BACKLOG: u32 = 64;

/// Fixed-rate thread running scheduler activations against a shared synth.
pub struct TickRunner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl TickRunner {
    /// Start activations at the synth's configured tick period.
    pub fn spawn<L>(synth: SharedSynth<L>) -> Result<Self>
    where
        L: BusLines + Send + 'static,
    {
        let period = synth.lock().scheduler().mode().period();
        Self::spawn_with_period(synth, period)
    }

    /// Start activations at an explicit period.
    pub fn spawn_with_period<L>(synth: SharedSynth<L>, period: Duration) -> Result<Self>
    where
        L: BusLines + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("effect-scheduler".into())
            .spawn(move || run_ticks(&synth, period, &flag))?;
        log::debug!("tick runner started, period {period:?}");
        Ok(TickRunner {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and return how many activations it ran.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(activations)) => activations,
            Some(Err(_)) => {
                log::error!("tick runner panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for TickRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_ticks<L: BusLines>(synth: &Mutex<Synth<L>>, period: Duration, stop: &AtomicBool) -> u64 {
    let mut activations = 0u64;
    let mut deadline = Instant::now() + period;
    while !stop.load(Ordering::Acquire) {
        synth.lock().tick();
        activations += 1;

        let now = Instant::now();
        if now > deadline + period * MAX_BACKLOG {
            log::trace!("tick runner behind by {:?}, resyncing", now - deadline);
            deadline = now;
        }
        if let Some(wait) = deadline.checked_duration_since(now) {
            if wait > SPIN_WINDOW {
                std::thread::sleep(wait - SPIN_WINDOW);
            }
            while Instant::now() < deadline {
                std::hint::spin_loop();
            }
        }
        deadline += period;
    }
    activations
}
