//! Serial-streamed register player for up to three YM2149 PSGs
//!
//! Register frames arrive over a serial link and are written to one of three
//! YM2149 chips sharing a parallel bus. On top of the 14 sound registers, two
//! effects reuse spare frame bits and are realized by rewriting amplitude
//! registers from a periodic scheduler:
//! - timer-synth: square-wave gating of a voice's amplitude
//! - sample playback: 4-bit samples streamed into a voice's amplitude
//!
//! # Layout
//! - [`bus`]: two-phase bus write protocol over pluggable line backends
//! - [`voice`]: register shadows and the setter surface (notes, volumes, ports)
//! - [`effects`]: per-voice effect state and the sample bank
//! - [`frame`]: wire format, masked register writes, effect slot decoding
//! - [`scheduler`]: periodic activations that drive the effects
//! - [`synth`]: the shared state container and the fixed-rate tick runner
//!
//! # Crate feature flags
//! - `port-io` (default): cycle-exact backend writing whole GPIO ports
//! - `hal-pins` (default): portable backend over `embedded-hal` output pins
//!
//! # Quick start
//! ```no_run
//! use ym2149_serial::bus::recording::RecordingLines;
//! use ym2149_serial::{Synth, SynthConfig, TickRunner};
//! use std::sync::Arc;
//!
//! let config = SynthConfig::default();
//! let mut synth = Synth::new(RecordingLines::new(config.select_wiring), &config);
//! synth.begin();
//! let shared = synth.into_shared();
//! let _runner = TickRunner::spawn(Arc::clone(&shared)).unwrap();
//!
//! let frame = [0u8; ym2149_serial::FRAME_LEN];
//! shared.lock().apply_frame(&frame);
//! ```

#![warn(missing_docs)]

pub mod bus; // Parallel bus driver
pub mod chip; // Chip / voice identifiers
pub mod config; // TOML configuration
pub mod effects; // Effect state model
pub mod frame; // Serial frame decoding
pub mod patch; // Voice patch blocks
pub mod registers; // YM2149 register map
pub mod scheduler; // Effect scheduler
pub mod synth; // Shared state and tick runner
pub mod voice; // Voice register model

/// Error types for the host-side parts of the player
#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    /// IO error from filesystem or serial device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Sample could not be loaded or stored
    #[error("Sample error: {0}")]
    SampleError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type for fallible (host-side) operations
pub type Result<T> = std::result::Result<T, SynthError>;

// Public API exports
pub use bus::{Bus, BusControl, BusLines, SelectWiring};
pub use chip::{Channel, ChipId, Voice};
pub use config::{SampleSource, SynthConfig};
pub use effects::{EffectPersistence, EffectState, SampleBank};
pub use frame::{FrameDecoder, FrameError, FrameOutcome, FrameRead, FrameReader, FRAME_LEN};
pub use patch::{Patch, PATCH_SIZE};
pub use registers::{EnvelopeShape, MixerFlags, Register};
pub use scheduler::{EffectScheduler, TickMode};
pub use synth::{SharedSynth, Synth, TickRunner};
pub use voice::{GpioPort, NoiseMode, RegisterShadow, Voices};
