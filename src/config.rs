//! Board configuration
//!
//! Loaded from TOML. Every field has a default matching the reference board,
//! so an empty file is a valid configuration:
//!
//! ```toml
//! master_clock_hz = 500000
//! select_wiring = "reversed"     # or "direct"
//! tick_mode = "batched"          # or "every-tick"
//! effect_persistence = "clear-on-zero"   # or "persist"
//!
//! [[samples]]
//! id = 0
//! path = "samples/kick.raw"
//! ```

use crate::bus::SelectWiring;
use crate::effects::{EffectPersistence, SampleBank, SAMPLE_SLOTS};
use crate::scheduler::TickMode;
use crate::voice::DEFAULT_MASTER_CLOCK_HZ;
use crate::{Result, SynthError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_master_clock_hz() -> u32 {
    DEFAULT_MASTER_CLOCK_HZ
}

/// A raw sample file for one bank slot. Each byte is one step; only its
/// low nibble is played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleSource {
    /// Bank slot (0-31)
    pub id: u8,
    /// File path, relative to the configuration file
    pub path: PathBuf,
}

/// Synth configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthConfig {
    /// Chip master clock in Hz
    #[serde(default = "default_master_clock_hz")]
    pub master_clock_hz: u32,
    /// Select decoder wiring
    #[serde(default)]
    pub select_wiring: SelectWiring,
    /// Scheduler activation rate
    #[serde(default)]
    pub tick_mode: TickMode,
    /// What a zero timer-synth flag does
    #[serde(default)]
    pub effect_persistence: EffectPersistence,
    /// Sample bank contents
    #[serde(default)]
    pub samples: Vec<SampleSource>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            master_clock_hz: default_master_clock_hz(),
            select_wiring: SelectWiring::default(),
            tick_mode: TickMode::default(),
            effect_persistence: EffectPersistence::default(),
            samples: Vec::new(),
        }
    }
}

impl SynthConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SynthConfig =
            toml::from_str(text).map_err(|e| SynthError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| SynthError::ConfigError(format!("{}: {e}", path.display())))
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SynthError::ConfigError(e.to_string()))
    }

    /// Reject values the hardware cannot take.
    pub fn validate(&self) -> Result<()> {
        if self.master_clock_hz == 0 {
            return Err(SynthError::ConfigError(
                "master_clock_hz must be non-zero".into(),
            ));
        }
        let mut seen = [false; SAMPLE_SLOTS];
        for sample in &self.samples {
            let slot = seen.get_mut(sample.id as usize).ok_or_else(|| {
                SynthError::ConfigError(format!(
                    "sample id {} out of range (0-{})",
                    sample.id,
                    SAMPLE_SLOTS - 1
                ))
            })?;
            if *slot {
                return Err(SynthError::ConfigError(format!(
                    "sample id {} listed twice",
                    sample.id
                )));
            }
            *slot = true;
        }
        Ok(())
    }

    /// Load every listed sample file. Relative paths resolve against
    /// `base_dir`.
    pub fn load_samples(&self, base_dir: &Path) -> Result<SampleBank> {
        let mut bank = SampleBank::new();
        for sample in &self.samples {
            let path = base_dir.join(&sample.path);
            let data = std::fs::read(&path).map_err(|e| {
                SynthError::SampleError(format!("{}: {e}", path.display()))
            })?;
            log::info!(
                "sample {:2}: {} ({} bytes)",
                sample.id,
                path.display(),
                data.len()
            );
            bank.insert(sample.id, data)?;
        }
        Ok(bank)
    }
}
