//! Engine configuration.
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file yields a working engine:
//!
//! ```toml
//! [provider]
//! active = "echo"
//!
//! [queue]
//! mode = "followup"      # or "collect"
//! max_pending = 8        # 0 rejects input while busy
//! drop_policy = "none"   # or "oldest" / "newest"
//! clear_on_stop = true
//!
//! [events]
//! capacity = 128
//!
//! [logging]
//! filter = "info"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DialogueError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub provider: ProviderConfig,
    pub queue: QueueConfig,
    pub events: EventConfig,
    pub logging: LoggingConfig,
}

/// Which registered provider the router sends turns to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub active: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            active: "echo".to_owned(),
        }
    }
}

/// How input submitted while a turn is running is replayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Replay queued inputs one turn at a time.
    #[default]
    Followup,
    /// Merge consecutive queued texts into a single turn.
    Collect,
}

/// What happens when the pending queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Reject the new input.
    #[default]
    None,
    /// Evict the oldest queued input.
    Oldest,
    /// Evict the most recently queued input.
    Newest,
}

/// Pending-input queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub mode: QueueMode,
    /// Zero disables queueing; input submitted while busy is rejected.
    pub max_pending: usize,
    pub drop_policy: DropPolicy,
    /// Discard queued input when the user explicitly stops a turn.
    pub clear_on_stop: bool,
}

fn default_max_pending() -> usize {
    8
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::default(),
            max_pending: default_max_pending(),
            drop_policy: DropPolicy::default(),
            clear_on_stop: true,
        }
    }
}

/// Event broadcast settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Broadcast channel capacity; slow subscribers lag past this.
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 128 }
    }
}

/// Log filter used by binaries when `RUST_LOG` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    /// Returns [`DialogueError::Config`] if the file cannot be read, parsed,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DialogueError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&contents, path)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// # Errors
    /// Same as [`load`](Self::load) for files that exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(DialogueError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    /// `<config dir>/colloquy/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("colloquy")
            .join("config.toml")
    }

    /// Check values serde cannot express.
    ///
    /// # Errors
    /// Returns [`DialogueError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.provider.active.trim().is_empty() {
            return Err(DialogueError::Config(
                "provider.active must name a provider".to_owned(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(DialogueError::Config(
                "events.capacity must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Write the config atomically (temp file, fsync, rename).
    ///
    /// # Errors
    /// Returns [`DialogueError::Config`] on serialization or write failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| DialogueError::Config(format!("failed to serialize config: {e}")))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DialogueError::Config(format!(
                    "failed to create config directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
            DialogueError::Config(format!(
                "failed to create temp file '{}': {e}",
                tmp_path.display()
            ))
        })?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| DialogueError::Config(format!("failed to write temp file: {e}")))?;
        std::fs::rename(&tmp_path, path).map_err(|e| {
            DialogueError::Config(format!(
                "failed to rename temp file to '{}': {e}",
                path.display()
            ))
        })
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| {
            DialogueError::Config(format!(
                "failed to parse config file '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}
