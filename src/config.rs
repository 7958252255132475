//! Configuration management for bfcpu-emu.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (`BFCPU_TAPE_LEN`, `BFCPU_MAX_CYCLES`)
//! 2. Project-local config file (`./bfcpu-emu.toml`)
//! 3. User config file (`~/.config/bfcpu-emu/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # bfcpu-emu.toml
//!
//! # Number of cells in the data store (tape)
//! tape_len = 512
//!
//! # Cycle budget for a run
//! max_cycles = 10000000
//!
//! # Transmit side asserts ready once every N cycles (1 = always, 0 = never)
//! tx_ready_every = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// bfcpu-emu configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of cells in the data store. The data pointer wraps modulo
    /// this length.
    pub tape_len: usize,

    /// Cycle budget for `run_until_quiescent`.
    pub max_cycles: u64,

    /// Transmit-ready cadence: the external transmit side asserts ready
    /// once every this many cycles (1 = every cycle, 0 = never).
    pub tx_ready_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tape_len: 512,
            max_cycles: 10_000_000,
            tx_ready_every: 1,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `bfcpu-emu.toml`
    /// 3. User config `~/.config/bfcpu-emu/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config = user_config;
        }

        if let Some(local_config) = Self::load_local_config() {
            config = local_config;
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Load user configuration from ~/.config/bfcpu-emu/config.toml
    fn load_user_config() -> Option<Self> {
        let config_dir = dirs::config_dir()?;
        let config_path = config_dir.join("bfcpu-emu").join("config.toml");
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./bfcpu-emu.toml
    fn load_local_config() -> Option<Self> {
        Self::load_from_file(Path::new("bfcpu-emu.toml"))
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BFCPU_TAPE_LEN") {
            match v.parse() {
                Ok(n) => self.tape_len = n,
                Err(_) => log::warn!("Ignoring non-numeric BFCPU_TAPE_LEN: {}", v),
            }
        }
        if let Ok(v) = std::env::var("BFCPU_MAX_CYCLES") {
            match v.parse() {
                Ok(n) => self.max_cycles = n,
                Err(_) => log::warn!("Ignoring non-numeric BFCPU_MAX_CYCLES: {}", v),
            }
        }
    }
}
