// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host configuration.
//!
//! Settings are resolved once at worker startup and are read-only afterwards.
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. A JSON configuration file
//! 3. `SPACEY_CGI_*` environment variables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{HostError, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "SPACEY_CGI_CONFIG";

/// Configuration file used when none is given explicitly
pub const DEFAULT_CONFIG_PATH: &str = "/etc/spacey-cgi.json";

const ENV_PREFIX: &str = "SPACEY_CGI_";

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directories searched for non-relative module names, in order
    pub library_path: Vec<PathBuf>,

    /// Modules required into every context before the main file
    pub library_autoload: Vec<String>,

    /// Extensions tried (in order) when a module name has no exact match
    pub extensions: Vec<String>,

    /// File extension identifying native shared objects
    pub native_extension: String,

    /// Collector pacing
    pub gc: GcConfig,

    /// Unrecognized keys, kept but ignored
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Collector pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GcConfig {
    /// Pending external bytes that force a collection
    pub threshold: usize,

    /// Force a collection every N completed requests (0 disables)
    pub collect_every: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            threshold: 8 * 1024 * 1024,
            collect_every: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let native_extension = default_native_extension().to_string();
        Self {
            library_path: Vec::new(),
            library_autoload: Vec::new(),
            extensions: vec![".js".to_string(), format!(".{}", native_extension)],
            native_extension,
            gc: GcConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// An explicit `path` must exist; otherwise `SPACEY_CGI_CONFIG` is
    /// consulted, then [`DEFAULT_CONFIG_PATH`] if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| {
                    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                    default.is_file().then_some(default)
                }),
        };

        if let Some(file) = file {
            config = Self::from_file(&file)?;
        }

        config.load_from_env(crate::request::process_environment());
        Ok(config)
    }

    /// Read configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HostError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        if !config.extra.is_empty() {
            tracing::debug!(
                "Ignoring unknown configuration keys: {:?}",
                config.extra.keys().collect::<Vec<_>>()
            );
        }
        Ok(config)
    }

    /// Apply `SPACEY_CGI_*` overrides from an environment listing.
    pub fn load_from_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value by its dashed name.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "library-path" => {
                self.library_path = std::env::split_paths(value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect();
            }
            "library-autoload" => {
                self.library_autoload = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "native-extension" => {
                let previous = format!(".{}", self.native_extension);
                self.native_extension = value.trim_start_matches('.').to_string();
                let current = format!(".{}", self.native_extension);
                if let Some(ext) = self.extensions.iter_mut().find(|ext| **ext == previous) {
                    *ext = current;
                } else if !self.extensions.contains(&current) {
                    self.extensions.push(current);
                }
            }
            "gc-threshold" => {
                if let Ok(n) = value.parse() {
                    self.gc.threshold = n;
                }
            }
            "gc-collect-every" => {
                if let Ok(n) = value.parse() {
                    self.gc.collect_every = n;
                }
            }
            // `config` names the file itself
            "config" => {}
            _ => {
                tracing::debug!("Ignoring unknown configuration override '{}'", key);
            }
        }
    }
}

/// Platform shared-object extension
pub fn default_native_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}
