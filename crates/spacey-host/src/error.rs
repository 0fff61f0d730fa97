// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the script host

use boa_engine::{JsError, JsNativeError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors that can occur while resolving, loading or running scripts
#[derive(Debug, Error)]
pub enum HostError {
    /// Module not found in any search location
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// Uncaught exception raised while running a script
    #[error("{0}")]
    Runtime(String),

    /// Shared object could not be opened or its entry point failed
    #[error("Cannot load native module '{path}': {reason}")]
    NativeLoad {
        /// Shared object path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// No main script could be determined for the request
    #[error("Cannot locate main file{}", .0.as_ref().map(|p| format!(" '{}'", p.display())).unwrap_or_default())]
    MainNotFound(Option<PathBuf>),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl HostError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// Create a native load error
    pub fn native_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::NativeLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<HostError> for JsError {
    fn from(err: HostError) -> Self {
        let native = match &err {
            HostError::Io(_) | HostError::JsonParse(_) => JsNativeError::typ(),
            _ => JsNativeError::error(),
        };
        native.with_message(err.to_string()).into()
    }
}
