// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-host
//!
//! A CGI-style JavaScript host: one long-lived engine per worker process,
//! one isolated execution context per request.
//!
//! For each request the host:
//!
//! - enters a fresh realm and installs `require`, `include`, `onexit`,
//!   `exit`, `global` and the `system` bindings
//! - locates the main file (explicitly, or from `PATH_TRANSLATED` /
//!   `SCRIPT_FILENAME`)
//! - requires the configured autoload modules, then runs the main file
//! - runs `onexit` hooks, clears the realm's globals and hands the collector
//!   a chance to run
//!
//! Module sources are cached per process and re-read only when the file's
//! modification time or size changes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spacey_host::request::process_environment;
//! use spacey_host::{Config, Engine, Request};
//!
//! let mut engine = Engine::new(Config::load(None)?)?;
//! let request = Request::from_vars(process_environment()).with_main_file("index.js");
//! let status = engine.execute(&request);
//! std::process::exit(status);
//! # Ok::<(), spacey_host::HostError>(())
//! ```
//!
//! ## Native modules
//!
//! ```rust,no_run
//! use boa_engine::{js_string, Context, JsObject, JsResult};
//! use spacey_host::{Config, Engine};
//!
//! fn answer(exports: &JsObject, context: &mut Context) -> JsResult<JsObject> {
//!     exports.set(js_string!("value"), 42, false, context)?;
//!     Ok(exports.clone())
//! }
//!
//! let mut engine = Engine::new(Config::default())?;
//! engine.register_native("answer", answer);
//! # Ok::<(), spacey_host::HostError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod globals;
pub mod io;
pub mod module_system;
pub mod request;
pub mod runtime;

// Re-exports
pub use config::Config;
pub use error::{HostError, Result};
pub use io::{CapturedIo, HostIo, StdIo};
pub use module_system::{NativeModule, ScriptCache};
pub use request::Request;
pub use runtime::{Diagnostic, Engine, ExecutionContext, GcNotifier, RequestJobs, ScriptFailure};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
