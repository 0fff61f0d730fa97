// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS-style module system
//!
//! - `require(name)` loads a module once per request and returns its
//!   `module.exports`; cyclic requires see partial exports
//! - `include(name)` runs a module again each time
//! - Relative names resolve against the directory of the running module,
//!   bare names against the configured library path
//! - Script sources are cached per process and re-read when the file changes
//! - Shared objects and in-process native modules load as modules too

mod cache;
pub(crate) mod loader;
mod native;
mod path_stack;
mod resolver;

pub use cache::{CacheStats, CachedScript, ScriptCache, StalenessToken, WRAPPER_HEADER, wrap_module};
pub use native::{NATIVE_INIT_SYMBOL, NativeInit, NativeLoader, NativeModule};
pub use path_stack::PathStack;
pub use resolver::{ModuleKind, ModuleResolver, ResolvedModule};
