// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Request lifecycle on a long-lived engine

pub(crate) mod context;
pub mod diagnostics;
mod engine;
pub mod gc;
pub mod jobs;

pub use context::ExecutionContext;
pub use diagnostics::{Diagnostic, ScriptFailure};
pub use engine::Engine;
pub use gc::{GcNotifier, GcStats};
pub use jobs::RequestJobs;
