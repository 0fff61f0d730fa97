// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Directories of the modules currently executing

use std::path::{Path, PathBuf};

/// Stack of module directories; the top is the directory of the module
/// running right now. Relative `require`/`include` names resolve against it.
#[derive(Debug, Default, Clone)]
pub struct PathStack {
    dirs: Vec<PathBuf>,
}

impl PathStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the module at `file`, pushing its containing directory
    pub fn push_file(&mut self, file: &Path) {
        let dir = file.parent().unwrap_or(Path::new("/"));
        self.dirs.push(dir.to_path_buf());
    }

    /// Leave the current module
    pub fn pop(&mut self) -> Option<PathBuf> {
        self.dirs.pop()
    }

    /// Directory of the executing module
    pub fn top(&self) -> Option<&Path> {
        self.dirs.last().map(PathBuf::as_path)
    }

    /// Nesting depth
    pub fn depth(&self) -> usize {
        self.dirs.len()
    }

    /// Whether no module is executing
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.dirs.clear();
    }
}
