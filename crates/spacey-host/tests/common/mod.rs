// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared fixture: a temporary site directory and captured streams

#![allow(dead_code)]

use spacey_host::{CapturedIo, Config, Engine, Request};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct Site {
    pub dir: TempDir,
    pub io: CapturedIo,
}

impl Site {
    pub fn new() -> Self {
        Self::with_input("")
    }

    pub fn with_input(input: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        Self {
            dir,
            io: CapturedIo::with_input(input),
        }
    }

    /// Write a script below the site root, creating directories
    pub fn write(&self, name: &str, source: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, source).unwrap();
        path
    }

    /// Canonical path of a site file, as the host reports it
    pub fn canonical(&self, name: &str) -> String {
        self.dir
            .path()
            .join(name)
            .canonicalize()
            .unwrap()
            .display()
            .to_string()
    }

    pub fn config(&self) -> Config {
        Config {
            library_path: vec![self.dir.path().join("lib")],
            ..Config::default()
        }
    }

    pub fn engine(&self) -> Engine {
        Engine::with_io(self.config(), self.io.clone()).unwrap()
    }

    pub fn request(&self, main: &str) -> Request {
        Request::default().with_main_file(self.dir.path().join(main))
    }

    /// Run `main` on a fresh engine and return the exit status
    pub fn run(&self, main: &str) -> i32 {
        self.engine().execute(&self.request(main))
    }
}
