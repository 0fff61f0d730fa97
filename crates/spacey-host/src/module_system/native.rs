// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Native extension modules.
//!
//! Two flavors exist: modules compiled into the host and registered by name
//! ([`NativeModule`]), and shared objects found through the resolver. A
//! shared object must export [`NATIVE_INIT_SYMBOL`] with the [`NativeInit`]
//! signature and be built with the same toolchain and engine version as the
//! host. Opened libraries stay loaded until the process exits.

use crate::error::{HostError, Result};
use boa_engine::{Context, JsObject, JsResult};
use libloading::Library;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Entry point a shared-object module exports
pub const NATIVE_INIT_SYMBOL: &[u8] = b"spacey_module_init\0";

/// Signature of [`NATIVE_INIT_SYMBOL`].
///
/// Receives the module's fresh `exports` object and returns the value that
/// becomes the module's exports.
pub type NativeInit = fn(&JsObject, &mut Context) -> JsResult<JsObject>;

/// A module implemented in Rust and linked into the host
pub trait NativeModule {
    /// Populate `exports` for one context and return the module's exports
    fn register(&self, exports: &JsObject, context: &mut Context) -> JsResult<JsObject>;
}

impl<F> NativeModule for F
where
    F: Fn(&JsObject, &mut Context) -> JsResult<JsObject>,
{
    fn register(&self, exports: &JsObject, context: &mut Context) -> JsResult<JsObject> {
        self(exports, context)
    }
}

/// Opens shared objects and remembers their entry points
#[derive(Default)]
pub struct NativeLoader {
    libraries: Mutex<HashMap<PathBuf, (Library, NativeInit)>>,
}

impl fmt::Debug for NativeLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLoader")
            .field("loaded", &self.libraries.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NativeLoader {
    /// Create a loader with nothing opened
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry point of the shared object at `path`, opening it on first use
    pub fn init_fn(&self, path: &Path) -> Result<NativeInit> {
        let mut libraries = self.libraries.lock();
        if let Some((_, init)) = libraries.get(path) {
            return Ok(*init);
        }

        // SAFETY: the library's initializers run here; shared objects on the
        // library path are trusted like scripts are.
        let library =
            unsafe { Library::new(path) }.map_err(|e| HostError::native_load(path, e))?;

        // SAFETY: the symbol is declared with the `NativeInit` signature and
        // the library is kept alive for as long as the pointer is used.
        let init = unsafe {
            library
                .get::<NativeInit>(NATIVE_INIT_SYMBOL)
                .map(|symbol| *symbol)
                .map_err(|e| HostError::native_load(path, e))?
        };

        tracing::debug!("Opened native module {}", path.display());
        libraries.insert(path.to_path_buf(), (library, init));
        Ok(init)
    }

    /// Whether `path` has been opened
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.libraries.lock().contains_key(path)
    }

    /// Number of opened shared objects
    pub fn len(&self) -> usize {
        self.libraries.lock().len()
    }

    /// Whether nothing has been opened
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_library_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.so");
        std::fs::write(&path, "not an object file").unwrap();

        let loader = NativeLoader::new();
        let err = loader.init_fn(&path).unwrap_err();
        assert!(matches!(err, HostError::NativeLoad { .. }));
        assert!(err.to_string().contains("fake.so"));
        assert!(loader.is_empty());
    }

    #[test]
    fn test_closures_are_native_modules() {
        let module = |exports: &JsObject, _: &mut Context| -> JsResult<JsObject> {
            Ok(exports.clone())
        };
        let mut context = Context::default();
        let exports = JsObject::with_object_proto(context.intrinsics());
        let result = module.register(&exports, &mut context).unwrap();
        assert!(JsObject::equals(&result, &exports));
    }
}
