// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution

use crate::config::Config;
use crate::error::{HostError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What kind of module a resolved name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Plain script file
    Script,
    /// Shared object exposing the native entry point
    Native,
    /// Directory resolved through its index script
    PackageIndex,
    /// Native module registered in-process by name
    Builtin,
}

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Absolute file path, or the bare name for builtins
    pub path: PathBuf,
    /// Detected kind
    pub kind: ModuleKind,
}

impl ResolvedModule {
    /// Key identifying this module within a context
    pub fn id(&self) -> String {
        match self.kind {
            ModuleKind::Builtin => format!("builtin:{}", self.path.display()),
            _ => self.path.display().to_string(),
        }
    }
}

/// Module resolver driven by the configured search paths and extensions
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Directories searched for bare names
    library_path: Vec<PathBuf>,
    /// Extensions to try, with leading dot
    extensions: Vec<String>,
    /// Extension marking shared objects, without dot
    native_extension: String,
    /// Names of in-process native modules
    builtins: HashSet<String>,
}

impl ModuleResolver {
    /// Create a resolver from configuration
    pub fn new(config: &Config) -> Self {
        Self {
            library_path: config.library_path.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|ext| {
                    if ext.starts_with('.') {
                        ext.clone()
                    } else {
                        format!(".{}", ext)
                    }
                })
                .collect(),
            native_extension: config.native_extension.trim_start_matches('.').to_string(),
            builtins: HashSet::new(),
        }
    }

    /// Make `name` resolve to an in-process native module
    pub fn add_builtin(&mut self, name: impl Into<String>) {
        self.builtins.insert(name.into());
    }

    /// Check if a module is a registered builtin
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    /// Resolve a module name.
    ///
    /// `current_dir` is the top of the path stack, or the working directory
    /// when no module is executing.
    pub fn resolve(&self, name: &str, current_dir: &Path) -> Result<ResolvedModule> {
        if self.is_builtin(name) {
            return Ok(ResolvedModule {
                path: PathBuf::from(name),
                kind: ModuleKind::Builtin,
            });
        }

        if is_explicit(name) {
            let path = current_dir.join(name);
            return self
                .find_extension(&path)
                .ok_or_else(|| HostError::module_not_found(name));
        }

        self.library_path
            .iter()
            .find_map(|lib| self.find_extension(&lib.join(name)))
            .ok_or_else(|| HostError::module_not_found(name))
    }

    /// Find the file a path refers to.
    ///
    /// Tries the exact file, then each extension appended, then the
    /// directory's index file with each extension.
    pub fn find_extension(&self, path: &Path) -> Option<ResolvedModule> {
        if path.is_file() {
            return Some(self.categorize_file(path, false));
        }

        for ext in &self.extensions {
            let candidate = append_extension(path, ext);
            if candidate.is_file() {
                return Some(self.categorize_file(&candidate, false));
            }
        }

        if path.is_dir() {
            for ext in &self.extensions {
                let index = path.join(format!("index{}", ext));
                if index.is_file() {
                    return Some(self.categorize_file(&index, true));
                }
            }
        }

        None
    }

    /// Categorize a file by extension
    fn categorize_file(&self, path: &Path, index: bool) -> ResolvedModule {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext == self.native_extension => ModuleKind::Native,
            _ if index => ModuleKind::PackageIndex,
            _ => ModuleKind::Script,
        };

        ResolvedModule { path, kind }
    }
}

/// Absolute, `./` or `../` names bypass the library path
fn is_explicit(name: &str) -> bool {
    name.starts_with("./")
        || name.starts_with("../")
        || name == "."
        || name == ".."
        || Path::new(name).is_absolute()
}

/// `dir/name` + `.js` without replacing an existing extension
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(ext);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver_with(lib: &[&Path]) -> ModuleResolver {
        let config = Config {
            library_path: lib.iter().map(|p| p.to_path_buf()).collect(),
            extensions: vec![".js".to_string(), ".so".to_string()],
            native_extension: "so".to_string(),
            ..Config::default()
        };
        ModuleResolver::new(&config)
    }

    #[test]
    fn test_relative_resolution_tries_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.js"), "").unwrap();
        fs::write(dir.path().join("util.v2.js"), "").unwrap();

        let resolver = resolver_with(&[]);
        let resolved = resolver.resolve("./util", dir.path()).unwrap();
        assert_eq!(resolved.kind, ModuleKind::Script);
        assert_eq!(resolved.path, dir.path().join("util.js").canonicalize().unwrap());

        // The dotted part of the name is not treated as an extension
        let resolved = resolver.resolve("./util.v2", dir.path()).unwrap();
        assert_eq!(resolved.path, dir.path().join("util.v2.js").canonicalize().unwrap());
    }

    #[test]
    fn test_exact_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data"), "").unwrap();
        fs::write(dir.path().join("data.js"), "").unwrap();

        let resolver = resolver_with(&[]);
        let resolved = resolver.resolve("./data", dir.path()).unwrap();
        assert_eq!(resolved.path, dir.path().join("data").canonicalize().unwrap());
    }

    #[test]
    fn test_library_path_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("shared.js"), "").unwrap();
        fs::write(first.path().join("only-first.js"), "").unwrap();

        let resolver = resolver_with(&[first.path(), second.path()]);
        let cwd = tempfile::tempdir().unwrap();

        let shared = resolver.resolve("shared", cwd.path()).unwrap();
        assert!(shared.path.starts_with(second.path().canonicalize().unwrap()));

        fs::write(first.path().join("shared.js"), "").unwrap();
        let shared = resolver.resolve("shared", cwd.path()).unwrap();
        assert!(shared.path.starts_with(first.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_bare_names_ignore_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("local.js"), "").unwrap();

        let resolver = resolver_with(&[]);
        assert!(matches!(
            resolver.resolve("local", dir.path()),
            Err(HostError::ModuleNotFound(name)) if name == "local"
        ));
        assert!(resolver.resolve("./local", dir.path()).is_ok());
    }

    #[test]
    fn test_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join("index.js"), "").unwrap();

        let resolver = resolver_with(&[dir.path()]);
        let resolved = resolver.resolve("pkg", Path::new("/")).unwrap();
        assert_eq!(resolved.kind, ModuleKind::PackageIndex);
        assert!(resolved.path.ends_with("pkg/index.js"));
    }

    #[test]
    fn test_native_kind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ext.so"), "").unwrap();

        let resolver = resolver_with(&[dir.path()]);
        let resolved = resolver.resolve("ext", Path::new("/")).unwrap();
        assert_eq!(resolved.kind, ModuleKind::Native);
    }

    #[test]
    fn test_builtin_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crypto.js"), "").unwrap();

        let mut resolver = resolver_with(&[dir.path()]);
        resolver.add_builtin("crypto");
        let resolved = resolver.resolve("crypto", Path::new("/")).unwrap();
        assert_eq!(resolved.kind, ModuleKind::Builtin);
        assert_eq!(resolved.id(), "builtin:crypto");
    }

    #[test]
    fn test_absolute_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abs.js");
        fs::write(&file, "").unwrap();

        let resolver = resolver_with(&[]);
        let name = dir.path().join("abs").display().to_string();
        let resolved = resolver.resolve(&name, Path::new("/elsewhere")).unwrap();
        assert_eq!(resolved.path, file.canonicalize().unwrap());
    }
}
