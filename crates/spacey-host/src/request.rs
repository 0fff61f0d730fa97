// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-request metadata parsed from a CGI environment

use crate::error::{HostError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One inbound request
#[derive(Debug, Clone, Default)]
pub struct Request {
    env: Vec<(String, String)>,
    main_file: Option<PathBuf>,
    args: Vec<String>,
}

impl Request {
    /// Build a request from a `NAME=value` environment vector.
    pub fn from_env_vector<I, S>(envp: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            env: parse_environment(envp),
            ..Self::default()
        }
    }

    /// Build a request from already split environment pairs
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            env: vars.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Run `path` instead of the file named by the CGI environment
    pub fn with_main_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.main_file = Some(path.into());
        self
    }

    /// Arguments following the main file
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Environment entries in their original order
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Look up an environment variable; the last duplicate wins
    pub fn var(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Arguments following the main file
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Whether the request came through a web server gateway
    pub fn is_http(&self) -> bool {
        self.var("GATEWAY_INTERFACE").is_some() || self.var("REQUEST_METHOD").is_some()
    }

    /// Determine the main script.
    ///
    /// An explicitly given file wins; otherwise `PATH_TRANSLATED`, then
    /// `SCRIPT_FILENAME`. Relative paths are taken against `cwd`.
    pub fn find_main(&self, cwd: &Path) -> Result<PathBuf> {
        let candidate = self
            .main_file
            .clone()
            .or_else(|| {
                ["PATH_TRANSLATED", "SCRIPT_FILENAME"]
                    .iter()
                    .filter_map(|name| self.var(name))
                    .find(|value| !value.is_empty())
                    .map(PathBuf::from)
            })
            .ok_or(HostError::MainNotFound(None))?;

        let path = if candidate.is_absolute() {
            candidate
        } else {
            cwd.join(candidate)
        };

        if !path.is_file() {
            return Err(HostError::MainNotFound(Some(path)));
        }
        Ok(path.canonicalize().unwrap_or(path))
    }
}

/// Split `NAME=value` entries at the first `=`.
///
/// Any further `=` characters belong to the value; an entry without `=` is a
/// name with an empty value.
pub fn parse_environment<I, S>(envp: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    envp.into_iter()
        .map(|entry| {
            let entry = entry.as_ref();
            match entry.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (entry.to_string(), String::new()),
            }
        })
        .collect()
}

/// The process environment, with invalid UTF-8 replaced.
///
/// Gateways pass raw header bytes in `HTTP_*` variables, which
/// `std::env::vars` would panic on.
pub fn process_environment() -> Vec<(String, String)> {
    lossy_environment(std::env::vars_os())
}

/// Convert OS environment pairs to strings, replacing invalid UTF-8
pub fn lossy_environment<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .map(|(name, value)| {
            (
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment_splits_on_first_equals() {
        let env = parse_environment(["PATH=/usr/bin", "FOO=bar=baz", "EMPTY=", "BARE"]);
        assert_eq!(
            env,
            vec![
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("FOO".to_string(), "bar=baz".to_string()),
                ("EMPTY".to_string(), String::new()),
                ("BARE".to_string(), String::new()),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_lossy_environment_keeps_invalid_bytes() {
        use std::os::unix::ffi::OsStringExt;

        let env = lossy_environment(vec![
            (OsString::from("HTTP_X_RAW"), OsString::from_vec(b"caf\xe9".to_vec())),
            (OsString::from("PATH"), OsString::from("/bin")),
        ]);
        assert_eq!(
            env,
            vec![
                ("HTTP_X_RAW".to_string(), "caf\u{fffd}".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_is_http() {
        assert!(!Request::from_env_vector(["PATH=/bin"]).is_http());
        assert!(Request::from_env_vector(["GATEWAY_INTERFACE=CGI/1.1"]).is_http());
        assert!(Request::from_env_vector(["REQUEST_METHOD=GET"]).is_http());
    }

    #[test]
    fn test_find_main_prefers_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.js");
        let translated = dir.path().join("translated.js");
        std::fs::write(&explicit, "").unwrap();
        std::fs::write(&translated, "").unwrap();

        let request = Request::from_vars(vec![(
            "PATH_TRANSLATED".to_string(),
            translated.display().to_string(),
        )]);
        assert_eq!(
            request.find_main(dir.path()).unwrap(),
            translated.canonicalize().unwrap()
        );

        let request = request.with_main_file("explicit.js");
        assert_eq!(
            request.find_main(dir.path()).unwrap(),
            explicit.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_find_main_falls_back_to_script_filename() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("index.js");
        std::fs::write(&script, "").unwrap();

        let request = Request::from_vars(vec![
            ("PATH_TRANSLATED".to_string(), String::new()),
            ("SCRIPT_FILENAME".to_string(), script.display().to_string()),
        ]);
        assert_eq!(
            request.find_main(dir.path()).unwrap(),
            script.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_find_main_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Request::default().find_main(dir.path()),
            Err(HostError::MainNotFound(None))
        ));
        assert!(matches!(
            Request::default()
                .with_main_file("nope.js")
                .find_main(dir.path()),
            Err(HostError::MainNotFound(Some(_)))
        ));
    }
}
