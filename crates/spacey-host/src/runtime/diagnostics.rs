// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Formatting of uncaught script errors

use crate::error::HostError;
use boa_engine::{Context, JsError, JsString, JsValue};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"line (\d+)|:(\d+):\d+").expect("line pattern is valid")
});

/// How a request's script run ended abnormally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    /// `exit()` was called; no diagnostic is produced
    Termination {
        /// Requested exit status
        code: i32,
    },
    /// An exception escaped the main file
    Script(Diagnostic),
}

impl ScriptFailure {
    /// Process exit status for this failure
    pub fn status(&self) -> i32 {
        match self {
            ScriptFailure::Termination { code } => *code,
            ScriptFailure::Script(_) => 1,
        }
    }
}

/// A formatted uncaught error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Exception text, `Name: message` for error objects
    pub message: String,
    /// Innermost module the exception escaped from
    pub file: String,
    /// Line in `file`, 0 when unknown
    pub line: u32,
    /// Engine stack trace, when the error carries one
    pub stack: Option<String>,
}

impl Diagnostic {
    /// Describe a script exception attributed to `file`
    pub fn from_error(error: &JsError, context: &mut Context, file: &Path) -> Self {
        let (message, stack) = match error.as_opaque() {
            Some(value) => describe_value(value, context),
            None => (error.to_string(), None),
        };

        let line = extract_line(&message)
            .or_else(|| stack.as_deref().and_then(extract_line))
            .unwrap_or(0);

        Self {
            message,
            file: file.display().to_string(),
            line,
            stack,
        }
    }

    /// Describe a host failure that happened outside any script
    pub fn from_host_error(error: &HostError, file: Option<&Path>) -> Self {
        Self {
            message: error.to_string(),
            file: file.map(|f| f.display().to_string()).unwrap_or_default(),
            line: 0,
            stack: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.file, self.line)?;
        if let Some(stack) = &self.stack {
            write!(f, "\n{}", stack)?;
        }
        Ok(())
    }
}

/// First line number mentioned as `line N` or `:N:M`
pub fn extract_line(text: &str) -> Option<u32> {
    let captures = LINE_PATTERN.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn describe_value(value: &JsValue, context: &mut Context) -> (String, Option<String>) {
    if !value.is_object() {
        return (display(value, context), None);
    }

    let stack = string_property(value, "stack", context);
    let message = string_property(value, "message", context);
    let name = string_property(value, "name", context);

    let message = match (name, message) {
        (Some(name), Some(message)) if !message.is_empty() => format!("{}: {}", name, message),
        (Some(name), _) => name,
        (None, Some(message)) => message,
        (None, None) => display(value, context),
    };
    (message, stack)
}

fn string_property(value: &JsValue, key: &str, context: &mut Context) -> Option<String> {
    let object = value.as_object()?;
    let property = object.get(JsString::from(key), context).ok()?;
    if property.is_undefined() || property.is_null() {
        return None;
    }
    property
        .to_string(context)
        .ok()
        .map(|s| s.to_std_string_escaped())
}

fn display(value: &JsValue, context: &mut Context) -> String {
    value
        .to_string(context)
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|_| "Uncaught exception".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{JsNativeError, Source};

    #[test]
    fn test_extract_line() {
        assert_eq!(extract_line("unexpected token at line 12, col 3"), Some(12));
        assert_eq!(extract_line("at /srv/app/b.js:7:15"), Some(7));
        assert_eq!(extract_line("no position here"), None);
    }

    #[test]
    fn test_display_format() {
        let diagnostic = Diagnostic {
            message: "Error: boom".to_string(),
            file: "/srv/b.js".to_string(),
            line: 4,
            stack: None,
        };
        assert_eq!(diagnostic.to_string(), "Error: boom (/srv/b.js:4)");

        let with_stack = Diagnostic {
            stack: Some("at f".to_string()),
            ..diagnostic
        };
        assert_eq!(with_stack.to_string(), "Error: boom (/srv/b.js:4)\nat f");
    }

    #[test]
    fn test_thrown_error_object() {
        let mut context = Context::default();
        let error = context
            .eval(Source::from_bytes("throw new TypeError('bad value')"))
            .unwrap_err();
        let diagnostic = Diagnostic::from_error(&error, &mut context, Path::new("/srv/a.js"));
        assert!(diagnostic.message.starts_with("TypeError: bad value"));
        assert_eq!(diagnostic.file, "/srv/a.js");
    }

    #[test]
    fn test_thrown_primitive() {
        let mut context = Context::default();
        let error = context.eval(Source::from_bytes("throw 'plain'")).unwrap_err();
        let diagnostic = Diagnostic::from_error(&error, &mut context, Path::new("/srv/a.js"));
        assert_eq!(diagnostic.message, "plain");
        assert_eq!(diagnostic.stack, None);
    }

    #[test]
    fn test_native_error() {
        let mut context = Context::default();
        let error: JsError = JsNativeError::range().with_message("too far").into();
        let diagnostic = Diagnostic::from_error(&error, &mut context, Path::new("/srv/a.js"));
        assert!(diagnostic.message.contains("too far"));
    }

    #[test]
    fn test_failure_status() {
        assert_eq!(ScriptFailure::Termination { code: 3 }.status(), 3);
        let diagnostic = Diagnostic::from_host_error(&HostError::MainNotFound(None), None);
        assert_eq!(ScriptFailure::Script(diagnostic).status(), 1);
    }
}
