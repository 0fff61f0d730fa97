// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Byte-level I/O seam between scripts and the transport.
//!
//! A CGI worker talks to the web server through stdin/stdout/stderr; a
//! FastCGI worker through per-request streams. Both are hidden behind
//! [`HostIo`], so the `system` bindings never touch process streams directly.

use parking_lot::Mutex;
use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

/// Request-level byte streams and error reporting
pub trait HostIo {
    /// Read up to `buf.len()` bytes of request input
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Read one line of at most `max` bytes, newline included.
    ///
    /// Returns `None` when the stream ends before any byte is read.
    fn read_line(&self, max: usize) -> io::Result<Option<Vec<u8>>>;

    /// Write response output
    fn write(&self, data: &[u8]) -> io::Result<usize>;

    /// Flush response output
    fn flush(&self) -> io::Result<()>;

    /// Write diagnostic output
    fn write_err(&self, data: &[u8]) -> io::Result<usize>;

    /// Flush diagnostic output
    fn flush_err(&self) -> io::Result<()>;

    /// Report an uncaught script error
    fn error(&self, message: &str, file: &str, line: u32);
}

/// Read everything remaining from `io`
pub fn read_all(io: &dyn HostIo) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = io.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

/// Read up to `count` bytes, stopping early only at end of stream.
///
/// The buffer grows with the bytes actually read, so `count` may be far
/// larger than the input.
pub fn read_exact_or_eof(io: &dyn HostIo, count: usize) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 1024];
    while data.len() < count {
        let want = (count - data.len()).min(chunk.len());
        let n = io.read(&mut chunk[..want])?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

/// Process standard streams
#[derive(Debug, Default, Clone, Copy)]
pub struct StdIo;

impl HostIo for StdIo {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }

    fn read_line(&self, max: usize) -> io::Result<Option<Vec<u8>>> {
        let stdin = io::stdin();
        let mut handle = stdin.lock().take(max as u64);
        let mut line = Vec::new();
        let n = handle.read_until(b'\n', &mut line)?;
        Ok((n > 0).then_some(line))
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        io::stdout().lock().write_all(data)?;
        Ok(data.len())
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }

    fn write_err(&self, data: &[u8]) -> io::Result<usize> {
        io::stderr().lock().write_all(data)?;
        Ok(data.len())
    }

    fn flush_err(&self) -> io::Result<()> {
        io::stderr().lock().flush()
    }

    fn error(&self, message: &str, _file: &str, _line: u32) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}", message);
        let _ = stderr.flush();
    }
}

/// A reported script error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    /// Formatted diagnostic
    pub message: String,
    /// File the error originated in
    pub file: String,
    /// Line number, 0 when unknown
    pub line: u32,
}

#[derive(Debug, Default)]
struct Captured {
    input: Vec<u8>,
    position: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    errors: Vec<ReportedError>,
}

/// In-memory streams, for embedding hosts and tests.
///
/// Clones share the same buffers.
#[derive(Debug, Default, Clone)]
pub struct CapturedIo {
    inner: Arc<Mutex<Captured>>,
}

impl CapturedIo {
    /// Create empty streams
    pub fn new() -> Self {
        Self::default()
    }

    /// Create streams whose input yields `input`
    pub fn with_input(input: impl Into<Vec<u8>>) -> Self {
        let io = Self::default();
        io.inner.lock().input = input.into();
        io
    }

    /// Everything written to stdout, lossily decoded
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().stdout).into_owned()
    }

    /// Everything written to stderr, lossily decoded
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().stderr).into_owned()
    }

    /// Errors reported so far
    pub fn errors(&self) -> Vec<ReportedError> {
        self.inner.lock().errors.clone()
    }

    /// Discard captured output and errors, keeping unread input
    pub fn clear_output(&self) {
        let mut inner = self.inner.lock();
        inner.stdout.clear();
        inner.stderr.clear();
        inner.errors.clear();
    }
}

impl HostIo for CapturedIo {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        let start = inner.position;
        let n = buf.len().min(inner.input.len() - start);
        buf[..n].copy_from_slice(&inner.input[start..start + n]);
        inner.position += n;
        Ok(n)
    }

    fn read_line(&self, max: usize) -> io::Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let start = inner.position;
        let rest = &inner.input[start..];
        if rest.is_empty() {
            return Ok(None);
        }
        let limit = rest.len().min(max);
        let end = rest[..limit]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(limit);
        let line = rest[..end].to_vec();
        inner.position += end;
        Ok(Some(line))
    }

    fn write(&self, data: &[u8]) -> io::Result<usize> {
        self.inner.lock().stdout.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn write_err(&self, data: &[u8]) -> io::Result<usize> {
        self.inner.lock().stderr.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush_err(&self) -> io::Result<()> {
        Ok(())
    }

    fn error(&self, message: &str, file: &str, line: u32) {
        self.inner.lock().errors.push(ReportedError {
            message: message.to_string(),
            file: file.to_string(),
            line,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_splits_on_newline() {
        let io = CapturedIo::with_input("first\nsecond");
        assert_eq!(io.read_line(100).unwrap().unwrap(), b"first\n");
        assert_eq!(io.read_line(100).unwrap().unwrap(), b"second");
        assert_eq!(io.read_line(100).unwrap(), None);
    }

    #[test]
    fn test_read_line_respects_max() {
        let io = CapturedIo::with_input("abcdef\n");
        assert_eq!(io.read_line(3).unwrap().unwrap(), b"abc");
        assert_eq!(io.read_line(10).unwrap().unwrap(), b"def\n");
    }

    #[test]
    fn test_read_helpers() {
        let io = CapturedIo::with_input(vec![7u8; 3000]);
        assert_eq!(read_exact_or_eof(&io, 10).unwrap().len(), 10);
        assert_eq!(read_all(&io).unwrap().len(), 2990);
        assert!(read_exact_or_eof(&io, 5).unwrap().is_empty());
    }

    #[test]
    fn test_huge_count_reads_available_bytes() {
        let io = CapturedIo::with_input(vec![1u8; 2500]);
        assert_eq!(read_exact_or_eof(&io, usize::MAX).unwrap().len(), 2500);
    }

    #[test]
    fn test_clones_share_buffers() {
        let io = CapturedIo::new();
        let other = io.clone();
        other.write(b"hello").unwrap();
        other.error("boom", "/a.js", 3);
        assert_eq!(io.stdout(), "hello");
        assert_eq!(io.errors()[0].line, 3);
    }
}
