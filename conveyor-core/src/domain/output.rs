//! Build output sinks
//!
//! A build streams the output of git, the build tool and the registry into a
//! single sink owned by the request. Sinks are shared across tasks, so writes
//! take `&self`.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Destination for streamed build output
///
/// # Thread Safety
/// Implementations must be Send + Sync; a single build writes from several
/// reader tasks at once (stdout and stderr of a child process).
pub trait OutputSink: Send + Sync {
    /// Writes a chunk of raw output
    fn write(&self, chunk: &[u8]) -> io::Result<()>;

    /// Writes a line of text followed by a newline
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.write(&buf)
    }
}

/// Shared handle to an output sink
pub type SharedSink = Arc<dyn OutputSink>;

/// Sink that forwards to the process stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, chunk: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(chunk)?;
        stdout.flush()
    }
}

/// In-memory sink that keeps every byte written to it
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the contents decoded as UTF-8 (lossy)
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl OutputSink for MemorySink {
    fn write(&self, chunk: &[u8]) -> io::Result<()> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::other("output buffer poisoned"))?
            .extend_from_slice(chunk);
        Ok(())
    }
}

/// Sink that duplicates output into two sinks
///
/// The first failure wins; the second sink is not written if the first fails.
pub struct TeeSink {
    primary: SharedSink,
    secondary: SharedSink,
}

impl TeeSink {
    pub fn new(primary: SharedSink, secondary: SharedSink) -> Self {
        Self { primary, secondary }
    }
}

impl OutputSink for TeeSink {
    fn write(&self, chunk: &[u8]) -> io::Result<()> {
        self.primary.write(chunk)?;
        self.secondary.write(chunk)
    }
}
