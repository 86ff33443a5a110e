//! Build log storage
//!
//! Logs are written through a `LogWriter`, which buffers every byte in memory
//! and uploads the whole buffer as a single object when closed. Reading logs
//! back is not supported.

mod blob;

pub use blob::{BlobError, BlobStore, MemoryBlobStore, PutObject, S3BlobStore, Visibility};

use conveyor_core::OutputSink;
use std::io;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised by the log store
#[derive(Debug, Error)]
pub enum LogError {
    #[error("logs: read is not implemented")]
    NotImplemented,

    #[error("logs: writer for {0} is already closed")]
    Closed(String),

    #[error("logs: {0}")]
    Blob(#[from] BlobError),
}

/// Object key for a named log
pub fn log_key(name: &str) -> String {
    format!("logs/{}.txt", name)
}

/// Log store backed by a blob store
#[derive(Clone)]
pub struct LogStore {
    blobs: Arc<dyn BlobStore>,
}

impl LogStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Creates a writer for the named log
    ///
    /// Nothing is uploaded until the writer is closed.
    pub fn create(&self, name: &str) -> Result<Arc<LogWriter>, LogError> {
        Ok(Arc::new(LogWriter {
            key: log_key(name),
            blobs: Arc::clone(&self.blobs),
            buffer: Mutex::new(Some(Vec::new())),
        }))
    }

    /// Opens a named log for reading
    ///
    /// Always fails with `LogError::NotImplemented`.
    pub fn open(&self, _name: &str) -> Result<Box<dyn io::Read + Send>, LogError> {
        Err(LogError::NotImplemented)
    }
}

/// Buffering log writer
///
/// Usable as an `OutputSink`. `close` uploads the buffer once; writes after
/// close fail.
pub struct LogWriter {
    key: String,
    blobs: Arc<dyn BlobStore>,
    buffer: Mutex<Option<Vec<u8>>>,
}

impl LogWriter {
    /// Key the log will be stored under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of bytes buffered so far (0 once closed)
    pub fn len(&self) -> usize {
        self.buffer
            .lock()
            .map(|buffer| buffer.as_ref().map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes the full buffer to blob storage as a public-read text object
    ///
    /// If the upload fails the buffer is kept, so `close` can be retried.
    pub async fn close(&self) -> Result<(), LogError> {
        let body = self
            .buffer
            .lock()
            .map_err(|_| LogError::Closed(self.key.clone()))?
            .take()
            .ok_or_else(|| LogError::Closed(self.key.clone()))?;

        let length = body.len();
        let put = self
            .blobs
            .put_object(PutObject {
                key: self.key.clone(),
                body: body.clone(),
                content_type: "text/plain".to_string(),
                visibility: Visibility::PublicRead,
            })
            .await;

        if let Err(e) = put {
            if let Ok(mut buffer) = self.buffer.lock() {
                *buffer = Some(body);
            }
            return Err(e.into());
        }

        tracing::info!("Flushed {} bytes of build log to {}", length, self.key);
        Ok(())
    }
}

impl OutputSink for LogWriter {
    fn write(&self, chunk: &[u8]) -> io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?;

        match buffer.as_mut() {
            Some(buffer) => {
                buffer.extend_from_slice(chunk);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("log {} is closed", self.key),
            )),
        }
    }
}
