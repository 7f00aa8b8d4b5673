//! The transport reader.
//!
//! A [`Transport`] owns one [`Connection`]. Once started, a background task
//! drains the read side into the shared buffer while the owner writes lines
//! to the write side and matches output through an [`ExpectEngine`].
//!
//! # Example
//!
//! ```ignore
//! use console_expect::{HarnessConfig, Pattern, Transport};
//! use std::time::Duration;
//!
//! let mut transport = Transport::new(&HarnessConfig::default());
//! transport.start(console_expect::connect_tcp("127.0.0.1:4321").await?)?;
//! transport.write_line("help").await?;
//! let engine = transport.engine();
//! engine.expect_match(&Pattern::literal("> ")?, Duration::from_secs(2)).await?;
//! transport.close().await;
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{HarnessConfig, LineEnding};
use crate::connection::Connection;
use crate::error::{ExpectError, Result};
use crate::expect::{ExpectEngine, SharedStream};
use crate::types::CloseReason;
use crate::util::TimeoutExt;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reader and writer for a single connection.
pub struct Transport {
    shared: Arc<SharedStream>,
    writer: Mutex<Option<BoxedWriter>>,
    reader: Option<JoinHandle<()>>,
    started: bool,
    line_ending: LineEnding,
    read_chunk: usize,
    close_timeout: Duration,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("started", &self.started)
            .field("closed", &self.shared.close_reason())
            .field("line_ending", &self.line_ending)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create an idle transport.
    #[must_use]
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            shared: Arc::new(SharedStream::new(config.buffer.max_size)),
            writer: Mutex::new(None),
            reader: None,
            started: false,
            line_ending: config.line_ending,
            read_chunk: config.buffer.read_chunk.max(1),
            close_timeout: config.timeout.close,
        }
    }

    /// Start draining `connection` into the buffer.
    ///
    /// Returns immediately; reading happens on a spawned task. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::AlreadyStarted`] if this transport was started
    /// before, even if that connection has since closed.
    pub fn start<C: Connection>(&mut self, connection: C) -> Result<()> {
        if self.started {
            return Err(ExpectError::AlreadyStarted);
        }
        self.started = true;

        let (reader, writer) = tokio::io::split(connection);
        *self.writer.get_mut() = Some(Box::new(writer));

        let shared = Arc::clone(&self.shared);
        let chunk = self.read_chunk;
        self.reader = Some(tokio::spawn(drain(reader, shared, chunk)));
        tracing::debug!(read_chunk = chunk, "transport reader started");
        Ok(())
    }

    /// Write `line` followed by the configured line ending.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::WriteFailed`] if the stream is closed or the
    /// write fails, and [`ExpectError::NotStarted`] before [`start`](Self::start).
    pub async fn write_line(&self, line: &str) -> Result<()> {
        tracing::debug!(line, "sending line");
        let data = format!("{line}{}", self.line_ending.as_str());
        self.write(data.as_bytes()).await
    }

    /// Write raw bytes and flush.
    ///
    /// # Errors
    ///
    /// See [`write_line`](Self::write_line).
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        if let Some(reason) = self.shared.close_reason() {
            return Err(ExpectError::write_closed(format!("stream closed ({reason})")));
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ExpectError::NotStarted)?;
        writer.write_all(data).await.map_err(ExpectError::write_io)?;
        writer.flush().await.map_err(ExpectError::write_io)?;
        Ok(())
    }

    /// An engine that matches against this transport's buffer.
    #[must_use]
    pub fn engine(&self) -> ExpectEngine {
        ExpectEngine::new(Arc::clone(&self.shared))
    }

    /// Check if the stream has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.close_reason().is_some()
    }

    /// Why the stream closed, if it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }

    /// Check if [`start`](Self::start) has been called.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// The last `n` bytes of unconsumed output.
    #[must_use]
    pub fn buffer_tail(&self, n: usize) -> String {
        self.shared.tail(n)
    }

    /// Shut down the connection and stop the reader.
    ///
    /// Shutting down the write side is bounded by the configured close
    /// timeout. Pending expectations resolve as closed. Safe to call more
    /// than once.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.get_mut().take() {
            match writer.shutdown().with_timeout(self.close_timeout).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "shutdown failed"),
                Err(_) => tracing::warn!(timeout = ?self.close_timeout, "shutdown timed out"),
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.shared.close(CloseReason::Cancelled);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            self.shared.close(CloseReason::Cancelled);
        }
    }
}

async fn drain<R>(mut reader: R, shared: Arc<SharedStream>, chunk: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                shared.close(CloseReason::Eof);
                return;
            }
            Ok(n) => shared.append(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(error = %e, "read from connection failed");
                shared.close(CloseReason::ReadError(e.to_string()));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::Pattern;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    fn transport() -> Transport {
        Transport::new(&HarnessConfig::default())
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let mut t = transport();
        let (a, _keep) = duplex(64);
        t.start(a).unwrap();

        let (b, _keep2) = duplex(64);
        assert!(matches!(t.start(b), Err(ExpectError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn write_before_start_fails() {
        let t = transport();
        assert!(matches!(t.write_line("x").await, Err(ExpectError::NotStarted)));
    }

    #[tokio::test]
    async fn write_line_appends_line_ending() {
        let mut t = Transport::new(&HarnessConfig::default().line_ending(LineEnding::CrLf));
        let (ours, device) = duplex(64);
        t.start(ours).unwrap();

        t.write_line("help").await.unwrap();
        let mut lines = BufReader::new(device);
        let mut line = String::new();
        lines.read_line(&mut line).await.unwrap();
        assert_eq!(line, "help\r\n");
    }

    #[tokio::test]
    async fn output_reaches_engine() {
        let mut t = transport();
        let (ours, mut device) = duplex(64);
        t.start(ours).unwrap();

        device.write_all(b"starting test\n").await.unwrap();
        let m = t
            .engine()
            .expect_match(&Pattern::literal("test").unwrap(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(m.before, "starting ");
    }

    #[tokio::test]
    async fn eof_closes_stream() {
        let mut t = transport();
        let (ours, device) = duplex(64);
        t.start(ours).unwrap();
        drop(device);

        let outcome = t
            .engine()
            .expect(&Pattern::literal("x").unwrap(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(outcome.is_closed());
        assert_eq!(t.close_reason(), Some(CloseReason::Eof));

        let err = t.write_line("x").await.unwrap_err();
        assert!(matches!(err, ExpectError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn close_releases_pending_expectation() {
        let mut t = transport();
        let (ours, _device) = duplex(64);
        t.start(ours).unwrap();
        let engine = t.engine();

        let waiter = tokio::spawn(async move {
            engine
                .expect(&Pattern::literal("never").unwrap(), Duration::from_secs(30))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        t.close().await;

        let outcome = waiter.await.unwrap().unwrap();
        assert!(outcome.is_closed());
        assert_eq!(t.close_reason(), Some(CloseReason::Cancelled));
        t.close().await;
    }
}
