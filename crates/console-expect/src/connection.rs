//! Connections to the device or process under test.
//!
//! The harness only needs a duplex byte stream. Anything that implements
//! tokio's [`AsyncRead`] and [`AsyncWrite`] is a [`Connection`]: a TCP socket
//! to a simulator console, a child process, a serial port opened by the
//! caller, or the in-memory mock device.
//!
//! Processes can be attached two ways. [`PtyConnection`] runs the process on
//! a pseudo-terminal, which is how an interactive user would see it.
//! [`ChildConnection`] uses plain pipes and only sees stdout.

#[cfg(unix)]
mod pty;

use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{ExpectError, Result};

#[cfg(unix)]
pub use pty::{PtyConnection, PtyOptions};

/// A duplex byte stream the harness can drive.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Open a TCP connection, e.g. to an emulator's console port.
///
/// # Errors
///
/// Returns [`ExpectError::Connect`] if the connection cannot be established.
pub async fn connect_tcp<A>(addr: A) -> Result<TcpStream>
where
    A: ToSocketAddrs + std::fmt::Display,
{
    let target = addr.to_string();
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ExpectError::connect(&target, e))?;
    // Console traffic is line-sized; don't let Nagle hold back short commands.
    stream
        .set_nodelay(true)
        .map_err(|e| ExpectError::connect(&target, e))?;
    tracing::debug!(%target, "connected");
    Ok(stream)
}

/// A child process whose stdin and stdout form the connection.
///
/// Stderr is passed through to the harness's own stderr, and programs that
/// buffer stdout when it is not a terminal may hold output back. The process
/// is killed when the connection is dropped.
#[derive(Debug)]
pub struct ChildConnection {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl ChildConnection {
    /// Spawn `program` with `args`, piping its stdin and stdout.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Connect`] if the process cannot be started.
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExpectError::connect(program, e))?;

        let missing = |what: &str| {
            ExpectError::connect(program, io::Error::other(format!("{what} was not captured")))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        tracing::debug!(program, pid = child.id(), "spawned child process");
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Get the process ID, if the process is still running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

impl AsyncRead for ChildConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ChildConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn spawn_missing_program_fails() {
        let err = ChildConnection::spawn("/nonexistent/console-expect-test", ["x"]).unwrap_err();
        assert!(matches!(err, ExpectError::Connect { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_echoes_through_cat() {
        let mut conn = ChildConnection::spawn("cat", Vec::<&str>::new()).unwrap();
        assert!(conn.pid().is_some());
        conn.write_all(b"ping\n").await.unwrap();
        conn.flush().await.unwrap();

        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
    }

    #[tokio::test]
    async fn tcp_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect_tcp(addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr.to_string()));
    }
}
