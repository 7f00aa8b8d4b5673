//! Child processes attached to a pseudo-terminal.
//!
//! A process on a terminal sees the same environment it would in an
//! interactive session: C stdio line-buffers its output, and stdout and
//! stderr arrive interleaved on one stream. The terminal driver also echoes
//! input and turns `\n` into `\r\n` on output, so patterns that span a line
//! break should expect `\r\n`.

use std::ffi::OsStr;
use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::{Errno, FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{LocalModes, OptionalActions, Winsize, tcgetattr, tcsetattr, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};

use crate::error::{ExpectError, Result};

/// Terminal settings for a [`PtyConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtyOptions {
    /// Whether the terminal echoes written lines back into the output.
    pub echo: bool,
    /// Window width in columns.
    pub cols: u16,
    /// Window height in rows.
    pub rows: u16,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            echo: true,
            cols: 80,
            rows: 24,
        }
    }
}

impl PtyOptions {
    /// Turn terminal echo on or off.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Set the window size.
    #[must_use]
    pub const fn size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }
}

/// A child process running on a pseudo-terminal.
///
/// The process is the leader of a new session with the terminal as its
/// controlling terminal, and is killed when the connection is dropped.
#[derive(Debug)]
pub struct PtyConnection {
    master: AsyncFd<OwnedFd>,
    child: Child,
}

impl PtyConnection {
    /// Spawn `program` with `args` on a new terminal with default options.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Connect`] if the terminal cannot be allocated
    /// or the process cannot be started.
    pub fn spawn<I, S>(program: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self::spawn_with(program, args, PtyOptions::default())
    }

    /// Spawn `program` with `args` on a new terminal.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Connect`] if the terminal cannot be allocated
    /// or the process cannot be started.
    pub fn spawn_with<I, S>(program: &str, args: I, options: PtyOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let fail = |e: io::Error| ExpectError::connect(program, e);
        let (master, slave) = open_pair(options).map_err(fail)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::from(slave.try_clone().map_err(fail)?))
            .stdout(Stdio::from(slave.try_clone().map_err(fail)?))
            .stderr(Stdio::from(slave))
            .kill_on_drop(true);

        // SAFETY: the hook only makes two syscalls, both async-signal-safe.
        // It runs after stdio has been redirected, so fd 0 is the terminal.
        #[allow(unsafe_code)]
        unsafe {
            command.pre_exec(|| {
                rustix::process::setsid()?;
                rustix::process::ioctl_tiocsctty(BorrowedFd::borrow_raw(0))?;
                Ok(())
            });
        }

        let child = command.spawn().map_err(fail)?;
        // Our copies of the terminal's child side must go, or reading the
        // master never reports the end of output.
        drop(command);

        let master = AsyncFd::new(master).map_err(fail)?;
        tracing::debug!(program, pid = child.id(), ?options, "spawned child on pty");
        Ok(Self { master, child })
    }

    /// Get the process ID, if the process is still running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Allocate a terminal, returning its non-blocking master side and the
/// child side configured per `options`.
fn open_pair(options: PtyOptions) -> io::Result<(OwnedFd, OwnedFd)> {
    let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)?;
    fcntl_setfd(&master, FdFlags::CLOEXEC)?;
    grantpt(&master)?;
    unlockpt(&master)?;

    let name = ptsname(&master, Vec::new())?;
    let slave = open(
        name.as_c_str(),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )?;

    let size = Winsize {
        ws_row: options.rows,
        ws_col: options.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    tcsetwinsize(&slave, size)?;

    if !options.echo {
        let mut termios = tcgetattr(&slave)?;
        termios.local_modes.remove(LocalModes::ECHO);
        tcsetattr(&slave, OptionalActions::Now, &termios)?;
    }

    fcntl_setfl(&master, OFlags::NONBLOCK)?;
    Ok((master, slave))
}

impl AsyncRead for PtyConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.master.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.master.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(e) if e == Errno::AGAIN => guard.clear_ready(),
                Err(e) if e == Errno::INTR => {}
                // Linux reports EIO once every process has closed the
                // child side. That is the end of the output.
                Err(e) if e == Errno::IO => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }
    }
}

impl AsyncWrite for PtyConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.master.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.master.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(e) if e == Errno::AGAIN => guard.clear_ready(),
                Err(e) if e == Errno::INTR => {}
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    // A terminal has no half-close; the process is killed on drop instead.
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::config::HarnessConfig;
    use crate::scenario::{FailureKind, Scenario, ScenarioRunner};

    async fn output_of(mut conn: PtyConnection) -> String {
        let mut out = Vec::new();
        conn.read_to_end(&mut out)
            .await
            .expect("reading the terminal failed");
        String::from_utf8_lossy(&out).into_owned()
    }

    fn runner(timeout: Duration) -> ScenarioRunner {
        ScenarioRunner::new(HarnessConfig::default().expect_timeout(timeout))
    }

    #[tokio::test]
    async fn spawn_missing_program_fails() {
        let err = PtyConnection::spawn("/nonexistent/console-expect-test", ["x"]).unwrap_err();
        assert!(matches!(err, ExpectError::Connect { .. }));
    }

    #[tokio::test]
    async fn stdio_is_a_terminal() {
        let conn = PtyConnection::spawn(
            "sh",
            ["-c", "[ -t 0 ] && [ -t 1 ] && [ -t 2 ] && echo all-tty"],
        )
        .unwrap();
        assert!(conn.pid().is_some());
        let out = tokio::time::timeout(Duration::from_secs(5), output_of(conn))
            .await
            .unwrap();
        assert_eq!(out, "all-tty\r\n");
    }

    #[tokio::test]
    async fn window_size_is_applied() {
        let options = PtyOptions::default().size(100, 30);
        let conn = PtyConnection::spawn_with("sh", ["-c", "stty size"], options).unwrap();
        let out = tokio::time::timeout(Duration::from_secs(5), output_of(conn))
            .await
            .unwrap();
        assert_eq!(out.trim_end(), "30 100");
    }

    #[tokio::test]
    async fn input_is_echoed_by_default() {
        let mut conn = PtyConnection::spawn("sh", ["-c", "read line; echo got-$line"]).unwrap();
        conn.write_all(b"ping\n").await.unwrap();
        let out = tokio::time::timeout(Duration::from_secs(5), output_of(conn))
            .await
            .unwrap();
        assert_eq!(out, "ping\r\ngot-ping\r\n");
    }

    #[tokio::test]
    async fn echo_can_be_disabled() {
        let options = PtyOptions::default().echo(false);
        let mut conn =
            PtyConnection::spawn_with("sh", ["-c", "read line; echo got-$line"], options).unwrap();
        conn.write_all(b"ping\n").await.unwrap();
        let out = tokio::time::timeout(Duration::from_secs(5), output_of(conn))
            .await
            .unwrap();
        assert_eq!(out, "got-ping\r\n");
    }

    #[tokio::test]
    async fn stderr_is_part_of_the_stream() {
        let conn = PtyConnection::spawn("sh", ["-c", "echo SUCCESS 1>&2; sleep 3"]).unwrap();
        let scenario = Scenario::new("stderr").expect("SUCCESS");
        let outcome = runner(Duration::from_secs(2)).run(&scenario, conn).await;
        assert!(outcome.is_pass(), "{outcome}");
    }

    #[tokio::test]
    async fn stdio_buffered_banner_arrives() {
        // perl block-buffers stdout on a pipe and line-buffers it on a
        // terminal, so the banner only shows up before the sleep on a pty.
        let conn = match PtyConnection::spawn(
            "perl",
            ["-e", "print qq(main(): This is RIOT!\\n); sleep 5;"],
        ) {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("skipping, perl is not available: {e}");
                return;
            }
        };
        let scenario = Scenario::new("native").expect("This is RIOT");
        let outcome = runner(Duration::from_secs(2)).run(&scenario, conn).await;
        assert!(outcome.is_pass(), "{outcome}");
    }

    #[tokio::test]
    async fn exit_closes_the_stream() {
        let conn = PtyConnection::spawn("sh", ["-c", "echo bye"]).unwrap();
        let scenario = Scenario::new("exit").expect("bye").expect("never");
        let outcome = runner(Duration::from_secs(5)).run(&scenario, conn).await;
        let failure = outcome.failure().expect("scenario should fail");
        assert_eq!(failure.step, 1);
        assert!(
            matches!(failure.kind, FailureKind::StreamClosed { .. }),
            "{outcome}"
        );
    }
}
