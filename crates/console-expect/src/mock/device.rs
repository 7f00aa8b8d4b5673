//! The in-memory mock connection and its device-side handle.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

use super::event::{EventTimeline, MockEvent};

/// A canned reply sent whenever the harness writes `trigger`.
#[derive(Debug, Clone)]
pub(crate) struct Responder {
    pub(crate) trigger: Vec<u8>,
    pub(crate) response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    /// Bytes ready to be read by the harness.
    output: VecDeque<u8>,
    /// Everything the harness wrote.
    input: Vec<u8>,
    /// Input before this offset has already been checked for triggers.
    scanned: usize,
    timeline: EventTimeline,
    responders: Vec<Responder>,
    delay: Option<Pin<Box<Sleep>>>,
    eof: bool,
    error: Option<String>,
    shutdown: bool,
    read_waker: Option<Waker>,
}

impl MockState {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
    }

    /// Queue responses for every trigger found in newly written input.
    fn scan_triggers(&mut self) {
        loop {
            let pending = &self.input[self.scanned..];
            let earliest = self
                .responders
                .iter()
                .filter_map(|r| {
                    pending
                        .windows(r.trigger.len())
                        .position(|w| w == r.trigger.as_slice())
                        .map(|pos| (pos, r))
                })
                .min_by_key(|(pos, _)| *pos);

            let Some((pos, responder)) = earliest else {
                return;
            };
            let end = self.scanned + pos + responder.trigger.len();
            let response = responder.response.clone();
            self.output.extend(response);
            self.scanned = end;
            self.wake_reader();
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The harness side of a mock device: a [`Connection`](crate::Connection).
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

/// The device side of a mock connection.
///
/// Lets a test push more output, close the device, and inspect what the
/// harness wrote.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

pub(crate) fn pair(
    timeline: EventTimeline,
    responders: Vec<Responder>,
) -> (MockConnection, MockDevice) {
    let state = Arc::new(Mutex::new(MockState {
        output: VecDeque::new(),
        input: Vec::new(),
        scanned: 0,
        timeline,
        responders: responders
            .into_iter()
            .filter(|r| !r.trigger.is_empty())
            .collect(),
        delay: None,
        eof: false,
        error: None,
        shutdown: false,
        read_waker: None,
    }));
    (
        MockConnection {
            state: Arc::clone(&state),
        },
        MockDevice { state },
    )
}

impl MockDevice {
    /// Append an event to the device's timeline.
    pub fn push(&self, event: MockEvent) {
        let mut state = lock(&self.state);
        state.timeline.push(event);
        state.wake_reader();
    }

    /// Print `data` after the events already queued.
    pub fn output(&self, data: &str) {
        self.push(MockEvent::output_str(data));
    }

    /// Close the device's output after the events already queued.
    pub fn close(&self) {
        self.push(MockEvent::Eof);
    }

    /// Everything the harness has written so far.
    #[must_use]
    pub fn input(&self) -> Vec<u8> {
        lock(&self.state).input.clone()
    }

    /// Everything the harness has written so far, as text.
    #[must_use]
    pub fn input_str(&self) -> String {
        String::from_utf8_lossy(&self.input()).into_owned()
    }

    /// The lines the harness has written, without line endings.
    #[must_use]
    pub fn input_lines(&self) -> Vec<String> {
        self.input_str()
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect()
    }

    /// Check if the harness shut down its side of the connection.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        lock(&self.state).shutdown
    }
}

impl AsyncRead for MockConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = lock(&self.state);

        loop {
            if let Some(error) = state.error.take() {
                return Poll::Ready(Err(io::Error::other(error)));
            }

            if !state.output.is_empty() {
                let n = buf.remaining().min(state.output.len());
                let chunk: Vec<u8> = state.output.drain(..n).collect();
                buf.put_slice(&chunk);
                return Poll::Ready(Ok(()));
            }

            if state.eof {
                return Poll::Ready(Ok(()));
            }

            if let Some(delay) = state.delay.as_mut() {
                match delay.as_mut().poll(cx) {
                    Poll::Ready(()) => state.delay = None,
                    Poll::Pending => return Poll::Pending,
                }
            }

            match state.timeline.next_event() {
                Some(MockEvent::Output(data)) => state.output.extend(data),
                Some(MockEvent::Delay(d)) => state.delay = Some(Box::pin(tokio::time::sleep(d))),
                Some(MockEvent::Eof) => state.eof = true,
                Some(MockEvent::Error(msg)) => state.error = Some(msg),
                None => {
                    state.read_waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
            }
        }
    }
}

impl AsyncWrite for MockConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = lock(&self.state);
        if state.shutdown {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        state.input.extend_from_slice(buf);
        state.scan_triggers();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        lock(&self.state).shutdown = true;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn responder(trigger: &str, response: &str) -> Responder {
        Responder {
            trigger: trigger.into(),
            response: response.into(),
        }
    }

    #[tokio::test]
    async fn plays_timeline_then_eof() {
        let timeline = EventTimeline::from_events(vec![
            MockEvent::output_str("3rd\n"),
            MockEvent::delay_ms(5),
            MockEvent::output_str("2nd\n"),
            MockEvent::Eof,
        ]);
        let (mut conn, _device) = pair(timeline, Vec::new());

        let mut out = String::new();
        conn.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "3rd\n2nd\n");
    }

    #[tokio::test]
    async fn responds_to_each_trigger() {
        let (mut conn, device) = pair(EventTimeline::default(), vec![responder("help", "> ")]);

        conn.write_all(b"help\nhelp\n").await.unwrap();
        device.close();

        let mut out = String::new();
        conn.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "> > ");
        assert_eq!(device.input_lines(), vec!["help", "help"]);
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let timeline = EventTimeline::from_events(vec![MockEvent::error("line dropped")]);
        let (mut conn, _device) = pair(timeline, Vec::new());

        let mut buf = [0u8; 8];
        let err = conn.read(&mut buf).await.unwrap_err();
        assert_eq!(err.to_string(), "line dropped");
    }

    #[tokio::test]
    async fn late_output_wakes_reader() {
        let (mut conn, device) = pair(EventTimeline::default(), Vec::new());
        let pusher = device.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            pusher.output("SUCCESS\n");
        });

        let mut buf = [0u8; 16];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"SUCCESS\n");
    }
}
