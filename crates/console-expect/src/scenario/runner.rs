//! Scenario execution.
//!
//! The runner owns the connection for the duration of one run: it starts a
//! [`Transport`] on it, executes the steps strictly in order, stops at the
//! first failing step and closes the connection before returning.

use std::time::{Duration, Instant};

use tracing::Instrument;

use super::definition::{CompiledStep, Expectation, Scenario};
use super::outcome::{Failure, FailureKind, Outcome, Verdict};
use crate::config::HarnessConfig;
use crate::connection::Connection;
use crate::expect::{ExpectEngine, Pattern};
use crate::transport::Transport;
use crate::types::ExpectOutcome;

/// Executes scenarios against connections.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    /// Create a runner with the given configuration.
    #[must_use]
    pub const fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// The runner's configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `scenario` against `connection`.
    ///
    /// Invalid scenarios fail at the offending step without touching the
    /// connection. The connection is closed when the run ends, whatever the
    /// verdict. Failed steps are never retried.
    pub async fn run<C: Connection>(&self, scenario: &Scenario, connection: C) -> Outcome {
        let span = tracing::info_span!("scenario", name = %scenario.name);
        self.run_inner(scenario, connection).instrument(span).await
    }

    async fn run_inner<C: Connection>(&self, scenario: &Scenario, connection: C) -> Outcome {
        let started = Instant::now();

        let verdict = match scenario.compile() {
            Err(invalid) => {
                tracing::warn!(step = invalid.step, error = %invalid.source, "invalid scenario");
                let step = &scenario.steps[invalid.step];
                Verdict::Fail(Failure {
                    step: invalid.step,
                    description: step.to_string(),
                    expected: step.expectation().map(ToString::to_string),
                    kind: FailureKind::from(&invalid.source),
                    buffer_tail: String::new(),
                })
            }
            Ok(steps) => {
                let mut transport = Transport::new(&self.config);
                let verdict = match transport.start(connection) {
                    Ok(()) => self.execute(scenario, &steps, &transport).await,
                    Err(e) => Verdict::Fail(Failure {
                        step: 0,
                        description: "start transport".to_string(),
                        expected: None,
                        kind: FailureKind::from(&e),
                        buffer_tail: String::new(),
                    }),
                };
                transport.close().await;
                verdict
            }
        };

        let outcome = Outcome {
            scenario: scenario.name.clone(),
            verdict,
            elapsed: started.elapsed(),
        };
        match outcome.failure() {
            None => tracing::info!(elapsed = ?outcome.elapsed, "scenario passed"),
            Some(failure) => {
                tracing::info!(step = failure.step, kind = %failure.kind, "scenario failed");
            }
        }
        outcome
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        steps: &[CompiledStep<'_>],
        transport: &Transport,
    ) -> Verdict {
        let engine = transport.engine();

        for (index, step) in steps.iter().enumerate() {
            let description = scenario.steps[index].to_string();
            tracing::debug!(step = index, %description, "step started");

            let result = match step {
                CompiledStep::Send(line) => transport
                    .write_line(line)
                    .await
                    .map_err(|e| FailureKind::from(&e)),
                CompiledStep::Expect(expectation, pattern) => {
                    let timeout = scenario.timeout_for(expectation, self.config.timeout.expect);
                    Self::expect(&engine, index, expectation, pattern, timeout).await
                }
                CompiledStep::Probe(line, expectation, pattern, attempts) => {
                    let timeout = scenario.timeout_for(expectation, self.config.timeout.expect);
                    Self::probe(
                        transport,
                        &engine,
                        index,
                        line,
                        expectation,
                        pattern,
                        timeout,
                        *attempts,
                    )
                    .await
                }
            };

            if let Err(kind) = result {
                tracing::debug!(step = index, %kind, "step failed");
                return Verdict::Fail(Failure {
                    step: index,
                    expected: scenario.steps[index].expectation().map(ToString::to_string),
                    description,
                    kind,
                    buffer_tail: transport.buffer_tail(self.config.buffer.tail_bytes),
                });
            }
            tracing::debug!(step = index, "step finished");
        }

        Verdict::Pass
    }

    async fn expect(
        engine: &ExpectEngine,
        index: usize,
        expectation: &Expectation,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<(), FailureKind> {
        match Self::wait(engine, index, pattern, timeout).await? {
            Waited::Matched => Ok(()),
            Waited::TimedOut if expectation.optional => {
                tracing::info!(step = index, %pattern, ?timeout, "optional step timed out, continuing");
                Ok(())
            }
            Waited::TimedOut => Err(FailureKind::Timeout { after: timeout }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn probe(
        transport: &Transport,
        engine: &ExpectEngine,
        index: usize,
        line: &str,
        expectation: &Expectation,
        pattern: &Pattern,
        timeout: Duration,
        attempts: u32,
    ) -> Result<(), FailureKind> {
        for attempt in 1..=attempts {
            transport
                .write_line(line)
                .await
                .map_err(|e| FailureKind::from(&e))?;
            match Self::wait(engine, index, pattern, timeout).await? {
                Waited::Matched => {
                    tracing::debug!(step = index, attempt, "probe answered");
                    return Ok(());
                }
                Waited::TimedOut => tracing::debug!(step = index, attempt, "no answer to probe"),
            }
        }

        if expectation.optional {
            tracing::info!(step = index, attempts, "optional probe got no answer, continuing");
            return Ok(());
        }
        Err(FailureKind::Timeout {
            after: timeout.saturating_mul(attempts),
        })
    }

    async fn wait(
        engine: &ExpectEngine,
        index: usize,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<Waited, FailureKind> {
        match engine.expect(pattern, timeout).await {
            Ok(ExpectOutcome::Matched(m)) => {
                tracing::debug!(step = index, %pattern, end = m.end, "matched");
                Ok(Waited::Matched)
            }
            Ok(ExpectOutcome::Timeout { .. }) => Ok(Waited::TimedOut),
            Ok(ExpectOutcome::Closed { reason, .. }) => Err(FailureKind::StreamClosed {
                reason: reason.to_string(),
            }),
            Err(e) => Err(FailureKind::from(&e)),
        }
    }
}

enum Waited {
    Matched,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(HarnessConfig::default().expect_timeout(Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn passes_on_expected_output() {
        let (ours, mut device) = duplex(256);
        device.write_all(b"starting test\nSUCCESS\n").await.unwrap();

        let scenario = Scenario::new("sema").expect("SUCCESS");
        let outcome = runner().run(&scenario, ours).await;
        assert!(outcome.is_pass(), "{outcome}");
    }

    #[tokio::test]
    async fn invalid_scenario_fails_before_running() {
        let (ours, _device) = duplex(16);
        let scenario = Scenario::new("bad").send("x").expect_regex("(");

        let outcome = runner().run(&scenario, ours).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.step, 1);
        assert!(matches!(failure.kind, FailureKind::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn empty_scenario_passes() {
        let (ours, _device) = duplex(16);
        assert!(runner().run(&Scenario::new("empty"), ours).await.is_pass());
    }

    #[tokio::test]
    async fn timeout_fails_with_buffer_tail() {
        let (ours, mut device) = duplex(256);
        device.write_all(b"starting test\ntrue\n").await.unwrap();

        let scenario = Scenario::new("t").expect("true").expect("false");
        let outcome = runner().run(&scenario, ours).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.step, 1);
        assert_eq!(
            failure.kind,
            FailureKind::Timeout {
                after: Duration::from_millis(200)
            }
        );
        assert_eq!(failure.buffer_tail, "\n");
    }
}
