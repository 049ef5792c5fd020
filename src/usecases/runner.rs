//! Scenario runner
//!
//! Plays a [`UseCase`] over a [`Transport`]: send a step, wait for exactly
//! one reply, validate it, pause, continue. The first failure ends the run.
//! Nothing here returns an error; every failure ends up in the
//! [`RunReport`] together with the step it happened at.

use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use tokio::sync::watch;

use crate::common::config::MatchScope;
use crate::transport::Transport;

use super::step::{Step, UseCase};
use super::validator::{self, Rejection};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    /// Zero-based index of the failing step
    Failed(usize),
    /// Zero-based index of the step that would have run next
    Cancelled(usize),
}

/// Transient state of one run
#[derive(Debug, Clone)]
pub struct RunState {
    pub code: String,
    pub phase: RunPhase,
    /// Zero-based index of the step being executed
    pub current_step: usize,
    pub steps_total: usize,
    pub steps_passed: usize,
    /// Token shared by several steps of the use case, if any
    pub correlation_token: Option<String>,
}

impl RunState {
    fn new(use_case: &UseCase) -> Self {
        Self {
            code: use_case.code().to_string(),
            phase: RunPhase::Idle,
            current_step: 0,
            steps_total: use_case.len(),
            steps_passed: 0,
            correlation_token: use_case.correlation_token().map(str::to_string),
        }
    }
}

/// Why a step failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Sending the request or receiving the reply failed
    Transport(String),
    /// The reply was received but not accepted
    Rejected(Rejection),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Transport(e) => write!(f, "transport error: {}", e),
            FailureReason::Rejected(r) => write!(f, "validation failed: {}", r),
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed { step: usize, reason: FailureReason },
    Cancelled { step: usize },
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }
}

/// Drives use cases over a borrowed transport
pub struct ScenarioRunner<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    pacing: Duration,
    scope: MatchScope,
    cancel: Option<watch::Receiver<bool>>,
    verbose: bool,
}

impl<'t, T: Transport + ?Sized> ScenarioRunner<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self {
            transport,
            pacing: Duration::ZERO,
            scope: MatchScope::default(),
            cancel: None,
            verbose: true,
        }
    }

    /// Fixed pause between two steps
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn match_scope(mut self, scope: MatchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Stop between steps once `signal` becomes `true`
    pub fn cancel_on(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Print raw requests and replies
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Execute every step of `use_case` in order
    pub async fn run(&mut self, use_case: &UseCase) -> RunReport {
        let mut state = RunState::new(use_case);
        state.phase = RunPhase::Running;

        println!(
            "\n{} {} {}",
            "Running Use Case:".blue().bold(),
            use_case.code().white().bold(),
            use_case.title().dimmed()
        );
        if let Some(token) = &state.correlation_token {
            println!("  {} {}", "Transaction:".dimmed(), token.dimmed());
        }
        tracing::info!(code = use_case.code(), steps = use_case.len(), "Starting use case");

        for (i, step) in use_case.steps().iter().enumerate() {
            state.current_step = i;

            if self.is_cancelled() {
                return self.cancelled(state, i);
            }

            if let Err(reason) = self.execute_step(use_case, step, i).await {
                println!(
                    "  {} [{}] {}/{} {}: {}",
                    "✗".red(),
                    use_case.code(),
                    i + 1,
                    use_case.len(),
                    step.label(),
                    reason
                );
                tracing::warn!(code = use_case.code(), step = i + 1, "Use case failed: {}", reason);
                state.phase = RunPhase::Failed(i);
                return RunReport {
                    state,
                    outcome: RunOutcome::Failed { step: i, reason },
                };
            }

            state.steps_passed += 1;
            println!(
                "  {} [{}] {}/{} {}",
                "✓".green(),
                use_case.code(),
                i + 1,
                use_case.len(),
                step.label()
            );

            if i + 1 < use_case.len() && !self.pause().await {
                return self.cancelled(state, i + 1);
            }
        }

        state.phase = RunPhase::Completed;
        println!(
            "{} {} {}",
            "✓".green().bold(),
            use_case.code().green().bold(),
            "Passed".green().bold()
        );
        tracing::info!(code = use_case.code(), "Use case completed");

        RunReport {
            state,
            outcome: RunOutcome::Completed,
        }
    }

    /// Send one request, wait for its reply and validate it
    async fn execute_step(
        &mut self,
        use_case: &UseCase,
        step: &Step,
        index: usize,
    ) -> Result<(), FailureReason> {
        let request = step.request_at(Utc::now());
        if self.verbose {
            println!(
                "\n[{}] {}/{}, Request...\n{}",
                use_case.code(),
                index + 1,
                use_case.len(),
                String::from_utf8_lossy(&request).dimmed()
            );
        }
        self.transport
            .send(&request)
            .await
            .map_err(|e| FailureReason::Transport(e.to_string()))?;

        let reply = self
            .transport
            .receive()
            .await
            .map_err(|e| FailureReason::Transport(e.to_string()))?;
        if self.verbose {
            println!(
                "[{}] {}/{}, Response...\n{}",
                use_case.code(),
                index + 1,
                use_case.len(),
                String::from_utf8_lossy(&reply).dimmed()
            );
        }

        validator::validate(&request, &reply, step.matcher(), self.scope)
            .map_err(FailureReason::Rejected)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|signal| *signal.borrow())
    }

    /// Sleep for the pacing interval; false if cancelled meanwhile
    async fn pause(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.pacing);
        match self.cancel.as_mut() {
            Some(signal) => {
                tokio::select! {
                    _ = sleep => true,
                    _ = wait_for_cancel(signal) => false,
                }
            }
            None => {
                sleep.await;
                true
            }
        }
    }

    fn cancelled(&self, mut state: RunState, next_step: usize) -> RunReport {
        println!(
            "  {} [{}] cancelled before step {}/{}",
            "!".yellow(),
            state.code,
            next_step + 1,
            state.steps_total
        );
        tracing::info!(code = %state.code, step = next_step + 1, "Use case cancelled");
        state.phase = RunPhase::Cancelled(next_step);
        RunReport {
            state,
            outcome: RunOutcome::Cancelled { step: next_step },
        }
    }
}

/// Resolves once the signal is `true`; never if the sender goes away first
pub(crate) async fn wait_for_cancel(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, Result};
    use crate::ocpp::{Call, CallResult};
    use crate::usecases::step::{Matcher, UseCaseBuilder};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Answers each call with a result built from the call
    struct Echo {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Box<dyn Fn(&Call) -> Vec<u8> + Send>>,
    }

    impl Echo {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                replies: VecDeque::new(),
            }
        }

        fn reply(mut self, f: impl Fn(&Call) -> Vec<u8> + Send + 'static) -> Self {
            self.replies.push_back(Box::new(f));
            self
        }
    }

    #[async_trait]
    impl Transport for Echo {
        async fn send(&mut self, payload: &[u8]) -> Result<()> {
            self.sent.push(payload.to_vec());
            Ok(())
        }

        async fn receive(&mut self) -> Result<Vec<u8>> {
            let call = Call::decode(self.sent.last().ok_or(Error::ConnectionClosed)?)?;
            let reply = self.replies.pop_front().ok_or(Error::ConnectionClosed)?;
            Ok(reply(&call))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn accepted(call: &Call) -> Vec<u8> {
        CallResult::new(call.message_id.clone(), json!({"status": "Accepted"})).encode()
    }

    fn two_step_use_case() -> UseCase {
        UseCaseBuilder::new("T01", "two steps")
            .step(Step::new(
                "First",
                Call::new("First", json!({})).encode(),
                Some(Matcher::new().expect("status", "Accepted")),
            ))
            .step(Step::new("Second", Call::new("Second", json!({})).encode(), None))
            .build()
    }

    #[tokio::test]
    async fn test_completes_when_every_reply_validates() {
        let mut transport = Echo::new().reply(accepted).reply(accepted);
        let use_case = two_step_use_case();

        let report = ScenarioRunner::new(&mut transport).run(&use_case).await;

        assert!(report.passed());
        assert_eq!(report.state.phase, RunPhase::Completed);
        assert_eq!(report.state.steps_passed, 2);
        assert_eq!(transport.sent.len(), 2);
    }

    #[tokio::test]
    async fn test_stops_at_first_rejection() {
        let mut transport = Echo::new().reply(|call| {
            CallResult::new(call.message_id.clone(), json!({"status": "Rejected"})).encode()
        });
        let use_case = two_step_use_case();

        let report = ScenarioRunner::new(&mut transport).run(&use_case).await;

        assert_eq!(report.state.phase, RunPhase::Failed(0));
        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                step: 0,
                reason: FailureReason::Rejected(Rejection::UnmatchedField { .. })
            }
        ));
        assert_eq!(transport.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_reports_step() {
        // second receive finds no scripted reply
        let mut transport = Echo::new().reply(accepted);
        let use_case = two_step_use_case();

        let report = ScenarioRunner::new(&mut transport).run(&use_case).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                step: 1,
                reason: FailureReason::Transport(_)
            }
        ));
        assert_eq!(report.state.steps_passed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut transport = Echo::new().reply(accepted).reply(accepted);
        let use_case = two_step_use_case();

        let report = ScenarioRunner::new(&mut transport)
            .cancel_on(rx)
            .run(&use_case)
            .await;

        assert_eq!(report.outcome, RunOutcome::Cancelled { step: 0 });
        assert!(transport.sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pacing() {
        let (tx, rx) = watch::channel(false);
        let mut transport = Echo::new().reply(accepted).reply(accepted);
        let use_case = two_step_use_case();

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send(true).unwrap();
            tx
        });

        let report = ScenarioRunner::new(&mut transport)
            .pacing(Duration::from_secs(60))
            .cancel_on(rx)
            .run(&use_case)
            .await;

        assert_eq!(report.outcome, RunOutcome::Cancelled { step: 1 });
        assert_eq!(report.state.phase, RunPhase::Cancelled(1));
        assert_eq!(transport.sent.len(), 1);
        drop(cancel.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_cancel_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut transport = Echo::new().reply(accepted).reply(accepted);
        let use_case = two_step_use_case();

        let report = ScenarioRunner::new(&mut transport)
            .pacing(Duration::from_secs(3))
            .cancel_on(rx)
            .run(&use_case)
            .await;

        assert!(report.passed());
    }
}
