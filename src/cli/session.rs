//! Station session
//!
//! One connection to the CSMS: play the selected use cases one after the
//! other, then keep the station alive with heartbeats until interrupted.

use std::time::Duration;

use colored::Colorize;
use tokio::sync::watch;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::ocpp::messages::HeartbeatRequest;
use crate::transport::{Transport, WebSocketTransport};
use crate::usecases::runner::wait_for_cancel;
use crate::usecases::{validate, RunOutcome, RunReport, ScenarioRunner, Scenarios, Step};

/// Options of one `run` invocation that are not part of the config file
#[derive(Debug, Default)]
pub struct RunOptions {
    pub codes: Vec<String>,
    pub heartbeat: bool,
    pub verbose: bool,
}

/// Result of one requested use case
#[derive(Debug)]
pub enum ScenarioResult {
    NotFound(String),
    Ran(RunReport),
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        matches!(self, ScenarioResult::Ran(report) if report.passed())
    }
}

/// Connect and run the session until done or interrupted
pub async fn run(config: &Config, options: RunOptions) -> Result<()> {
    let scenarios = Scenarios::standard(config.station.clone())?;
    let codes = if options.codes.is_empty() {
        config.scenarios.run.clone()
    } else {
        options.codes
    };

    let mut transport =
        WebSocketTransport::connect(&config.csms, &config.station.id, &config.timing).await?;
    println!("Connected to {}", transport.url().to_string().cyan());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(watch_interrupt(cancel_tx));

    let results = play(
        &mut transport,
        &scenarios,
        &codes,
        config,
        options.verbose,
        cancel_rx.clone(),
    )
    .await;
    print_summary(&results);

    let interrupted = *cancel_rx.borrow();
    let period = config.timing.heartbeat_interval();
    let heartbeat_result = if options.heartbeat && !period.is_zero() && !interrupted {
        heartbeat_loop(&mut transport, period, cancel_rx).await
    } else {
        Ok(())
    };

    if let Err(e) = transport.close().await {
        tracing::warn!("Error while closing connection: {}", e);
    }
    heartbeat_result?;

    let failed = results.iter().filter(|r| !r.passed()).count();
    if failed > 0 {
        return Err(Error::ScenariosFailed {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

/// Run each code in order over one transport
pub async fn play<T: Transport + ?Sized>(
    transport: &mut T,
    scenarios: &Scenarios,
    codes: &[String],
    config: &Config,
    verbose: bool,
    cancel: watch::Receiver<bool>,
) -> Vec<ScenarioResult> {
    let mut results = Vec::with_capacity(codes.len());

    for code in codes {
        if *cancel.borrow() {
            break;
        }

        let use_case = match scenarios.resolve(code) {
            Ok(use_case) => use_case,
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                tracing::error!("{}", e);
                results.push(ScenarioResult::NotFound(code.clone()));
                if config.scenarios.stop_on_failure {
                    break;
                }
                continue;
            }
        };

        let report = ScenarioRunner::new(&mut *transport)
            .pacing(config.timing.step_interval())
            .match_scope(config.scenarios.match_scope)
            .cancel_on(cancel.clone())
            .verbose(verbose)
            .run(&use_case)
            .await;

        let stop = match &report.outcome {
            RunOutcome::Completed => false,
            RunOutcome::Cancelled { .. } => true,
            RunOutcome::Failed { reason, .. } => {
                // a dead connection makes every later use case fail too
                matches!(reason, crate::usecases::FailureReason::Transport(_))
                    || config.scenarios.stop_on_failure
            }
        };
        results.push(ScenarioResult::Ran(report));
        if stop {
            break;
        }
    }

    results
}

fn print_summary(results: &[ScenarioResult]) {
    println!("\n{}", "Summary:".cyan());
    for result in results {
        match result {
            ScenarioResult::NotFound(code) => {
                println!("  {} {} not found", "✗".red(), code);
            }
            ScenarioResult::Ran(report) => {
                let state = &report.state;
                match &report.outcome {
                    RunOutcome::Completed => println!(
                        "  {} {} passed ({} steps)",
                        "✓".green(),
                        state.code,
                        state.steps_total
                    ),
                    RunOutcome::Failed { step, reason } => println!(
                        "  {} {} failed at step {}/{}: {}",
                        "✗".red(),
                        state.code,
                        step + 1,
                        state.steps_total,
                        reason
                    ),
                    RunOutcome::Cancelled { step } => println!(
                        "  {} {} cancelled before step {}/{}",
                        "!".yellow(),
                        state.code,
                        step + 1,
                        state.steps_total
                    ),
                }
            }
        }
    }
}

/// Send a heartbeat every `period` until cancelled
///
/// The first heartbeat goes out one full period after the use cases end.
/// A zero period sends nothing.
pub async fn heartbeat_loop<T: Transport + ?Sized>(
    transport: &mut T,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
) -> Result<()> {
    if period.is_zero() {
        tracing::info!("Heartbeat interval is zero, not sending heartbeats");
        return Ok(());
    }

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    println!(
        "\n{} every {:?}, press Ctrl-C to stop",
        "Sending heartbeats".cyan(),
        period
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => heartbeat(transport).await?,
            _ = wait_for_cancel(&mut cancel) => {
                tracing::info!("Interrupted, stopping heartbeats");
                return Ok(());
            }
        }
    }
}

async fn heartbeat<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let step = Step::from_request(&HeartbeatRequest::default(), None)?;
    tracing::info!("Sending Heartbeat");

    transport.send(step.request()).await?;
    let reply = transport.receive().await?;

    match validate(step.request(), &reply, None, Default::default()) {
        Ok(()) => tracing::debug!("Heartbeat acknowledged"),
        Err(rejection) => tracing::warn!("Unexpected heartbeat reply: {}", rejection),
    }
    Ok(())
}

/// First Ctrl-C cancels between steps; a second one exits immediately
async fn watch_interrupt(cancel: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::info!("Interrupt received, finishing current step");
    let _ = cancel.send(true);

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Interrupted again, exiting");
        std::process::exit(130);
    }
}
