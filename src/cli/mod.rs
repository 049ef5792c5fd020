//! CLI command handling
//!
//! Applies command-line overrides to the configuration and dispatches to the
//! station session or the catalog printers.

pub mod session;

use colored::Colorize;

use crate::commands::{Commands, ConnectionArgs};
use crate::common::config::{Config, MatchScope};
use crate::common::Result;
use crate::ocpp::Envelope;
use crate::usecases::{Scenarios, UseCase};

pub use session::RunOptions;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Run {
            codes,
            connection,
            interval,
            heartbeat,
            no_heartbeat,
            reply_timeout,
            strict,
            stop_on_failure,
            verbose,
        } => {
            apply_connection(&mut config, connection);
            if let Some(secs) = interval {
                config.timing.step_interval_secs = secs;
            }
            if let Some(secs) = heartbeat {
                config.timing.heartbeat_interval_secs = secs;
            }
            if let Some(secs) = reply_timeout {
                config.timing.reply_timeout_secs = secs;
            }
            if strict {
                config.scenarios.match_scope = MatchScope::TopLevel;
            }
            if stop_on_failure {
                config.scenarios.stop_on_failure = true;
            }

            session::run(
                &config,
                RunOptions {
                    codes,
                    heartbeat: !no_heartbeat,
                    verbose,
                },
            )
            .await
        }

        Commands::List => {
            let scenarios = Scenarios::standard(config.station.clone())?;
            for (family, catalog) in scenarios.catalogs()? {
                println!("{}", family.cyan().bold());
                for use_case in catalog.use_cases() {
                    println!(
                        "  {}  {} ({} steps)",
                        use_case.code().white().bold(),
                        use_case.title(),
                        use_case.len()
                    );
                    for (i, step) in use_case.steps().iter().enumerate() {
                        let expects = step
                            .matcher()
                            .map(|m| {
                                m.pairs()
                                    .map(|(k, v)| format!("{}={}", k, v))
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            })
                            .unwrap_or_default();
                        if expects.is_empty() {
                            println!("      {:>2}. {}", i + 1, step.label());
                        } else {
                            println!(
                                "      {:>2}. {} {}",
                                i + 1,
                                step.label(),
                                format!("expects {}", expects).dimmed()
                            );
                        }
                    }
                }
            }
            Ok(())
        }

        Commands::Show { code } => {
            let scenarios = Scenarios::standard(config.station.clone())?;
            let use_case = scenarios.resolve(&code)?;
            print_use_case(&use_case)
        }
    }
}

fn apply_connection(config: &mut Config, connection: ConnectionArgs) {
    if let Some(host) = connection.host {
        config.csms.host = host;
    }
    if let Some(path) = connection.path {
        config.csms.path = path;
    }
    if let Some(id) = connection.id {
        config.station.id = id;
    }
}

fn print_use_case(use_case: &UseCase) -> Result<()> {
    println!(
        "{} {}",
        use_case.code().white().bold(),
        use_case.title().dimmed()
    );
    if let Some(token) = use_case.correlation_token() {
        println!("{} {}", "Transaction:".dimmed(), token);
    }

    for (i, step) in use_case.steps().iter().enumerate() {
        println!("\n{}. {}", i + 1, step.label().cyan());
        let call = Envelope::decode(step.request())?;
        println!("{}", serde_json::to_string_pretty(call.payload())?);
        if let Some(matcher) = step.matcher() {
            for (key, value) in matcher.pairs() {
                println!("  {} {} = {}", "expect".yellow(), key, value);
            }
        }
    }
    Ok(())
}
