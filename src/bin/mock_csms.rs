//! Mock CSMS binary for local runs
//!
//! Accepts station connections and answers with canned OCPP 2.0.1 replies.
//! Point `station-sim run --host` at it to try use cases without a backend.

use clap::Parser;
use station_sim::common::logging;
use station_sim::mock::{Fault, MockCsms};
use station_sim::ocpp::messages::{AuthorizationStatus, RegistrationStatus};

#[derive(Parser)]
#[command(name = "mock-csms", about = "Scripted OCPP 2.0.1 CSMS")]
#[command(version, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// Answer BootNotification with status Rejected
    #[arg(long)]
    reject_boot: bool,

    /// Answer Authorize with status Invalid
    #[arg(long)]
    reject_authorize: bool,

    /// Websocket subprotocol to accept
    #[arg(long, default_value = "ocpp2.0.1")]
    subprotocol: String,

    /// Misbehave on one action, e.g. `Heartbeat=silence`
    #[arg(long, value_parser = parse_fault)]
    fault: Vec<(String, Fault)>,
}

fn parse_fault(s: &str) -> Result<(String, Fault), String> {
    let (action, kind) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ACTION=KIND, got '{}'", s))?;
    let fault = match kind {
        "wrong-id" => Fault::WrongMessageId,
        "garbage" => Fault::Garbage,
        "call-error" => Fault::CallError,
        "silence" => Fault::Silence,
        other => {
            return Err(format!(
                "unknown fault '{}' (wrong-id, garbage, call-error, silence)",
                other
            ))
        }
    };
    Ok((action.to_string(), fault))
}

#[tokio::main]
async fn main() {
    logging::init_cli();
    let args = Args::parse();

    let mut csms = MockCsms::new().subprotocol(args.subprotocol);
    if args.reject_boot {
        csms = csms.registration(RegistrationStatus::Rejected);
    }
    if args.reject_authorize {
        csms = csms.authorization(AuthorizationStatus::Invalid);
    }
    for (action, fault) in args.fault {
        csms = csms.fault(action, fault);
    }

    let server = match csms.bind(args.listen.as_str()).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Ok(addr) = server.local_addr() {
        tracing::info!("Mock CSMS listening on ws://{}", addr);
    }

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
}
