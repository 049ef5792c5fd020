//! CLI command definitions
//!
//! Defines the clap commands for the station simulator.

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the CSMS, play use cases, then send heartbeats until Ctrl-C
    Run {
        /// Use case codes to play in order (default: `scenarios.run` from config)
        codes: Vec<String>,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Seconds to wait between two steps
        #[arg(long)]
        interval: Option<u64>,

        /// Seconds between heartbeats once the use cases are done (0 disables them)
        #[arg(long)]
        heartbeat: Option<u64>,

        /// Disconnect after the use cases instead of sending heartbeats
        #[arg(long)]
        no_heartbeat: bool,

        /// Seconds to wait for each reply (0 waits forever)
        #[arg(long)]
        reply_timeout: Option<u64>,

        /// Only match expected fields at the top level of a reply
        #[arg(long)]
        strict: bool,

        /// Skip the remaining use cases after a failure
        #[arg(long)]
        stop_on_failure: bool,

        /// Print every request and reply
        #[arg(long, short)]
        verbose: bool,
    },

    /// List registered use cases
    #[command(alias = "ls")]
    List,

    /// Print the requests of one use case without connecting
    Show {
        /// Use case code, e.g. B01
        code: String,
    },
}

/// Where to find the CSMS
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// CSMS websocket host and port
    #[arg(long, short = 'H')]
    pub host: Option<String>,

    /// CSMS URL path; the station id is appended
    #[arg(long, short = 'u')]
    pub path: Option<String>,

    /// Charging station id
    #[arg(long)]
    pub id: Option<String>,
}
