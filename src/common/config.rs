//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Identity of the simulated charging station
    #[serde(default)]
    pub station: StationConfig,

    /// Where the CSMS lives
    #[serde(default)]
    pub csms: CsmsConfig,

    /// Pacing and timeout settings
    #[serde(default)]
    pub timing: Timing,

    /// Which scenarios to play and how to judge them
    #[serde(default)]
    pub scenarios: ScenarioConfig,
}

/// Charging station identity used in the OCPP requests
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    /// Station identity, appended to the CSMS URL path
    #[serde(default = "default_station_id")]
    pub id: String,

    /// Reported in BootNotification
    #[serde(default = "default_model")]
    pub model: String,

    /// Reported in BootNotification
    #[serde(default = "default_vendor")]
    pub vendor_name: String,

    /// Token presented in Authorize requests
    #[serde(default = "default_id_token")]
    pub id_token: String,

    #[serde(default = "default_one")]
    pub evse_id: u32,

    #[serde(default = "default_one")]
    pub connector_id: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: default_station_id(),
            model: default_model(),
            vendor_name: default_vendor(),
            id_token: default_id_token(),
            evse_id: default_one(),
            connector_id: default_one(),
        }
    }
}

fn default_station_id() -> String {
    "CS001".to_string()
}
fn default_model() -> String {
    "SimStation".to_string()
}
fn default_vendor() -> String {
    "StationSim".to_string()
}
fn default_id_token() -> String {
    "DEADBEEF".to_string()
}
fn default_one() -> u32 {
    1
}

/// CSMS endpoint settings
#[derive(Debug, Deserialize, Clone)]
pub struct CsmsConfig {
    /// Host and port of the CSMS websocket server
    #[serde(default = "default_host")]
    pub host: String,

    /// URL path; the station id is appended as the last segment
    #[serde(default = "default_path")]
    pub path: String,

    /// Websocket subprotocol requested during the handshake
    #[serde(default = "default_subprotocol")]
    pub subprotocol: String,
}

impl Default for CsmsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            path: default_path(),
            subprotocol: default_subprotocol(),
        }
    }
}

fn default_host() -> String {
    "localhost:3000".to_string()
}
fn default_path() -> String {
    "/ocpp".to_string()
}
fn default_subprotocol() -> String {
    "ocpp2.0.1".to_string()
}

/// Timing settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timing {
    /// Pause between two steps of a use case
    #[serde(default = "default_step_interval")]
    pub step_interval_secs: u64,

    /// Period of the heartbeat loop that follows the scenarios, 0 disables it
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// How long to wait for the CSMS close frame on shutdown
    #[serde(default = "default_close_grace")]
    pub close_grace_secs: u64,

    /// Maximum wait for a single reply, 0 waits forever
    #[serde(default)]
    pub reply_timeout_secs: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            step_interval_secs: default_step_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            close_grace_secs: default_close_grace(),
            reply_timeout_secs: 0,
        }
    }
}

fn default_step_interval() -> u64 {
    3
}
fn default_heartbeat_interval() -> u64 {
    10
}
fn default_close_grace() -> u64 {
    1
}

impl Timing {
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs(self.step_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_secs)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_secs > 0).then(|| Duration::from_secs(self.reply_timeout_secs))
    }
}

/// How matcher keys are located inside a reply payload
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchScope {
    /// Any mapping at any depth may satisfy a pair
    #[default]
    Anywhere,
    /// Only the top-level keys of the payload are inspected
    TopLevel,
}

/// Scenario selection
#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioConfig {
    /// Use case codes played by `station-sim run` when none are given
    #[serde(default = "default_run")]
    pub run: Vec<String>,

    #[serde(default)]
    pub match_scope: MatchScope,

    /// Skip the remaining use cases once one fails
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            run: default_run(),
            match_scope: MatchScope::default(),
            stop_on_failure: false,
        }
    }
}

fn default_run() -> Vec<String> {
    vec!["B01".to_string(), "E02".to_string()]
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_station() {
        let config = Config::default();
        assert_eq!(config.station.id, "CS001");
        assert_eq!(config.csms.host, "localhost:3000");
        assert_eq!(config.csms.path, "/ocpp");
        assert_eq!(config.timing.step_interval_secs, 3);
        assert_eq!(config.timing.heartbeat_interval_secs, 10);
        assert_eq!(config.timing.reply_timeout(), None);
        assert_eq!(config.scenarios.run, vec!["B01", "E02"]);
        assert_eq!(config.scenarios.match_scope, MatchScope::Anywhere);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[csms]
host = "csms.example.org:9000"

[timing]
reply_timeout_secs = 5

[scenarios]
run = ["E02"]
match_scope = "top_level"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.csms.host, "csms.example.org:9000");
        assert_eq!(config.csms.path, "/ocpp");
        assert_eq!(config.timing.reply_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.timing.step_interval_secs, 3);
        assert_eq!(config.scenarios.run, vec!["E02"]);
        assert_eq!(config.scenarios.match_scope, MatchScope::TopLevel);
        assert_eq!(config.station.id, "CS001");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nstep_interval_secs = \"soon\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, crate::common::Error::ConfigParse(_)));
    }
}
