//! Provisioning use cases (OCPP 2.0.1 functional block B)

use crate::common::config::StationConfig;
use crate::common::Result;
use crate::ocpp::messages::{
    BootNotificationRequest, ConnectorStatus, HeartbeatRequest, RegistrationStatus,
    StatusNotificationRequest,
};

use super::catalog::{Catalog, ScenarioFamily};
use super::step::{Matcher, UseCase, UseCaseBuilder};

/// B01 - Cold boot charging station
pub const COLD_BOOT: &str = "B01";

pub struct Provisioning;

impl ScenarioFamily for Provisioning {
    fn name(&self) -> &'static str {
        "provisioning"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[COLD_BOOT]
    }

    fn build(&self, station: &StationConfig) -> Result<Catalog> {
        Catalog::from_use_cases([cold_boot(station)?])
    }
}

/// The station powers up, registers and resumes normal operation
fn cold_boot(station: &StationConfig) -> Result<UseCase> {
    Ok(UseCaseBuilder::new(COLD_BOOT, "Cold boot charging station")
        .send_expecting(
            &BootNotificationRequest::power_up(station),
            Matcher::new().expect("status", RegistrationStatus::Accepted.as_str()),
        )?
        // one notification per connector
        .send(&StatusNotificationRequest::new(station, ConnectorStatus::Available))?
        .send(&HeartbeatRequest::default())?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::Call;

    #[test]
    fn test_cold_boot_steps() {
        let catalog = Provisioning.build(&StationConfig::default()).unwrap();
        let use_case = catalog.lookup(COLD_BOOT).unwrap();

        let labels: Vec<_> = use_case.steps().iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["BootNotification", "StatusNotification", "Heartbeat"]);

        let boot = &use_case.steps()[0];
        assert_eq!(
            boot.matcher().unwrap().pairs().collect::<Vec<_>>(),
            vec![("status", "Accepted")]
        );
        assert!(use_case.steps()[1].matcher().is_none());
        assert!(use_case.steps()[2].matcher().is_none());

        let status = Call::decode(use_case.steps()[1].request()).unwrap();
        assert_eq!(status.payload["connectorStatus"], "Available");
        assert!(use_case.correlation_token().is_none());
    }
}
