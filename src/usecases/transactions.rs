//! Transaction use cases (OCPP 2.0.1 functional block E)

use crate::common::config::StationConfig;
use crate::common::Result;
use crate::ocpp::messages::{
    AuthorizationStatus, AuthorizeRequest, ConnectorStatus, EventParams,
    StatusNotificationRequest, TransactionEventRequest, TransactionEventType, TriggerReason,
};

use super::catalog::{Catalog, ScenarioFamily};
use super::step::{Matcher, Step, UseCase, UseCaseBuilder};

/// E02 - Start transaction, cable plugin first
pub const CABLE_PLUGIN_FIRST: &str = "E02";

/// Maximum power offered during the simulated session, in kW
const CHARGING_POWER_KW: f64 = 22.0;

pub struct Transactions;

impl ScenarioFamily for Transactions {
    fn name(&self) -> &'static str {
        "transactions"
    }

    fn codes(&self) -> &'static [&'static str] {
        &[CABLE_PLUGIN_FIRST]
    }

    fn build(&self, station: &StationConfig) -> Result<Catalog> {
        let transaction_id = uuid::Uuid::new_v4().to_string();
        Catalog::from_use_cases([cable_plugin_first(station, &transaction_id)?])
    }
}

/// Numbers the transaction events of one transaction
struct TransactionScript<'a> {
    station: &'a StationConfig,
    transaction_id: &'a str,
    seq_no: u32,
}

impl TransactionScript<'_> {
    fn event(
        &mut self,
        event_type: TransactionEventType,
        energy_kwh: f64,
        trigger_reason: TriggerReason,
    ) -> Result<Step> {
        let params = EventParams {
            event_type,
            energy_kwh,
            power_kw: CHARGING_POWER_KW,
            trigger_reason,
        };
        let request =
            TransactionEventRequest::new(self.station, params, self.transaction_id, self.seq_no);
        self.seq_no += 1;
        Step::from_request(&request, None)
    }
}

/// The driver plugs in before authorizing
fn cable_plugin_first(station: &StationConfig, transaction_id: &str) -> Result<UseCase> {
    use TransactionEventType::{Ended, Started, Updated};

    let mut tx = TransactionScript {
        station,
        transaction_id,
        seq_no: 0,
    };

    Ok(UseCaseBuilder::new(CABLE_PLUGIN_FIRST, "Start transaction - cable plugin first")
        .correlation_token(transaction_id)
        // cable plugged in, connector becomes Occupied
        .send(&StatusNotificationRequest::new(station, ConnectorStatus::Occupied))?
        // transaction starts before the driver is known
        .step(tx.event(Started, 0.0, TriggerReason::CablePluggedIn)?)
        .send_expecting(
            &AuthorizeRequest::new(station),
            Matcher::new().expect("status", AuthorizationStatus::Accepted.as_str()),
        )?
        // energy offer starts for the authorized idToken
        .step(tx.event(Updated, 0.1, TriggerReason::Authorized)?)
        .step(tx.event(Updated, 0.1, TriggerReason::ChargingStateChanged)?)
        // driver presents the token again to stop
        .send(&AuthorizeRequest::new(station))?
        .step(tx.event(Updated, 0.1, TriggerReason::StopAuthorized)?)
        .send(&StatusNotificationRequest::new(station, ConnectorStatus::Available))?
        .step(tx.event(Ended, 0.1, TriggerReason::EVCommunicationLost)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::Call;

    fn build() -> UseCase {
        let catalog = Transactions.build(&StationConfig::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        catalog.lookup(CABLE_PLUGIN_FIRST).unwrap().clone()
    }

    fn transaction_ids(use_case: &UseCase) -> Vec<(usize, String)> {
        use_case
            .steps()
            .iter()
            .enumerate()
            .filter(|(_, step)| step.label() == "TransactionEvent")
            .map(|(i, step)| {
                let call = Call::decode(step.request()).unwrap();
                let id = call.payload["transactionInfo"]["transactionId"]
                    .as_str()
                    .unwrap()
                    .to_string();
                (i, id)
            })
            .collect()
    }

    #[test]
    fn test_cable_plugin_first_sequence() {
        let use_case = build();
        let labels: Vec<_> = use_case.steps().iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            vec![
                "StatusNotification",
                "TransactionEvent",
                "Authorize",
                "TransactionEvent",
                "TransactionEvent",
                "Authorize",
                "TransactionEvent",
                "StatusNotification",
                "TransactionEvent",
            ]
        );

        let checked: Vec<_> = use_case
            .steps()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.matcher().map(|_| i))
            .collect();
        assert_eq!(checked, vec![2]);
    }

    #[test]
    fn test_event_types_and_triggers() {
        let use_case = build();
        let events: Vec<_> = use_case
            .steps()
            .iter()
            .filter(|s| s.label() == "TransactionEvent")
            .map(|s| {
                let call = Call::decode(s.request()).unwrap();
                (
                    call.payload["eventType"].as_str().unwrap().to_string(),
                    call.payload["triggerReason"].as_str().unwrap().to_string(),
                    call.payload["seqNo"].as_u64().unwrap(),
                )
            })
            .collect();

        assert_eq!(
            events,
            vec![
                ("Started".to_string(), "CablePluggedIn".to_string(), 0),
                ("Updated".to_string(), "Authorized".to_string(), 1),
                ("Updated".to_string(), "ChargingStateChanged".to_string(), 2),
                ("Updated".to_string(), "StopAuthorized".to_string(), 3),
                ("Ended".to_string(), "EVCommunicationLost".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_transaction_id_shared_within_run() {
        let use_case = build();
        let ids = transaction_ids(&use_case);

        // steps 2, 4, 5, 7 and 9 in one-based numbering
        assert_eq!(ids.iter().map(|(i, _)| i + 1).collect::<Vec<_>>(), vec![2, 4, 5, 7, 9]);
        let token = use_case.correlation_token().unwrap();
        assert!(ids.iter().all(|(_, id)| id == token));
    }

    #[test]
    fn test_transaction_id_differs_between_runs() {
        let first = build();
        let second = build();
        assert_ne!(first.correlation_token(), second.correlation_token());
        assert_ne!(transaction_ids(&first)[0].1, transaction_ids(&second)[0].1);
    }
}
