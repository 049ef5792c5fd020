//! OCPP 2.0.1 message types
//!
//! Only the requests a charging station sends in the simulated use cases
//! and the responses the mock CSMS produces are modelled.
//! See: OCPP 2.0.1 Part 2, Messages, Datatypes & Enumerations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::config::StationConfig;
use crate::common::Result;

use super::envelope::{Call, ValueTree};

/// A request message with its OCPP action name
pub trait OcppRequest: Serialize {
    const ACTION: &'static str;

    /// Wrap the request in a CALL with a fresh message id
    fn to_call(&self) -> Result<Call> {
        Ok(Call::new(Self::ACTION, serde_json::to_value(self)?))
    }

    /// Encoded CALL frame ready to be sent
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_call()?.encode())
    }
}

// === Enumerations ===

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BootReason {
    PowerUp,
    RemoteReset,
    ScheduledReset,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectorStatus {
    Available,
    Occupied,
    Reserved,
    Unavailable,
    Faulted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionEventType {
    Started,
    Updated,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TriggerReason {
    Authorized,
    CablePluggedIn,
    ChargingStateChanged,
    EVCommunicationLost,
    MeterValuePeriodic,
    StopAuthorized,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChargingState {
    Charging,
    EVConnected,
    SuspendedEV,
    SuspendedEVSE,
    Idle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegistrationStatus {
    Accepted,
    Pending,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Pending => "Pending",
            Self::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    Unknown,
}

impl AuthorizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
            Self::Unknown => "Unknown",
        }
    }
}

// === Shared Datatypes ===

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargingStation {
    pub model: String,
    pub vendor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdToken {
    pub id_token: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdTokenInfo {
    pub status: AuthorizationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evse {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charging_state: Option<ChargingState>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampledValue {
    pub value: f64,
    pub measurand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<UnitOfMeasure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitOfMeasure {
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeterValue {
    pub timestamp: DateTime<Utc>,
    pub sampled_value: Vec<SampledValue>,
}

// === Requests ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationRequest {
    pub charging_station: ChargingStation,
    pub reason: BootReason,
}

impl OcppRequest for BootNotificationRequest {
    const ACTION: &'static str = "BootNotification";
}

impl BootNotificationRequest {
    pub fn power_up(station: &StationConfig) -> Self {
        Self {
            charging_station: ChargingStation {
                model: station.model.clone(),
                vendor_name: station.vendor_name.clone(),
            },
            reason: BootReason::PowerUp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotificationRequest {
    pub timestamp: DateTime<Utc>,
    pub connector_status: ConnectorStatus,
    pub evse_id: u32,
    pub connector_id: u32,
}

impl OcppRequest for StatusNotificationRequest {
    const ACTION: &'static str = "StatusNotification";
}

impl StatusNotificationRequest {
    pub fn new(station: &StationConfig, connector_status: ConnectorStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            connector_status,
            evse_id: station.evse_id,
            connector_id: station.connector_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {}

impl OcppRequest for HeartbeatRequest {
    const ACTION: &'static str = "Heartbeat";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub id_token: IdToken,
}

impl OcppRequest for AuthorizeRequest {
    const ACTION: &'static str = "Authorize";
}

impl AuthorizeRequest {
    pub fn new(station: &StationConfig) -> Self {
        Self {
            id_token: IdToken {
                id_token: station.id_token.clone(),
                token_type: "ISO14443".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEventRequest {
    pub event_type: TransactionEventType,
    pub timestamp: DateTime<Utc>,
    pub trigger_reason: TriggerReason,
    pub seq_no: u32,
    pub transaction_info: TransactionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse: Option<Evse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meter_value: Vec<MeterValue>,
}

impl OcppRequest for TransactionEventRequest {
    const ACTION: &'static str = "TransactionEvent";
}

/// Parameters of one transaction event in a scripted charging session
#[derive(Debug, Clone, Copy)]
pub struct EventParams {
    pub event_type: TransactionEventType,
    /// Energy delivered so far, in kWh
    pub energy_kwh: f64,
    /// Instantaneous charging power, in kW
    pub power_kw: f64,
    pub trigger_reason: TriggerReason,
}

impl TransactionEventRequest {
    /// Build a transaction event carrying a meter value
    ///
    /// `seq_no` orders the events of one transaction, starting at 0.
    pub fn new(
        station: &StationConfig,
        params: EventParams,
        transaction_id: &str,
        seq_no: u32,
    ) -> Self {
        let now = Utc::now();
        let charging_state = match params.event_type {
            TransactionEventType::Started => ChargingState::EVConnected,
            TransactionEventType::Updated => ChargingState::Charging,
            TransactionEventType::Ended => ChargingState::Idle,
        };
        let id_token = matches!(params.trigger_reason, TriggerReason::Authorized)
            .then(|| AuthorizeRequest::new(station).id_token);

        Self {
            event_type: params.event_type,
            timestamp: now,
            trigger_reason: params.trigger_reason,
            seq_no,
            transaction_info: TransactionInfo {
                transaction_id: transaction_id.to_string(),
                charging_state: Some(charging_state),
            },
            evse: Some(Evse {
                id: station.evse_id,
                connector_id: Some(station.connector_id),
            }),
            id_token,
            meter_value: vec![MeterValue {
                timestamp: now,
                sampled_value: vec![
                    SampledValue {
                        value: params.energy_kwh * 1000.0,
                        measurand: "Energy.Active.Import.Register".to_string(),
                        unit_of_measure: Some(UnitOfMeasure {
                            unit: "Wh".to_string(),
                        }),
                    },
                    SampledValue {
                        value: params.power_kw * 1000.0,
                        measurand: "Power.Active.Import".to_string(),
                        unit_of_measure: Some(UnitOfMeasure {
                            unit: "W".to_string(),
                        }),
                    },
                ],
            }],
        }
    }
}

/// Move the send time of a request payload to `now`
///
/// Use cases are built before the run starts, so `timestamp` and every
/// `meterValue[].timestamp` are refreshed right before the request is sent.
pub fn restamp(payload: &mut ValueTree, now: DateTime<Utc>) -> Result<()> {
    let stamp = serde_json::to_value(now)?;
    if let Some(timestamp) = payload.get_mut("timestamp") {
        *timestamp = stamp.clone();
    }
    if let Some(values) = payload
        .get_mut("meterValue")
        .and_then(ValueTree::as_array_mut)
    {
        for value in values {
            if let Some(timestamp) = value.get_mut("timestamp") {
                *timestamp = stamp.clone();
            }
        }
    }
    Ok(())
}

// === Responses ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationResponse {
    pub current_time: DateTime<Utc>,
    pub interval: u32,
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub current_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub id_token_info: IdTokenInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEventResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_info: Option<IdTokenInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_notification_call() {
        let call = BootNotificationRequest::power_up(&StationConfig::default())
            .to_call()
            .unwrap();

        assert_eq!(call.action, "BootNotification");
        assert_eq!(call.payload["reason"], "PowerUp");
        assert_eq!(call.payload["chargingStation"]["model"], "SimStation");
        assert_eq!(call.payload["chargingStation"]["vendorName"], "StationSim");
    }

    #[test]
    fn test_status_notification_uses_station_connector() {
        let station = StationConfig {
            evse_id: 2,
            connector_id: 3,
            ..Default::default()
        };
        let call = StatusNotificationRequest::new(&station, ConnectorStatus::Occupied)
            .to_call()
            .unwrap();

        assert_eq!(call.payload["connectorStatus"], "Occupied");
        assert_eq!(call.payload["evseId"], 2);
        assert_eq!(call.payload["connectorId"], 3);
        assert!(call.payload["timestamp"].is_string());
    }

    #[test]
    fn test_heartbeat_payload_is_empty_object() {
        let call = HeartbeatRequest::default().to_call().unwrap();
        assert_eq!(call.payload, serde_json::json!({}));
    }

    #[test]
    fn test_transaction_event_payload() {
        let params = EventParams {
            event_type: TransactionEventType::Updated,
            energy_kwh: 0.1,
            power_kw: 22.0,
            trigger_reason: TriggerReason::Authorized,
        };
        let call = TransactionEventRequest::new(&StationConfig::default(), params, "tx-1", 3)
            .to_call()
            .unwrap();

        let payload = &call.payload;
        assert_eq!(payload["eventType"], "Updated");
        assert_eq!(payload["triggerReason"], "Authorized");
        assert_eq!(payload["seqNo"], 3);
        assert_eq!(payload["transactionInfo"]["transactionId"], "tx-1");
        assert_eq!(payload["idToken"]["idToken"], "DEADBEEF");
        let sampled = &payload["meterValue"][0]["sampledValue"];
        assert_eq!(sampled[0]["measurand"], "Energy.Active.Import.Register");
        assert_eq!(sampled[0]["value"], 100.0);
        assert_eq!(sampled[1]["value"], 22000.0);
    }

    #[test]
    fn test_id_token_only_sent_when_authorized() {
        let params = EventParams {
            event_type: TransactionEventType::Started,
            energy_kwh: 0.0,
            power_kw: 22.0,
            trigger_reason: TriggerReason::CablePluggedIn,
        };
        let call = TransactionEventRequest::new(&StationConfig::default(), params, "tx-1", 0)
            .to_call()
            .unwrap();
        assert!(call.payload.get("idToken").is_none());
    }

    #[test]
    fn test_restamp_moves_event_and_meter_times() {
        let params = EventParams {
            event_type: TransactionEventType::Updated,
            energy_kwh: 1.0,
            power_kw: 22.0,
            trigger_reason: TriggerReason::ChargingStateChanged,
        };
        let mut call = TransactionEventRequest::new(&StationConfig::default(), params, "tx-1", 2)
            .to_call()
            .unwrap();
        let later = Utc::now() + chrono::Duration::seconds(30);

        restamp(&mut call.payload, later).unwrap();

        let expected = serde_json::to_value(later).unwrap();
        assert_eq!(call.payload["timestamp"], expected);
        assert_eq!(call.payload["meterValue"][0]["timestamp"], expected);
        assert_eq!(call.payload["seqNo"], 2);
    }

    #[test]
    fn test_restamp_leaves_untimed_payloads_alone() {
        let mut payload = serde_json::json!({"idToken": {"idToken": "DEADBEEF"}});
        restamp(&mut payload, Utc::now()).unwrap();
        assert_eq!(payload, serde_json::json!({"idToken": {"idToken": "DEADBEEF"}}));
    }

    #[test]
    fn test_response_statuses_serialize_as_names() {
        let response = AuthorizeResponse {
            id_token_info: IdTokenInfo {
                status: AuthorizationStatus::Accepted,
            },
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["idTokenInfo"]["status"], AuthorizationStatus::Accepted.as_str());
        assert_eq!(RegistrationStatus::Rejected.as_str(), "Rejected");
    }
}
