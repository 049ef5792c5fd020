//! Scripted CSMS for local runs and integration tests
//!
//! Answers every CALL with a CALLRESULT carrying the same message id and a
//! payload shaped like a real CSMS reply. Statuses can be changed and one
//! action can be made to misbehave, which is how failing conformance runs
//! are reproduced without a real backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::common::Result;
use crate::ocpp::messages::{
    AuthorizationStatus, AuthorizeResponse, BootNotificationResponse, HeartbeatResponse,
    IdTokenInfo, RegistrationStatus, TransactionEventResponse,
};
use crate::ocpp::{Call, CallError, CallResult, Envelope};

/// How a misbehaving action is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Correct payload, wrong message id
    WrongMessageId,
    /// Bytes that are not an OCPP-J frame
    Garbage,
    /// CALLERROR instead of CALLRESULT
    CallError,
    /// No reply at all
    Silence,
}

/// Reply policy of the mock CSMS
#[derive(Debug, Clone)]
pub struct MockCsms {
    registration: RegistrationStatus,
    authorization: AuthorizationStatus,
    heartbeat_interval: u32,
    faults: HashMap<String, Fault>,
    subprotocol: String,
}

impl Default for MockCsms {
    fn default() -> Self {
        Self {
            registration: RegistrationStatus::Accepted,
            authorization: AuthorizationStatus::Accepted,
            heartbeat_interval: 10,
            faults: HashMap::new(),
            subprotocol: "ocpp2.0.1".to_string(),
        }
    }
}

impl MockCsms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status returned in BootNotification replies
    pub fn registration(mut self, status: RegistrationStatus) -> Self {
        self.registration = status;
        self
    }

    /// Status returned in Authorize and TransactionEvent replies
    pub fn authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    pub fn subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }

    /// Make every call of `action` misbehave
    pub fn fault(mut self, action: impl Into<String>, fault: Fault) -> Self {
        self.faults.insert(action.into(), fault);
        self
    }

    /// Reply to one incoming frame, `None` when nothing should be sent
    pub fn respond(&self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        let call = match Envelope::decode(frame) {
            Ok(Envelope::Call(call)) => call,
            Ok(other) => {
                tracing::debug!("Ignoring {:?} from station", other.kind());
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!("Undecodable frame from station: {}", e);
                return Ok(None);
            }
        };

        match self.faults.get(&call.action) {
            None => {}
            Some(Fault::WrongMessageId) => {
                if let Ok(payload) = self.payload_for(&call) {
                    let id = format!("{}-other", call.message_id);
                    return Ok(Some(CallResult::new(id, payload).encode()));
                }
            }
            Some(Fault::Garbage) => return Ok(Some(b"<html>502 Bad Gateway</html>".to_vec())),
            Some(Fault::CallError) => {
                return Ok(Some(
                    CallError::new(call.message_id, "InternalError", "scripted fault").encode(),
                ))
            }
            Some(Fault::Silence) => return Ok(None),
        }

        let reply = match self.payload_for(&call) {
            Ok(payload) => CallResult::new(call.message_id, payload).encode(),
            Err(_) => CallError::new(
                call.message_id,
                "NotImplemented",
                format!("{} is not supported by the mock CSMS", call.action),
            )
            .encode(),
        };
        Ok(Some(reply))
    }

    fn payload_for(&self, call: &Call) -> Result<serde_json::Value> {
        let id_token_info = IdTokenInfo {
            status: self.authorization,
        };

        let payload = match call.action.as_str() {
            "BootNotification" => serde_json::to_value(BootNotificationResponse {
                current_time: Utc::now(),
                interval: self.heartbeat_interval,
                status: self.registration,
            })?,
            "Heartbeat" => serde_json::to_value(HeartbeatResponse {
                current_time: Utc::now(),
            })?,
            "StatusNotification" => json!({}),
            "Authorize" => serde_json::to_value(AuthorizeResponse { id_token_info })?,
            "TransactionEvent" => {
                let response = TransactionEventResponse {
                    id_token_info: call.payload.get("idToken").map(|_| id_token_info),
                };
                serde_json::to_value(response)?
            }
            other => {
                return Err(crate::common::Error::malformed(format!(
                    "unsupported action {}",
                    other
                )))
            }
        };
        Ok(payload)
    }

    /// Bind a listener; use port 0 for an ephemeral port
    pub async fn bind(self, addr: impl ToSocketAddrs) -> Result<MockServer> {
        let listener = TcpListener::bind(addr).await?;
        Ok(MockServer {
            listener,
            csms: Arc::new(self),
        })
    }
}

/// Listening mock CSMS
pub struct MockServer {
    listener: TcpListener,
    csms: Arc<MockCsms>,
}

impl MockServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept stations until the task is dropped
    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!("Station connected from {}", peer);

            let csms = Arc::clone(&self.csms);
            tokio::spawn(async move {
                if let Err(e) = handle_station(stream, csms).await {
                    tracing::warn!("Station {} session ended with error: {}", peer, e);
                }
            });
        }
    }
}

async fn handle_station(stream: TcpStream, csms: Arc<MockCsms>) -> Result<()> {
    let subprotocol = csms.subprotocol.clone();
    let negotiate = move |request: &Request, mut response: Response| {
        tracing::info!("Station endpoint {}", request.uri().path());

        let offered = request
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').any(|p| p.trim() == subprotocol))
            .unwrap_or(false);
        if offered {
            if let Ok(value) = HeaderValue::from_str(&subprotocol) {
                response
                    .headers_mut()
                    .insert("Sec-WebSocket-Protocol", value);
            }
        }
        Ok::<Response, ErrorResponse>(response)
    };

    let mut ws = tokio_tungstenite::accept_hdr_async(stream, negotiate).await?;

    // Keep reading after a Close so tungstenite can flush its close reply
    while let Some(message) = ws.next().await {
        let frame = match message? {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
            _ => continue,
        };
        tracing::debug!("CSMS <<< {}", String::from_utf8_lossy(&frame));

        if let Some(reply) = csms.respond(&frame)? {
            let reply = String::from_utf8_lossy(&reply).into_owned();
            tracing::debug!("CSMS >>> {}", reply);
            ws.send(Message::Text(reply)).await?;
        }
    }

    Ok(())
}
