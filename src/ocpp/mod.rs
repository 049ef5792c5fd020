//! OCPP 2.0.1 over OCPP-J
//!
//! This module holds the message collaborator of the simulator: the
//! envelope codec and the typed request/response payloads.

pub mod envelope;
pub mod messages;

pub use envelope::{Call, CallError, CallResult, Envelope, MessageKind, ValueTree};
pub use messages::OcppRequest;
