//! OCPP charging station simulator
//!
//! Plays scripted conformance use cases against a Charging Station
//! Management System over OCPP-J and checks every reply against the fields
//! the use case expects.

pub mod cli;
pub mod commands;
pub mod common;
pub mod mock;
pub mod ocpp;
pub mod transport;
pub mod usecases;

pub use common::{Error, Result};
