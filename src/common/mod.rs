//! Common utilities shared by the simulator and the mock CSMS

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
