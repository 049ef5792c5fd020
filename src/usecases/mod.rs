//! Scenario execution engine
//!
//! Use cases are declarative step tables grouped into families
//! ([`provisioning`], [`transactions`]). The [`runner`] plays one use case
//! over a transport and the [`validator`] judges every reply.

pub mod catalog;
pub mod provisioning;
pub mod runner;
pub mod step;
pub mod transactions;
pub mod validator;

pub use crate::common::config::MatchScope;
pub use catalog::{Catalog, ScenarioFamily, Scenarios};
pub use runner::{FailureReason, RunOutcome, RunPhase, RunReport, RunState, ScenarioRunner};
pub use step::{Matcher, Step, UseCase, UseCaseBuilder};
pub use validator::{validate, Rejection, Verdict};
