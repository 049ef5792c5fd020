//! Use case data model
//!
//! A [`UseCase`] is an ordered list of [`Step`]s. Each step is one encoded
//! request plus an optional [`Matcher`] describing what the reply payload
//! must contain. Everything here is immutable once built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::common::Result;
use crate::ocpp::messages::restamp;
use crate::ocpp::{Call, OcppRequest};

/// Required `(key, value)` pairs a reply payload must contain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matcher {
    pairs: BTreeMap<String, String>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required pair
    pub fn expect(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.insert(key.into(), value.into());
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Matcher {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One request of a use case and what its reply must look like
#[derive(Debug, Clone)]
pub struct Step {
    label: String,
    request: Vec<u8>,
    matcher: Option<Matcher>,
}

impl Step {
    /// Create a step from an already encoded request
    ///
    /// An empty matcher is the same as no matcher: only the message id of
    /// the reply is checked.
    pub fn new(label: impl Into<String>, request: Vec<u8>, matcher: Option<Matcher>) -> Self {
        Self {
            label: label.into(),
            request,
            matcher: matcher.filter(|m| !m.is_empty()),
        }
    }

    /// Encode a typed OCPP request into a step labelled with its action
    pub fn from_request<R: OcppRequest>(request: &R, matcher: Option<Matcher>) -> Result<Self> {
        Ok(Self::new(R::ACTION, request.encode()?, matcher))
    }

    /// OCPP action name, for narration
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn request(&self) -> &[u8] {
        &self.request
    }

    /// The request with its timestamps moved to `now`, same message id
    ///
    /// Requests that do not decode as a CALL are returned unchanged.
    pub fn request_at(&self, now: DateTime<Utc>) -> Vec<u8> {
        let Ok(mut call) = Call::decode(&self.request) else {
            return self.request.clone();
        };
        match restamp(&mut call.payload, now) {
            Ok(()) => call.encode(),
            Err(_) => self.request.clone(),
        }
    }

    pub fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_ref()
    }
}

/// A named, ordered interaction scenario
#[derive(Debug, Clone)]
pub struct UseCase {
    code: String,
    title: String,
    steps: Vec<Step>,
    correlation_token: Option<String>,
}

impl UseCase {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Token threaded through several steps of this use case, such as a
    /// transaction id
    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }
}

/// Declarative construction of a [`UseCase`]
///
/// ```
/// use station_sim::ocpp::messages::HeartbeatRequest;
/// use station_sim::usecases::UseCaseBuilder;
///
/// let use_case = UseCaseBuilder::new("X01", "Single heartbeat")
///     .send(&HeartbeatRequest::default())
///     .unwrap()
///     .build();
/// assert_eq!(use_case.steps()[0].label(), "Heartbeat");
/// ```
#[derive(Debug)]
pub struct UseCaseBuilder {
    code: String,
    title: String,
    steps: Vec<Step>,
    correlation_token: Option<String>,
}

impl UseCaseBuilder {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            steps: Vec::new(),
            correlation_token: None,
        }
    }

    pub fn correlation_token(mut self, token: impl Into<String>) -> Self {
        self.correlation_token = Some(token.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a request whose reply is only checked for its message id
    pub fn send<R: OcppRequest>(self, request: &R) -> Result<Self> {
        Ok(self.step(Step::from_request(request, None)?))
    }

    /// Append a request whose reply must also satisfy `matcher`
    pub fn send_expecting<R: OcppRequest>(self, request: &R, matcher: Matcher) -> Result<Self> {
        Ok(self.step(Step::from_request(request, Some(matcher))?))
    }

    pub fn build(self) -> UseCase {
        UseCase {
            code: self.code,
            title: self.title,
            steps: self.steps,
            correlation_token: self.correlation_token,
        }
    }
}
