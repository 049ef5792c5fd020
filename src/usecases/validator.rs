//! Reply validation
//!
//! A reply passes when it is a CALLRESULT carrying the message id of the
//! request and, if the step has a matcher, every matcher pair can be found
//! in its payload.

use std::borrow::Cow;

use thiserror::Error;

use crate::common::config::MatchScope;
use crate::ocpp::{Call, Envelope, ValueTree};

use super::step::Matcher;

/// Why a reply was not accepted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("request is not a valid CALL: {0}")]
    MalformedRequest(String),

    #[error("reply is not a valid CALLRESULT: {0}")]
    MalformedReply(String),

    #[error("CSMS answered with CALLERROR {code}: {description}")]
    CallError { code: String, description: String },

    #[error("message id mismatch: sent {sent}, received {received}")]
    CorrelationMismatch { sent: String, received: String },

    #[error("reply payload has no '{key}' = '{expected}'")]
    UnmatchedField { key: String, expected: String },
}

/// Outcome of validating one reply
pub type Verdict = std::result::Result<(), Rejection>;

/// Validate `received` as the reply to `sent`
pub fn validate(
    sent: &[u8],
    received: &[u8],
    matcher: Option<&Matcher>,
    scope: MatchScope,
) -> Verdict {
    let call = Call::decode(sent).map_err(|e| Rejection::MalformedRequest(e.to_string()))?;

    let result = match Envelope::decode(received) {
        Ok(Envelope::CallResult(result)) => result,
        Ok(Envelope::CallError(error)) => {
            return Err(Rejection::CallError {
                code: error.error_code,
                description: error.error_description,
            })
        }
        Ok(Envelope::Call(other)) => {
            return Err(Rejection::MalformedReply(format!(
                "received a CALL ({}) instead of a reply",
                other.action
            )))
        }
        Err(e) => return Err(Rejection::MalformedReply(e.to_string())),
    };

    if call.message_id != result.message_id {
        return Err(Rejection::CorrelationMismatch {
            sent: call.message_id,
            received: result.message_id,
        });
    }

    let Some(matcher) = matcher else {
        return Ok(());
    };

    for (key, expected) in matcher.pairs() {
        if !contains_pair(&result.payload, key, expected, scope) {
            tracing::debug!("No match for {{{}: {}}} in {}", key, expected, result.payload);
            return Err(Rejection::UnmatchedField {
                key: key.to_string(),
                expected: expected.to_string(),
            });
        }
    }

    Ok(())
}

/// Whether `tree` holds `key` with a scalar value whose text is `expected`
pub fn contains_pair(tree: &ValueTree, key: &str, expected: &str, scope: MatchScope) -> bool {
    match scope {
        MatchScope::Anywhere => find_anywhere(tree, key, expected),
        MatchScope::TopLevel => match tree {
            ValueTree::Object(map) => map
                .get(key)
                .is_some_and(|value| scalar_text(value).is_some_and(|text| text == expected)),
            _ => false,
        },
    }
}

/// Depth-first search over every mapping, including mappings nested in
/// sequences. The path to the key is not tracked.
fn find_anywhere(tree: &ValueTree, key: &str, expected: &str) -> bool {
    match tree {
        ValueTree::Object(map) => map.iter().any(|(k, value)| {
            (k == key && scalar_text(value).is_some_and(|text| text == expected))
                || find_anywhere(value, key, expected)
        }),
        ValueTree::Array(items) => items.iter().any(|item| find_anywhere(item, key, expected)),
        _ => false,
    }
}

/// Text form of a scalar; mappings, sequences and null have none
fn scalar_text(value: &ValueTree) -> Option<Cow<'_, str>> {
    match value {
        ValueTree::String(s) => Some(Cow::Borrowed(s.as_str())),
        ValueTree::Number(n) => Some(Cow::Owned(n.to_string())),
        ValueTree::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        ValueTree::Null | ValueTree::Array(_) | ValueTree::Object(_) => None,
    }
}
