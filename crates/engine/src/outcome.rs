// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Classification of delete responses

use std::fmt::{self, Display};

use serde_json::Value;

/// What a delete call produced, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// No response could be obtained, because of a transport error or because
    /// the request could not even be prepared
    NoResponse { reason: String },

    /// The service answered
    Received { status: u16, body: String },
}

impl RawResponse {
    pub fn no_response(reason: impl Into<String>) -> Self {
        Self::NoResponse {
            reason: reason.into(),
        }
    }

    pub fn received(status: u16, body: impl Into<String>) -> Self {
        Self::Received {
            status,
            body: body.into(),
        }
    }
}

/// Why a delete attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NoResponse { reason: String },
    UnparsableBody { body: String },
    Rejected { body: String },
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse { reason } => write!(f, "no response ({reason})"),
            Self::UnparsableBody { body } => write!(f, "unparsable body: {body}"),
            Self::Rejected { body } => write!(f, "rejected: {body}"),
        }
    }
}

/// The classification of a single delete attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Success,

    /// The attempt failed, which counts against the error budget
    SoftFailure(FailureReason),

    /// The service signalled a condition which makes any further attempt
    /// pointless, like an exhausted daily quota
    HaltRequested { body: String },
}

impl DeletionOutcome {
    /// Short label, used as a metric attribute
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SoftFailure(_) => "failure",
            Self::HaltRequested { .. } => "halt",
        }
    }
}

/// Maps a [`RawResponse`] to a [`DeletionOutcome`]
pub trait Classifier: Send + Sync {
    fn classify(&self, response: &RawResponse) -> DeletionOutcome;
}

/// Matches a top-level JSON field against an integer code
///
/// The service is not consistent about codes being numbers or strings, so
/// both `{"no": 0}` and `{"no": "0"}` match `FieldMatch::new("no", 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatch {
    field: &'static str,
    code: i64,
}

impl FieldMatch {
    #[must_use]
    pub const fn new(field: &'static str, code: i64) -> Self {
        Self { field, code }
    }

    fn matches(&self, body: &Value) -> bool {
        match body.get(self.field) {
            Some(Value::Number(n)) => n.as_i64() == Some(self.code),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok() == Some(self.code),
            _ => false,
        }
    }
}

/// A [`Classifier`] for services answering with a JSON object carrying
/// status codes
///
/// Rules are applied in order:
///
///  1. no response is a soft failure;
///  2. a body which is not a JSON object is a soft failure;
///  3. any of the halt codes requests a halt;
///  4. the success code is a success;
///  5. anything else is a soft failure, keeping the body for diagnostics.
#[derive(Debug, Clone)]
pub struct JsonClassifier {
    success: FieldMatch,
    halt: Vec<FieldMatch>,
}

impl JsonClassifier {
    #[must_use]
    pub fn new(success: FieldMatch) -> Self {
        Self {
            success,
            halt: Vec::new(),
        }
    }

    /// Add a code which requests an immediate halt
    #[must_use]
    pub fn halt_on(mut self, code: FieldMatch) -> Self {
        self.halt.push(code);
        self
    }
}

impl Classifier for JsonClassifier {
    fn classify(&self, response: &RawResponse) -> DeletionOutcome {
        let body = match response {
            RawResponse::NoResponse { reason } => {
                return DeletionOutcome::SoftFailure(FailureReason::NoResponse {
                    reason: reason.clone(),
                });
            }
            RawResponse::Received { body, .. } => body,
        };

        let parsed = match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) | Err(_) => {
                return DeletionOutcome::SoftFailure(FailureReason::UnparsableBody {
                    body: body.clone(),
                });
            }
        };

        if self.halt.iter().any(|code| code.matches(&parsed)) {
            return DeletionOutcome::HaltRequested { body: body.clone() };
        }

        if self.success.matches(&parsed) {
            return DeletionOutcome::Success;
        }

        DeletionOutcome::SoftFailure(FailureReason::Rejected { body: body.clone() })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn classifier() -> JsonClassifier {
        JsonClassifier::new(FieldMatch::new("no", 0)).halt_on(FieldMatch::new("err_code", 220_034))
    }

    #[test]
    fn no_response_is_a_soft_failure() {
        let outcome = classifier().classify(&RawResponse::no_response("connection reset"));
        assert_matches!(
            outcome,
            DeletionOutcome::SoftFailure(FailureReason::NoResponse { reason }) if reason == "connection reset"
        );
    }

    #[test]
    fn unparsable_body_is_a_soft_failure() {
        let outcome = classifier().classify(&RawResponse::received(200, "<html>"));
        assert_matches!(
            outcome,
            DeletionOutcome::SoftFailure(FailureReason::UnparsableBody { .. })
        );

        // Valid JSON, but not an object
        let outcome = classifier().classify(&RawResponse::received(200, "[0]"));
        assert_matches!(
            outcome,
            DeletionOutcome::SoftFailure(FailureReason::UnparsableBody { .. })
        );
    }

    #[test]
    fn halt_code_wins_over_success_code() {
        let outcome = classifier().classify(&RawResponse::received(
            200,
            r#"{"no": 0, "err_code": 220034}"#,
        ));
        assert_matches!(outcome, DeletionOutcome::HaltRequested { .. });
    }

    #[test]
    fn success_code() {
        let outcome = classifier().classify(&RawResponse::received(
            200,
            r#"{"no": 0, "err_code": 0, "error": ""}"#,
        ));
        assert_eq!(outcome, DeletionOutcome::Success);

        let outcome = classifier().classify(&RawResponse::received(200, r#"{"no": "0"}"#));
        assert_eq!(outcome, DeletionOutcome::Success);
    }

    #[test]
    fn other_codes_are_rejections() {
        let body = r#"{"no": 4, "err_code": 4, "error": "need login"}"#;
        let outcome = classifier().classify(&RawResponse::received(200, body));
        assert_eq!(
            outcome,
            DeletionOutcome::SoftFailure(FailureReason::Rejected {
                body: body.to_owned()
            })
        );
    }

    #[test]
    fn without_halt_codes_nothing_halts() {
        let classifier = JsonClassifier::new(FieldMatch::new("no", 0));
        let outcome = classifier.classify(&RawResponse::received(200, r#"{"err_code": 220034}"#));
        assert_matches!(outcome, DeletionOutcome::SoftFailure(FailureReason::Rejected { .. }));
    }
}
