//! Job results and poll statuses.

use serde::{Deserialize, Serialize};

use crate::SluiceError;

/// Body of a successful upstream response.
///
/// The worker parses the body as JSON when possible and falls back to
/// raw text otherwise. Tagged so cache entries round-trip unambiguously
/// (an untagged JSON string body would be indistinguishable from text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum CallResult {
    Json(serde_json::Value),
    Text(String),
}

/// Terminal result of a job. Failures travel the same path as successes
/// and are distinguished by the error marker, so callers have one code
/// path for both outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum JobOutcome {
    Success { response: CallResult },
    Failed { code: String, message: String },
}

impl JobOutcome {
    /// Build a failure outcome from an error, exposing only the stable
    /// code and display message.
    pub(crate) fn failed(err: &SluiceError) -> Self {
        JobOutcome::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }
}

/// One-shot poll result.
///
/// `Complete` removes the stored outcome; polling the same id again
/// yields `NotFound`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollStatus {
    Pending,
    Complete { outcome: JobOutcome },
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_result_round_trips_tagged() {
        // A JSON string body must come back as Json, not Text.
        let json = CallResult::Json(serde_json::json!("a plain string"));
        let round = serde_json::to_string(&json).unwrap();
        assert_eq!(serde_json::from_str::<CallResult>(&round).unwrap(), json);

        let text = CallResult::Text("a plain string".into());
        let round = serde_json::to_string(&text).unwrap();
        assert_eq!(serde_json::from_str::<CallResult>(&round).unwrap(), text);
    }

    #[test]
    fn failed_outcome_exposes_code_not_internals() {
        let err = SluiceError::Upstream {
            status: 502,
            message: "bad gateway".into(),
        };
        match JobOutcome::failed(&err) {
            JobOutcome::Failed { code, message } => {
                assert_eq!(code, "upstream_error");
                assert!(message.contains("502"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn poll_status_serializes_with_status_tag() {
        let status = PollStatus::Complete {
            outcome: JobOutcome::Success {
                response: CallResult::Text("ok".into()),
            },
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["outcome"]["outcome"], "success");
    }
}
