//! Input validation for rates, targets, and job requests.

use url::Url;

use crate::types::{CallMethod, JobRequest};
use crate::{Result, SluiceError};

/// Parse and normalize a target URL. Only absolute http(s) URLs are
/// accepted; the normalized string form (lowercased scheme and host,
/// default port elided) is returned.
pub fn normalize_target(target: &str) -> Result<String> {
    let parsed = Url::parse(target)
        .map_err(|e| SluiceError::Validation(format!("invalid target url {target:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(SluiceError::Validation(format!(
                "unsupported url scheme {other:?}, expected http or https"
            )));
        }
    }
    if parsed.host_str().is_none() {
        return Err(SluiceError::Validation(format!(
            "target url {target:?} has no host"
        )));
    }
    Ok(parsed.to_string())
}

/// Reject rates that cannot define a pacing interval.
pub fn validate_rate(calls_per_second: f64) -> Result<()> {
    if !calls_per_second.is_finite() || calls_per_second <= 0.0 {
        return Err(SluiceError::Validation(format!(
            "rate limit must be a positive finite number, got {calls_per_second}"
        )));
    }
    Ok(())
}

/// Validate a request before it is offered to a broker: the URL must
/// normalize, and a GET payload must be a JSON object so it can become
/// query parameters.
pub fn validate_request(request: &JobRequest) -> Result<JobRequest> {
    let mut validated = request.clone();
    validated.url = normalize_target(&request.url)?;
    if request.method == CallMethod::Get {
        if let Some(payload) = &request.payload {
            if !payload.is_object() {
                return Err(SluiceError::Validation(
                    "GET payload must be a JSON object".to_string(),
                ));
            }
        }
    }
    for (name, _) in &request.headers {
        if name.trim().is_empty() {
            return Err(SluiceError::Validation(
                "header names must be non-empty".to_string(),
            ));
        }
    }
    Ok(validated)
}
