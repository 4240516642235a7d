//! Upstream call dispatch.
//!
//! [`CallDispatcher`] is the seam between the worker loop and the network:
//! the worker is written against the trait, production wires in
//! [`HttpDispatcher`] (reqwest), and tests substitute mocks. The retry
//! decorator in [`resilience::retry`](crate::resilience::retry) wraps any
//! dispatcher the same way.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{CallMethod, CallResult, JobRequest};
use crate::{Result, SluiceError};

/// Issues one outbound call for a job.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    async fn dispatch(&self, request: &JobRequest) -> Result<CallResult>;
}

/// Production dispatcher backed by a shared reqwest client.
pub struct HttpDispatcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpDispatcher {
    /// Build a dispatcher with a per-call timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SluiceError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl CallDispatcher for HttpDispatcher {
    async fn dispatch(&self, request: &JobRequest) -> Result<CallResult> {
        let mut builder = match request.method {
            CallMethod::Get => {
                let mut b = self.client.get(&request.url);
                if let Some(payload) = &request.payload {
                    b = b.query(&query_pairs(payload)?);
                }
                b
            }
            CallMethod::Post => {
                let mut b = self.client.post(&request.url);
                if let Some(payload) = &request.payload {
                    b = b.json(payload);
                }
                b
            }
            CallMethod::Put => {
                let mut b = self.client.put(&request.url);
                if let Some(payload) = &request.payload {
                    b = b.json(payload);
                }
                b
            }
            CallMethod::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SluiceError::Timeout {
                    seconds: self.timeout_secs,
                }
            } else {
                SluiceError::from(e)
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(SluiceError::from)?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(SluiceError::RateLimited { retry_after: None });
            }
            return Err(SluiceError::Upstream {
                status: status.as_u16(),
                message: truncate(&body, 512),
            });
        }

        // Structured body when possible, raw text otherwise.
        Ok(match serde_json::from_str(&body) {
            Ok(value) => CallResult::Json(value),
            Err(_) => CallResult::Text(body),
        })
    }
}

/// Flatten a JSON object into query pairs for GET dispatch.
///
/// String values pass through unquoted; everything else is serialized.
fn query_pairs(payload: &serde_json::Value) -> Result<Vec<(String, String)>> {
    let object = payload.as_object().ok_or_else(|| {
        SluiceError::Validation("GET payload must be a JSON object of query parameters".into())
    })?;
    Ok(object
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_flatten_strings_and_scalars() {
        let pairs = query_pairs(&json!({"q": "rust lang", "limit": 5, "flag": true})).unwrap();
        assert!(pairs.contains(&("q".to_string(), "rust lang".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(pairs.contains(&("flag".to_string(), "true".to_string())));
    }

    #[test]
    fn non_object_get_payload_is_a_validation_error() {
        let err = query_pairs(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.starts_with('h'));
        assert!(t.ends_with('…'));
        assert_eq!(truncate("short", 10), "short");
    }
}
