//! Job identity and submission types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SluiceError};

/// HTTP method for an outbound call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallMethod {
    Get,
    /// Default — most brokered upstreams are POST-style query APIs.
    #[default]
    Post,
    Put,
    Delete,
}

impl CallMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMethod::Get => "GET",
            CallMethod::Post => "POST",
            CallMethod::Put => "PUT",
            CallMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for CallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallMethod {
    type Err = SluiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(CallMethod::Get),
            "POST" => Ok(CallMethod::Post),
            "PUT" => Ok(CallMethod::Put),
            "DELETE" => Ok(CallMethod::Delete),
            other => Err(SluiceError::Validation(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

/// Opaque job identifier, unique for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id.
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One queued outbound call: target, method, payload, headers, cache
/// window, and an optional client reference for push notification.
///
/// ```rust
/// # use sluice::{JobRequest, CallMethod};
/// # use std::time::Duration;
/// let request = JobRequest::new("https://api.example.org/search")
///     .method(CallMethod::Get)
///     .payload(serde_json::json!({ "q": "rust" }))
///     .header("User-Agent", "sluice-demo/1.0")
///     .cache_for(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Target URL. Normalized by the validation layer before enqueue.
    pub url: String,
    #[serde(default)]
    pub method: CallMethod,
    /// JSON payload: request body for POST/PUT, query parameters for GET.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Ordered header pairs, applied as sent.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// How long a successful response may be served from cache.
    /// Zero disables both the read check and the write.
    #[serde(default, with = "duration_secs")]
    pub cache_duration: Duration,
    /// Client id to push the completion event to, if registered.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl JobRequest {
    /// Create a request for the given target with defaults (POST, no
    /// payload, no caching, no push).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: CallMethod::default(),
            payload: None,
            headers: Vec::new(),
            cache_duration: Duration::ZERO,
            client_id: None,
        }
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: CallMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the JSON payload (body for POST/PUT, query for GET).
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Append a header pair.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Allow a successful response to be served from cache for `window`.
    pub fn cache_for(mut self, window: Duration) -> Self {
        self.cache_duration = window;
        self
    }

    /// Bind the job to a client id for push notification.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }
}

/// Returned at submission: the job id, a status reference the caller can
/// poll, and a point-in-time delay estimate (queue depth × call interval,
/// not corrected by later rate-limit changes).
#[derive(Debug, Clone, Serialize)]
pub struct JobTicket {
    pub job_id: JobId,
    pub status_ref: String,
    pub estimated_delay_secs: f64,
}

/// Serde helper: `Duration` as (fractional) seconds on the wire.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("cache duration must be >= 0"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_str() {
        for m in [
            CallMethod::Get,
            CallMethod::Post,
            CallMethod::Put,
            CallMethod::Delete,
        ] {
            assert_eq!(m.as_str().parse::<CallMethod>().unwrap(), m);
        }
        assert_eq!("get".parse::<CallMethod>().unwrap(), CallMethod::Get);
        assert!("PATCH".parse::<CallMethod>().is_err());
    }

    #[test]
    fn job_ids_are_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = JobRequest::new("https://api.example.org/q")
            .method(CallMethod::Get)
            .payload(serde_json::json!({"k": "v"}))
            .header("X-Test", "1")
            .cache_for(Duration::from_secs(60))
            .client_id("client-1");
        assert_eq!(req.method, CallMethod::Get);
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.cache_duration, Duration::from_secs(60));
        assert_eq!(req.client_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: JobRequest =
            serde_json::from_str(r#"{ "url": "https://api.example.org" }"#).unwrap();
        assert_eq!(req.method, CallMethod::Post);
        assert_eq!(req.cache_duration, Duration::ZERO);
        assert!(req.payload.is_none());
    }

    #[test]
    fn cache_duration_serializes_as_seconds() {
        let req = JobRequest::new("https://x").cache_for(Duration::from_millis(1500));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["cache_duration"], serde_json::json!(1.5));
    }

    #[test]
    fn negative_cache_duration_rejected() {
        let result: std::result::Result<JobRequest, _> =
            serde_json::from_str(r#"{ "url": "https://x", "cache_duration": -1 }"#);
        assert!(result.is_err());
    }
}
