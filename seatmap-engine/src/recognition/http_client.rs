//! HTTP recognition backend
//!
//! Posts the screenshot (base64) to `{endpoint}/identity` and
//! `{endpoint}/details` and validates the JSON answer at the boundary.
//!
//! # Error mapping
//! - connection refused / DNS failure → [`RecognitionError::Unavailable`] (job-fatal)
//! - HTTP 401 / 403 → [`RecognitionError::Configuration`] (job-fatal)
//! - timeout, other HTTP status, malformed body → ordinary pass failure

use super::{
    DetailResult, IdentityResult, RawDetailPayload, RawIdentityPayload, RecognitionError,
    Recognizer,
};
use crate::config::RecognitionSettings;
use crate::evidence::EvidenceImage;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RecognitionRequest<'a> {
    filename: &'a str,
    image: String,
}

/// Recognition service reached over HTTP
pub struct HttpRecognizer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl HttpRecognizer {
    /// Build a client from resolved settings
    ///
    /// Fails with [`RecognitionError::Configuration`] when no endpoint is
    /// configured or the rate is zero.
    pub fn new(settings: &RecognitionSettings) -> Result<Self, RecognitionError> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                RecognitionError::Configuration("no usable recognition backend".to_string())
            })?
            .to_string();

        let rate = NonZeroU32::new(settings.requests_per_second).ok_or_else(|| {
            RecognitionError::Configuration("requests_per_second must be non-zero".to_string())
        })?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RecognitionError::Configuration(format!("HTTP client: {}", e)))?;

        if settings.api_key.is_none() {
            warn!("Recognition endpoint {} configured without an API key", endpoint);
        }

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the image and decode the body
    ///
    /// Outer `Err` is job-fatal; inner `Err` carries an ordinary failure reason.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        image: &EvidenceImage,
    ) -> Result<Result<T, String>, RecognitionError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.endpoint, path);
        let body = RecognitionRequest {
            filename: &image.filename,
            image: general_purpose::STANDARD.encode(&image.bytes),
        };

        debug!(url = %url, evidence = %image.filename, "Sending recognition request");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(RecognitionError::Unavailable(format!("{}: {}", url, e)));
            }
            Err(e) if e.is_timeout() => return Ok(Err("timeout".to_string())),
            Err(e) => return Ok(Err(format!("request_failed: {}", e))),
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RecognitionError::Configuration(format!(
                "recognition backend refused credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            warn!(url = %url, status = %status, "Recognition request failed");
            return Ok(Err(format!("http_status: {}", status.as_u16())));
        }

        match response.json::<T>().await {
            Ok(decoded) => Ok(Ok(decoded)),
            Err(e) if e.is_timeout() => Ok(Err("timeout".to_string())),
            Err(e) => Ok(Err(format!("invalid_payload: {}", e))),
        }
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn recognize_identity(
        &self,
        image: &EvidenceImage,
    ) -> Result<IdentityResult, RecognitionError> {
        Ok(match self.post::<RawIdentityPayload>("identity", image).await? {
            Ok(raw) => raw.validate(),
            Err(reason) => IdentityResult::Failure { reason },
        })
    }

    async fn recognize_details(
        &self,
        image: &EvidenceImage,
    ) -> Result<DetailResult, RecognitionError> {
        Ok(match self.post::<RawDetailPayload>("details", image).await? {
            Ok(raw) => raw.validate(),
            Err(reason) => DetailResult::Failure { reason },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(endpoint: Option<&str>) -> RecognitionSettings {
        RecognitionSettings {
            endpoint: endpoint.map(str::to_string),
            api_key: Some("test-key".to_string()),
            timeout: Duration::from_secs(2),
            requests_per_second: 5,
        }
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let err = HttpRecognizer::new(&settings(None)).err().unwrap();
        assert!(matches!(err, RecognitionError::Configuration(_)));

        let err = HttpRecognizer::new(&settings(Some("   "))).err().unwrap();
        assert!(matches!(err, RecognitionError::Configuration(_)));
    }

    #[test]
    fn test_zero_rate_is_configuration_error() {
        let mut s = settings(Some("http://localhost:9"));
        s.requests_per_second = 0;
        assert!(matches!(
            HttpRecognizer::new(&s),
            Err(RecognitionError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = HttpRecognizer::new(&settings(Some("http://localhost:9000/api/"))).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000/api");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 9 (discard) is closed on test hosts
        let client = HttpRecognizer::new(&settings(Some("http://127.0.0.1:9"))).unwrap();
        let image = EvidenceImage::new("shot.png", vec![1, 2, 3]);

        let result = client.recognize_identity(&image).await;
        assert!(matches!(result, Err(RecognitionError::Unavailable(_))));
    }
}
