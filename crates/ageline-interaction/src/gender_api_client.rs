//! GenderApiClient - best-effort gender classifier over HTTP.

use ageline_core::config::{EndpointConfig, ProviderConfig};
use ageline_core::error::{AgelineError, Result};
use ageline_core::provider::GenderClassifier;
use ageline_core::session::GenderHint;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::http;

const SERVICE: &str = "GenderApi";

/// Predictions below this confidence are reported as `Auto`.
const MIN_CONFIDENCE: f64 = 0.6;

#[derive(Clone)]
pub struct GenderApiClient {
    client: Client,
    endpoint: EndpointConfig,
}

impl GenderApiClient {
    pub fn new(endpoint: EndpointConfig, timeout: Duration) -> Result<Self> {
        if !endpoint.is_configured() {
            return Err(AgelineError::config(
                "providers.classifier.base_url is not configured",
            ));
        }
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint,
        })
    }

    /// Builds a client if the classifier endpoint is configured.
    pub fn from_config(config: &ProviderConfig) -> Result<Option<Self>> {
        if !config.classifier.is_configured() {
            return Ok(None);
        }
        Self::new(
            config.classifier.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
        .map(Some)
    }
}

#[derive(Serialize)]
struct ClassifyRequest {
    image: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    gender: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn to_hint(response: ClassifyResponse) -> GenderHint {
    if response.confidence.is_some_and(|c| c < MIN_CONFIDENCE) {
        return GenderHint::Auto;
    }
    match response.gender.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("male") | Some("man") => GenderHint::Male,
        Some("female") | Some("woman") => GenderHint::Female,
        _ => GenderHint::Auto,
    }
}

#[async_trait]
impl GenderClassifier for GenderApiClient {
    async fn predict(&self, image: &Path) -> Result<GenderHint> {
        let body = ClassifyRequest {
            image: http::image_data_uri(image).await?,
        };
        let request = http::authorize(
            self.client
                .post(http::endpoint_url(&self.endpoint, "classify"))
                .json(&body),
            &self.endpoint,
        );
        let response = http::send(SERVICE, request).await?;
        let parsed: ClassifyResponse = http::json(SERVICE, response).await?;
        Ok(to_hint(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(json: &str) -> GenderHint {
        to_hint(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_maps_labels() {
        assert_eq!(hint(r#"{"gender":"Female","confidence":0.93}"#), GenderHint::Female);
        assert_eq!(hint(r#"{"gender":"man"}"#), GenderHint::Male);
        assert_eq!(hint(r#"{"gender":"unknown"}"#), GenderHint::Auto);
        assert_eq!(hint(r#"{}"#), GenderHint::Auto);
    }

    #[test]
    fn test_low_confidence_is_auto() {
        assert_eq!(hint(r#"{"gender":"male","confidence":0.4}"#), GenderHint::Auto);
    }

    #[test]
    fn test_unconfigured_classifier_is_absent() {
        let config = ProviderConfig::default();
        assert!(GenderApiClient::from_config(&config).unwrap().is_none());
    }
}
