//! TransitionApiClient - REST client for the video-transition service.
//!
//! The service is prediction based: a create call returns a prediction id,
//! which is polled until it reaches a terminal status.

use ageline_core::config::{EndpointConfig, ProviderConfig};
use ageline_core::error::{AgelineError, Result};
use ageline_core::provider::TransitionSynthesizer;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::http;

const SERVICE: &str = "VideoApi";
const DEFAULT_VIDEO_MODEL: &str = "image-to-video-1";

/// Transition synthesizer backed by a prediction-style HTTP API.
#[derive(Clone)]
pub struct TransitionApiClient {
    client: Client,
    endpoint: EndpointConfig,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl TransitionApiClient {
    pub fn new(endpoint: EndpointConfig, timeout: Duration) -> Result<Self> {
        if !endpoint.is_configured() {
            return Err(AgelineError::config(
                "providers.video.base_url is not configured",
            ));
        }
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 300,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(
            config.video.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_polling(
            Duration::from_millis(config.poll_interval_ms),
            config.max_poll_attempts,
        ))
    }

    /// Overrides the status polling cadence.
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts.max(1);
        self
    }

    fn model(&self) -> &str {
        self.endpoint.model.as_deref().unwrap_or(DEFAULT_VIDEO_MODEL)
    }

    async fn create_prediction(&self, input: TransitionInput) -> Result<Prediction> {
        let body = CreatePredictionRequest {
            model: self.model(),
            input,
        };
        let request = http::authorize(
            self.client
                .post(http::endpoint_url(&self.endpoint, "predictions"))
                .json(&body),
            &self.endpoint,
        );
        let response = http::send(SERVICE, request).await?;
        http::json(SERVICE, response).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let request = http::authorize(
            self.client
                .get(http::endpoint_url(&self.endpoint, &format!("predictions/{id}"))),
            &self.endpoint,
        );
        let response = http::send(SERVICE, request).await?;
        http::json(SERVICE, response).await
    }

    async fn wait_for_output(&self, mut prediction: Prediction) -> Result<String> {
        let mut attempts = 0;
        loop {
            match prediction.state() {
                PredictionState::Succeeded(url) => return Ok(url),
                PredictionState::Failed(message) => {
                    return Err(AgelineError::collaborator(SERVICE, message));
                }
                PredictionState::Pending => {}
            }

            attempts += 1;
            if attempts > self.max_poll_attempts {
                return Err(AgelineError::collaborator(
                    SERVICE,
                    format!(
                        "prediction {} did not finish after {} status checks",
                        prediction.id, self.max_poll_attempts
                    ),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.get_prediction(&prediction.id).await?;
        }
    }
}

#[derive(Serialize)]
struct CreatePredictionRequest<'a> {
    model: &'a str,
    input: TransitionInput,
}

#[derive(Serialize)]
struct TransitionInput {
    start_image: String,
    end_image: String,
    prompt: String,
    duration: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, PartialEq)]
enum PredictionState {
    Pending,
    Succeeded(String),
    Failed(String),
}

impl Prediction {
    fn state(&self) -> PredictionState {
        match self.status.as_str() {
            "succeeded" | "completed" => {
                let url = match &self.output {
                    Some(PredictionOutput::Single(url)) => Some(url.clone()),
                    Some(PredictionOutput::Many(urls)) => urls.first().cloned(),
                    None => None,
                };
                match url {
                    Some(url) if !url.trim().is_empty() => PredictionState::Succeeded(url),
                    _ => PredictionState::Failed(format!(
                        "prediction {} succeeded without output",
                        self.id
                    )),
                }
            }
            "failed" | "canceled" | "cancelled" => PredictionState::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| format!("prediction {} {}", self.id, self.status)),
            ),
            _ => PredictionState::Pending,
        }
    }
}

#[async_trait]
impl TransitionSynthesizer for TransitionApiClient {
    async fn generate_transition(
        &self,
        start_image: &Path,
        end_image: &Path,
        prompt: &str,
        duration_secs: u32,
        aspect_ratio: &str,
    ) -> Result<String> {
        let input = TransitionInput {
            start_image: http::image_data_uri(start_image).await?,
            end_image: http::image_data_uri(end_image).await?,
            prompt: prompt.to_string(),
            duration: duration_secs,
            aspect_ratio: aspect_ratio.to_string(),
        };

        let prediction = self.create_prediction(input).await?;
        tracing::debug!("[{}] Created prediction {}", SERVICE, prediction.id);
        self.wait_for_output(prediction).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        http::download_to(&self.client, SERVICE, url, dest).await
    }
}
