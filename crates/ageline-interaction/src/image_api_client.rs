//! ImageApiClient - REST client for the image-synthesis service.
//!
//! Reference images are sent inline as `data:` URIs; the service answers
//! with the URL of the generated image.

use ageline_core::config::{EndpointConfig, ProviderConfig};
use ageline_core::error::{AgelineError, Result};
use ageline_core::provider::{ImageOptions, ImageSynthesizer};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http;

const SERVICE: &str = "ImageApi";
const DEFAULT_IMAGE_MODEL: &str = "image-edit-1";

/// Image synthesizer backed by an HTTP API.
#[derive(Clone)]
pub struct ImageApiClient {
    client: Client,
    endpoint: EndpointConfig,
}

impl ImageApiClient {
    pub fn new(endpoint: EndpointConfig, timeout: Duration) -> Result<Self> {
        if !endpoint.is_configured() {
            return Err(AgelineError::config(
                "providers.image.base_url is not configured",
            ));
        }
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            config.image.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn model(&self) -> &str {
        self.endpoint.model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL)
    }
}

#[derive(Serialize)]
struct GenerateImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    aspect_ratio: &'a str,
    background_mode: ageline_core::session::BackgroundMode,
}

/// Accepts both `{ "url": ... }` and `{ "data": [{ "url": ... }] }` shapes.
#[derive(Deserialize)]
struct GenerateImageResponse {
    url: Option<String>,
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

fn extract_image_url(response: GenerateImageResponse) -> Result<String> {
    response
        .url
        .or_else(|| response.data.into_iter().find_map(|d| d.url))
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AgelineError::collaborator(SERVICE, "response contained no image URL"))
}

#[async_trait]
impl ImageSynthesizer for ImageApiClient {
    async fn generate(
        &self,
        reference_images: &[PathBuf],
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<String> {
        if reference_images.is_empty() {
            return Err(AgelineError::invalid_state(
                "image generation requires at least one reference image",
            ));
        }

        let mut images = Vec::with_capacity(reference_images.len());
        for path in reference_images {
            images.push(http::image_data_uri(path).await?);
        }

        let body = GenerateImageRequest {
            model: self.model(),
            prompt,
            images,
            aspect_ratio: &options.aspect_ratio,
            background_mode: options.background_mode,
        };

        let request = http::authorize(
            self.client
                .post(http::endpoint_url(&self.endpoint, "images/generations"))
                .json(&body),
            &self.endpoint,
        );
        let response = http::send(SERVICE, request).await?;
        let parsed: GenerateImageResponse = http::json(SERVICE, response).await?;
        extract_image_url(parsed)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        http::download_to(&self.client, SERVICE, url, dest).await
    }
}
