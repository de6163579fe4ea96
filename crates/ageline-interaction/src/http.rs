//! Shared HTTP plumbing for the remote generation services.

use ageline_core::config::EndpointConfig;
use ageline_core::error::{AgelineError, Result};
use ageline_infrastructure::media_store;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Builds a client with the configured request timeout.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgelineError::config(format!("Failed to build HTTP client: {e}")))
}

/// Joins an endpoint base URL and a path without doubling slashes.
pub fn endpoint_url(endpoint: &EndpointConfig, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Adds bearer authentication when an API key is configured.
pub fn authorize(request: RequestBuilder, endpoint: &EndpointConfig) -> RequestBuilder {
    if endpoint.api_key.trim().is_empty() {
        request
    } else {
        request.bearer_auth(&endpoint.api_key)
    }
}

/// Encodes a local image as a `data:` URI.
pub async fn image_data_uri(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AgelineError::io(format!("Failed to read image '{}': {e}", path.display()))
    })?;
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(format!(
        "data:{mime_type};base64,{}",
        BASE64_STANDARD.encode(bytes)
    ))
}

/// Sends a request, mapping transport failures and non-success statuses
/// to [`AgelineError::Collaborator`].
pub async fn send(service: &str, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|err| map_request_error(service, err))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(map_http_error(service, status, &body));
    }
    Ok(response)
}

/// Decodes a JSON response body.
pub async fn json<T: serde::de::DeserializeOwned>(service: &str, response: Response) -> Result<T> {
    response.json::<T>().await.map_err(|err| {
        AgelineError::collaborator(service, format!("Failed to parse response: {err}"))
    })
}

/// Downloads `url` to `dest`.
///
/// The body is written to a sibling temporary file first and renamed into
/// place, so `dest` either holds the complete download or is untouched.
pub async fn download_to(client: &Client, service: &str, url: &str, dest: &Path) -> Result<()> {
    let response = send(service, client.get(url)).await?;
    let bytes = response.bytes().await.map_err(|err| {
        AgelineError::collaborator(service, format!("Failed to read download body: {err}"))
    })?;
    if bytes.is_empty() {
        return Err(AgelineError::collaborator(
            service,
            format!("Download from {url} returned an empty body"),
        ));
    }

    media_store::ensure_parent(dest).await?;
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let tmp_path = dest.with_file_name(format!(".{file_name}.part"));

    tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| {
        AgelineError::io(format!("Failed to write '{}': {e}", tmp_path.display()))
    })?;
    tokio::fs::rename(&tmp_path, dest).await.map_err(|e| {
        AgelineError::io(format!("Failed to move download to '{}': {e}", dest.display()))
    })?;

    tracing::debug!(
        "[{}] Downloaded {} bytes to {}",
        service,
        bytes.len(),
        dest.display()
    );
    Ok(())
}

fn map_request_error(service: &str, err: reqwest::Error) -> AgelineError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AgelineError::collaborator(service, format!("{kind}: {err}"))
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    },
    Plain(String),
}

/// Maps a non-success status to a collaborator error, extracting the
/// provider's error message when the body carries one.
pub fn map_http_error(service: &str, status: StatusCode, body: &str) -> AgelineError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| match wrapper.error {
            ErrorBody::Detailed { message, kind } => {
                let msg = message.unwrap_or_else(|| body.to_string());
                match kind {
                    Some(kind) if !kind.is_empty() => format!("{kind}: {msg}"),
                    _ => msg,
                }
            }
            ErrorBody::Plain(msg) => msg,
        })
        .unwrap_or_else(|_| body.to_string());

    AgelineError::collaborator(service, format!("HTTP {}: {}", status.as_u16(), message))
}
