//! Client for the published flatpak content index, which lists the images
//! built from each module stream.

use super::ModuleStream;
use crate::config::ConfigurationError;
use crate::error::{FreshmakerError, FreshmakerResult};
use crate::resilience::{retry_with_timeout, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// NVRs of released images containing the module stream
    async fn images_for_module(&self, module: &ModuleStream) -> FreshmakerResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ContentIndexDocument {
    #[serde(rename = "Images", default)]
    images: Vec<ContentIndexImage>,
}

#[derive(Debug, Deserialize)]
struct ContentIndexImage {
    #[serde(rename = "ImageNvr")]
    image_nvr: String,
}

#[derive(Debug, Clone)]
pub struct ContentIndexClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ContentIndexClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> FreshmakerResult<Self> {
        if base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("base_url", "content_index").into());
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FreshmakerError::collaborator("content index", e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn module_index_url(&self, module: &ModuleStream) -> String {
        format!(
            "{}/released/contents/modules/{}:{}.json",
            self.base_url, module.name, module.stream
        )
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

#[async_trait]
impl ContentIndex for ContentIndexClient {
    #[instrument(skip(self), fields(module = %module.name, stream = %module.stream))]
    async fn images_for_module(&self, module: &ModuleStream) -> FreshmakerResult<Vec<String>> {
        let url = self.module_index_url(module);

        let response = retry_with_timeout(&self.retry, "content_index.get", is_transient, || {
            self.client.get(&url).send()
        })
        .await
        .map_err(|e| FreshmakerError::collaborator("content index", e.to_string()))?;

        if response.status() != StatusCode::OK {
            warn!(
                url = %url,
                status = response.status().as_u16(),
                "Content index lookup failed, no images for module stream"
            );
            return Ok(Vec::new());
        }

        let document: ContentIndexDocument = response
            .json()
            .await
            .map_err(|e| FreshmakerError::collaborator("content index", e.to_string()))?;
        let nvrs: Vec<String> = document.images.into_iter().map(|i| i.image_nvr).collect();
        debug!(count = nvrs.len(), "Content index images found");
        Ok(nvrs)
    }
}
