//! # Catalog HTTP Client
//!
//! `reqwest` client for the remote image/bundle catalog. Every request carries
//! the configured network timeout. Non-success responses become
//! [`CatalogError::Request`] and are never retried here; callers that want
//! retries wrap calls in [`crate::resilience::retry_with_timeout`].

use super::error::{CatalogError, CatalogErrorBody, CatalogResult};
use super::filter::{Filter, QueryParams};
use super::types::{
    strip_arch, CatalogImage, OperatorBundle, OperatorIndex, RepositoryMetadata, RepositoryRecord,
    RpmManifest,
};
use super::ImageCatalog;
use crate::config::CatalogConfig;
use crate::constants::catalog::{API_ROOT, PAGE_SIZE};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    api_root: Url,
}

impl CatalogClient {
    /// Build a client rooted at `<server_url>/v1/`
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        let server = Url::parse(&config.server_url)
            .map_err(|e| CatalogError::InvalidUrl(format!("{}: {e}", config.server_url)))?;
        let api_root = server
            .join(API_ROOT)
            .map_err(|e| CatalogError::InvalidUrl(format!("{}: {e}", config.server_url)))?;

        let client = Client::builder()
            .timeout(config.network_timeout())
            .build()?;

        debug!(
            api_root = %api_root,
            timeout_ms = config.network_timeout_ms,
            "Catalog client created"
        );

        Ok(Self { client, api_root })
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    async fn make_request(&self, resource: &str, pairs: &[(String, String)]) -> CatalogResult<Value> {
        let url = self
            .api_root
            .join(resource)
            .map_err(|e| CatalogError::InvalidUrl(format!("{resource}: {e}")))?;

        let response = self.client.get(url).query(pairs).send().await?;

        if response.status().is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| CatalogError::decode(resource, e));
        }

        let status = response.status();
        warn!(
            url = %response.url(),
            status = %status,
            "Catalog request failed"
        );
        let text = response.text().await.unwrap_or_default();
        Err(CatalogError::request(
            status.as_u16(),
            CatalogErrorBody::from_text(text),
        ))
    }

    /// Fetch a single resource with exactly one request
    pub async fn get(&self, resource: &str, params: &QueryParams) -> CatalogResult<Value> {
        self.make_request(resource, &params.to_pairs()).await
    }

    /// Fetch every page of `resource`, starting at page 0, until a page has no
    /// `data`. Records are returned in arrival order.
    #[instrument(skip(self, params), fields(resource = %resource))]
    pub async fn fetch_all(&self, resource: &str, params: &QueryParams) -> CatalogResult<Vec<Value>> {
        let base_pairs = params.to_pairs();
        let mut records = Vec::new();
        let mut page: u32 = 0;

        loop {
            let mut pairs = base_pairs.clone();
            pairs.push(("page_size".to_string(), PAGE_SIZE.to_string()));
            pairs.push(("page".to_string(), page.to_string()));

            let body = self.make_request(resource, &pairs).await?;
            match body.get("data").and_then(Value::as_array) {
                Some(data) if !data.is_empty() => records.extend(data.iter().cloned()),
                _ => break,
            }
            page += 1;
        }

        debug!(pages = page, records = records.len(), "Fetched all catalog pages");
        Ok(records)
    }

    async fn fetch_typed<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &QueryParams,
    ) -> CatalogResult<Vec<T>> {
        let records = self.fetch_all(resource, params).await?;
        Ok(decode_records(resource, records))
    }
}

/// Decode records, logging and skipping any that lack required fields
pub(crate) fn decode_records<T: DeserializeOwned>(resource: &str, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<T>(record) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                error!(resource = %resource, error = %e, "Skipping malformed catalog record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ImageCatalog for CatalogClient {
    async fn operator_indices(&self, organizations: &[String]) -> CatalogResult<Vec<OperatorIndex>> {
        let filter = Filter::any(
            organizations
                .iter()
                .map(|org| Filter::eq("organization", org)),
        );
        let indices: Vec<OperatorIndex> = self
            .fetch_typed("operators/indices", &QueryParams::new().maybe_filter(filter))
            .await?;
        let paths: Vec<&str> = indices.iter().filter_map(|i| i.path.as_deref()).collect();
        debug!(indices = %paths.join(", "), "Found index images");
        Ok(indices)
    }

    async fn bundles_by_related_image_digest(
        &self,
        digest: &str,
        index_paths: &[String],
        latest: bool,
    ) -> CatalogResult<Vec<OperatorBundle>> {
        let mut filter = Filter::eq("related_images.digest", digest);
        if latest {
            filter = filter.and(Filter::eq("latest_in_channel", true));
        }
        if !index_paths.is_empty() {
            filter = filter.and(Filter::is_in(
                "source_index_container_path",
                index_paths.iter().cloned(),
            ));
        }
        let params = QueryParams::new()
            .include(&[
                "data.channel_name",
                "data.version_original",
                "data.related_images",
                "data.bundle_path_digest",
                "data.bundle_path",
                "data.csv_name",
            ])
            .filter(filter);
        self.fetch_typed("operators/bundles", &params).await
    }

    async fn bundles_by_digest(&self, digest: &str) -> CatalogResult<Vec<OperatorBundle>> {
        let params = QueryParams::new()
            .include(&["data.version_original", "data.csv_name"])
            .filter(Filter::eq("bundle_path_digest", digest));
        self.fetch_typed("operators/bundles", &params).await
    }

    async fn images_by_digest(&self, digest: &str) -> CatalogResult<Vec<CatalogImage>> {
        let params = QueryParams::new()
            .include(&["data.brew", "data.repositories"])
            .filter(
                Filter::eq("repositories.manifest_list_digest", digest)
                    .or(Filter::eq("repositories.manifest_schema2_digest", digest)),
            );
        self.fetch_typed("images", &params).await
    }

    async fn images_by_nvr(&self, nvr: &str) -> CatalogResult<Vec<CatalogImage>> {
        let params =
            QueryParams::new().include(&["data.architecture", "data.brew", "data.repositories"]);
        self.fetch_typed(&format!("images/nvr/{nvr}"), &params).await
    }

    async fn auto_rebuild_tags(&self, registry: &str, repository: &str) -> CatalogResult<Vec<String>> {
        let resource = format!("repositories/registry/{registry}/repository/{repository}");
        let value = self
            .get(&resource, &QueryParams::new().include(&["auto_rebuild_tags"]))
            .await?;
        let record: RepositoryRecord =
            serde_json::from_value(value).map_err(|e| CatalogError::decode(&resource, e))?;
        Ok(record.auto_rebuild_tags)
    }

    async fn is_bundle(&self, nvr: &str) -> CatalogResult<bool> {
        let images: Vec<CatalogImage> = self
            .fetch_typed(
                &format!("images/nvr/{nvr}"),
                &QueryParams::new().include(&["data.parsed_data.labels"]),
            )
            .await?;
        Ok(images.first().map_or(false, CatalogImage::is_bundle))
    }

    async fn image_repositories_by_nvr(
        &self,
        nvr: &str,
    ) -> CatalogResult<Option<Vec<RepositoryMetadata>>> {
        let resource = format!("images/nvr/{nvr}");
        let value = self
            .get(
                &resource,
                &QueryParams::new().include(&[
                    "data._id",
                    "data.repositories.registry",
                    "data.repositories.repository",
                    "data.repositories.tags.name",
                ]),
            )
            .await?;

        let Some(data) = value.get("data").and_then(Value::as_array) else {
            return Ok(None);
        };
        let mut metadata = Vec::new();
        for record in data {
            let Ok(image) = serde_json::from_value::<CatalogImage>(record.clone()) else {
                return Ok(None);
            };
            let Some(image_id) = image.id else {
                return Ok(None);
            };
            for repo in image.repositories {
                metadata.push(RepositoryMetadata {
                    image_id: image_id.clone(),
                    registry: repo.registry.clone(),
                    repository: repo.repository.clone(),
                    tags: repo.tag_names().map(String::from).collect(),
                });
            }
        }
        Ok(Some(metadata))
    }

    async fn image_rpm_nvrs(&self, image_id: &str) -> CatalogResult<Option<Vec<String>>> {
        let resource = format!("images/id/{image_id}/rpm-manifest");
        let value = self
            .get(&resource, &QueryParams::new().include(&["rpms.nvra"]))
            .await?;
        if value.get("rpms").is_none() {
            return Ok(None);
        }
        let manifest: RpmManifest =
            serde_json::from_value(value).map_err(|e| CatalogError::decode(&resource, e))?;
        Ok(Some(
            manifest
                .rpms
                .iter()
                .map(|rpm| strip_arch(&rpm.nvra).to_string())
                .collect(),
        ))
    }
}
