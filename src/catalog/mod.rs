//! # Image Catalog
//!
//! Query contract of the remote image/bundle catalog and its paginated HTTP
//! client. The resolver only sees the [`ImageCatalog`] trait, so tests can
//! substitute scripted catalogs.

pub mod client;
pub mod error;
pub mod filter;
pub mod types;

pub use client::CatalogClient;
pub use error::{CatalogError, CatalogErrorBody, CatalogResult};
pub use filter::{Filter, QueryParams};
pub use types::{
    CatalogImage, ImageRepository, OperatorBundle, OperatorIndex, RelatedImage,
    RepositoryMetadata,
};

use async_trait::async_trait;

/// Catalog queries used during resolution
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Index images, restricted to the given organizations when non-empty
    async fn operator_indices(&self, organizations: &[String]) -> CatalogResult<Vec<OperatorIndex>>;

    /// Bundles whose related images reference `digest`
    async fn bundles_by_related_image_digest(
        &self,
        digest: &str,
        index_paths: &[String],
        latest: bool,
    ) -> CatalogResult<Vec<OperatorBundle>>;

    /// Bundles whose bundle image has content digest `digest`
    async fn bundles_by_digest(&self, digest: &str) -> CatalogResult<Vec<OperatorBundle>>;

    /// Images published under a manifest list or schema2 digest
    async fn images_by_digest(&self, digest: &str) -> CatalogResult<Vec<CatalogImage>>;

    async fn images_by_nvr(&self, nvr: &str) -> CatalogResult<Vec<CatalogImage>>;

    /// Tags configured as auto-rebuild tags on a repository
    async fn auto_rebuild_tags(&self, registry: &str, repository: &str) -> CatalogResult<Vec<String>>;

    async fn is_bundle(&self, nvr: &str) -> CatalogResult<bool>;

    /// `None` when the catalog record lacks repository metadata
    async fn image_repositories_by_nvr(
        &self,
        nvr: &str,
    ) -> CatalogResult<Option<Vec<RepositoryMetadata>>>;

    /// RPM NVRs installed in an image; `None` when the manifest is missing
    async fn image_rpm_nvrs(&self, image_id: &str) -> CatalogResult<Option<Vec<String>>>;

    async fn manifest_list_digest_by_nvr(
        &self,
        nvr: &str,
        must_be_published: bool,
    ) -> CatalogResult<Option<String>> {
        let images = self.images_by_nvr(nvr).await?;
        Ok(images
            .iter()
            .flat_map(|image| image.repositories.iter())
            .filter(|repo| !must_be_published || repo.published)
            .find_map(|repo| repo.manifest_list_digest.clone()))
    }

    async fn manifest_schema2_digest_by_nvr(
        &self,
        nvr: &str,
        must_be_published: bool,
    ) -> CatalogResult<Option<String>> {
        let images = self.images_by_nvr(nvr).await?;
        Ok(images
            .iter()
            .flat_map(|image| image.repositories.iter())
            .filter(|repo| !must_be_published || repo.published)
            .find_map(|repo| repo.manifest_schema2_digest.clone()))
    }

    /// Bundles built from the image `nvr` (bundle path digest is the schema2 digest)
    async fn bundles_by_nvr(&self, nvr: &str) -> CatalogResult<Vec<OperatorBundle>> {
        match self.manifest_schema2_digest_by_nvr(nvr, false).await? {
            Some(digest) => self.bundles_by_digest(&digest).await,
            None => Ok(Vec::new()),
        }
    }
}
