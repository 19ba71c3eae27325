//! Auto-rebuild eligibility: an image may be rebuilt automatically when one
//! of its tags is configured as an auto-rebuild tag on its repository, or when
//! its `name-version` is on the configured exception list.

use crate::catalog::{CatalogImage, CatalogResult, ImageCatalog};
use crate::versioning::Nvr;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct AutoRebuildEligibility {
    catalog: Arc<dyn ImageCatalog>,
    exceptions: HashSet<String>,
}

impl std::fmt::Debug for AutoRebuildEligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRebuildEligibility")
            .field("exceptions", &self.exceptions)
            .finish()
    }
}

impl AutoRebuildEligibility {
    pub fn new(catalog: Arc<dyn ImageCatalog>, exceptions: &[String]) -> Self {
        Self {
            catalog,
            exceptions: exceptions.iter().cloned().collect(),
        }
    }

    fn is_exception(&self, nvr: &str) -> bool {
        match Nvr::parse(nvr) {
            Ok(parsed) => self.exceptions.contains(&parsed.name_version()),
            Err(_) => false,
        }
    }

    async fn has_auto_rebuild_tag<'a, I>(&self, registry: &str, repository: &str, tags: I) -> CatalogResult<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let auto_tags: HashSet<String> = self
            .catalog
            .auto_rebuild_tags(registry, repository)
            .await?
            .into_iter()
            .collect();
        Ok(tags.into_iter().any(|tag| auto_tags.contains(tag)))
    }

    /// Catalog id of the image `nvr` when it is eligible for automatic
    /// rebuild
    #[instrument(skip(self))]
    pub async fn rebuild_image_id(&self, nvr: &str) -> CatalogResult<Option<String>> {
        let Some(repositories) = self.catalog.image_repositories_by_nvr(nvr).await? else {
            return Ok(None);
        };

        for repo in &repositories {
            let tags = repo.tags.iter().map(String::as_str);
            if self.has_auto_rebuild_tag(&repo.registry, &repo.repository, tags).await? {
                return Ok(Some(repo.image_id.clone()));
            }
        }

        if self.is_exception(nvr) {
            debug!(nvr = %nvr, "Image is on the auto-rebuild exception list");
            return Ok(repositories.first().map(|repo| repo.image_id.clone()));
        }
        Ok(None)
    }

    /// True when a published repository of `image` carries an auto-rebuild tag
    pub async fn image_has_auto_rebuild_tag(&self, image: &CatalogImage) -> CatalogResult<bool> {
        for repo in image.repositories.iter().filter(|repo| repo.published) {
            if self
                .has_auto_rebuild_tag(&repo.registry, &repo.repository, repo.tag_names())
                .await?
            {
                return Ok(true);
            }
        }

        Ok(image.nvr().is_some_and(|nvr| self.is_exception(nvr)))
    }
}
