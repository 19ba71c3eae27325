//! Mapping between images shipped in an advisory and the published images
//! they replace.

use crate::catalog::ImageCatalog;
use crate::error::FreshmakerResult;
use crate::models::ErrataAdvisory;
use crate::services::AdvisoryService;
use crate::store::RebuildStore;
use crate::versioning::Nvr;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct NvrMapper {
    store: Arc<dyn RebuildStore>,
    catalog: Arc<dyn ImageCatalog>,
    advisories: Arc<dyn AdvisoryService>,
}

impl NvrMapper {
    pub fn new(
        store: Arc<dyn RebuildStore>,
        catalog: Arc<dyn ImageCatalog>,
        advisories: Arc<dyn AdvisoryService>,
    ) -> Self {
        Self {
            store,
            catalog,
            advisories,
        }
    }

    /// Follow recorded rebuilds backwards from `rebuilt_nvr` until reaching an
    /// original that is published in the catalog.
    ///
    /// Returns `None` when `rebuilt_nvr` was not rebuilt by us or no image in
    /// the chain is published.
    #[instrument(skip(self))]
    pub async fn published_original_nvr(&self, rebuilt_nvr: &str) -> FreshmakerResult<Option<String>> {
        let mut current = rebuilt_nvr.to_string();
        let mut visited = HashSet::from([current.clone()]);

        loop {
            let Some(build) = self.store.build_by_rebuilt_nvr(&current).await? else {
                return Ok(None);
            };
            let original = build.original_nvr;

            let images = self.catalog.images_by_nvr(&original).await?;
            let Some(image) = images.first() else {
                debug!(original_nvr = %original, "Original image not found in catalog");
                return Ok(None);
            };
            if image.repositories.iter().any(|repo| repo.published) {
                return Ok(Some(original));
            }

            if !visited.insert(original.clone()) {
                warn!(nvr = %original, "Rebuild chain loops back on itself");
                return Ok(None);
            }
            current = original;
        }
    }

    /// Map each published original NVR to the advisory build replacing it.
    ///
    /// Builds from blocking advisories with the same name and version as an
    /// advisory build map to that advisory build as well.
    #[instrument(skip(self, advisory), fields(errata_id = advisory.errata_id))]
    pub async fn original_to_rebuilt_map(
        &self,
        advisory: &ErrataAdvisory,
    ) -> FreshmakerResult<BTreeMap<String, String>> {
        let mut mapping = BTreeMap::new();

        for build in &advisory.builds {
            match self.published_original_nvr(build).await? {
                Some(original) => {
                    mapping.insert(original, build.clone());
                }
                None => debug!(build = %build, "No published original for advisory build"),
            }
        }

        let blocking = self
            .advisories
            .blocking_advisories_builds(advisory.errata_id)
            .await?;
        let advisory_builds: Vec<(Nvr, &String)> = advisory
            .builds
            .iter()
            .filter_map(|nvr| Nvr::parse(nvr).ok().map(|parsed| (parsed, nvr)))
            .collect();

        for blocking_nvr in blocking {
            let Ok(parsed) = Nvr::parse(&blocking_nvr) else {
                warn!(nvr = %blocking_nvr, "Skipping unparseable blocking advisory build");
                continue;
            };
            if let Some((_, build)) = advisory_builds
                .iter()
                .find(|(b, _)| b.name == parsed.name && b.version == parsed.version)
            {
                mapping.insert(blocking_nvr, (*build).clone());
            }
        }

        debug!(entries = mapping.len(), "Original to rebuilt NVR map built");
        Ok(mapping)
    }
}
