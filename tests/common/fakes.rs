//! Scripted collaborators for integration tests

use async_trait::async_trait;
use chrono::NaiveDate;
use freshmaker_core::catalog::{
    CatalogImage, CatalogResult, ImageCatalog, OperatorBundle, OperatorIndex, RepositoryMetadata,
};
use freshmaker_core::error::{FreshmakerError, FreshmakerResult};
use freshmaker_core::models::{ArtifactBuild, ContainerImage};
use freshmaker_core::resolver::ReleaseDateService;
use freshmaker_core::services::{
    AdvisoryService, BuildDispatcher, BuildInfo, BuildSystem, ContentIndex, ImageMetadataSource,
    ModuleStream,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub indices: Vec<OperatorIndex>,
    pub images_by_nvr: HashMap<String, Vec<CatalogImage>>,
    pub images_by_digest: HashMap<String, Vec<CatalogImage>>,
    pub bundles_by_related_digest: HashMap<String, Vec<OperatorBundle>>,
    pub bundles_by_digest: HashMap<String, Vec<OperatorBundle>>,
    pub auto_rebuild_tags: HashMap<(String, String), Vec<String>>,
    pub repositories: HashMap<String, Vec<RepositoryMetadata>>,
    pub rpms: HashMap<String, Vec<String>>,
    /// Related-image digest lookups, in call order
    pub related_lookups: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, path: &str, ocp_version: &str) -> Self {
        self.indices.push(OperatorIndex {
            path: Some(path.to_string()),
            ocp_version: ocp_version.to_string(),
            organization: Some("redhat-operators".to_string()),
        });
        self
    }

    /// Register an image under its NVR and under every digest it carries
    pub fn with_image(mut self, image: CatalogImage) -> Self {
        let nvr = image.nvr().unwrap_or_default().to_string();
        for repo in &image.repositories {
            for digest in [&repo.manifest_list_digest, &repo.manifest_schema2_digest]
                .into_iter()
                .flatten()
            {
                let entry = self.images_by_digest.entry(digest.clone()).or_default();
                if !entry.contains(&image) {
                    entry.push(image.clone());
                }
            }
        }
        self.images_by_nvr.entry(nvr).or_default().push(image);
        self
    }

    pub fn with_related_bundle(mut self, related_digest: &str, bundle: OperatorBundle) -> Self {
        self.bundles_by_related_digest
            .entry(related_digest.to_string())
            .or_default()
            .push(bundle);
        self
    }

    pub fn with_bundle_digest(mut self, digest: &str, bundle: OperatorBundle) -> Self {
        self.bundles_by_digest
            .entry(digest.to_string())
            .or_default()
            .push(bundle);
        self
    }

    pub fn with_auto_rebuild_tags(mut self, registry: &str, repository: &str, tags: &[&str]) -> Self {
        self.auto_rebuild_tags.insert(
            (registry.to_string(), repository.to_string()),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_repositories(mut self, nvr: &str, repositories: Vec<RepositoryMetadata>) -> Self {
        self.repositories.insert(nvr.to_string(), repositories);
        self
    }

    pub fn with_rpms(mut self, image_id: &str, rpms: &[&str]) -> Self {
        self.rpms
            .insert(image_id.to_string(), rpms.iter().map(|r| r.to_string()).collect());
        self
    }
}

#[async_trait]
impl ImageCatalog for FakeCatalog {
    async fn operator_indices(&self, _organizations: &[String]) -> CatalogResult<Vec<OperatorIndex>> {
        Ok(self.indices.clone())
    }

    async fn bundles_by_related_image_digest(
        &self,
        digest: &str,
        _index_paths: &[String],
        _latest: bool,
    ) -> CatalogResult<Vec<OperatorBundle>> {
        self.related_lookups.lock().push(digest.to_string());
        Ok(self
            .bundles_by_related_digest
            .get(digest)
            .cloned()
            .unwrap_or_default())
    }

    async fn bundles_by_digest(&self, digest: &str) -> CatalogResult<Vec<OperatorBundle>> {
        Ok(self.bundles_by_digest.get(digest).cloned().unwrap_or_default())
    }

    async fn images_by_digest(&self, digest: &str) -> CatalogResult<Vec<CatalogImage>> {
        Ok(self.images_by_digest.get(digest).cloned().unwrap_or_default())
    }

    async fn images_by_nvr(&self, nvr: &str) -> CatalogResult<Vec<CatalogImage>> {
        Ok(self.images_by_nvr.get(nvr).cloned().unwrap_or_default())
    }

    async fn auto_rebuild_tags(&self, registry: &str, repository: &str) -> CatalogResult<Vec<String>> {
        Ok(self
            .auto_rebuild_tags
            .get(&(registry.to_string(), repository.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn is_bundle(&self, nvr: &str) -> CatalogResult<bool> {
        Ok(self
            .images_by_nvr
            .get(nvr)
            .and_then(|images| images.first())
            .map_or(false, CatalogImage::is_bundle))
    }

    async fn image_repositories_by_nvr(
        &self,
        nvr: &str,
    ) -> CatalogResult<Option<Vec<RepositoryMetadata>>> {
        Ok(self.repositories.get(nvr).cloned())
    }

    async fn image_rpm_nvrs(&self, image_id: &str) -> CatalogResult<Option<Vec<String>>> {
        Ok(self.rpms.get(image_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct FakeAdvisories {
    pub rpms: HashMap<i64, Vec<String>>,
    pub modules: HashMap<i64, Vec<String>>,
    pub blocking: HashMap<i64, HashSet<String>>,
    pub fail: bool,
}

impl FakeAdvisories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rpms(mut self, errata_id: i64, rpms: &[&str]) -> Self {
        self.rpms
            .insert(errata_id, rpms.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn with_modules(mut self, errata_id: i64, modules: &[&str]) -> Self {
        self.modules
            .insert(errata_id, modules.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_blocking(mut self, errata_id: i64, builds: &[&str]) -> Self {
        self.blocking
            .insert(errata_id, builds.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> FreshmakerResult<()> {
        if self.fail {
            return Err(FreshmakerError::collaborator("advisory service", "service unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl AdvisoryService for FakeAdvisories {
    async fn affected_rpm_nvrs(&self, errata_id: i64) -> FreshmakerResult<Vec<String>> {
        self.check()?;
        Ok(self.rpms.get(&errata_id).cloned().unwrap_or_default())
    }

    async fn affected_module_nvrs(&self, errata_id: i64) -> FreshmakerResult<Vec<String>> {
        self.check()?;
        Ok(self.modules.get(&errata_id).cloned().unwrap_or_default())
    }

    async fn blocking_advisories_builds(&self, errata_id: i64) -> FreshmakerResult<HashSet<String>> {
        self.check()?;
        Ok(self.blocking.get(&errata_id).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct FakeBuildSystem {
    pub builds: HashMap<String, BuildInfo>,
    pub modules: HashMap<String, ModuleStream>,
    pub failing: HashSet<String>,
}

impl FakeBuildSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(mut self, info: BuildInfo) -> Self {
        self.builds.insert(info.nvr.clone(), info);
        self
    }

    pub fn with_module(mut self, nvr: &str, name: &str, stream: &str) -> Self {
        self.modules.insert(
            nvr.to_string(),
            ModuleStream {
                name: name.to_string(),
                stream: stream.to_string(),
            },
        );
        self
    }

    /// Lookups of `nvr` fail with a collaborator error
    pub fn with_failure(mut self, nvr: &str) -> Self {
        self.failing.insert(nvr.to_string());
        self
    }
}

#[async_trait]
impl BuildSystem for FakeBuildSystem {
    async fn build(&self, nvr: &str) -> FreshmakerResult<Option<BuildInfo>> {
        if self.failing.contains(nvr) {
            return Err(FreshmakerError::collaborator("build system", format!("lookup of {nvr} failed")));
        }
        Ok(self.builds.get(nvr).cloned())
    }

    async fn module_stream(&self, module_nvr: &str) -> FreshmakerResult<Option<ModuleStream>> {
        Ok(self.modules.get(module_nvr).cloned())
    }
}

#[derive(Debug, Default)]
pub struct FakeContentIndex {
    /// `name:stream` -> image NVRs
    pub images: HashMap<String, Vec<String>>,
}

impl FakeContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_images(mut self, name: &str, stream: &str, nvrs: &[&str]) -> Self {
        self.images.insert(
            format!("{name}:{stream}"),
            nvrs.iter().map(|n| n.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl ContentIndex for FakeContentIndex {
    async fn images_for_module(&self, module: &ModuleStream) -> FreshmakerResult<Vec<String>> {
        Ok(self
            .images
            .get(&format!("{}:{}", module.name, module.stream))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct FakeImageMetadata {
    pub images: Vec<ContainerImage>,
    pub fail: bool,
}

impl FakeImageMetadata {
    pub fn new(images: Vec<ContainerImage>) -> Self {
        Self {
            images,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            images: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ImageMetadataSource for FakeImageMetadata {
    async fn images_by_nvrs(&self, nvrs: &[String]) -> FreshmakerResult<Vec<ContainerImage>> {
        if self.fail {
            return Err(FreshmakerError::collaborator("image metadata", "lookup failed"));
        }
        Ok(self
            .images
            .iter()
            .filter(|image| nvrs.contains(&image.nvr))
            .cloned()
            .collect())
    }
}

/// Records every unit handed off and returns increasing task ids
#[derive(Debug)]
pub struct FakeDispatcher {
    pub dispatched: Mutex<Vec<String>>,
    pub failing: HashSet<String>,
    next_task_id: AtomicI64,
}

impl Default for FakeDispatcher {
    fn default() -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            next_task_id: AtomicI64::new(1000),
        }
    }
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(mut self, original_nvr: &str) -> Self {
        self.failing.insert(original_nvr.to_string());
        self
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().clone()
    }
}

#[async_trait]
impl BuildDispatcher for FakeDispatcher {
    async fn dispatch(&self, build: &ArtifactBuild) -> FreshmakerResult<i64> {
        if self.failing.contains(&build.original_nvr) {
            return Err(FreshmakerError::collaborator("build system", "submission rejected"));
        }
        self.dispatched.lock().push(build.original_nvr.clone());
        Ok(self.next_task_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Debug, Default)]
pub struct FakeReleaseDates {
    pub dates: HashMap<String, NaiveDate>,
    pub calls: AtomicUsize,
}

impl FakeReleaseDates {
    pub fn new(dates: &[(&str, NaiveDate)]) -> Self {
        Self {
            dates: dates.iter().map(|(v, d)| (v.to_string(), *d)).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReleaseDateService for FakeReleaseDates {
    async fn ga_date(&self, platform_version: &str) -> FreshmakerResult<Option<NaiveDate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.dates.get(platform_version).copied())
    }
}
