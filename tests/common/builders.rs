//! Builders for catalog records, configuration and handler wiring

use super::fakes::{FakeBuildSystem, FakeDispatcher};
use freshmaker_core::catalog::types::{BrewInfo, RepositoryTag};
use freshmaker_core::catalog::{CatalogImage, ImageRepository, OperatorBundle, RelatedImage};
use freshmaker_core::config::FreshmakerConfig;
use freshmaker_core::constants::handlers::{BUNDLE_ADVISORY, FLATPAK_MODULE};
use freshmaker_core::handlers::HandlerContext;
use freshmaker_core::models::{NewTriggerEvent, PullspecReplacement, TriggerEvent};
use freshmaker_core::models::EventKindTag;
use freshmaker_core::orchestration::BuildLifecycle;
use freshmaker_core::planner::BuildPlanner;
use freshmaker_core::store::{InMemoryStore, RebuildStore};
use freshmaker_core::versioning::{Clock, FixedClock, RebuildStamp};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 2020-12-25T00:00:00Z
pub const TS: i64 = 1608854400;
pub const RELEASE_SUFFIX: &str = ".p";
pub const API_BASE_URL: &str = "https://freshmaker.example.com/";

pub fn stamp() -> RebuildStamp {
    RebuildStamp::from_timestamp(TS)
}

pub fn repo(
    registry: &str,
    repository: &str,
    published: bool,
    manifest_list_digest: Option<&str>,
    tags: &[&str],
) -> ImageRepository {
    ImageRepository {
        registry: registry.to_string(),
        repository: repository.to_string(),
        published,
        manifest_list_digest: manifest_list_digest.map(String::from),
        manifest_schema2_digest: None,
        tags: tags
            .iter()
            .map(|t| RepositoryTag {
                name: t.to_string(),
            })
            .collect(),
    }
}

pub fn catalog_image(id: &str, nvr: &str, repositories: Vec<ImageRepository>) -> CatalogImage {
    CatalogImage {
        id: Some(id.to_string()),
        brew: Some(BrewInfo {
            build: nvr.to_string(),
            nvra: None,
            package: None,
        }),
        repositories,
        architecture: Some("amd64".to_string()),
        parsed_data: None,
    }
}

pub fn bundle(csv_name: &str, version: &str, bundle_digest: &str, related: &[&str]) -> OperatorBundle {
    OperatorBundle {
        csv_name: csv_name.to_string(),
        version_original: version.to_string(),
        bundle_path_digest: Some(bundle_digest.to_string()),
        bundle_path: Some(format!("registry.example.com/bundle@{bundle_digest}")),
        channel_name: Some("stable".to_string()),
        related_images: related
            .iter()
            .map(|digest| RelatedImage {
                image: format!("registry.example.com/operator@{digest}"),
                name: None,
                digest: digest.to_string(),
            })
            .collect(),
    }
}

pub fn pullspec(new: &str, original: &str) -> PullspecReplacement {
    PullspecReplacement {
        new: new.to_string(),
        original: original.to_string(),
        pinned: true,
        old: None,
    }
}

/// Allow-all rule for every handler
pub fn test_config() -> FreshmakerConfig {
    let mut config = FreshmakerConfig::default();
    config.catalog.server_url = "https://catalog.example.com/".to_string();
    config.rebuild.rebuilt_nvr_release_suffix = RELEASE_SUFFIX.to_string();
    config.api.base_url = API_BASE_URL.to_string();
    for handler in [BUNDLE_ADVISORY, FLATPAK_MODULE] {
        config
            .handler_build_allowlist
            .insert(handler.to_string(), vec![BTreeMap::new()]);
    }
    config
}

/// Store, dispatcher and clock shared by one test
pub struct Harness {
    pub config: Arc<FreshmakerConfig>,
    pub store: Arc<InMemoryStore>,
    pub dispatcher: Arc<FakeDispatcher>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config(), FakeDispatcher::new())
    }

    pub fn with_config(config: FreshmakerConfig, dispatcher: FakeDispatcher) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(InMemoryStore::new()),
            dispatcher: Arc::new(dispatcher),
            clock: Arc::new(FixedClock::at_timestamp(TS)),
        }
    }

    pub fn store(&self) -> Arc<dyn RebuildStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn planner(&self, build_system: Arc<FakeBuildSystem>) -> BuildPlanner {
        BuildPlanner::new(
            self.store(),
            build_system,
            RELEASE_SUFFIX,
            API_BASE_URL,
        )
        .unwrap()
    }

    pub fn context(&self, build_system: Arc<FakeBuildSystem>) -> HandlerContext {
        HandlerContext {
            config: self.config.clone(),
            store: self.store(),
            planner: Arc::new(self.planner(build_system)),
            lifecycle: BuildLifecycle::new(self.store()),
            dispatcher: self.dispatcher.clone(),
            clock: self.clock(),
        }
    }

    pub async fn event(&self, message_id: &str, depends_on: Option<i64>) -> TriggerEvent {
        let new = NewTriggerEvent::new(message_id, EventKindTag::BotasErrataShipped, message_id)
            .with_depends_on(depends_on);
        let (event, _) = self.store.get_or_create_event(new).await.unwrap();
        event
    }
}
