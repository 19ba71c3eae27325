mod common;

use common::*;
use freshmaker_core::catalog::RepositoryMetadata;
use freshmaker_core::models::{ArtifactBuild, ArtifactType, ErrataAdvisory};
use freshmaker_core::resolver::{AdvisoryResolver, AutoRebuildEligibility, NvrMapper};
use std::collections::BTreeMap;
use std::sync::Arc;

const REGISTRY: &str = "registry.example.com";

fn repository(image_id: &str, repository: &str, tags: &[&str]) -> RepositoryMetadata {
    RepositoryMetadata {
        image_id: image_id.to_string(),
        registry: REGISTRY.to_string(),
        repository: repository.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

fn flatpak_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .with_repositories("app-a-1-1", vec![repository("a-id", "apps/app-a", &["latest"])])
        .with_repositories("app-b-1-1", vec![repository("b-id", "apps/app-b", &["latest"])])
        .with_repositories("app-c-1-1", vec![repository("c-id", "apps/app-c", &["1.0"])])
        .with_auto_rebuild_tags(REGISTRY, "apps/app-a", &["latest"])
        .with_auto_rebuild_tags(REGISTRY, "apps/app-b", &["latest"])
        .with_auto_rebuild_tags(REGISTRY, "apps/app-c", &["latest"])
        .with_rpms("a-id", &["foo-1.1-9", "bar-1-1"])
        .with_rpms("b-id", &["foo-1.3-1"])
        .with_rpms("c-id", &["2:foo-1.1-9"])
}

fn advisory_resolver(catalog: FakeCatalog, exceptions: &[String]) -> AdvisoryResolver {
    let catalog = Arc::new(catalog);
    let advisories = FakeAdvisories::new()
        .with_rpms(100, &["foo-1.2-3"])
        .with_modules(100, &["flatpak-runtime-1-1", "unknown-module-1-1"]);
    let build_system = FakeBuildSystem::new().with_module("flatpak-runtime-1-1", "flatpak-runtime", "stable");
    let content_index = FakeContentIndex::new().with_images(
        "flatpak-runtime",
        "stable",
        &["app-a-1-1", "app-b-1-1", "app-c-1-1", "app-a-1-1", "app-d-1-1"],
    );
    AdvisoryResolver::new(
        Arc::new(advisories),
        Arc::new(build_system),
        Arc::new(content_index),
        catalog.clone(),
        AutoRebuildEligibility::new(catalog, exceptions),
        2,
    )
}

#[tokio::test]
async fn test_images_with_older_rpm_are_rebuilt() {
    let resolver = advisory_resolver(flatpak_catalog(), &[]);
    let images = resolver.images_to_rebuild(100).await.unwrap();
    // app-b ships a newer foo, app-c lacks an auto-rebuild tag, app-d is unknown
    assert_eq!(images, vec!["app-a-1-1"]);
}

#[tokio::test]
async fn test_exception_list_makes_untagged_image_eligible() {
    let resolver = advisory_resolver(flatpak_catalog(), &["app-c-1".to_string()]);
    let images = resolver.images_to_rebuild(100).await.unwrap();
    assert_eq!(images, vec!["app-a-1-1", "app-c-1-1"]);
}

#[tokio::test]
async fn test_advisory_service_failure_propagates() {
    let catalog = Arc::new(flatpak_catalog());
    let resolver = AdvisoryResolver::new(
        Arc::new(FakeAdvisories::failing()),
        Arc::new(FakeBuildSystem::new()),
        Arc::new(FakeContentIndex::new()),
        catalog.clone(),
        AutoRebuildEligibility::new(catalog, &[]),
        2,
    );
    assert!(resolver.images_to_rebuild(100).await.is_err());
}

#[tokio::test]
async fn test_only_published_repositories_count_for_auto_rebuild() {
    let catalog = Arc::new(FakeCatalog::new().with_auto_rebuild_tags(REGISTRY, "foo/bundle", &["latest"]));
    let eligibility = AutoRebuildEligibility::new(catalog.clone(), &[]);

    let unpublished = catalog_image(
        "id-1",
        "bundle-1.0-1",
        vec![repo(REGISTRY, "foo/bundle", false, None, &["latest"])],
    );
    assert!(!eligibility.image_has_auto_rebuild_tag(&unpublished).await.unwrap());

    let published = catalog_image(
        "id-1",
        "bundle-1.0-1",
        vec![repo(REGISTRY, "foo/bundle", true, None, &["1.0", "latest"])],
    );
    assert!(eligibility.image_has_auto_rebuild_tag(&published).await.unwrap());

    let excepted = AutoRebuildEligibility::new(catalog, &["bundle-1.0".to_string()]);
    assert!(excepted.image_has_auto_rebuild_tag(&unpublished).await.unwrap());
}

fn rebuilt(event_id: i64, original: &str, rebuilt: &str) -> ArtifactBuild {
    let mut build = ArtifactBuild::planned(event_id, "foo", original, ArtifactType::Image);
    build.rebuilt_nvr = Some(rebuilt.to_string());
    build
}

fn image_published(nvr: &str, published: bool) -> freshmaker_core::catalog::CatalogImage {
    catalog_image(
        &format!("{nvr}-id"),
        nvr,
        vec![repo(REGISTRY, "foo/foo", published, None, &[])],
    )
}

async fn chain_mapper(harness: &Harness, advisories: FakeAdvisories) -> NvrMapper {
    let event = harness.event("msg-1", None).await;
    harness
        .store
        .insert_build(rebuilt(event.id, "foo-1.0-1", "foo-1.0-1.1608800000.p"));
    harness.store.insert_build(rebuilt(
        event.id,
        "foo-1.0-1.1608800000.p",
        "foo-1.0-1.1608854400.p",
    ));
    harness
        .store
        .insert_build(rebuilt(event.id, "loop-1-2", "loop-1-1"));
    harness
        .store
        .insert_build(rebuilt(event.id, "loop-1-1", "loop-1-2"));

    let catalog = FakeCatalog::new()
        .with_image(image_published("foo-1.0-1", true))
        .with_image(image_published("foo-1.0-1.1608800000.p", false))
        .with_image(image_published("loop-1-1", false))
        .with_image(image_published("loop-1-2", false));
    NvrMapper::new(harness.store(), Arc::new(catalog), Arc::new(advisories))
}

#[tokio::test]
async fn test_published_original_follows_rebuild_chain() {
    let harness = Harness::new();
    let mapper = chain_mapper(&harness, FakeAdvisories::new()).await;

    assert_eq!(
        mapper
            .published_original_nvr("foo-1.0-1.1608854400.p")
            .await
            .unwrap()
            .as_deref(),
        Some("foo-1.0-1")
    );
    assert_eq!(mapper.published_original_nvr("bar-1-1").await.unwrap(), None);
    assert_eq!(mapper.published_original_nvr("loop-1-1").await.unwrap(), None);
}

#[tokio::test]
async fn test_original_to_rebuilt_map_includes_blocking_builds() {
    let harness = Harness::new();
    let advisories = FakeAdvisories::new().with_blocking(200, &["bar-2.0-1", "baz-1-1", "not-an-nvr"]);
    let mapper = chain_mapper(&harness, advisories).await;

    let advisory = ErrataAdvisory::new(200, "RHBA-2020:200")
        .with_builds(["foo-1.0-1.1608854400.p", "bar-2.0-3"]);
    let mapping = mapper.original_to_rebuilt_map(&advisory).await.unwrap();

    assert_eq!(
        mapping,
        BTreeMap::from([
            ("bar-2.0-1".to_string(), "bar-2.0-3".to_string()),
            ("foo-1.0-1".to_string(), "foo-1.0-1.1608854400.p".to_string()),
        ])
    );
}
