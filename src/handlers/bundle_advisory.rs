//! Rebuilds operator bundles after the images they reference were rebuilt
//! and shipped, and serves manual and release-driver bundle requests.

use super::allowlist::is_allowed;
use super::{
    EventHandler, EventKind, HandlerContext, HandlerOutcome, IncomingEvent, ManualRebuildMode,
};
use crate::constants::handlers::BUNDLE_ADVISORY;
use crate::constants::reasons::NOT_ALLOWED_BY_POLICY;
use crate::error::{FreshmakerError, FreshmakerResult};
use crate::logging::LogContext;
use crate::models::{ErrataAdvisory, EventKindTag, TriggerEvent};
use crate::resolver::{BundleFilters, BundleResolution, BundleResolver, BundleToRebuild, NvrMapper};
use crate::versioning::RebuildStamp;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub struct BundleAdvisoryHandler {
    ctx: HandlerContext,
    mapper: NvrMapper,
    bundles: Arc<BundleResolver>,
}

impl BundleAdvisoryHandler {
    pub fn new(ctx: HandlerContext, mapper: NvrMapper, bundles: Arc<BundleResolver>) -> Self {
        Self {
            ctx,
            mapper,
            bundles,
        }
    }

    fn policy_fields(advisory: Option<&ErrataAdvisory>) -> BTreeMap<&'static str, String> {
        let mut fields = BTreeMap::new();
        if let Some(advisory) = advisory {
            fields.insert("advisory_name", advisory.name.clone());
            fields.insert("advisory_state", advisory.state.clone());
            fields.insert("advisory_content_types", advisory.content_types.join(","));
        }
        fields
    }

    /// Bundles referencing images the advisory rebuilt
    async fn advisory_bundles(
        &self,
        advisory: &ErrataAdvisory,
        filters: &BundleFilters,
        stamp: RebuildStamp,
    ) -> FreshmakerResult<BundleResolution> {
        let mapping = self.mapper.original_to_rebuilt_map(advisory).await?;
        let organizations = &self.ctx.config.catalog.index_image_organizations;
        let index_paths = self.bundles.released_index_paths(organizations).await?;
        debug!(
            originals = mapping.len(),
            index_paths = index_paths.len(),
            "Resolving bundles for advisory"
        );
        self.bundles.resolve(&mapping, &index_paths, filters, stamp).await
    }

    async fn plan(
        &self,
        event: &TriggerEvent,
        bundles: Vec<BundleToRebuild>,
        stamp: RebuildStamp,
    ) -> FreshmakerResult<HandlerOutcome> {
        let log_ctx = LogContext::for_event(event.id, &event.message_id);
        let pass = self
            .ctx
            .planner
            .plan_bundles(event, &bundles, stamp, &log_ctx)
            .await?;
        let empty_reason = format!("No bundle images to rebuild. message_id: {}", event.message_id);
        let state = self.ctx.planner.commit(pass, &empty_reason).await?;
        self.ctx.finish(event, state).await
    }
}

#[async_trait]
impl EventHandler for BundleAdvisoryHandler {
    fn name(&self) -> &'static str {
        BUNDLE_ADVISORY
    }

    fn handles(&self) -> &'static [EventKindTag] {
        &[EventKindTag::BotasErrataShipped, EventKindTag::ManualBundleRebuild]
    }

    async fn handle(&self, event: &TriggerEvent, incoming: &IncomingEvent) -> FreshmakerResult<HandlerOutcome> {
        let fields = Self::policy_fields(incoming.kind.advisory());
        if !is_allowed(&self.ctx.config, BUNDLE_ADVISORY, &fields) {
            let reason = format!("{NOT_ALLOWED_BY_POLICY} message_id: {}", event.message_id);
            return self.ctx.skip(event, &reason).await;
        }

        // One instant for every identifier of this pass
        let stamp = RebuildStamp::capture(self.ctx.clock.as_ref());

        let resolution = match &incoming.kind {
            EventKind::BotasErrataShipped { advisory } => {
                self.advisory_bundles(advisory, &BundleFilters::default(), stamp)
                    .await?
            }
            EventKind::ManualBundleRebuild {
                mode: ManualRebuildMode::ManualRebuild,
                advisory,
                container_images,
                ..
            } => {
                let Some(advisory) = advisory else {
                    let reason = format!(
                        "Manual bundle rebuild requires an advisory. message_id: {}",
                        event.message_id
                    );
                    return self.ctx.skip(event, &reason).await;
                };
                let filters = BundleFilters {
                    allowed_nvrs: (!container_images.is_empty())
                        .then(|| container_images.iter().cloned().collect::<HashSet<_>>()),
                    dependent_of_event: Some(event.id),
                };
                self.advisory_bundles(advisory, &filters, stamp).await?
            }
            EventKind::ManualBundleRebuild {
                mode: ManualRebuildMode::ReleaseDriver,
                container_images,
                bundle_images,
                ..
            } => BundleResolution::Rebuild(
                self.bundles
                    .release_driver_bundles(container_images, bundle_images, stamp)
                    .await?,
            ),
            EventKind::FlatpakModuleAdvisoryReady { .. } => {
                return Err(FreshmakerError::InvalidInput(format!(
                    "{BUNDLE_ADVISORY} cannot handle {} events",
                    incoming.kind.tag()
                )));
            }
        };

        match resolution {
            BundleResolution::Skip(reason) => self.ctx.skip(event, &reason).await,
            BundleResolution::Rebuild(bundles) => {
                info!(event_id = event.id, bundles = bundles.len(), "Planning bundle rebuilds");
                self.plan(event, bundles, stamp).await
            }
        }
    }
}
