//! Rebuilds flatpak application images when an advisory fixes RPMs in a
//! module they are built from.

use super::{EventHandler, EventKind, HandlerContext, HandlerOutcome, IncomingEvent};
use crate::constants::handlers::FLATPAK_MODULE;
use crate::error::{FreshmakerError, FreshmakerResult};
use crate::logging::LogContext;
use crate::models::{EventKindTag, TriggerEvent};
use crate::resolver::AdvisoryResolver;
use crate::services::ImageMetadataSource;
use crate::versioning::RebuildStamp;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct FlatpakModuleHandler {
    ctx: HandlerContext,
    resolver: Arc<AdvisoryResolver>,
    images: Arc<dyn ImageMetadataSource>,
}

impl FlatpakModuleHandler {
    pub fn new(
        ctx: HandlerContext,
        resolver: Arc<AdvisoryResolver>,
        images: Arc<dyn ImageMetadataSource>,
    ) -> Self {
        Self {
            ctx,
            resolver,
            images,
        }
    }
}

#[async_trait]
impl EventHandler for FlatpakModuleHandler {
    fn name(&self) -> &'static str {
        FLATPAK_MODULE
    }

    fn handles(&self) -> &'static [EventKindTag] {
        &[EventKindTag::FlatpakModuleAdvisoryReady]
    }

    async fn handle(&self, event: &TriggerEvent, incoming: &IncomingEvent) -> FreshmakerResult<HandlerOutcome> {
        let EventKind::FlatpakModuleAdvisoryReady { advisory } = &incoming.kind else {
            return Err(FreshmakerError::InvalidInput(format!(
                "{FLATPAK_MODULE} cannot handle {} events",
                incoming.kind.tag()
            )));
        };
        let log_ctx = LogContext::for_event(event.id, &event.message_id);

        let nvrs = self.resolver.images_to_rebuild(advisory.errata_id).await?;
        if nvrs.is_empty() {
            let reason = format!("There is no image can be rebuilt. message_id: {}", event.message_id);
            return self.ctx.skip(event, &reason).await;
        }

        let images = self.images.images_by_nvrs(&nvrs).await?;
        info!(
            advisory = %advisory.name,
            requested = nvrs.len(),
            found = images.len(),
            "Image metadata resolved"
        );

        let stamp = RebuildStamp::capture(self.ctx.clock.as_ref());
        let pass = self
            .ctx
            .planner
            .plan_images(event, &images, stamp, &log_ctx)
            .await?;
        let empty_reason = format!("No container images to rebuild for advisory '{}'", advisory.name);
        let state = self.ctx.planner.commit(pass, &empty_reason).await?;

        self.ctx.finish(event, state).await
    }
}
