pub mod advisory;
pub mod artifact_build;
pub mod container_image;
pub mod event;
pub mod types;

// Re-export core models for easy access
pub use advisory::ErrataAdvisory;
pub use artifact_build::{ArtifactBuild, BuildArgs, BundleOverrides, PullspecReplacement};
pub use container_image::ContainerImage;
pub use event::{EventKindTag, NewTriggerEvent, TriggerEvent};
pub use types::{ArtifactType, RebuildReason};
