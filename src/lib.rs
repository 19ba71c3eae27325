#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Freshmaker Core
//!
//! Rebuild orchestration engine: decides which container images and
//! operator bundles must be rebuilt after an upstream change, in what order,
//! and with which content patches, then hands each decision to the build
//! system.
//!
//! ## Pipeline
//!
//! 1. An [`handlers::IncomingEvent`] is dispatched through the
//!    [`handlers::HandlerRegistry`], which creates the trigger event once per
//!    message id.
//! 2. The [`resolver`] walks the image catalog to find affected artifacts.
//! 3. The [`planner`] turns candidates into rebuild units wired into a
//!    dependency forest, computing rebuilt identifiers with [`versioning`].
//! 4. The pass is committed atomically through the [`store`].
//! 5. [`orchestration::BuildLifecycle`] applies build progress and propagates
//!    failures to dependent units.
//!
//! ## Module Organization
//!
//! - [`catalog`] - Paginated catalog client and query contract
//! - [`versioning`] - Rebuilt NVRs, bundle versions and CSV patches
//! - [`resolver`] - Advisory- and digest-driven traversal
//! - [`planner`] - Dependency-aware build planning
//! - [`state_machine`] - Event and rebuild unit states
//! - [`store`] - Persistence contract, in-memory and PostgreSQL stores
//! - [`handlers`] - Event kinds and their pipelines
//! - [`services`] - Collaborator contracts
//! - [`config`] - Configuration loading and validation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use freshmaker_core::config::ConfigManager;
//! use freshmaker_core::logging::init_structured_logging;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_directory(None)?;
//! let config = manager.config();
//! init_structured_logging(&config.logging);
//! println!("Catalog at {}", config.catalog.server_url);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod planner;
pub mod resilience;
pub mod resolver;
pub mod services;
pub mod state_machine;
pub mod store;
pub mod utils;
pub mod versioning;

pub use catalog::{CatalogClient, CatalogError, ImageCatalog};
pub use config::{ConfigManager, FreshmakerConfig};
pub use error::{FreshmakerError, FreshmakerResult};
pub use handlers::{EventHandler, EventKind, HandlerRegistry, IncomingEvent};
pub use models::{ArtifactBuild, ContainerImage, ErrataAdvisory, TriggerEvent};
pub use orchestration::BuildLifecycle;
pub use planner::{BuildPlanner, PlannedPass};
pub use state_machine::{ArtifactBuildState, EventState};
pub use store::{InMemoryStore, RebuildStore};
