//! # Catalog Resolver
//!
//! Expands a trigger event into the artifacts that must be rebuilt, by
//! walking the image catalog's relationships:
//!
//! - [`advisory`]: advisory RPMs → module content → affected images
//! - [`bundles`]: rebuilt image digests → referencing bundles → bundle images
//! - [`nvr_mapping`]: advisory builds → the published images they replace
//!
//! Eligibility ([`eligibility`]) and GA gating ([`release_dates`]) filter the
//! traversal roots.

pub mod advisory;
pub mod bundles;
pub mod eligibility;
pub mod nvr_mapping;
pub mod release_dates;

pub use advisory::{needs_rebuild, AdvisoryResolver};
pub use bundles::{BundleFilters, BundleResolution, BundleResolver, BundleToRebuild};
pub use eligibility::AutoRebuildEligibility;
pub use nvr_mapping::NvrMapper;
pub use release_dates::{ReleaseDateCache, ReleaseDateService};
