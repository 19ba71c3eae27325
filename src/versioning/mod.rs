//! # Version & Patch Generation
//!
//! Pure functions computing rebuilt identifiers. Every function takes the
//! pass's [`RebuildStamp`] explicitly, so output is deterministic for a frozen
//! clock.

pub mod bundle;
pub mod clock;
pub mod nvr;

pub use bundle::{csv_name, csv_updates, rebuild_bundle_version, BundleVersion, CsvUpdate};
pub use clock::{Clock, FixedClock, RebuildStamp, SystemClock};
pub use nvr::{compare_evr, compare_nvr, rebuilt_nvr, rpm_vercmp, sort_by_nvr, Nvr};
