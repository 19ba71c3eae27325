//! # System Constants
//!
//! Fixed values shared by the resolver, planner and state machines. Anything an
//! operator may want to tune lives in [`crate::config`] instead.

/// Catalog query contract constants
pub mod catalog {
    /// Fixed page size used for every paginated catalog request
    pub const PAGE_SIZE: u32 = 100;
    /// API version segment appended to the catalog server URL
    pub const API_ROOT: &str = "v1/";
    /// Label marking an image as an operator bundle
    pub const BUNDLE_LABEL: &str = "com.redhat.delivery.operator.bundle";
}

/// Markers used when stamping rebuilt bundle versions
pub mod bundle {
    /// Current marker appended after the rebuild timestamp
    pub const MARKER: &str = ".p";
    /// Marker used by older rebuilds, still recognized when re-stamping
    pub const LEGACY_MARKER: &str = ".patched";
    /// CSV annotation linking a rebuilt CSV to the one it replaces
    pub const SUBSTITUTES_FOR_ANNOTATION: &str = "olm.substitutesFor";
}

/// Human-readable state reasons persisted with events and rebuild units
pub mod reasons {
    pub const DEPENDENCY_FAILED: &str =
        "Cannot build artifact, because its dependency cannot be built.";
    pub const NOT_ALLOWED_BY_POLICY: &str = "This image rebuild is not allowed by internal policy.";
    pub const PLANNED: &str = "Planned for rebuild";
    pub const ALL_BUILDS_DONE: &str = "All rebuilds finished successfully";
    pub const SOME_BUILDS_FAILED: &str = "Some of the rebuilds failed";
    pub const WAITING_FOR_BUILDS: &str = "Waiting for rebuilds to finish";
}

/// Handler names, used as keys of the build allowlist
pub mod handlers {
    pub const FLATPAK_MODULE: &str = "RebuildFlatpakApplicationOnModuleReady";
    pub const BUNDLE_ADVISORY: &str = "HandleBotasAdvisory";
}

/// Path template under the API base URL where bundle CSV modifications are served
pub const PULLSPEC_OVERRIDES_PATH: &str = "api/2/pullspec_overrides";
