//! Resolver configuration.

use givens_common::limits::{MAX_RESOLUTION_DEPTH, MAX_RESOLUTION_STEPS};

/// Knobs for one graph build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Maximum length of the request chain before resolution is reported as
    /// excessively deep.
    pub max_resolution_depth: u32,
    /// Maximum number of requests one top-level resolution may make, however
    /// shallow the chain stays.
    pub max_resolution_steps: u32,
    /// Run the star-projection merge after a batch of requests.
    pub merge_star_projections: bool,
    /// Resolve every `Set`/`Map` request, even with no declaration anywhere.
    pub empty_collections_by_default: bool,
    /// Allow a binding with `DuplicatePolicy::Override` to replace an earlier
    /// binding of the same type in the same scope.
    pub allow_overrides: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_resolution_depth: MAX_RESOLUTION_DEPTH,
            max_resolution_steps: MAX_RESOLUTION_STEPS,
            merge_star_projections: true,
            empty_collections_by_default: false,
            allow_overrides: true,
        }
    }
}
