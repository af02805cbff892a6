//! `givens.json` configuration.
//!
//! ```json
//! {
//!   "extends": "../base",
//!   "resolver": {
//!     "maxResolutionDepth": 300,
//!     "maxResolutionSteps": 500000,
//!     "mergeStarProjections": true,
//!     "emptyCollectionsByDefault": "false",
//!     "allowOverrides": true
//!   }
//! }
//! ```
//!
//! Absent keys fall back to [`ResolverOptions::default`]. A config may
//! extend another; the extending file wins key by key.

use anyhow::{Context, Result, anyhow, bail};
use givens_solver::ResolverOptions;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Accepts `true` as well as `"true"`, `"1"`, `"yes"`, `"on"` (and their
/// negations).
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{s}'. Expected true, false, 'true', or 'false'"
            ))),
        },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GivensConfig {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub resolver: Option<ResolverConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default)]
    pub max_resolution_depth: Option<u32>,
    #[serde(default)]
    pub max_resolution_steps: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub merge_star_projections: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub empty_collections_by_default: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub allow_overrides: Option<bool>,
}

impl GivensConfig {
    /// Resolver options with defaults for every absent key.
    pub fn resolver_options(&self) -> ResolverOptions {
        let defaults = ResolverOptions::default();
        let Some(resolver) = &self.resolver else {
            return defaults;
        };
        ResolverOptions {
            max_resolution_depth: resolver.max_resolution_depth.unwrap_or(defaults.max_resolution_depth),
            max_resolution_steps: resolver.max_resolution_steps.unwrap_or(defaults.max_resolution_steps),
            merge_star_projections: resolver
                .merge_star_projections
                .unwrap_or(defaults.merge_star_projections),
            empty_collections_by_default: resolver
                .empty_collections_by_default
                .unwrap_or(defaults.empty_collections_by_default),
            allow_overrides: resolver.allow_overrides.unwrap_or(defaults.allow_overrides),
        }
    }
}

pub fn parse_config(source: &str) -> Result<GivensConfig> {
    let config: GivensConfig = serde_json::from_str(source).context("failed to parse givens config JSON")?;
    if let Some(0) = config.resolver.as_ref().and_then(|r| r.max_resolution_depth) {
        bail!("resolver.maxResolutionDepth must be at least 1");
    }
    if let Some(0) = config.resolver.as_ref().and_then(|r| r.max_resolution_steps) {
        bail!("resolver.maxResolutionSteps must be at least 1");
    }
    Ok(config)
}

/// Load `path`, following `extends` chains.
pub fn load_config(path: &Path) -> Result<GivensConfig> {
    let mut visited = HashSet::new();
    load_config_inner(path, &mut visited)
}

fn load_config_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<GivensConfig> {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        bail!("givens config extends cycle detected at {}", canonical.display());
    }

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read givens config: {}", path.display()))?;
    let mut config =
        parse_config(&source).with_context(|| format!("failed to parse givens config: {}", path.display()))?;

    if let Some(extends) = config.extends.take() {
        let base_path = resolve_extends_path(path, &extends)?;
        let base = load_config_inner(&base_path, visited)?;
        config = merge_configs(base, config);
    }

    visited.remove(&canonical);
    Ok(config)
}

fn resolve_extends_path(current_path: &Path, extends: &str) -> Result<PathBuf> {
    let base_dir = current_path
        .parent()
        .ok_or_else(|| anyhow!("givens config has no parent directory"))?;
    let mut candidate = PathBuf::from(extends);
    if candidate.extension().is_none() {
        candidate.set_extension("json");
    }
    if candidate.is_absolute() {
        Ok(candidate)
    } else {
        Ok(base_dir.join(candidate))
    }
}

fn merge_configs(base: GivensConfig, child: GivensConfig) -> GivensConfig {
    let resolver = match (base.resolver, child.resolver) {
        (Some(base), Some(child)) => Some(ResolverConfig {
            max_resolution_depth: child.max_resolution_depth.or(base.max_resolution_depth),
            max_resolution_steps: child.max_resolution_steps.or(base.max_resolution_steps),
            merge_star_projections: child.merge_star_projections.or(base.merge_star_projections),
            empty_collections_by_default: child
                .empty_collections_by_default
                .or(base.empty_collections_by_default),
            allow_overrides: child.allow_overrides.or(base.allow_overrides),
        }),
        (base, child) => child.or(base),
    };
    GivensConfig {
        extends: None,
        resolver,
    }
}

#[cfg(test)]
#[path = "../tests/config_tests.rs"]
mod tests;
