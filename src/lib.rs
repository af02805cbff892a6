//! givens
//!
//! Compile-time dependency-injection binding resolution. The work is split
//! across the workspace:
//!
//! - `givens-common`: limits and coded diagnostics
//! - `givens-solver`: classifier store, declaration index, resolver and
//!   the serializable [`BindingPlan`]
//! - `givens-runtime`: an interpreter that executes a plan against a table
//!   of factories
//!
//! This crate adds the host-facing pieces: `givens.json` loading
//! ([`config`]), tracing setup ([`tracing_config`]) and JSON export of
//! plans and diagnostics.

pub mod config;
pub mod tracing_config;

pub use givens_common as common;
pub use givens_runtime as runtime;
pub use givens_solver as solver;

pub use config::{GivensConfig, ResolverConfig, load_config, parse_config};
pub use givens_common::Diagnostic;
pub use givens_solver::{BindingGraph, BindingPlan, ResolutionError, ResolverOptions};

use anyhow::{Context, Result};
use givens_solver::{ClassifierStore, DeclarationIndex, TypeRef};
use tracing::{debug, info_span};

/// Resolve every entry point of `component` as a root scope.
pub fn resolve_component(
    classifiers: &ClassifierStore,
    index: &DeclarationIndex,
    options: ResolverOptions,
    component: &TypeRef,
) -> Result<BindingPlan, ResolutionError> {
    let formatter = givens_solver::TypeFormatter::new(classifiers);
    let _span = info_span!("resolve_component", component = %formatter.format(component)).entered();
    let mut graph = BindingGraph::new(classifiers, index, options);
    let scope = graph.add_component(None, component)?;
    let plan = graph.resolve_entry_points(scope)?;
    debug!(nodes = plan.nodes.len(), roots = plan.roots.len(), "component resolved");
    Ok(plan)
}

/// Convert resolution errors into coded diagnostics, naming types through
/// `classifiers`.
pub fn diagnostics_for(classifiers: &ClassifierStore, errors: &[ResolutionError]) -> Vec<Diagnostic> {
    let formatter = givens_solver::TypeFormatter::new(classifiers);
    errors.iter().map(|error| error.to_diagnostic(&formatter)).collect()
}

pub fn plan_to_json(plan: &BindingPlan) -> Result<String> {
    serde_json::to_string_pretty(plan).context("failed to serialize binding plan")
}

pub fn diagnostics_to_json(diagnostics: &[Diagnostic]) -> Result<String> {
    serde_json::to_string_pretty(diagnostics).context("failed to serialize diagnostics")
}

#[cfg(test)]
#[path = "../tests/lib_tests.rs"]
mod tests;
