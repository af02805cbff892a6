//! Resolution errors.
//!
//! Every error is terminal for the top-level request that produced it. The
//! `Display` impls work without a classifier store (types print as `#id`);
//! [`ResolutionError::to_diagnostic`] renders names and lists every origin
//! or chain hop as related information.

use crate::callable::MapKey;
use crate::format::TypeFormatter;
use crate::graph::{BindingRequest, Tier};
use crate::types::{ClassifierId, FqName, TypeRef};
use givens_common::diagnostics::{Diagnostic, diagnostic_codes, format_code};
use std::fmt;
use std::sync::Arc;

/// One hop of a request chain: the requested type and who asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub type_ref: TypeRef,
    pub origin: FqName,
}

impl From<&BindingRequest> for ChainLink {
    fn from(request: &BindingRequest) -> Self {
        Self {
            type_ref: request.type_ref.clone(),
            origin: request.origin.clone(),
        }
    }
}

/// Key under which two collection entries collided.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DuplicateKey {
    /// Set element identity (the declaration origin).
    Element(FqName),
    /// Map entry key.
    Key(MapKey),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionError {
    /// No candidate in any tier and the request is neither nullable nor
    /// optional. `chain` runs from the top-level request to the failing one.
    Missing {
        type_ref: TypeRef,
        scope: Arc<str>,
        chain: Vec<ChainLink>,
    },
    /// More than one equally specific candidate in one tier.
    Ambiguous {
        type_ref: TypeRef,
        tier: Tier,
        candidates: Vec<FqName>,
    },
    /// A node reappeared in the active chain with no provider in between.
    /// The first and last links are the repeated node.
    Circular { cycle: Vec<ChainLink> },
    /// Two collection entries share a key under `DuplicatePolicy::Fail`.
    Duplicate {
        collection: TypeRef,
        key: DuplicateKey,
        scope: Arc<str>,
        existing: FqName,
        duplicate: FqName,
    },
    /// A binding would replace an earlier binding of the same type without
    /// allowed override intent.
    OverrideViolation {
        type_ref: TypeRef,
        scope: Arc<str>,
        existing: FqName,
        overriding: FqName,
    },
    /// The request chain grew past the configured depth.
    DepthExceeded {
        type_ref: TypeRef,
        depth: u32,
        chain: Vec<ChainLink>,
    },
    /// The walk made more requests than the step budget allows, at any depth.
    StepBudgetExceeded {
        type_ref: TypeRef,
        budget: u32,
        chain: Vec<ChainLink>,
    },
    /// A declaration mentions a classifier the store or index does not know.
    UnknownClassifier {
        classifier: ClassifierId,
        origin: FqName,
    },
    /// A module includes itself. `path` lists the including declarations.
    ModuleCycle {
        module: ClassifierId,
        path: Vec<FqName>,
    },
}

impl ResolutionError {
    pub fn code(&self) -> u32 {
        match self {
            ResolutionError::Missing { .. } => diagnostic_codes::NO_BINDING_FOUND,
            ResolutionError::Ambiguous { .. } => diagnostic_codes::MULTIPLE_BINDINGS_FOUND,
            ResolutionError::Circular { .. } => diagnostic_codes::CIRCULAR_DEPENDENCY,
            ResolutionError::Duplicate { .. } => diagnostic_codes::DUPLICATE_COLLECTION_ENTRY,
            ResolutionError::OverrideViolation { .. } => diagnostic_codes::OVERRIDE_NOT_ALLOWED,
            ResolutionError::DepthExceeded { .. } => diagnostic_codes::RESOLUTION_TOO_DEEP,
            ResolutionError::StepBudgetExceeded { .. } => diagnostic_codes::RESOLUTION_STEP_BUDGET_EXCEEDED,
            ResolutionError::UnknownClassifier { .. } => diagnostic_codes::UNKNOWN_CLASSIFIER,
            ResolutionError::ModuleCycle { .. } => diagnostic_codes::MODULE_INCLUDES_ITSELF,
        }
    }

    /// Origin the diagnostic is reported at: the last requester for chain
    /// errors, the later declaration for collisions.
    pub fn origin(&self) -> Option<&FqName> {
        match self {
            ResolutionError::Missing { chain, .. }
            | ResolutionError::DepthExceeded { chain, .. }
            | ResolutionError::StepBudgetExceeded { chain, .. } => chain.last().map(|l| &l.origin),
            ResolutionError::Ambiguous { candidates, .. } => candidates.first(),
            ResolutionError::Circular { cycle } => cycle.last().map(|l| &l.origin),
            ResolutionError::Duplicate { duplicate, .. } => Some(duplicate),
            ResolutionError::OverrideViolation { overriding, .. } => Some(overriding),
            ResolutionError::UnknownClassifier { origin, .. } => Some(origin),
            ResolutionError::ModuleCycle { path, .. } => path.last(),
        }
    }

    pub fn message(&self, formatter: &TypeFormatter<'_>) -> String {
        let code = self.code();
        match self {
            ResolutionError::Missing { type_ref, scope, .. } => {
                format_code(code, &[&formatter.format(type_ref), scope])
            }
            ResolutionError::Ambiguous { type_ref, tier, .. } => {
                format_code(code, &[tier.as_str(), &formatter.format(type_ref)])
            }
            ResolutionError::Circular { cycle } => {
                let rendered: Vec<String> = cycle.iter().map(|l| formatter.format(&l.type_ref)).collect();
                format_code(code, &[&rendered.join(" -> ")])
            }
            ResolutionError::Duplicate {
                collection,
                key,
                scope,
                ..
            } => {
                let what = match key {
                    DuplicateKey::Element(origin) => {
                        format!("element '{origin}' of {}", formatter.format(collection))
                    }
                    DuplicateKey::Key(key) => {
                        format!("key '{}' of {}", key.value, formatter.format(collection))
                    }
                };
                format_code(code, &[&what, scope])
            }
            ResolutionError::OverrideViolation { type_ref, scope, .. } => {
                format_code(code, &[&formatter.format(type_ref), scope])
            }
            ResolutionError::DepthExceeded { type_ref, .. } => {
                format_code(code, &[&formatter.format(type_ref)])
            }
            ResolutionError::StepBudgetExceeded { type_ref, budget, .. } => {
                format_code(code, &[&formatter.format(type_ref), &budget.to_string()])
            }
            ResolutionError::UnknownClassifier { classifier, .. } => {
                format_code(code, &[&format!("#{}", classifier.0)])
            }
            ResolutionError::ModuleCycle { module, .. } => {
                let name = formatter.format(&TypeRef::of(*module));
                format_code(code, &[&name])
            }
        }
    }

    /// Render as a coded diagnostic with one related entry per chain hop or
    /// candidate.
    pub fn to_diagnostic(&self, formatter: &TypeFormatter<'_>) -> Diagnostic {
        let origin = self
            .origin()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "unknown origin".to_string());
        let mut diagnostic = Diagnostic::error(origin, self.message(formatter), self.code());
        match self {
            ResolutionError::Missing { chain, .. }
            | ResolutionError::DepthExceeded { chain, .. }
            | ResolutionError::StepBudgetExceeded { chain, .. } => {
                for link in chain.iter().rev() {
                    let text = format_code(
                        diagnostic_codes::REQUIRED_BY,
                        &[&formatter.format(&link.type_ref), link.origin.as_str()],
                    );
                    diagnostic = diagnostic.with_related(link.origin.to_string(), text);
                }
            }
            ResolutionError::Ambiguous { candidates, .. } => {
                for candidate in candidates {
                    let text = format_code(diagnostic_codes::CANDIDATE_DECLARED_AT, &[candidate.as_str()]);
                    diagnostic = diagnostic.with_related(candidate.to_string(), text);
                }
            }
            ResolutionError::Circular { cycle } => {
                for link in cycle {
                    let text = format_code(diagnostic_codes::CYCLE_MEMBER, &[&formatter.format(&link.type_ref)]);
                    diagnostic = diagnostic.with_related(link.origin.to_string(), text);
                }
            }
            ResolutionError::Duplicate {
                existing, duplicate, ..
            } => {
                for origin in [existing, duplicate] {
                    let text = format_code(diagnostic_codes::CANDIDATE_DECLARED_AT, &[origin.as_str()]);
                    diagnostic = diagnostic.with_related(origin.to_string(), text);
                }
            }
            ResolutionError::OverrideViolation {
                existing, overriding, ..
            } => {
                for origin in [existing, overriding] {
                    let text = format_code(diagnostic_codes::CANDIDATE_DECLARED_AT, &[origin.as_str()]);
                    diagnostic = diagnostic.with_related(origin.to_string(), text);
                }
            }
            ResolutionError::ModuleCycle { path, .. } => {
                for origin in path {
                    diagnostic = diagnostic.with_related(origin.to_string(), "included here".to_string());
                }
            }
            ResolutionError::UnknownClassifier { .. } => {}
        }
        diagnostic
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message(&TypeFormatter::plain()))
    }
}

impl std::error::Error for ResolutionError {}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
