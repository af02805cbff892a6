//! Binding Resolution Engine
//!
//! Given the declarations visible from a component and a set of requested
//! types, this crate decides which declaration answers each request and
//! records the answer as a [`BindingPlan`]. It uses:
//!
//! - **Classifier store**: Concurrent registry of classifiers, qualifiers
//!   and supertypes
//! - **Type relation**: Assignability and unification with qualifiers,
//!   nullability and star projections
//! - **Tiered lookup**: Explicit, implicit internal, implicit external,
//!   framework, then parent scope, with most-specific-or-fail selection
//! - **Provider-aware cycles**: A cycle is legal when a function type sits
//!   in it
//!
//! A plan never repeats a resolution decision: a generator (or the
//! interpreter in `givens-runtime`) walks the nodes and emits construction
//! code directly.
mod callable;
mod classifiers;
mod collections;
mod diagnostics;
mod expand;
mod format;
mod graph;
mod index;
mod options;
pub mod post_process;
pub mod recursion;
mod relations;
mod resolver;
mod scope;
mod specificity;
pub mod types;

pub use callable::{
    CallContext, CallableKind, CallableRef, CallableWithReceiver, ContributionKind, DuplicatePolicy, MapKey,
    ValueParameter,
};
pub use classifiers::{ClassifierFlags, ClassifierInfo, ClassifierStore};
pub use collections::{CollectionMerger, MergedEntries};
pub use diagnostics::{ChainLink, DuplicateKey, ResolutionError};
pub use expand::{Contributions, ModuleDescriptor, ModuleSource, expand_contributions};
pub use format::TypeFormatter;
pub use graph::{
    BindingKind, BindingNode, BindingPlan, BindingRequest, InterceptorNode, NodeId, PlanRoot, ScopeId,
    ScopeSummary, Tier,
};
pub use index::{ComponentDescriptor, DeclarationIndex, DeclarationIndexBuilder};
pub use options::ResolverOptions;
pub use relations::{
    SubstitutionMap, TypeRelation, count_star_projections, is_star_generalization, substitute,
};
pub use resolver::{BindingGraph, ResolutionChain};
pub use scope::{
    Candidate, ResolutionScope, ScopeKind, ScopeSpec, is_in_ancestry, match_declaration,
    normalize_request_type, owner_for_target,
};
pub use specificity::{Ambiguity, most_specific_or_fail};
pub use types::{ClassifierId, FqName, QualifierId, QualifierSet, TypeRef};
