//! Resolution scopes.
//!
//! A scope is one level of the lookup hierarchy: a component, a child
//! component, a provider's dependency scope, or any other declaration
//! context. Scopes live in an arena owned by `BindingGraph` and point to their
//! parent by [`ScopeId`].
//!
//! Construction expands the scope's declarations into flat contributions and
//! applies the single-binding duplicate policy. A child scope then inherits
//! its parent's givens and inputs, each tagged with the scope that declared
//! it; a local given of the same type shadows an inherited one. Queries
//! ([`ResolutionScope::givens_for_type`]) are memoized per exact type.

use crate::callable::{CallContext, CallableRef, CallableWithReceiver, DuplicatePolicy};
use crate::classifiers::ClassifierFlags;
use crate::diagnostics::ResolutionError;
use crate::expand::Contributions;
use crate::graph::ScopeId;
use crate::index::DeclarationIndex;
use crate::options::ResolverOptions;
use crate::relations::{SubstitutionMap, TypeRelation};
use crate::types::{ClassifierId, FqName, TypeRef};
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// What kind of context a scope stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A top-level component.
    Component,
    /// A component created by a factory inside another component.
    ChildComponent,
    /// The dependency scope of a provider.
    Provider,
    /// Any other declaration context (class body, function body).
    Declaration,
}

// =============================================================================
// Candidates
// =============================================================================

/// One way to satisfy a type, before it becomes a node.
///
/// The first six variants come from [`ResolutionScope::givens_for_type`];
/// the rest are synthesized by the resolver's framework tier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// A declaration, already substituted for the requested type.
    /// `assisted` is set when the request is an assisted factory
    /// `(A...) -> R` served by a declaration of `R` with assisted parameters.
    /// `declared_in` is the ancestor the given was inherited from, `None`
    /// for the requesting scope's own.
    Given {
        callable: Arc<CallableRef>,
        /// The declaration before substitution.
        declaration: Arc<CallableRef>,
        receivers: Vec<FqName>,
        raw_type: TypeRef,
        assisted: bool,
        declared_in: Option<ScopeId>,
    },
    /// Input `index` of the scope, or of the ancestor `declared_in`.
    Input {
        index: usize,
        type_ref: TypeRef,
        declared_in: Option<ScopeId>,
    },
    /// Reference to a singleton object.
    Object { type_ref: TypeRef },
    /// Invocation of a function alias.
    FunAlias {
        callable: Arc<CallableRef>,
        type_ref: TypeRef,
    },
    /// Synthesized provider for a function type.
    Provider {
        type_ref: TypeRef,
        parameters: Vec<TypeRef>,
        returns: TypeRef,
    },
    /// Synthesized set over the merged elements.
    Set { type_ref: TypeRef, element: TypeRef },
    /// Synthesized map over the merged entries.
    Map { type_ref: TypeRef },
    /// The component the scope builds.
    SelfBinding { type_ref: TypeRef },
    /// Factory for a child component.
    ChildComponent {
        type_ref: TypeRef,
        parameters: Vec<TypeRef>,
        component: TypeRef,
    },
}

impl Candidate {
    /// Declared type used for the exact-match tie-break.
    pub fn raw_type(&self) -> &TypeRef {
        match self {
            Candidate::Given { raw_type, .. } => raw_type,
            Candidate::Input { type_ref, .. }
            | Candidate::Object { type_ref }
            | Candidate::FunAlias { type_ref, .. }
            | Candidate::Provider { type_ref, .. }
            | Candidate::Set { type_ref, .. }
            | Candidate::Map { type_ref }
            | Candidate::SelfBinding { type_ref }
            | Candidate::ChildComponent { type_ref, .. } => type_ref,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, Candidate::Given { .. } | Candidate::Input { .. })
    }

    pub fn origin(&self) -> Option<&FqName> {
        match self {
            Candidate::Given { callable, .. } | Candidate::FunAlias { callable, .. } => {
                Some(&callable.fq_name)
            }
            _ => None,
        }
    }

    /// Origin for diagnostics; synthesized candidates get a bracketed label.
    pub fn describe(&self) -> FqName {
        if let Some(origin) = self.origin() {
            return origin.clone();
        }
        let label = match self {
            Candidate::Input { index, .. } => format!("<input {index}>"),
            Candidate::Object { .. } => "<object>".to_string(),
            Candidate::Provider { .. } => "<provider>".to_string(),
            Candidate::Set { .. } => "<set>".to_string(),
            Candidate::Map { .. } => "<map>".to_string(),
            Candidate::SelfBinding { .. } => "<component>".to_string(),
            Candidate::ChildComponent { .. } => "<child component>".to_string(),
            Candidate::Given { .. } | Candidate::FunAlias { .. } => String::new(),
        };
        FqName::new(label)
    }

    /// Tag an explicit candidate as inherited from `scope`.
    #[must_use]
    pub fn declared_in(mut self, scope: ScopeId) -> Self {
        if let Candidate::Given { declared_in, .. } | Candidate::Input { declared_in, .. } = &mut self {
            *declared_in = Some(scope);
        }
        self
    }

    /// The component a declaration is pinned to, if any.
    pub fn target_component(&self) -> Option<&TypeRef> {
        match self {
            Candidate::Given { callable, .. } => callable.target_component.as_ref(),
            _ => None,
        }
    }
}

/// Match a declaration against a requested type.
///
/// Generic declarations are unified with the request first; type parameters
/// left unbound become star projections. Declarations with assisted
/// parameters only match assisted factory requests.
pub fn match_declaration(
    relation: &TypeRelation<'_>,
    entry: &CallableWithReceiver,
    requested: &TypeRef,
    context: CallContext,
) -> Option<Candidate> {
    let declaration = &entry.callable;
    if !context.can_call(declaration.callable_kind) {
        return None;
    }
    if declaration.has_assisted_parameters() {
        return match_assisted(relation, entry, requested);
    }
    let substituted = instantiate(relation, declaration, requested)?;
    if !relation.is_assignable(&substituted.type_ref, requested) {
        return None;
    }
    Some(Candidate::Given {
        callable: substituted,
        declaration: declaration.clone(),
        receivers: entry.receivers.clone(),
        raw_type: declaration.type_ref.clone(),
        assisted: false,
        declared_in: None,
    })
}

/// `(A, B) -> R` served by a declaration producing `R` whose assisted
/// parameters accept `A` and `B`, in order.
fn match_assisted(
    relation: &TypeRelation<'_>,
    entry: &CallableWithReceiver,
    requested: &TypeRef,
) -> Option<Candidate> {
    let (parameters, returns) = requested.function_parts()?;
    let declaration = &entry.callable;
    let substituted = instantiate(relation, declaration, returns)?;
    if !relation.is_assignable(&substituted.type_ref, returns) {
        return None;
    }
    let assisted: Vec<&TypeRef> = substituted.assisted_parameters().map(|p| &p.type_ref).collect();
    if assisted.len() != parameters.len()
        || !parameters
            .iter()
            .zip(assisted)
            .all(|(given, declared)| relation.is_assignable(given, declared))
    {
        return None;
    }
    Some(Candidate::Given {
        callable: substituted,
        declaration: declaration.clone(),
        receivers: entry.receivers.clone(),
        raw_type: requested.clone(),
        assisted: true,
        declared_in: None,
    })
}

/// Substitute a generic declaration for `requested`.
///
/// The declared type is first viewed as the requested classifier, so
/// `fun <T> impl(): RepoImpl<T>` with `RepoImpl<T> : Repo<T>` unifies with a
/// request for `Repo<Foo>`.
fn instantiate(
    relation: &TypeRelation<'_>,
    declaration: &Arc<CallableRef>,
    requested: &TypeRef,
) -> Option<Arc<CallableRef>> {
    if declaration.type_parameters.is_empty() && !relation.contains_type_parameters(&declaration.type_ref) {
        return Some(declaration.clone());
    }
    let mut map = if requested.star || requested.classifier == ClassifierId::ANY {
        SubstitutionMap::default()
    } else {
        let pattern = relation
            .classifiers()
            .subtype_view(&declaration.type_ref, requested.classifier)
            .unwrap_or_else(|| declaration.type_ref.clone());
        relation.try_unify(requested, &pattern)?
    };
    for parameter in &declaration.type_parameters {
        map.entry(*parameter).or_insert_with(TypeRef::star);
    }
    let mut substituted = declaration.substitute(&map);
    if relation.contains_type_parameters(&substituted.type_ref) {
        substituted.type_ref = relation.erase_type_parameters(&substituted.type_ref);
    }
    for parameter in &mut substituted.value_parameters {
        if relation.contains_type_parameters(&parameter.type_ref) {
            parameter.type_ref = relation.erase_type_parameters(&parameter.type_ref);
        }
    }
    Some(Arc::new(substituted))
}

// =============================================================================
// ResolutionScope
// =============================================================================

/// One level of the lookup hierarchy.
#[derive(Debug)]
pub struct ResolutionScope {
    pub id: ScopeId,
    pub name: Arc<str>,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub depth: u32,
    pub call_context: CallContext,
    /// The component this scope builds, if any.
    pub component: Option<TypeRef>,
    /// Values supplied by the scope's factory or provider caller.
    pub inputs: Vec<TypeRef>,
    /// Types resolved when the scope is built.
    pub entry_points: Vec<TypeRef>,
    givens: Vec<CallableWithReceiver>,
    set_elements: Vec<CallableWithReceiver>,
    map_entries: Vec<CallableWithReceiver>,
    interceptors: Vec<CallableWithReceiver>,
    multibinds: Vec<TypeRef>,
    inherited_givens: Vec<(CallableWithReceiver, ScopeId)>,
    inherited_inputs: Vec<(usize, TypeRef, ScopeId)>,
    given_nodes_by_type: FxHashMap<TypeRef, Arc<[Candidate]>>,
    pub(crate) set_elements_by_type: FxHashMap<TypeRef, Option<Arc<[CallableWithReceiver]>>>,
    pub(crate) map_entries_by_type: FxHashMap<TypeRef, Option<Arc<[CallableWithReceiver]>>>,
    pub(crate) interceptors_by_type: FxHashMap<TypeRef, Arc<[CallableWithReceiver]>>,
}

/// Everything needed to create a scope besides its contributions.
#[derive(Clone, Debug)]
pub struct ScopeSpec {
    pub name: Arc<str>,
    pub kind: ScopeKind,
    pub call_context: CallContext,
    pub component: Option<TypeRef>,
    pub inputs: Vec<TypeRef>,
    pub entry_points: Vec<TypeRef>,
}

impl ScopeSpec {
    pub fn new(name: impl Into<Arc<str>>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            call_context: CallContext::Default,
            component: None,
            inputs: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_component(mut self, component: TypeRef) -> Self {
        self.component = Some(component);
        self
    }

    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<TypeRef>) -> Self {
        self.inputs = inputs;
        self
    }

    #[must_use]
    pub fn with_call_context(mut self, call_context: CallContext) -> Self {
        self.call_context = call_context;
        self
    }

    #[must_use]
    pub fn with_entry_points(mut self, entry_points: Vec<TypeRef>) -> Self {
        self.entry_points = entry_points;
        self
    }
}

impl ResolutionScope {
    /// Build a scope from its spec and expanded contributions.
    ///
    /// Two plain bindings of exactly the same type in one scope collide. A
    /// later `Override` replaces the earlier, or is an
    /// [`ResolutionError::OverrideViolation`] when overrides are disabled. A
    /// later `Drop` is discarded. With `Fail` both are kept, and a request
    /// for the type reports them as ambiguous.
    pub fn new(
        id: ScopeId,
        parent: Option<(ScopeId, u32)>,
        spec: ScopeSpec,
        contributions: Contributions,
        options: &ResolverOptions,
    ) -> Result<Self, ResolutionError> {
        let mut givens: Vec<CallableWithReceiver> = Vec::with_capacity(contributions.bindings.len());
        for entry in contributions.bindings {
            let existing = givens
                .iter()
                .position(|g| g.callable.type_ref == entry.callable.type_ref);
            let Some(position) = existing else {
                givens.push(entry);
                continue;
            };
            match entry.callable.duplicate_policy {
                DuplicatePolicy::Override if options.allow_overrides => {
                    debug!(
                        scope = %spec.name,
                        replaced = %givens[position].origin(),
                        by = %entry.origin(),
                        "binding overridden"
                    );
                    givens[position] = entry;
                }
                DuplicatePolicy::Drop => {
                    trace!(scope = %spec.name, dropped = %entry.origin(), "binding dropped");
                }
                DuplicatePolicy::Override => {
                    return Err(ResolutionError::OverrideViolation {
                        type_ref: entry.callable.type_ref.clone(),
                        scope: spec.name.clone(),
                        existing: givens[position].origin().clone(),
                        overriding: entry.origin().clone(),
                    });
                }
                DuplicatePolicy::Fail => givens.push(entry),
            }
        }

        Ok(Self {
            id,
            name: spec.name,
            kind: spec.kind,
            parent: parent.map(|(p, _)| p),
            depth: parent.map(|(_, d)| d + 1).unwrap_or(0),
            call_context: spec.call_context,
            component: spec.component,
            inputs: spec.inputs,
            entry_points: spec.entry_points,
            givens,
            set_elements: contributions.set_elements,
            map_entries: contributions.map_entries,
            interceptors: contributions.interceptors,
            multibinds: contributions.multibinds,
            inherited_givens: Vec::new(),
            inherited_inputs: Vec::new(),
            given_nodes_by_type: FxHashMap::default(),
            set_elements_by_type: FxHashMap::default(),
            map_entries_by_type: FxHashMap::default(),
            interceptors_by_type: FxHashMap::default(),
        })
    }

    /// Take over the givens and inputs `parent` can see. Entries keep the
    /// scope that declared them, which owns their nodes.
    pub fn inherit_from(&mut self, parent: &ResolutionScope) {
        let local_givens = &self.givens;
        self.inherited_givens = parent
            .inherited_givens
            .iter()
            .cloned()
            .chain(parent.givens.iter().map(|entry| (entry.clone(), parent.id)))
            .filter(|(entry, _)| {
                !local_givens
                    .iter()
                    .any(|local| local.callable.type_ref == entry.callable.type_ref)
            })
            .collect();
        self.inherited_inputs = parent
            .inherited_inputs
            .iter()
            .cloned()
            .chain(
                parent
                    .inputs
                    .iter()
                    .enumerate()
                    .map(|(index, input)| (index, input.clone(), parent.id)),
            )
            .collect();
        self.given_nodes_by_type.clear();
        trace!(
            scope = %self.name,
            parent = %parent.name,
            givens = self.inherited_givens.len(),
            inputs = self.inherited_inputs.len(),
            "inherited parent givens"
        );
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn givens(&self) -> &[CallableWithReceiver] {
        &self.givens
    }

    pub fn set_elements(&self) -> &[CallableWithReceiver] {
        &self.set_elements
    }

    pub fn map_entries(&self) -> &[CallableWithReceiver] {
        &self.map_entries
    }

    pub fn interceptors(&self) -> &[CallableWithReceiver] {
        &self.interceptors
    }

    pub fn multibinds(&self) -> &[TypeRef] {
        &self.multibinds
    }

    /// Candidates this scope itself offers for `ty`, in this order:
    ///
    /// 1. declarations and inputs assignable to `ty`, inherited ones first
    /// 2. the object itself, if `ty` is an object classifier
    /// 3. an invocation, if `ty` is a function alias
    /// 4. a synthesized provider, if `ty` is a function type
    /// 5. a synthesized set, if `ty` is `Set<E>`
    ///
    /// Duplicates are removed and the result is memoized per type.
    pub fn givens_for_type(
        &mut self,
        ty: &TypeRef,
        relation: &TypeRelation<'_>,
        index: &DeclarationIndex,
    ) -> Arc<[Candidate]> {
        if let Some(cached) = self.given_nodes_by_type.get(ty) {
            return cached.clone();
        }
        let classifiers = relation.classifiers();
        let mut candidates: IndexSet<Candidate> = IndexSet::default();

        for (entry, declared_in) in &self.inherited_givens {
            if let Some(candidate) = match_declaration(relation, entry, ty, self.call_context) {
                candidates.insert(candidate.declared_in(*declared_in));
            }
        }
        for entry in &self.givens {
            if let Some(candidate) = match_declaration(relation, entry, ty, self.call_context) {
                candidates.insert(candidate);
            }
        }
        for (index, input, declared_in) in &self.inherited_inputs {
            if relation.is_assignable(input, ty) {
                candidates.insert(Candidate::Input {
                    index: *index,
                    type_ref: input.clone(),
                    declared_in: Some(*declared_in),
                });
            }
        }
        for (index, input) in self.inputs.iter().enumerate() {
            if relation.is_assignable(input, ty) {
                candidates.insert(Candidate::Input {
                    index,
                    type_ref: input.clone(),
                    declared_in: None,
                });
            }
        }

        let flags = classifiers.flags(ty.classifier);
        if !ty.star && flags.contains(ClassifierFlags::OBJECT) {
            candidates.insert(Candidate::Object {
                type_ref: ty.non_null(),
            });
        }
        if !ty.star && flags.contains(ClassifierFlags::FUN_ALIAS) {
            if let Some(callable) = index.fun_alias(ty.classifier) {
                if self.call_context.can_call(callable.callable_kind) {
                    candidates.insert(Candidate::FunAlias {
                        callable: callable.clone(),
                        type_ref: ty.non_null(),
                    });
                }
            }
        }
        if let Some((parameters, returns)) = ty.function_parts() {
            let child_component = classifiers.has_flag(returns.classifier, ClassifierFlags::CHILD_COMPONENT);
            if !child_component {
                candidates.insert(Candidate::Provider {
                    type_ref: ty.non_null(),
                    parameters: parameters.to_vec(),
                    returns: returns.clone(),
                });
            }
        }
        if let Some(element) = ty.set_element() {
            candidates.insert(Candidate::Set {
                type_ref: ty.non_null(),
                element: element.clone(),
            });
        }

        let result: Arc<[Candidate]> = candidates.into_iter().collect();
        trace!(
            scope = %self.name,
            candidates = result.len(),
            "givens_for_type"
        );
        self.given_nodes_by_type.insert(ty.clone(), result.clone());
        result
    }
}

/// Normalize an `Inline<T>` request to `() -> T` for cache keys.
pub fn normalize_request_type(relation: &TypeRelation<'_>, ty: &TypeRef) -> TypeRef {
    let classifiers = relation.classifiers();
    if ty.star || !classifiers.has_flag(ty.classifier, ClassifierFlags::INLINE_PROVIDER) {
        return ty.clone();
    }
    match ty.arguments.first() {
        Some(inner) => TypeRef {
            qualifiers: ty.qualifiers.clone(),
            nullable: ty.nullable,
            ..TypeRef::function(Vec::new(), inner.clone())
        },
        None => ty.clone(),
    }
}

/// The owner of a binding pinned to `target`: the nearest scope, starting at
/// `from`, whose component is `target`. `None` when no such scope exists in
/// the ancestry.
pub fn owner_for_target(scopes: &[ResolutionScope], from: ScopeId, target: &TypeRef) -> Option<ScopeId> {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        let scope = scopes.get(id.index())?;
        if scope.component.as_ref() == Some(target) {
            return Some(id);
        }
        cursor = scope.parent;
    }
    None
}

/// Whether `component` is built by `from` or one of its ancestors.
pub fn is_in_ancestry(scopes: &[ResolutionScope], from: ScopeId, component: ClassifierId) -> bool {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        let Some(scope) = scopes.get(id.index()) else {
            return false;
        };
        if scope.component.as_ref().map(|c| c.classifier) == Some(component) {
            return true;
        }
        cursor = scope.parent;
    }
    false
}

#[cfg(test)]
#[path = "../tests/scope_tests.rs"]
mod tests;
