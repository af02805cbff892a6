//! Binding graph construction.
//!
//! [`BindingGraph`] answers requests against a scope tree. For each request:
//!
//! 1. Normalize `Inline<T>` to `() -> T`.
//! 2. Return the cached node for `(scope, type)` if there is one (checking
//!    the active chain for cycles).
//! 3. Try the tiers in order, stopping at the first with candidates:
//!    explicit, implicit internal, implicit external, framework, parent.
//! 4. Within a tier, pick with [`most_specific_or_fail`].
//! 5. With no candidate at all: `Null` for nullable types, `Missing` for
//!    optional requests, otherwise a missing-binding error.
//! 6. Resolve the chosen node's dependencies the same way, threading the same
//!    [`ResolutionChain`].
//!
//! ## Cycles
//!
//! Before a declaration becomes a node, the chain is searched for a node of
//! the same declaration and type. A hit is a legal cycle when the slice of
//! the chain from the hit to the top contains a provider (or any
//! function-typed node), since the recursive dependency is only evaluated
//! when the function is invoked. Otherwise it is a circular-dependency
//! error.

use crate::callable::{CallContext, CallableRef, CallableWithReceiver, MapKey, ValueParameter};
use crate::classifiers::{ClassifierFlags, ClassifierStore};
use crate::collections::CollectionMerger;
use crate::diagnostics::{ChainLink, ResolutionError};
use crate::expand::{Contributions, expand_contributions};
use crate::format::TypeFormatter;
use crate::graph::{
    BindingKind, BindingNode, BindingPlan, BindingRequest, InterceptorNode, NodeId, PlanRoot, ScopeId,
    ScopeSummary, Tier,
};
use crate::index::DeclarationIndex;
use crate::options::ResolverOptions;
use crate::post_process;
use crate::recursion::{DepthCounter, RecursionResult};
use crate::relations::{SubstitutionMap, TypeRelation, count_star_projections, is_star_generalization, substitute};
use crate::scope::{
    Candidate, ResolutionScope, ScopeKind, ScopeSpec, is_in_ancestry, match_declaration, normalize_request_type,
    owner_for_target,
};
use crate::specificity::{Ambiguity, most_specific_or_fail};
use crate::types::{FqName, TypeRef};
use givens_common::limits::NODE_ARENA_INITIAL_CAPACITY;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Stack space kept free before growing onto a new segment.
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each additional stack segment.
const STACK_GROWTH: usize = 1024 * 1024;

// =============================================================================
// ResolutionChain
// =============================================================================

/// The active request chain of one top-level resolution.
///
/// Passed by reference through the recursion and shared across scopes, so a
/// cycle through a provider's dependency scope or a parent scope is seen.
pub struct ResolutionChain {
    nodes: Vec<NodeId>,
    requests: Vec<BindingRequest>,
    depth: DepthCounter,
}

impl ResolutionChain {
    pub fn new(max_depth: u32, max_steps: u32) -> Self {
        Self {
            nodes: Vec::new(),
            requests: Vec::new(),
            depth: DepthCounter::new(max_depth, max_steps),
        }
    }

    /// Requests from the top-level one to the current one.
    pub fn requests(&self) -> &[BindingRequest] {
        &self.requests
    }

    /// Nodes whose dependencies are being resolved, outermost first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    fn links(&self) -> Vec<ChainLink> {
        self.requests.iter().map(ChainLink::from).collect()
    }
}

/// Where the dependencies of a new node come from.
enum DependencySource {
    /// Resolve `dependencies` as requests in this scope.
    Requests(ScopeId),
    /// Instantiate these collection entries directly, in this scope.
    Entries(ScopeId, Arc<[CallableWithReceiver]>),
}

// =============================================================================
// BindingGraph
// =============================================================================

/// Owns the scope tree and the node arena of one build.
pub struct BindingGraph<'a> {
    classifiers: &'a ClassifierStore,
    index: &'a DeclarationIndex,
    options: ResolverOptions,
    scopes: Vec<ResolutionScope>,
    nodes: Vec<BindingNode>,
    resolved: FxHashMap<(ScopeId, TypeRef), NodeId>,
    roots: Vec<PlanRoot>,
}

impl<'a> BindingGraph<'a> {
    pub fn new(classifiers: &'a ClassifierStore, index: &'a DeclarationIndex, options: ResolverOptions) -> Self {
        Self {
            classifiers,
            index,
            options,
            scopes: Vec::new(),
            nodes: Vec::with_capacity(NODE_ARENA_INITIAL_CAPACITY),
            resolved: FxHashMap::default(),
            roots: Vec::new(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn formatter(&self) -> TypeFormatter<'a> {
        TypeFormatter::new(self.classifiers)
    }

    fn relation(&self) -> TypeRelation<'a> {
        TypeRelation::new(self.classifiers)
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ResolutionScope> {
        self.scopes.get(id.index())
    }

    pub fn scopes(&self) -> &[ResolutionScope] {
        &self.scopes
    }

    pub fn node(&self, id: NodeId) -> Option<&BindingNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[BindingNode] {
        &self.nodes
    }

    // =========================================================================
    // Scope construction
    // =========================================================================

    /// Create a scope from raw declarations. Modules among them are expanded
    /// against the index's module descriptors.
    pub fn add_scope(
        &mut self,
        parent: Option<ScopeId>,
        spec: ScopeSpec,
        declarations: Vec<CallableRef>,
    ) -> Result<ScopeId, ResolutionError> {
        let declarations: Vec<Arc<CallableRef>> = declarations.into_iter().map(Arc::new).collect();
        let contributions = expand_contributions(&declarations, self.index)?;
        self.push_scope(parent, spec, contributions)
    }

    /// Create the scope of a component registered in the index.
    pub fn add_component(&mut self, parent: Option<ScopeId>, component: &TypeRef) -> Result<ScopeId, ResolutionError> {
        let index = self.index;
        let Some(descriptor) = index.component(component.classifier) else {
            return Err(ResolutionError::UnknownClassifier {
                classifier: component.classifier,
                origin: self
                    .classifiers
                    .name(component.classifier)
                    .unwrap_or_else(|| FqName::new("<component>")),
            });
        };
        let kind = if parent.is_some() {
            ScopeKind::ChildComponent
        } else {
            ScopeKind::Component
        };
        let spec = ScopeSpec::new(self.formatter().format(component), kind)
            .for_component(component.clone())
            .with_entry_points(descriptor.entry_points.clone());
        let contributions = expand_contributions(&descriptor.declarations, index)?;
        self.push_scope(parent, spec, contributions)
    }

    fn push_scope(
        &mut self,
        parent: Option<ScopeId>,
        spec: ScopeSpec,
        contributions: Contributions,
    ) -> Result<ScopeId, ResolutionError> {
        let id = ScopeId(self.scopes.len() as u32);
        let parent = match parent {
            Some(p) => Some((p, self.scopes.get(p.index()).map(|s| s.depth).unwrap_or(0))),
            None => None,
        };
        let mut scope = ResolutionScope::new(id, parent, spec, contributions, &self.options)?;
        if let Some(parent) = parent.and_then(|(p, _)| self.scopes.get(p.index())) {
            scope.inherit_from(parent);
        }
        trace!(scope = %scope.name, id = id.0, depth = scope.depth, "scope created");
        self.scopes.push(scope);
        Ok(id)
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Resolve one top-level request.
    ///
    /// On error the graph is rolled back to its state before the call: a
    /// failing request leaves no nodes behind.
    pub fn resolve(&mut self, scope: ScopeId, request: BindingRequest) -> Result<NodeId, ResolutionError> {
        debug!(
            scope = %self.scope_name(scope),
            type_ref = %self.formatter().format(&request.type_ref),
            origin = %request.origin,
            "resolve"
        );
        let node_mark = self.nodes.len();
        let scope_mark = self.scopes.len();
        let mut chain = ResolutionChain::new(self.options.max_resolution_depth, self.options.max_resolution_steps);
        match self.resolve_request(scope, &request, &mut chain) {
            Ok(node) => {
                self.roots.push(PlanRoot { scope, request, node });
                Ok(node)
            }
            Err(error) => {
                self.rollback(node_mark, scope_mark);
                Err(error)
            }
        }
    }

    /// Resolve a batch of requests, run the post-processing phase, and return
    /// the plan.
    pub fn resolve_all(
        &mut self,
        scope: ScopeId,
        requests: impl IntoIterator<Item = BindingRequest>,
    ) -> Result<BindingPlan, ResolutionError> {
        for request in requests {
            self.resolve(scope, request)?;
        }
        if self.options.merge_star_projections {
            let merged = post_process::merge_star_projections(&mut self.nodes);
            if merged > 0 {
                debug!(merged, "star-projection merge");
            }
        }
        Ok(self.plan())
    }

    /// Resolve every entry point of a component scope as a batch.
    pub fn resolve_entry_points(&mut self, scope: ScopeId) -> Result<BindingPlan, ResolutionError> {
        let Some(current) = self.scope(scope) else {
            return Ok(self.plan());
        };
        let origin = FqName::new(current.name.as_ref());
        let requests: Vec<BindingRequest> = current
            .entry_points
            .iter()
            .map(|t| BindingRequest::new(t.clone(), origin.clone()))
            .collect();
        self.resolve_all(scope, requests)
    }

    /// Snapshot of the graph for code generation.
    pub fn plan(&self) -> BindingPlan {
        BindingPlan {
            nodes: self.nodes.clone(),
            scopes: self
                .scopes
                .iter()
                .map(|s| ScopeSummary {
                    id: s.id,
                    name: s.name.clone(),
                    parent: s.parent,
                    component: s.component.clone(),
                    call_context: s.call_context,
                    inputs: s.inputs.clone(),
                })
                .collect(),
            roots: self.roots.clone(),
        }
    }

    fn rollback(&mut self, node_mark: usize, scope_mark: usize) {
        self.nodes.truncate(node_mark);
        self.scopes.truncate(scope_mark);
        self.resolved
            .retain(|(scope, _), node| node.index() < node_mark && scope.index() < scope_mark);
    }

    fn scope_name(&self, scope: ScopeId) -> Arc<str> {
        self.scope(scope)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| Arc::from("<unknown scope>"))
    }

    // =========================================================================
    // Request resolution
    // =========================================================================

    fn resolve_request(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        match chain.depth.enter() {
            RecursionResult::Entered => {}
            RecursionResult::IterationExceeded => {
                warn!(
                    type_ref = %self.formatter().format(&request.type_ref),
                    budget = chain.depth.max_steps(),
                    "resolution step budget exceeded"
                );
                let mut links = chain.links();
                links.push(ChainLink::from(request));
                return Err(ResolutionError::StepBudgetExceeded {
                    type_ref: request.type_ref.clone(),
                    budget: chain.depth.max_steps(),
                    chain: links,
                });
            }
            RecursionResult::DepthExceeded | RecursionResult::Cycle => {
                warn!(
                    type_ref = %self.formatter().format(&request.type_ref),
                    depth = chain.depth.depth(),
                    "resolution depth exceeded"
                );
                let mut links = chain.links();
                links.push(ChainLink::from(request));
                return Err(ResolutionError::DepthExceeded {
                    type_ref: request.type_ref.clone(),
                    depth: chain.depth.max_depth(),
                    chain: links,
                });
            }
        }
        chain.requests.push(request.clone());
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.resolve_request_inner(scope, request, chain)
        });
        chain.requests.pop();
        chain.depth.leave();
        result
    }

    fn resolve_request_inner(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let key = normalize_request_type(&self.relation(), &request.type_ref);
        let normalized;
        let request = if key == request.type_ref {
            request
        } else {
            normalized = BindingRequest {
                type_ref: key,
                ..request.clone()
            };
            &normalized
        };
        if let Some(id) = self.lookup(scope, request, chain)? {
            return Ok(id);
        }
        self.unresolved(scope, request, chain)
    }

    /// No candidate anywhere in the chain of scopes.
    fn unresolved(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        chain: &ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let kind = if request.type_ref.nullable {
            BindingKind::Null
        } else if !request.required {
            BindingKind::Missing
        } else {
            return Err(ResolutionError::Missing {
                type_ref: request.type_ref.clone(),
                scope: self.scope_name(scope),
                chain: chain.links(),
            });
        };
        trace!(type_ref = %self.formatter().format(&request.type_ref), kind = kind.name(), "unresolved request");
        // Only `Null` is cached: a later required request for the same
        // non-null type must still fail.
        let key = matches!(kind, BindingKind::Null).then(|| (scope, request.type_ref.clone()));
        let node = BindingNode::new(NodeId(0), request.type_ref.clone(), scope, kind);
        Ok(self.push_node(node, key, scope))
    }

    /// Search the tiers of `scope` and then its parents. `Ok(None)` means no
    /// candidate exists anywhere in the ancestry.
    fn lookup(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        chain: &mut ResolutionChain,
    ) -> Result<Option<NodeId>, ResolutionError> {
        let ty = &request.type_ref;
        if let Some(&id) = self.resolved.get(&(scope, ty.clone())) {
            self.check_cycle_at(id, chain)?;
            return Ok(Some(id));
        }
        let relation = self.relation();
        let Some(current) = self.scopes.get_mut(scope.index()) else {
            return Ok(None);
        };
        let call_context = current.call_context;
        let parent = current.parent;
        let scoped_candidates = current.givens_for_type(ty, &relation, self.index);

        let explicit: Vec<Candidate> = scoped_candidates
            .iter()
            .filter(|c| c.is_explicit() && self.is_visible(scope, c))
            .cloned()
            .collect();
        if let Some(id) = self.try_tier(scope, request, Tier::Explicit, explicit, chain)? {
            return Ok(Some(id));
        }

        for (tier, external) in [(Tier::Internal, false), (Tier::External, true)] {
            let implicit: Vec<Candidate> = self
                .index
                .implicit_bindings_for(ty.classifier)
                .into_iter()
                .filter(|entry| entry.callable.is_external == external)
                .filter_map(|entry| match_declaration(&relation, entry, ty, call_context))
                .filter(|c| self.is_visible(scope, c))
                .collect();
            if let Some(id) = self.try_tier(scope, request, tier, implicit, chain)? {
                return Ok(Some(id));
            }
        }

        let framework = self.framework_candidates(scope, ty, &scoped_candidates)?;
        if let Some(id) = self.try_tier(scope, request, Tier::Framework, framework, chain)? {
            return Ok(Some(id));
        }

        if let Some(parent) = parent {
            if let Some(id) = self.lookup(parent, request, chain)? {
                trace!(
                    tier = Tier::Parent.as_str(),
                    scope = %self.scope_name(scope),
                    node = id.0,
                    "candidate found"
                );
                self.resolved.insert((scope, ty.clone()), id);
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Scoped declarations are only visible below the component they are
    /// pinned to.
    fn is_visible(&self, scope: ScopeId, candidate: &Candidate) -> bool {
        match candidate.target_component() {
            Some(target) => owner_for_target(&self.scopes, scope, target).is_some(),
            None => true,
        }
    }

    fn framework_candidates(
        &mut self,
        scope: ScopeId,
        ty: &TypeRef,
        scoped_candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, ResolutionError> {
        let merger = CollectionMerger::new(self.relation(), self.index, &self.options);
        let mut out = Vec::new();
        for candidate in scoped_candidates.iter().filter(|c| !c.is_explicit()) {
            if let Candidate::Set { type_ref, .. } = candidate {
                if merger.set_elements(&mut self.scopes, scope, type_ref)?.is_none() {
                    continue;
                }
            }
            out.push(candidate.clone());
        }

        let non_null = ty.non_null();
        if self.scopes[scope.index()].component.as_ref() == Some(&non_null) {
            out.push(Candidate::SelfBinding { type_ref: non_null.clone() });
        }
        if let Some((parameters, returns)) = ty.function_parts() {
            let child = self
                .classifiers
                .has_flag(returns.classifier, ClassifierFlags::CHILD_COMPONENT);
            if child && !is_in_ancestry(&self.scopes, scope, returns.classifier) {
                out.push(Candidate::ChildComponent {
                    type_ref: non_null.clone(),
                    parameters: parameters.to_vec(),
                    component: returns.non_null(),
                });
            }
        }
        if ty.is_map() && merger.map_entries(&mut self.scopes, scope, &non_null)?.is_some() {
            out.push(Candidate::Map { type_ref: non_null });
        }
        Ok(out)
    }

    fn try_tier(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        tier: Tier,
        candidates: Vec<Candidate>,
        chain: &mut ResolutionChain,
    ) -> Result<Option<NodeId>, ResolutionError> {
        match most_specific_or_fail(candidates, &request.type_ref, Candidate::raw_type) {
            Ok(None) => Ok(None),
            Ok(Some(candidate)) => {
                trace!(
                    tier = tier.as_str(),
                    scope = %self.scope_name(scope),
                    candidate = %candidate.describe(),
                    "candidate found"
                );
                self.instantiate(scope, request, candidate, chain).map(Some)
            }
            Err(Ambiguity { candidates }) => Err(ResolutionError::Ambiguous {
                type_ref: request.type_ref.clone(),
                tier,
                candidates: candidates.iter().map(Candidate::describe).collect(),
            }),
        }
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    fn instantiate(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        candidate: Candidate,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let key = Some(request.type_ref.clone());
        match candidate {
            Candidate::Given {
                callable,
                declaration,
                receivers,
                assisted,
                declared_in,
                ..
            } => {
                let entry = CallableWithReceiver { callable, receivers };
                self.callable_node(scope, declared_in, key, &entry, &declaration, assisted, chain)
            }
            Candidate::Input {
                index,
                type_ref,
                declared_in,
            } => {
                let owner = declared_in.unwrap_or(scope);
                if let Some(&existing) = self.resolved.get(&(owner, request.type_ref.clone())) {
                    self.resolved.insert((scope, request.type_ref.clone()), existing);
                    return Ok(existing);
                }
                let node = BindingNode::new(NodeId(0), type_ref, owner, BindingKind::Input { index });
                let id = self.push_node(node, key.map(|k| (owner, k)), owner);
                self.resolved.insert((scope, request.type_ref.clone()), id);
                Ok(id)
            }
            Candidate::Object { type_ref } => {
                let node = BindingNode::new(NodeId(0), type_ref, scope, BindingKind::Object);
                Ok(self.push_node(node, key.map(|k| (scope, k)), scope))
            }
            Candidate::SelfBinding { type_ref } => {
                let node = BindingNode::new(NodeId(0), type_ref, scope, BindingKind::SelfBinding);
                Ok(self.push_node(node, key.map(|k| (scope, k)), scope))
            }
            Candidate::FunAlias { callable, type_ref } => {
                if let Some(position) = self.find_in_chain(&callable.fq_name, &type_ref, chain) {
                    return self.revisit(position, chain);
                }
                let mut node = BindingNode::new(
                    NodeId(0),
                    type_ref,
                    scope,
                    BindingKind::Function {
                        callable: callable.clone(),
                    },
                );
                node.origin = Some(callable.fq_name.clone());
                node.callable_kind = callable.callable_kind;
                node.dependencies = dependency_requests(&callable);
                self.build_node(node, key, scope, DependencySource::Requests(scope), chain)
            }
            Candidate::Provider {
                type_ref,
                parameters,
                returns,
            } => self.provider_node(scope, request, type_ref, parameters, returns, chain),
            Candidate::Set { type_ref, .. } => {
                let merger = CollectionMerger::new(self.relation(), self.index, &self.options);
                let elements = merger
                    .set_elements(&mut self.scopes, scope, &type_ref)?
                    .unwrap_or_else(|| Arc::from(Vec::new()));
                let mut node = BindingNode::new(
                    NodeId(0),
                    type_ref,
                    scope,
                    BindingKind::Set {
                        elements: elements.iter().map(|e| e.origin().clone()).collect(),
                    },
                );
                node.dependencies = entry_requests(&elements);
                self.build_node(node, key, scope, DependencySource::Entries(scope, elements), chain)
            }
            Candidate::Map { type_ref } => {
                let merger = CollectionMerger::new(self.relation(), self.index, &self.options);
                let entries = merger
                    .map_entries(&mut self.scopes, scope, &type_ref)?
                    .unwrap_or_else(|| Arc::from(Vec::new()));
                let keys: Vec<MapKey> = entries
                    .iter()
                    .filter_map(|e| e.callable.map_key.clone())
                    .collect();
                let mut node = BindingNode::new(NodeId(0), type_ref, scope, BindingKind::Map { keys });
                node.dependencies = entry_requests(&entries);
                self.build_node(node, key, scope, DependencySource::Entries(scope, entries), chain)
            }
            Candidate::ChildComponent {
                type_ref,
                parameters,
                component,
            } => self.child_component_node(scope, request, type_ref, parameters, component, chain),
        }
    }

    /// A node invoking a declaration. Relocates scoped declarations to the
    /// scope of their component, and inherited ones to the scope that
    /// declared them.
    fn callable_node(
        &mut self,
        scope: ScopeId,
        declared_in: Option<ScopeId>,
        key: Option<TypeRef>,
        entry: &CallableWithReceiver,
        declaration: &CallableRef,
        assisted: bool,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let callable = &entry.callable;
        let node_type = match (&key, assisted) {
            (Some(requested), true) => requested.clone(),
            _ => callable.type_ref.clone(),
        };
        if let Some(position) = self.find_in_chain(&callable.fq_name, &node_type, chain) {
            return self.revisit(position, chain);
        }

        let declaring = declared_in.unwrap_or(scope);
        let owner = match &callable.target_component {
            Some(target) => owner_for_target(&self.scopes, scope, target).unwrap_or(declaring),
            None => declaring,
        };
        if owner != scope {
            if let Some(requested) = &key {
                if let Some(&existing) = self.resolved.get(&(owner, requested.clone())) {
                    self.check_cycle_at(existing, chain)?;
                    self.resolved.insert((scope, requested.clone()), existing);
                    return Ok(existing);
                }
            }
            debug!(
                origin = %callable.fq_name,
                from = %self.scope_name(scope),
                to = %self.scope_name(owner),
                "relocated scoped binding"
            );
        }

        let assisted_parameters: Vec<usize> = if assisted {
            callable
                .value_parameters
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_assisted)
                .map(|(i, _)| i)
                .collect()
        } else {
            Vec::new()
        };
        let mut node = BindingNode::new(
            NodeId(0),
            node_type.clone(),
            owner,
            BindingKind::Callable {
                callable: callable.clone(),
                receivers: entry.receivers.clone(),
                assisted_parameters,
            },
        );
        node.raw_type = if assisted {
            node_type
        } else {
            declaration.type_ref.clone()
        };
        node.origin = Some(callable.fq_name.clone());
        node.target_component = callable.target_component.clone();
        node.scoped = callable.target_component.is_some();
        node.eager = callable.eager;
        node.callable_kind = callable.callable_kind;
        node.is_external = callable.is_external;
        node.dependencies = dependency_requests(callable);

        let id = self.build_node_at(node, key, scope, owner, DependencySource::Requests(owner), chain)?;
        if !assisted {
            self.refine_type(id, declaration);
        }
        self.attach_interceptors(id, owner, chain)?;
        Ok(id)
    }

    fn provider_node(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        type_ref: TypeRef,
        parameters: Vec<TypeRef>,
        returns: TypeRef,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let call_context = CallContext::of_function_type(&type_ref);
        let name = format!("{}/{}", self.scope_name(scope), self.formatter().format(&type_ref));
        let spec = ScopeSpec::new(name, ScopeKind::Provider)
            .with_inputs(parameters.clone())
            .with_call_context(call_context);
        let dependency_scope = self.push_scope(Some(scope), spec, Contributions::default())?;
        let mut node = BindingNode::new(
            NodeId(0),
            type_ref,
            scope,
            BindingKind::Provider {
                dependency_scope,
                parameters,
                call_context,
            },
        );
        node.dependencies = vec![BindingRequest {
            type_ref: returns,
            origin: request.origin.clone(),
            required: true,
            lazy: true,
        }];
        self.build_node(
            node,
            Some(request.type_ref.clone()),
            scope,
            DependencySource::Requests(dependency_scope),
            chain,
        )
    }

    fn child_component_node(
        &mut self,
        scope: ScopeId,
        request: &BindingRequest,
        type_ref: TypeRef,
        parameters: Vec<TypeRef>,
        component: TypeRef,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let index = self.index;
        let Some(descriptor) = index.component(component.classifier) else {
            return Err(ResolutionError::UnknownClassifier {
                classifier: component.classifier,
                origin: request.origin.clone(),
            });
        };
        let spec = ScopeSpec::new(self.formatter().format(&component), ScopeKind::ChildComponent)
            .for_component(component.clone())
            .with_inputs(parameters.clone())
            .with_entry_points(descriptor.entry_points.clone());
        let contributions = expand_contributions(&descriptor.declarations, index)?;
        let child_scope = self.push_scope(Some(scope), spec, contributions)?;
        let origin = self
            .classifiers
            .name(component.classifier)
            .unwrap_or_else(|| request.origin.clone());
        let mut node = BindingNode::new(
            NodeId(0),
            type_ref,
            scope,
            BindingKind::ChildComponent {
                child_scope,
                parameters,
            },
        );
        node.origin = Some(origin.clone());
        node.dependencies = descriptor
            .entry_points
            .iter()
            .map(|t| BindingRequest::new(t.clone(), origin.clone()))
            .collect();
        self.build_node(
            node,
            Some(request.type_ref.clone()),
            scope,
            DependencySource::Requests(child_scope),
            chain,
        )
    }

    fn build_node(
        &mut self,
        node: BindingNode,
        key: Option<TypeRef>,
        scope: ScopeId,
        dependencies: DependencySource,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let owner = node.owner;
        self.build_node_at(node, key, scope, owner, dependencies, chain)
    }

    /// Push `node`, cache it under `key` for both the requesting scope and
    /// the owner, then resolve its dependencies with the node on the chain.
    fn build_node_at(
        &mut self,
        node: BindingNode,
        key: Option<TypeRef>,
        scope: ScopeId,
        owner: ScopeId,
        dependencies: DependencySource,
        chain: &mut ResolutionChain,
    ) -> Result<NodeId, ResolutionError> {
        let id = self.push_node(node, key.clone().map(|k| (owner, k)), owner);
        if let Some(key) = key {
            if scope != owner {
                self.resolved.insert((scope, key), id);
            }
        }

        chain.nodes.push(id);
        let resolved = match dependencies {
            DependencySource::Requests(dependency_scope) => {
                let requests = self.nodes[id.index()].dependencies.clone();
                self.resolve_all_requests(dependency_scope, &requests, chain)
            }
            DependencySource::Entries(entry_scope, entries) => self.instantiate_entries(entry_scope, &entries, chain),
        };
        chain.nodes.pop();
        self.nodes[id.index()].resolved_dependencies = resolved?;
        Ok(id)
    }

    fn resolve_all_requests(
        &mut self,
        scope: ScopeId,
        requests: &[BindingRequest],
        chain: &mut ResolutionChain,
    ) -> Result<Vec<NodeId>, ResolutionError> {
        requests
            .iter()
            .map(|request| self.resolve_request(scope, request, chain))
            .collect()
    }

    fn instantiate_entries(
        &mut self,
        scope: ScopeId,
        entries: &[CallableWithReceiver],
        chain: &mut ResolutionChain,
    ) -> Result<Vec<NodeId>, ResolutionError> {
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let declaration = entry.callable.clone();
            ids.push(self.callable_node(scope, None, None, entry, &declaration, false, chain)?);
        }
        Ok(ids)
    }

    fn push_node(&mut self, mut node: BindingNode, key: Option<(ScopeId, TypeRef)>, owner: ScopeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.id = id;
        node.owner = owner;
        self.nodes.push(node);
        if let Some(key) = key {
            self.resolved.insert(key, id);
        }
        id
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Position in the chain of a node for the same declaration and type.
    fn find_in_chain(&self, origin: &FqName, ty: &TypeRef, chain: &ResolutionChain) -> Option<usize> {
        chain.nodes.iter().position(|id| {
            let node = &self.nodes[id.index()];
            node.origin.as_ref() == Some(origin) && node.type_ref == *ty
        })
    }

    fn check_cycle_at(&self, id: NodeId, chain: &ResolutionChain) -> Result<(), ResolutionError> {
        match chain.nodes.iter().position(|n| *n == id) {
            Some(position) => self.revisit(position, chain).map(|_| ()),
            None => Ok(()),
        }
    }

    /// The node at `position` is being requested again. Legal when the chain
    /// from there to the top contains a cycle-breaking node.
    fn revisit(&self, position: usize, chain: &ResolutionChain) -> Result<NodeId, ResolutionError> {
        let cycle = &chain.nodes[position..];
        let repeated = cycle[0];
        if cycle.iter().any(|id| self.nodes[id.index()].breaks_cycles()) {
            debug!(
                node = repeated.0,
                length = cycle.len(),
                "cycle broken by provider"
            );
            return Ok(repeated);
        }
        let mut links: Vec<ChainLink> = cycle.iter().map(|id| self.link_for(*id)).collect();
        links.push(self.link_for(repeated));
        Err(ResolutionError::Circular { cycle: links })
    }

    fn link_for(&self, id: NodeId) -> ChainLink {
        let node = &self.nodes[id.index()];
        ChainLink {
            type_ref: node.type_ref.clone(),
            origin: node
                .origin
                .clone()
                .unwrap_or_else(|| FqName::new(format!("<{}>", node.kind.name()))),
        }
    }

    // =========================================================================
    // Refinement and interceptors
    // =========================================================================

    /// Narrow a star-projected callable node from the types its dependencies
    /// actually resolved to.
    fn refine_type(&mut self, id: NodeId, declaration: &CallableRef) {
        let current = &self.nodes[id.index()];
        let before = count_star_projections(&current.type_ref);
        if before == 0 {
            return;
        }
        let relation = self.relation();
        let mut map = SubstitutionMap::default();
        let parameters = declaration.value_parameters.iter().filter(|p| !p.is_assisted);
        for (parameter, dependency) in parameters.zip(&current.resolved_dependencies) {
            let resolved = &self.nodes[dependency.index()].type_ref;
            if let Some(bindings) = relation.try_unify(resolved, &parameter.type_ref) {
                for (type_parameter, value) in bindings {
                    map.entry(type_parameter).or_insert(value);
                }
            }
        }
        if map.is_empty() {
            return;
        }
        let refined = relation.erase_type_parameters(&substitute(&declaration.type_ref, &map));
        let refined = TypeRef {
            qualifiers: current.type_ref.qualifiers.clone(),
            nullable: current.type_ref.nullable,
            ..refined
        };
        if count_star_projections(&refined) < before && is_star_generalization(&current.type_ref, &refined) {
            debug!(
                node = id.0,
                from = %self.formatter().format(&current.type_ref),
                to = %self.formatter().format(&refined),
                "refined star-projected type"
            );
            self.nodes[id.index()].type_ref = refined;
        }
    }

    fn attach_interceptors(&mut self, id: NodeId, owner: ScopeId, chain: &mut ResolutionChain) -> Result<(), ResolutionError> {
        let node_type = self.nodes[id.index()].type_ref.clone();
        let merger = CollectionMerger::new(self.relation(), self.index, &self.options);
        let interceptors = merger.interceptors(&mut self.scopes, owner, &node_type);
        if interceptors.is_empty() {
            return Ok(());
        }
        let mut attached = Vec::with_capacity(interceptors.len());
        for interceptor in interceptors.iter() {
            let callable = &interceptor.callable;
            let factory_parameter = callable
                .value_parameters
                .iter()
                .position(|p| p.type_ref.function_parts().is_some_and(|(_, r)| r.non_null() == node_type.non_null()))
                .unwrap_or(0);
            let dependencies: Vec<BindingRequest> = callable
                .value_parameters
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != factory_parameter)
                .map(|(_, p)| parameter_request(callable, p))
                .collect();
            chain.nodes.push(id);
            let resolved = self.resolve_all_requests(owner, &dependencies, chain);
            chain.nodes.pop();
            attached.push(InterceptorNode {
                callable: callable.clone(),
                receivers: interceptor.receivers.clone(),
                factory_parameter,
                dependencies,
                resolved_dependencies: resolved?,
            });
        }
        trace!(node = id.0, interceptors = attached.len(), "interceptors attached");
        self.nodes[id.index()].interceptors = attached;
        Ok(())
    }
}

fn parameter_request(callable: &CallableRef, parameter: &ValueParameter) -> BindingRequest {
    BindingRequest {
        type_ref: parameter.type_ref.clone(),
        origin: callable.fq_name.child(&parameter.name),
        required: !parameter.has_default,
        lazy: false,
    }
}

/// Requests for the non-assisted parameters of `callable`.
fn dependency_requests(callable: &CallableRef) -> Vec<BindingRequest> {
    callable
        .value_parameters
        .iter()
        .filter(|p| !p.is_assisted)
        .map(|p| parameter_request(callable, p))
        .collect()
}

/// One presentation request per collection entry.
fn entry_requests(entries: &[CallableWithReceiver]) -> Vec<BindingRequest> {
    entries
        .iter()
        .map(|e| BindingRequest::new(e.callable.type_ref.clone(), e.origin().clone()))
        .collect()
}

#[cfg(test)]
#[path = "../tests/resolver_tests.rs"]
mod tests;
