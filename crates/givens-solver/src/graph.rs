//! The resolved binding graph.
//!
//! Nodes live in an arena owned by `BindingGraph` and refer to each other by
//! [`NodeId`]. Every dependency request of a node has a matching entry in
//! `resolved_dependencies` once the node is complete, which is all a code
//! generator needs to emit construction code without repeating any
//! resolution decision.

use crate::callable::{CallContext, CallableKind, CallableRef, MapKey};
use crate::types::{FqName, TypeRef};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Index of a node in the graph arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Index of a scope in the scope tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What is wanted at a call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BindingRequest {
    pub type_ref: TypeRef,
    /// Whose parameter this request satisfies.
    pub origin: FqName,
    /// `false` when the request may stay unresolved (parameter with a
    /// default value).
    pub required: bool,
    /// Resolved behind a provider and evaluated on demand.
    pub lazy: bool,
}

impl BindingRequest {
    pub fn new(type_ref: TypeRef, origin: impl Into<FqName>) -> Self {
        Self {
            type_ref,
            origin: origin.into(),
            required: true,
            lazy: false,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.lazy = true;
        self
    }
}

/// The candidate search tiers, in the order they are tried.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Tier {
    Explicit,
    Internal,
    External,
    Framework,
    Parent,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Explicit => "explicit",
            Tier::Internal => "internal",
            Tier::External => "external",
            Tier::Framework => "framework",
            Tier::Parent => "parent",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An interceptor attached to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterceptorNode {
    pub callable: Arc<CallableRef>,
    pub receivers: Vec<FqName>,
    /// Parameter receiving the wrapped factory.
    pub factory_parameter: usize,
    pub dependencies: Vec<BindingRequest>,
    pub resolved_dependencies: Vec<NodeId>,
}

/// Variant-specific data of a [`BindingNode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum BindingKind {
    /// Invoke a declaration. Assisted parameters (by index) are supplied by
    /// the caller of the assisted factory; the rest are `dependencies`.
    Callable {
        callable: Arc<CallableRef>,
        receivers: Vec<FqName>,
        assisted_parameters: Vec<usize>,
    },
    /// Invoke the callable behind a function alias.
    Function { callable: Arc<CallableRef> },
    /// The component being built.
    SelfBinding,
    /// A singleton object.
    Object,
    /// Parameter `index` of the scope's factory or provider.
    Input { index: usize },
    /// A function returning the single dependency, resolved in
    /// `dependency_scope` where `parameters` are inputs.
    Provider {
        dependency_scope: ScopeId,
        parameters: Vec<TypeRef>,
        call_context: CallContext,
    },
    /// One entry per resolved dependency, in merge order.
    Map { keys: Vec<MapKey> },
    /// One element per resolved dependency, in merge order.
    Set { elements: Vec<FqName> },
    /// A factory for `child_scope`; dependencies are its entry points.
    ChildComponent { child_scope: ScopeId, parameters: Vec<TypeRef> },
    /// Same instance as `target`.
    Delegate { target: NodeId },
    /// Unresolved request for a nullable type.
    Null,
    /// Unresolved optional request.
    Missing,
}

impl BindingKind {
    pub fn name(&self) -> &'static str {
        match self {
            BindingKind::Callable { .. } => "callable",
            BindingKind::Function { .. } => "function",
            BindingKind::SelfBinding => "self",
            BindingKind::Object => "object",
            BindingKind::Input { .. } => "input",
            BindingKind::Provider { .. } => "provider",
            BindingKind::Map { .. } => "map",
            BindingKind::Set { .. } => "set",
            BindingKind::ChildComponent { .. } => "child_component",
            BindingKind::Delegate { .. } => "delegate",
            BindingKind::Null => "null",
            BindingKind::Missing => "missing",
        }
    }
}

/// The resolved answer to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BindingNode {
    pub id: NodeId,
    /// Produced type after substitution and refinement.
    pub type_ref: TypeRef,
    /// Declared type before substitution.
    pub raw_type: TypeRef,
    /// Scope that constructs (and for scoped nodes caches) the value.
    pub owner: ScopeId,
    pub origin: Option<FqName>,
    pub target_component: Option<TypeRef>,
    pub scoped: bool,
    pub eager: bool,
    pub callable_kind: CallableKind,
    pub is_external: bool,
    pub dependencies: Vec<BindingRequest>,
    pub resolved_dependencies: Vec<NodeId>,
    pub interceptors: Vec<InterceptorNode>,
    pub kind: BindingKind,
}

impl BindingNode {
    pub(crate) fn new(id: NodeId, type_ref: TypeRef, owner: ScopeId, kind: BindingKind) -> Self {
        Self {
            id,
            raw_type: type_ref.clone(),
            type_ref,
            owner,
            origin: None,
            target_component: None,
            scoped: false,
            eager: false,
            callable_kind: CallableKind::Default,
            is_external: false,
            dependencies: Vec::new(),
            resolved_dependencies: Vec::new(),
            interceptors: Vec::new(),
            kind,
        }
    }

    /// Whether a cycle passing through this node is deferred to invocation
    /// time.
    pub fn breaks_cycles(&self) -> bool {
        matches!(self.kind, BindingKind::Provider { .. }) || self.type_ref.is_function_type()
    }

    pub fn is_provider(&self) -> bool {
        matches!(self.kind, BindingKind::Provider { .. })
    }
}

// =============================================================================
// Plan
// =============================================================================

/// Scope data a generator or interpreter needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScopeSummary {
    pub id: ScopeId,
    pub name: Arc<str>,
    pub parent: Option<ScopeId>,
    pub component: Option<TypeRef>,
    pub call_context: CallContext,
    pub inputs: Vec<TypeRef>,
}

/// A top-level request and the node that answers it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanRoot {
    pub scope: ScopeId,
    pub request: BindingRequest,
    pub node: NodeId,
}

/// The complete output of a graph build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BindingPlan {
    pub nodes: Vec<BindingNode>,
    pub scopes: Vec<ScopeSummary>,
    pub roots: Vec<PlanRoot>,
}

impl BindingPlan {
    pub fn node(&self, id: NodeId) -> Option<&BindingNode> {
        self.nodes.get(id.index())
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeSummary> {
        self.scopes.get(id.index())
    }

    /// Follow `Delegate` links to the node that actually produces the value.
    pub fn canonical(&self, mut id: NodeId) -> NodeId {
        for _ in 0..self.nodes.len() {
            match self.node(id).map(|n| &n.kind) {
                Some(BindingKind::Delegate { target }) => id = *target,
                _ => break,
            }
        }
        id
    }

    /// Eager nodes owned by `scope`, in creation order.
    pub fn eager_nodes(&self, scope: ScopeId) -> impl Iterator<Item = &BindingNode> {
        self.nodes
            .iter()
            .filter(move |n| n.eager && n.owner == scope && !matches!(n.kind, BindingKind::Delegate { .. }))
    }

    pub fn root_for(&self, scope: ScopeId, ty: &TypeRef) -> Option<NodeId> {
        self.roots
            .iter()
            .find(|r| r.scope == scope && r.request.type_ref == *ty)
            .map(|r| r.node)
    }
}
