//! Binding declarations.
//!
//! A [`CallableRef`] is one way to produce a value: a constructor, a
//! function, a property, or an object. The front-end tags each declaration
//! with a [`ContributionKind`] when it builds the declaration list, so the
//! resolver never inspects annotations itself.

use crate::relations::{SubstitutionMap, substitute};
use crate::types::{ClassifierId, FqName, TypeRef};
use serde::Serialize;
use std::sync::Arc;

/// Role of a declaration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ContributionKind {
    /// A plain binding for its type.
    #[default]
    Binding,
    /// An entry of `Map<K, V>`; the key is in [`CallableRef::map_key`].
    MapEntry,
    /// An element of `Set<T>`.
    SetElement,
    /// A module whose declarations are expanded into the enclosing scope.
    Module,
    /// Wraps bindings of the type it intercepts.
    Interceptor,
    /// Declares that a `Set` or `Map` type exists, even without elements.
    Multibinds,
    /// Not a contribution; ignored by scope construction.
    None,
}

/// How a callable must be invoked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CallableKind {
    #[default]
    Default,
    Suspend,
    Composable,
}

/// What a scope is allowed to call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CallContext {
    #[default]
    Default,
    Suspend,
    Composable,
}

impl CallContext {
    /// Default callables can be called from anywhere; suspend and composable
    /// callables only from a matching context.
    pub fn can_call(self, kind: CallableKind) -> bool {
        match kind {
            CallableKind::Default => true,
            CallableKind::Suspend => self == CallContext::Suspend,
            CallableKind::Composable => self == CallContext::Composable,
        }
    }

    /// The context a function type's body runs in.
    pub fn of_function_type(ty: &TypeRef) -> Self {
        match ty.classifier {
            ClassifierId::SUSPEND_FUNCTION => CallContext::Suspend,
            ClassifierId::COMPOSABLE_FUNCTION => CallContext::Composable,
            _ => CallContext::Default,
        }
    }
}

/// What happens when a declaration collides with an earlier one for the same
/// key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DuplicatePolicy {
    /// Report a duplicate.
    #[default]
    Fail,
    /// The later declaration replaces the earlier one.
    Override,
    /// The later declaration is discarded.
    Drop,
}

/// A parameter of a callable. Each non-assisted parameter becomes a
/// dependency request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ValueParameter {
    pub name: Arc<str>,
    pub type_ref: TypeRef,
    /// Supplied by the caller of an assisted factory instead of resolved.
    pub is_assisted: bool,
    /// The parameter has a default value, so resolving it is optional.
    pub has_default: bool,
}

/// The explicit key of a map entry: a key type and the rendered key value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MapKey {
    pub type_ref: TypeRef,
    pub value: Arc<str>,
}

impl MapKey {
    pub fn new(type_ref: TypeRef, value: impl Into<Arc<str>>) -> Self {
        Self {
            type_ref,
            value: value.into(),
        }
    }
}

// =============================================================================
// CallableRef
// =============================================================================

/// One way to produce a value.
///
/// Parameter types may reference the declaration's own `type_parameters`;
/// [`substitute`](Self::substitute) rewrites the produced type, every
/// parameter type and the target component together.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CallableRef {
    pub fq_name: FqName,
    pub type_ref: TypeRef,
    pub value_parameters: Vec<ValueParameter>,
    pub type_parameters: Vec<ClassifierId>,
    pub contribution_kind: ContributionKind,
    /// The component this binding is scoped to, or `None` for unscoped.
    pub target_component: Option<TypeRef>,
    pub is_external: bool,
    pub eager: bool,
    pub callable_kind: CallableKind,
    pub duplicate_policy: DuplicatePolicy,
    pub map_key: Option<MapKey>,
}

impl CallableRef {
    pub fn new(fq_name: impl Into<FqName>, type_ref: TypeRef) -> Self {
        Self {
            fq_name: fq_name.into(),
            type_ref,
            value_parameters: Vec::new(),
            type_parameters: Vec::new(),
            contribution_kind: ContributionKind::Binding,
            target_component: None,
            is_external: false,
            eager: false,
            callable_kind: CallableKind::Default,
            duplicate_policy: DuplicatePolicy::Fail,
            map_key: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.value_parameters.push(ValueParameter {
            name: name.into(),
            type_ref,
            is_assisted: false,
            has_default: false,
        });
        self
    }

    #[must_use]
    pub fn with_default_parameter(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.value_parameters.push(ValueParameter {
            name: name.into(),
            type_ref,
            is_assisted: false,
            has_default: true,
        });
        self
    }

    #[must_use]
    pub fn with_assisted_parameter(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.value_parameters.push(ValueParameter {
            name: name.into(),
            type_ref,
            is_assisted: true,
            has_default: false,
        });
        self
    }

    #[must_use]
    pub fn with_type_parameters(mut self, type_parameters: Vec<ClassifierId>) -> Self {
        self.type_parameters = type_parameters;
        self
    }

    #[must_use]
    pub fn contributing(mut self, kind: ContributionKind) -> Self {
        self.contribution_kind = kind;
        self
    }

    #[must_use]
    pub fn scoped_to(mut self, component: TypeRef) -> Self {
        self.target_component = Some(component);
        self
    }

    #[must_use]
    pub fn external(mut self) -> Self {
        self.is_external = true;
        self
    }

    #[must_use]
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    #[must_use]
    pub fn with_callable_kind(mut self, kind: CallableKind) -> Self {
        self.callable_kind = kind;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn with_map_key(mut self, key: MapKey) -> Self {
        self.contribution_kind = ContributionKind::MapEntry;
        self.map_key = Some(key);
        self
    }

    pub fn has_assisted_parameters(&self) -> bool {
        self.value_parameters.iter().any(|p| p.is_assisted)
    }

    pub fn assisted_parameters(&self) -> impl Iterator<Item = &ValueParameter> {
        self.value_parameters.iter().filter(|p| p.is_assisted)
    }

    /// A copy with `map` applied to every type the declaration mentions.
    /// Type parameters bound by `map` are dropped from `type_parameters`.
    pub fn substitute(&self, map: &SubstitutionMap) -> CallableRef {
        if map.is_empty() {
            return self.clone();
        }
        CallableRef {
            type_ref: substitute(&self.type_ref, map),
            value_parameters: self
                .value_parameters
                .iter()
                .map(|p| ValueParameter {
                    type_ref: substitute(&p.type_ref, map),
                    ..p.clone()
                })
                .collect(),
            type_parameters: self
                .type_parameters
                .iter()
                .copied()
                .filter(|t| !map.contains_key(t))
                .collect(),
            target_component: self.target_component.as_ref().map(|t| substitute(t, map)),
            map_key: self.map_key.as_ref().map(|k| MapKey {
                type_ref: substitute(&k.type_ref, map),
                value: k.value.clone(),
            }),
            ..self.clone()
        }
    }
}

/// A declaration together with the chain of modules it was reached through.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CallableWithReceiver {
    pub callable: Arc<CallableRef>,
    /// Outermost module first. Empty for top-level declarations.
    pub receivers: Vec<FqName>,
}

impl CallableWithReceiver {
    pub fn top_level(callable: Arc<CallableRef>) -> Self {
        Self {
            callable,
            receivers: Vec::new(),
        }
    }

    pub fn origin(&self) -> &FqName {
        &self.callable.fq_name
    }
}
