//! Plan interpreter.
//!
//! A [`ScopeInstance`] is one live instance of a plan scope. Nodes are
//! evaluated in the instance of the scope that owns them, found by walking
//! up the parent chain:
//!
//! - scoped nodes are memoized in the owner's [`ScopedSlot`];
//! - unscoped nodes are recomputed on every request;
//! - providers and child component factories yield [`Function`] values that
//!   build a nested instance when invoked;
//! - eager nodes are initialized while their instance is built, and a
//!   failure aborts the build.

use crate::error::RuntimeError;
use crate::factory::{Absent, FactoryTable, Function, Instance, instance};
use crate::slot::ScopedSlot;
use dashmap::DashMap;
use givens_solver::{BindingKind, BindingNode, BindingPlan, InterceptorNode, NodeId, ScopeId, TypeFormatter, TypeRef};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, trace};

struct RuntimeInner {
    plan: BindingPlan,
    factories: FactoryTable,
}

/// A plan paired with the factories that implement its declarations.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new(plan: BindingPlan, factories: FactoryTable) -> Self {
        Self {
            inner: Arc::new(RuntimeInner { plan, factories }),
        }
    }

    pub fn plan(&self) -> &BindingPlan {
        &self.inner.plan
    }

    pub fn factories(&self) -> &FactoryTable {
        &self.inner.factories
    }

    /// Build a root instance of `scope`. Its entry points are the plan roots
    /// requested in that scope.
    pub fn instantiate(&self, scope: ScopeId, inputs: Vec<Instance>) -> Result<Arc<ScopeInstance>, RuntimeError> {
        let entry_points = self
            .plan()
            .roots
            .iter()
            .filter(|root| root.scope == scope)
            .map(|root| (root.request.type_ref.clone(), root.node))
            .collect();
        ScopeInstance::build(self.clone(), scope, None, inputs, entry_points)
    }
}

/// One live instance of a plan scope.
pub struct ScopeInstance {
    runtime: Runtime,
    scope: ScopeId,
    parent: Option<Arc<ScopeInstance>>,
    inputs: Vec<Instance>,
    entry_points: Vec<(TypeRef, NodeId)>,
    slots: DashMap<NodeId, Arc<ScopedSlot>>,
}

impl ScopeInstance {
    fn build(
        runtime: Runtime,
        scope: ScopeId,
        parent: Option<Arc<ScopeInstance>>,
        inputs: Vec<Instance>,
        entry_points: Vec<(TypeRef, NodeId)>,
    ) -> Result<Arc<Self>, RuntimeError> {
        let instance = Arc::new(Self {
            runtime,
            scope,
            parent,
            inputs,
            entry_points,
            slots: DashMap::new(),
        });
        let eager: Vec<NodeId> = instance.runtime.plan().eager_nodes(scope).map(|n| n.id).collect();
        debug!(scope = scope.0, eager = eager.len(), "scope instance created");
        for node in eager {
            instance.node(node).map_err(|source| RuntimeError::EagerInit {
                node,
                source: Box::new(source),
            })?;
        }
        Ok(instance)
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn parent(&self) -> Option<&Arc<ScopeInstance>> {
        self.parent.as_ref()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Value of the entry point requested for `type_ref`.
    pub fn get(self: &Arc<Self>, type_ref: &TypeRef) -> Result<Instance, RuntimeError> {
        let Some(&(_, node)) = self.entry_points.iter().find(|(t, _)| t == type_ref) else {
            return Err(self.missing(format!(
                "Entry point '{}'",
                TypeFormatter::plain().format(type_ref)
            )));
        };
        self.node(node)
    }

    /// Whether the scoped node `id` has been initialized in this instance.
    pub fn is_initialized(&self, id: NodeId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.is_initialized())
    }

    /// Evaluate node `id` in the instance owning it.
    pub fn node(self: &Arc<Self>, id: NodeId) -> Result<Instance, RuntimeError> {
        let Some(node) = self.runtime.plan().node(id) else {
            return Err(self.missing(format!("Node #{}", id.0)));
        };
        let Some(owner) = self.instance_for(node.owner) else {
            return Err(self.missing(format!("Scope #{} of node #{}", node.owner.0, id.0)));
        };
        if !node.scoped {
            return owner.compute(node);
        }
        // Clone the slot out so the map shard is not held during computation.
        let slot = Arc::clone(owner.slots.entry(id).or_default().value());
        slot.get_or_try_init(|| {
            trace!(node = id.0, scope = owner.scope.0, "initializing scoped node");
            owner.compute(node)
        })
    }

    fn instance_for(self: &Arc<Self>, scope: ScopeId) -> Option<Arc<ScopeInstance>> {
        let mut current = Some(self);
        while let Some(instance) = current {
            if instance.scope == scope {
                return Some(Arc::clone(instance));
            }
            current = instance.parent.as_ref();
        }
        None
    }

    fn missing(&self, what: String) -> RuntimeError {
        let scope = self
            .runtime
            .plan()
            .scope(self.scope)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| Arc::from("<unknown scope>"));
        RuntimeError::MissingBinding { what, scope }
    }

    fn nodes(self: &Arc<Self>, ids: &[NodeId]) -> Result<Vec<Instance>, RuntimeError> {
        ids.iter().map(|id| self.node(*id)).collect()
    }

    fn compute(self: &Arc<Self>, node: &BindingNode) -> Result<Instance, RuntimeError> {
        match &node.kind {
            BindingKind::Callable {
                callable,
                assisted_parameters,
                ..
            } => {
                if !assisted_parameters.is_empty() {
                    return Ok(instance(self.assisted_factory(node.id, assisted_parameters.len())));
                }
                if node.interceptors.is_empty() {
                    let args = self.nodes(&node.resolved_dependencies)?;
                    return self.runtime.factories().call(&callable.fq_name, &args);
                }
                self.intercepted(node)
            }
            BindingKind::Function { callable } => {
                let owner = Arc::clone(self);
                let origin = callable.fq_name.clone();
                let dependencies = node.resolved_dependencies.clone();
                Ok(instance(Function::new(0, move |_| {
                    let args = owner.nodes(&dependencies)?;
                    owner.runtime.factories().call(&origin, &args)
                })))
            }
            BindingKind::SelfBinding => Ok(Arc::clone(self) as Instance),
            BindingKind::Object => match self.runtime.factories().object_instance(&node.type_ref) {
                Some(value) => Ok(value.clone()),
                None => Err(self.missing(format!(
                    "Object '{}'",
                    TypeFormatter::plain().format(&node.type_ref)
                ))),
            },
            BindingKind::Input { index } => match self.inputs.get(*index) {
                Some(value) => Ok(value.clone()),
                None => Err(self.missing(format!("Input {index}"))),
            },
            BindingKind::Provider {
                dependency_scope,
                parameters,
                ..
            } => {
                let owner = Arc::clone(self);
                let dependency_scope = *dependency_scope;
                let Some(&target) = node.resolved_dependencies.first() else {
                    return Err(self.missing(format!("Provided value of node #{}", node.id.0)));
                };
                Ok(instance(Function::new(parameters.len(), move |args| {
                    let nested = ScopeInstance::build(
                        owner.runtime.clone(),
                        dependency_scope,
                        Some(Arc::clone(&owner)),
                        args.to_vec(),
                        Vec::new(),
                    )?;
                    nested.node(target)
                })))
            }
            BindingKind::ChildComponent {
                child_scope,
                parameters,
            } => {
                let owner = Arc::clone(self);
                let child_scope = *child_scope;
                let entry_points: Vec<(TypeRef, NodeId)> = node
                    .dependencies
                    .iter()
                    .map(|request| request.type_ref.clone())
                    .zip(node.resolved_dependencies.iter().copied())
                    .collect();
                Ok(instance(Function::new(parameters.len(), move |args| {
                    let child = ScopeInstance::build(
                        owner.runtime.clone(),
                        child_scope,
                        Some(Arc::clone(&owner)),
                        args.to_vec(),
                        entry_points.clone(),
                    )?;
                    Ok(child as Instance)
                })))
            }
            BindingKind::Set { .. } => {
                let elements = self.nodes(&node.resolved_dependencies)?;
                Ok(instance(elements))
            }
            BindingKind::Map { keys } => {
                let values = self.nodes(&node.resolved_dependencies)?;
                let entries: IndexMap<Arc<str>, Instance> =
                    keys.iter().map(|k| k.value.clone()).zip(values).collect();
                Ok(instance(entries))
            }
            BindingKind::Delegate { target } => self.node(*target),
            BindingKind::Null | BindingKind::Missing => Ok(instance(Absent)),
        }
    }

    /// A factory taking the assisted parameters, in declared order.
    fn assisted_factory(self: &Arc<Self>, id: NodeId, arity: usize) -> Function {
        let owner = Arc::clone(self);
        Function::new(arity, move |assisted| {
            let Some(node) = owner.runtime.plan().node(id) else {
                return Err(owner.missing(format!("Node #{}", id.0)));
            };
            let BindingKind::Callable { callable, .. } = &node.kind else {
                return Err(RuntimeError::mismatch::<Function>(node.kind.name()));
            };
            let mut provided = owner.nodes(&node.resolved_dependencies)?.into_iter();
            let mut assisted = assisted.iter().cloned();
            let mut args = Vec::with_capacity(callable.value_parameters.len());
            for parameter in &callable.value_parameters {
                let next = if parameter.is_assisted {
                    assisted.next()
                } else {
                    provided.next()
                };
                match next {
                    Some(value) => args.push(value),
                    None => return Err(owner.missing(format!("Argument '{}'", parameter.name))),
                }
            }
            owner.runtime.factories().call(&callable.fq_name, &args)
        })
    }

    /// Evaluate a callable node through its interceptors. The first
    /// interceptor wraps the declaration's factory, each later one wraps the
    /// previous result.
    fn intercepted(self: &Arc<Self>, node: &BindingNode) -> Result<Instance, RuntimeError> {
        let owner = Arc::clone(self);
        let id = node.id;
        let mut current = Function::new(0, move |_| {
            let Some(node) = owner.runtime.plan().node(id) else {
                return Err(owner.missing(format!("Node #{}", id.0)));
            };
            let BindingKind::Callable { callable, .. } = &node.kind else {
                return Err(RuntimeError::mismatch::<Function>(node.kind.name()));
            };
            let args = owner.nodes(&node.resolved_dependencies)?;
            owner.runtime.factories().call(&callable.fq_name, &args)
        });
        for interceptor in &node.interceptors {
            current = self.wrap(interceptor, current)?;
        }
        current.invoke(&[])
    }

    fn wrap(self: &Arc<Self>, interceptor: &InterceptorNode, inner: Function) -> Result<Function, RuntimeError> {
        let mut dependencies = self.nodes(&interceptor.resolved_dependencies)?.into_iter();
        let parameters = interceptor.callable.value_parameters.len();
        let mut args = Vec::with_capacity(parameters);
        for position in 0..parameters {
            if position == interceptor.factory_parameter {
                args.push(instance(inner.clone()));
            } else if let Some(value) = dependencies.next() {
                args.push(value);
            }
        }
        let wrapped = self.runtime.factories().call(&interceptor.callable.fq_name, &args)?;
        wrapped
            .downcast::<Function>()
            .map(|f| f.as_ref().clone())
            .map_err(|_| RuntimeError::mismatch::<Function>(format!("the result of '{}'", interceptor.callable.fq_name)))
    }
}

#[cfg(test)]
#[path = "../tests/instance_tests.rs"]
mod tests;
