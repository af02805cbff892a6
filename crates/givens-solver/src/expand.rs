//! Contribution expansion.
//!
//! Runs once per declaration list, before any resolution: modules are
//! replaced by their (substituted) member declarations, recursively, and
//! every declaration is sorted into a bucket by its [`ContributionKind`].
//! The resolver only ever sees the flat result.

use crate::callable::{CallableRef, CallableWithReceiver, ContributionKind};
use crate::diagnostics::ResolutionError;
use crate::recursion::{RecursionGuard, RecursionProfile, RecursionResult};
use crate::relations::SubstitutionMap;
use crate::types::{ClassifierId, FqName, TypeRef};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

/// Members of a module classifier, expressed over its type parameters.
#[derive(Clone, Debug)]
pub struct ModuleDescriptor {
    pub classifier: ClassifierId,
    pub type_parameters: Vec<ClassifierId>,
    pub declarations: Vec<Arc<CallableRef>>,
}

impl ModuleDescriptor {
    pub fn new(classifier: ClassifierId, declarations: Vec<CallableRef>) -> Self {
        Self {
            classifier,
            type_parameters: Vec::new(),
            declarations: declarations.into_iter().map(Arc::new).collect(),
        }
    }

    #[must_use]
    pub fn with_type_parameters(mut self, type_parameters: Vec<ClassifierId>) -> Self {
        self.type_parameters = type_parameters;
        self
    }
}

/// Lookup of module descriptors by classifier.
pub trait ModuleSource {
    fn module(&self, classifier: ClassifierId) -> Option<&ModuleDescriptor>;
}

impl ModuleSource for FxHashMap<ClassifierId, ModuleDescriptor> {
    fn module(&self, classifier: ClassifierId) -> Option<&ModuleDescriptor> {
        self.get(&classifier)
    }
}

/// Flat contributions of one declaration list.
#[derive(Clone, Debug, Default)]
pub struct Contributions {
    pub bindings: Vec<CallableWithReceiver>,
    pub set_elements: Vec<CallableWithReceiver>,
    pub map_entries: Vec<CallableWithReceiver>,
    pub interceptors: Vec<CallableWithReceiver>,
    /// Collection types declared by `Multibinds` contributions.
    pub multibinds: Vec<TypeRef>,
}

impl Contributions {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
            && self.set_elements.is_empty()
            && self.map_entries.is_empty()
            && self.interceptors.is_empty()
            && self.multibinds.is_empty()
    }
}

/// Expand `declarations` into flat contributions.
///
/// A `Module` declaration contributes itself as a plain binding (its members
/// need the module instance as receiver) and then each member, with the
/// module's type parameters substituted by the declaration's type arguments.
pub fn expand_contributions(
    declarations: &[Arc<CallableRef>],
    modules: &impl ModuleSource,
) -> Result<Contributions, ResolutionError> {
    let mut out = Contributions::default();
    let mut guard = RecursionGuard::with_profile(RecursionProfile::ModuleExpansion);
    let mut path = Vec::new();
    for declaration in declarations {
        expand_one(declaration, modules, &mut guard, &mut path, &mut out)?;
    }
    Ok(out)
}

fn expand_one(
    declaration: &Arc<CallableRef>,
    modules: &impl ModuleSource,
    guard: &mut RecursionGuard<ClassifierId>,
    path: &mut Vec<FqName>,
    out: &mut Contributions,
) -> Result<(), ResolutionError> {
    let entry = CallableWithReceiver {
        callable: declaration.clone(),
        receivers: path.clone(),
    };
    match declaration.contribution_kind {
        ContributionKind::Binding => out.bindings.push(entry),
        ContributionKind::SetElement => out.set_elements.push(entry),
        ContributionKind::MapEntry => out.map_entries.push(entry),
        ContributionKind::Interceptor => out.interceptors.push(entry),
        ContributionKind::Multibinds => out.multibinds.push(declaration.type_ref.clone()),
        ContributionKind::None => {}
        ContributionKind::Module => {
            out.bindings.push(entry);
            let module_type = &declaration.type_ref;
            let Some(descriptor) = modules.module(module_type.classifier) else {
                return Ok(());
            };
            match guard.enter(module_type.classifier) {
                RecursionResult::Entered => {}
                RecursionResult::Cycle => {
                    let mut cycle = path.clone();
                    cycle.push(declaration.fq_name.clone());
                    return Err(ResolutionError::ModuleCycle {
                        module: module_type.classifier,
                        path: cycle,
                    });
                }
                RecursionResult::DepthExceeded => {
                    return Err(ResolutionError::DepthExceeded {
                        type_ref: module_type.clone(),
                        depth: guard.depth(),
                        chain: Vec::new(),
                    });
                }
                RecursionResult::IterationExceeded => {
                    return Err(ResolutionError::StepBudgetExceeded {
                        type_ref: module_type.clone(),
                        budget: RecursionProfile::ModuleExpansion.max_iterations(),
                        chain: Vec::new(),
                    });
                }
            }
            let map: SubstitutionMap = descriptor
                .type_parameters
                .iter()
                .copied()
                .zip(module_type.arguments.iter().cloned())
                .collect();
            trace!(
                module = %declaration.fq_name,
                members = descriptor.declarations.len(),
                "expanding module"
            );
            path.push(declaration.fq_name.clone());
            let mut result = Ok(());
            for member in &descriptor.declarations {
                let member = Arc::new(member.substitute(&map));
                result = expand_one(&member, modules, guard, path, out);
                if result.is_err() {
                    break;
                }
            }
            path.pop();
            guard.leave(module_type.classifier);
            result?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/expand_tests.rs"]
mod tests;
