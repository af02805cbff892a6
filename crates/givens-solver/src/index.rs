//! The declaration index.
//!
//! An explicit, read-only value holding every globally registered
//! declaration of one build: implicit bindings (internal and external),
//! global collection contributions, interceptors, module and component
//! descriptors, and function aliases. It is built once by the front-end with
//! [`DeclarationIndexBuilder`] and passed into graph construction.

use crate::callable::{CallableRef, CallableWithReceiver};
use crate::classifiers::{ClassifierFlags, ClassifierStore};
use crate::diagnostics::ResolutionError;
use crate::expand::{ModuleDescriptor, ModuleSource, expand_contributions};
use crate::types::{ClassifierId, TypeRef};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Declarations of a component: what it provides and what it exposes.
#[derive(Clone, Debug)]
pub struct ComponentDescriptor {
    pub component: TypeRef,
    pub declarations: Vec<Arc<CallableRef>>,
    /// Types resolved eagerly when the component's scope is built.
    pub entry_points: Vec<TypeRef>,
}

impl ComponentDescriptor {
    pub fn new(component: TypeRef) -> Self {
        Self {
            component,
            declarations: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_declarations(mut self, declarations: Vec<CallableRef>) -> Self {
        self.declarations = declarations.into_iter().map(Arc::new).collect();
        self
    }

    #[must_use]
    pub fn with_entry_points(mut self, entry_points: Vec<TypeRef>) -> Self {
        self.entry_points = entry_points;
        self
    }
}

/// Read-only index of global declarations.
#[derive(Debug, Default)]
pub struct DeclarationIndex {
    bindings: Vec<CallableWithReceiver>,
    /// Classifier (and each of its supertypes) to positions in `bindings`.
    by_classifier: FxHashMap<ClassifierId, SmallVec<[u32; 4]>>,
    /// Bindings whose produced type is a bare type parameter.
    generic: Vec<u32>,
    set_elements: Vec<CallableWithReceiver>,
    map_entries: Vec<CallableWithReceiver>,
    interceptors: Vec<CallableWithReceiver>,
    multibinds: Vec<TypeRef>,
    modules: FxHashMap<ClassifierId, ModuleDescriptor>,
    components: FxHashMap<ClassifierId, ComponentDescriptor>,
    fun_aliases: FxHashMap<ClassifierId, Arc<CallableRef>>,
}

impl DeclarationIndex {
    /// An index with no global declarations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Implicit bindings that could produce `classifier`, in declaration
    /// order. Function-alias bindings are excluded.
    pub fn implicit_bindings_for(&self, classifier: ClassifierId) -> Vec<&CallableWithReceiver> {
        let mut positions: SmallVec<[u32; 8]> = self
            .by_classifier
            .get(&classifier)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        positions.extend(self.generic.iter().copied());
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .filter_map(|p| self.bindings.get(p as usize))
            .collect()
    }

    pub fn bindings(&self) -> &[CallableWithReceiver] {
        &self.bindings
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

    pub fn component(&self, classifier: ClassifierId) -> Option<&ComponentDescriptor> {
        self.components.get(&classifier)
    }

    pub fn fun_alias(&self, classifier: ClassifierId) -> Option<&Arc<CallableRef>> {
        self.fun_aliases.get(&classifier)
    }
}

impl ModuleSource for DeclarationIndex {
    fn module(&self, classifier: ClassifierId) -> Option<&ModuleDescriptor> {
        self.modules.get(&classifier)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects global declarations and descriptors, then builds the index.
#[derive(Default)]
pub struct DeclarationIndexBuilder {
    declarations: Vec<Arc<CallableRef>>,
    modules: FxHashMap<ClassifierId, ModuleDescriptor>,
    components: FxHashMap<ClassifierId, ComponentDescriptor>,
    fun_aliases: FxHashMap<ClassifierId, Arc<CallableRef>>,
}

impl DeclarationIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global declaration. Its contribution kind decides where it
    /// ends up.
    pub fn add(&mut self, declaration: CallableRef) -> &mut Self {
        self.declarations.push(Arc::new(declaration));
        self
    }

    pub fn module(&mut self, descriptor: ModuleDescriptor) -> &mut Self {
        self.modules.insert(descriptor.classifier, descriptor);
        self
    }

    pub fn component(&mut self, descriptor: ComponentDescriptor) -> &mut Self {
        self.components
            .insert(descriptor.component.classifier, descriptor);
        self
    }

    /// Register the callable a function-alias classifier stands for.
    pub fn fun_alias(&mut self, alias: ClassifierId, callable: CallableRef) -> &mut Self {
        self.fun_aliases.insert(alias, Arc::new(callable));
        self
    }

    /// Expand global modules and index the result.
    pub fn build(self, classifiers: &ClassifierStore) -> Result<DeclarationIndex, ResolutionError> {
        for alias in self.fun_aliases.keys() {
            if !classifiers.has_flag(*alias, ClassifierFlags::FUN_ALIAS) {
                let origin = self.fun_aliases[alias].fq_name.clone();
                return Err(ResolutionError::UnknownClassifier {
                    classifier: *alias,
                    origin,
                });
            }
        }

        let contributions = expand_contributions(&self.declarations, &self.modules)?;
        let mut index = DeclarationIndex {
            set_elements: contributions.set_elements,
            map_entries: contributions.map_entries,
            interceptors: contributions.interceptors,
            multibinds: contributions.multibinds,
            modules: self.modules,
            components: self.components,
            fun_aliases: self.fun_aliases,
            ..DeclarationIndex::default()
        };

        for binding in contributions.bindings {
            let produced = binding.callable.type_ref.classifier;
            if classifiers.has_flag(produced, ClassifierFlags::FUN_ALIAS) {
                continue;
            }
            let position = index.bindings.len() as u32;
            if classifiers.is_type_parameter(produced) {
                index.generic.push(position);
            } else {
                for classifier in classifiers.supertype_closure(produced) {
                    index
                        .by_classifier
                        .entry(classifier)
                        .or_default()
                        .push(position);
                }
            }
            index.bindings.push(binding);
        }

        debug!(
            bindings = index.bindings.len(),
            set_elements = index.set_elements.len(),
            map_entries = index.map_entries.len(),
            interceptors = index.interceptors.len(),
            modules = index.modules.len(),
            components = index.components.len(),
            "built declaration index"
        );
        Ok(index)
    }
}

#[cfg(test)]
#[path = "../tests/index_tests.rs"]
mod tests;
