//! Classifier and qualifier storage.
//!
//! The front-end registers every class, interface, object and type parameter
//! it discovers here before building scopes. The resolver only ever sees
//! [`ClassifierId`]s; names live in this store and are used for diagnostics.
//!
//! ## Built-ins
//!
//! | Id | Name | Notes |
//! |----|------|-------|
//! | 0 | `Any` | top type |
//! | 1 | `Function` | `(P...) -> R` |
//! | 2 | `SuspendFunction` | callable from suspend contexts |
//! | 3 | `ComposableFunction` | callable from composable contexts |
//! | 4 | `Set` | multibinding target |
//! | 5 | `Map` | multibinding target |

use crate::recursion::{RecursionGuard, RecursionProfile};
use crate::relations::{SubstitutionMap, substitute};
use crate::types::{ClassifierId, FqName, QualifierId, TypeRef};
use bitflags::bitflags;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

bitflags! {
    /// Properties of a classifier that change how requests for it resolve.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClassifierFlags: u16 {
        /// Singleton object; a request resolves to the object itself.
        const OBJECT = 1 << 0;
        /// Generic type parameter; substituted during unification.
        const TYPE_PARAMETER = 1 << 1;
        /// Function alias; resolves to an invocation of the aliased callable.
        const FUN_ALIAS = 1 << 2;
        /// A component that can own scoped bindings.
        const COMPONENT = 1 << 3;
        /// A component created through a factory from a parent component.
        const CHILD_COMPONENT = 1 << 4;
        /// `Inline<T>` wrapper, normalized to `() -> T`.
        const INLINE_PROVIDER = 1 << 5;
        /// Declared by the resolver itself.
        const BUILTIN = 1 << 6;
    }
}

// =============================================================================
// ClassifierInfo
// =============================================================================

/// Everything the resolver needs to know about one classifier.
#[derive(Clone, Debug)]
pub struct ClassifierInfo {
    pub fq_name: FqName,
    pub flags: ClassifierFlags,
    /// Declared type parameters, in order.
    pub type_parameters: Vec<ClassifierId>,
    /// Declared direct supertypes, expressed over `type_parameters`.
    pub supertypes: Vec<TypeRef>,
    /// Upper bounds; only meaningful for type parameters.
    pub upper_bounds: Vec<TypeRef>,
}

impl ClassifierInfo {
    pub fn class(fq_name: impl Into<FqName>) -> Self {
        Self {
            fq_name: fq_name.into(),
            flags: ClassifierFlags::empty(),
            type_parameters: Vec::new(),
            supertypes: Vec::new(),
            upper_bounds: Vec::new(),
        }
    }

    pub fn object(fq_name: impl Into<FqName>) -> Self {
        Self::class(fq_name).with_flags(ClassifierFlags::OBJECT)
    }

    pub fn type_parameter(fq_name: impl Into<FqName>, upper_bounds: Vec<TypeRef>) -> Self {
        Self {
            upper_bounds,
            ..Self::class(fq_name).with_flags(ClassifierFlags::TYPE_PARAMETER)
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ClassifierFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_type_parameters(mut self, type_parameters: Vec<ClassifierId>) -> Self {
        self.type_parameters = type_parameters;
        self
    }

    #[must_use]
    pub fn with_supertypes(mut self, supertypes: Vec<TypeRef>) -> Self {
        self.supertypes = supertypes;
        self
    }
}

// =============================================================================
// ClassifierStore
// =============================================================================

/// Thread-safe registry of classifiers and qualifiers.
///
/// Registration takes `&self` so a front-end may populate the store from
/// several threads before resolution starts.
pub struct ClassifierStore {
    classifiers: DashMap<ClassifierId, ClassifierInfo>,
    by_name: DashMap<FqName, ClassifierId>,
    qualifiers: DashMap<QualifierId, FqName>,
    qualifiers_by_name: DashMap<FqName, QualifierId>,
    next_id: AtomicU32,
    next_qualifier: AtomicU32,
}

impl Default for ClassifierStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierStore {
    pub fn new() -> Self {
        let store = Self {
            classifiers: DashMap::new(),
            by_name: DashMap::new(),
            qualifiers: DashMap::new(),
            qualifiers_by_name: DashMap::new(),
            next_id: AtomicU32::new(ClassifierId::FIRST_USER),
            next_qualifier: AtomicU32::new(0),
        };
        for (id, name) in [
            (ClassifierId::ANY, "Any"),
            (ClassifierId::FUNCTION, "Function"),
            (ClassifierId::SUSPEND_FUNCTION, "SuspendFunction"),
            (ClassifierId::COMPOSABLE_FUNCTION, "ComposableFunction"),
            (ClassifierId::SET, "Set"),
            (ClassifierId::MAP, "Map"),
        ] {
            store.insert(id, ClassifierInfo::class(name).with_flags(ClassifierFlags::BUILTIN));
        }
        store
    }

    fn insert(&self, id: ClassifierId, info: ClassifierInfo) {
        self.by_name.insert(info.fq_name.clone(), id);
        self.classifiers.insert(id, info);
    }

    /// Register a classifier and return its id.
    pub fn register(&self, info: ClassifierInfo) -> ClassifierId {
        let id = ClassifierId(self.next_id.fetch_add(1, Ordering::SeqCst));
        trace!(classifier = id.0, name = %info.fq_name, flags = ?info.flags, "ClassifierStore::register");
        self.insert(id, info);
        id
    }

    /// Shorthand for registering a plain classifier with flags.
    pub fn declare(&self, fq_name: &str, flags: ClassifierFlags) -> ClassifierId {
        self.register(ClassifierInfo::class(fq_name).with_flags(flags))
    }

    /// Shorthand for registering a type parameter.
    pub fn type_parameter(&self, fq_name: &str, upper_bounds: Vec<TypeRef>) -> ClassifierId {
        self.register(ClassifierInfo::type_parameter(fq_name, upper_bounds))
    }

    pub fn get(&self, id: ClassifierId) -> Option<ClassifierInfo> {
        self.classifiers.get(&id).map(|r| r.clone())
    }

    pub fn contains(&self, id: ClassifierId) -> bool {
        self.classifiers.contains_key(&id)
    }

    pub fn lookup(&self, fq_name: &str) -> Option<ClassifierId> {
        self.by_name.get(&FqName::new(fq_name)).map(|r| *r)
    }

    pub fn name(&self, id: ClassifierId) -> Option<FqName> {
        self.classifiers.get(&id).map(|r| r.fq_name.clone())
    }

    /// Flags of `id`, or empty flags for an unknown classifier.
    pub fn flags(&self, id: ClassifierId) -> ClassifierFlags {
        self.classifiers
            .get(&id)
            .map(|r| r.flags)
            .unwrap_or_default()
    }

    pub fn has_flag(&self, id: ClassifierId, flag: ClassifierFlags) -> bool {
        self.flags(id).contains(flag)
    }

    pub fn is_type_parameter(&self, id: ClassifierId) -> bool {
        self.has_flag(id, ClassifierFlags::TYPE_PARAMETER)
    }

    pub fn upper_bounds(&self, id: ClassifierId) -> Vec<TypeRef> {
        self.classifiers
            .get(&id)
            .map(|r| r.upper_bounds.clone())
            .unwrap_or_default()
    }

    pub fn add_supertype(&self, id: ClassifierId, supertype: TypeRef) {
        if let Some(mut info) = self.classifiers.get_mut(&id) {
            info.supertypes.push(supertype);
        }
    }

    pub fn set_type_parameters(&self, id: ClassifierId, type_parameters: Vec<ClassifierId>) {
        if let Some(mut info) = self.classifiers.get_mut(&id) {
            info.type_parameters = type_parameters;
        }
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    // =========================================================================
    // Qualifiers
    // =========================================================================

    /// Register a qualifier by name. Registering the same name twice returns
    /// the same id.
    pub fn register_qualifier(&self, fq_name: &str) -> QualifierId {
        let name = FqName::new(fq_name);
        *self
            .qualifiers_by_name
            .entry(name.clone())
            .or_insert_with(|| {
                let id = QualifierId(self.next_qualifier.fetch_add(1, Ordering::SeqCst));
                self.qualifiers.insert(id, name);
                id
            })
    }

    pub fn qualifier_name(&self, id: QualifierId) -> Option<FqName> {
        self.qualifiers.get(&id).map(|r| r.clone())
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Whether `sub` is `sup` or transitively declares it as a supertype.
    /// Every classifier is a subclassifier of `Any`.
    pub fn is_subclassifier(&self, sub: ClassifierId, sup: ClassifierId) -> bool {
        if sub == sup || sup == ClassifierId::ANY {
            return true;
        }
        let mut guard = RecursionGuard::with_profile(RecursionProfile::SupertypeWalk);
        self.reaches(sub, sup, &mut guard)
    }

    fn reaches(
        &self,
        id: ClassifierId,
        target: ClassifierId,
        guard: &mut RecursionGuard<ClassifierId>,
    ) -> bool {
        if !guard.enter(id).is_entered() {
            return false;
        }
        let supertypes = self
            .classifiers
            .get(&id)
            .map(|r| r.supertypes.clone())
            .unwrap_or_default();
        let found = supertypes
            .iter()
            .any(|s| s.classifier == target || self.reaches(s.classifier, target, guard));
        guard.leave(id);
        found
    }

    /// `id` followed by all of its transitive supertype classifiers, each
    /// listed once, in breadth-first order.
    pub fn supertype_closure(&self, id: ClassifierId) -> Vec<ClassifierId> {
        let mut closure = vec![id];
        let mut cursor = 0;
        while cursor < closure.len() {
            if closure.len() > RecursionProfile::SupertypeWalk.max_iterations() as usize {
                break;
            }
            let current = closure[cursor];
            cursor += 1;
            if let Some(info) = self.classifiers.get(&current) {
                for supertype in &info.supertypes {
                    if !closure.contains(&supertype.classifier) {
                        closure.push(supertype.classifier);
                    }
                }
            }
        }
        closure
    }

    /// View `ty` as an instance of `target`, substituting the type arguments
    /// along the supertype path. `List<String>` viewed as `Collection` gives
    /// `Collection<String>`. Qualifiers and nullability of `ty` are kept.
    pub fn subtype_view(&self, ty: &TypeRef, target: ClassifierId) -> Option<TypeRef> {
        if ty.classifier == target {
            return Some(ty.clone());
        }
        let mut guard = RecursionGuard::with_profile(RecursionProfile::SupertypeWalk);
        let view = self.view_through_supertypes(ty, target, &mut guard)?;
        Some(TypeRef {
            qualifiers: ty.qualifiers.clone(),
            nullable: ty.nullable,
            ..view
        })
    }

    fn view_through_supertypes(
        &self,
        ty: &TypeRef,
        target: ClassifierId,
        guard: &mut RecursionGuard<ClassifierId>,
    ) -> Option<TypeRef> {
        if ty.classifier == target {
            return Some(ty.clone());
        }
        let info = self.get(ty.classifier)?;
        if info.supertypes.is_empty() || !guard.enter(ty.classifier).is_entered() {
            return None;
        }
        let map: SubstitutionMap = info
            .type_parameters
            .iter()
            .copied()
            .zip(ty.arguments.iter().cloned())
            .collect();
        let mut view = None;
        for supertype in &info.supertypes {
            let supertype = substitute(supertype, &map);
            if let Some(found) = self.view_through_supertypes(&supertype, target, guard) {
                view = Some(found);
                break;
            }
        }
        guard.leave(ty.classifier);
        view
    }
}

#[cfg(test)]
#[path = "../tests/classifiers_tests.rs"]
mod tests;
