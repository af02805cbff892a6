//! Type relations: assignability, unification and substitution.
//!
//! ## Assignability
//!
//! `source` is assignable to `target` when:
//!
//! 1. `target` is a star projection, or
//! 2. qualifiers are equal, nullability is compatible (`target` nullable or
//!    `source` non-null), and
//! 3. `source` viewed as `target`'s classifier (through the declared supertype
//!    closure) has pairwise assignable type arguments.
//!
//! Type parameters on either side are checked against their upper bounds.
//!
//! ## Unification
//!
//! [`TypeRelation::substitution_map`] matches a concrete type against a
//! pattern containing type parameters and returns the binding of each
//! parameter. Any structural mismatch yields an empty map.

use crate::classifiers::ClassifierStore;
use crate::recursion::RecursionProfile;
use crate::types::{ClassifierId, TypeRef};
use rustc_hash::FxHashMap;
use tracing::warn;

/// Type parameter to replacement.
pub type SubstitutionMap = FxHashMap<ClassifierId, TypeRef>;

/// Relation queries over one classifier store.
#[derive(Clone, Copy)]
pub struct TypeRelation<'a> {
    classifiers: &'a ClassifierStore,
}

impl<'a> TypeRelation<'a> {
    pub fn new(classifiers: &'a ClassifierStore) -> Self {
        Self { classifiers }
    }

    pub fn classifiers(&self) -> &'a ClassifierStore {
        self.classifiers
    }

    /// Whether a value of `source` can satisfy a request for `target`.
    pub fn is_assignable(&self, source: &TypeRef, target: &TypeRef) -> bool {
        self.assignable_at(source, target, 0)
    }

    fn assignable_at(&self, source: &TypeRef, target: &TypeRef, depth: u32) -> bool {
        if depth > RecursionProfile::TypeRelation.max_depth() {
            warn!(depth, "assignability check exceeded the type relation depth");
            return false;
        }
        if target.star {
            return true;
        }
        if source.star {
            return false;
        }
        if source.nullable && !target.nullable {
            return false;
        }
        if source.qualifiers != target.qualifiers {
            return false;
        }
        if source.classifier == target.classifier {
            return self.arguments_assignable(&source.arguments, &target.arguments, depth);
        }
        if self.classifiers.is_type_parameter(source.classifier) {
            let bounds = self.classifiers.upper_bounds(source.classifier);
            let target = target.unqualified();
            return bounds
                .iter()
                .any(|bound| self.assignable_at(bound, &target, depth + 1));
        }
        if self.classifiers.is_type_parameter(target.classifier) {
            let source = source.unqualified().non_null();
            return self
                .classifiers
                .upper_bounds(target.classifier)
                .iter()
                .all(|bound| self.assignable_at(&source, bound, depth + 1));
        }
        if target.classifier == ClassifierId::ANY {
            return true;
        }
        match self.classifiers.subtype_view(source, target.classifier) {
            Some(view) => self.arguments_assignable(&view.arguments, &target.arguments, depth),
            None => false,
        }
    }

    fn arguments_assignable(&self, source: &[TypeRef], target: &[TypeRef], depth: u32) -> bool {
        source.len() == target.len()
            && source
                .iter()
                .zip(target)
                .all(|(s, t)| self.assignable_at(s, t, depth + 1))
    }

    /// Unify `concrete` against `pattern`.
    ///
    /// Each type parameter occurring in `pattern` is bound to the matching
    /// part of `concrete`. Star projections in `concrete` leave the parameter
    /// unbound. Returns an empty map if the two disagree anywhere.
    pub fn substitution_map(&self, concrete: &TypeRef, pattern: &TypeRef) -> SubstitutionMap {
        let mut map = SubstitutionMap::default();
        if self.unify(concrete, pattern, &mut map, 0) {
            map
        } else {
            SubstitutionMap::default()
        }
    }

    /// Like [`substitution_map`](Self::substitution_map) but distinguishes a
    /// failed unification (`None`) from a successful one that binds nothing.
    pub fn try_unify(&self, concrete: &TypeRef, pattern: &TypeRef) -> Option<SubstitutionMap> {
        let mut map = SubstitutionMap::default();
        self.unify(concrete, pattern, &mut map, 0).then_some(map)
    }

    fn unify(&self, concrete: &TypeRef, pattern: &TypeRef, map: &mut SubstitutionMap, depth: u32) -> bool {
        if depth > RecursionProfile::TypeRelation.max_depth() {
            warn!(depth, "unification exceeded the type relation depth");
            return false;
        }
        if pattern.star {
            return true;
        }
        if self.classifiers.is_type_parameter(pattern.classifier) {
            if concrete.star {
                return true;
            }
            if !pattern.qualifiers.iter().all(|q| concrete.qualifiers.contains(q)) {
                return false;
            }
            let mut value = TypeRef {
                qualifiers: concrete.qualifiers.without(&pattern.qualifiers),
                ..concrete.clone()
            };
            if pattern.nullable {
                value.nullable = false;
            }
            return match map.get(&pattern.classifier) {
                Some(existing) => *existing == value,
                None => {
                    map.insert(pattern.classifier, value);
                    true
                }
            };
        }
        if concrete.star {
            return false;
        }
        let Some(view) = self.classifiers.subtype_view(concrete, pattern.classifier) else {
            return false;
        };
        view.arguments.len() == pattern.arguments.len()
            && view
                .arguments
                .iter()
                .zip(pattern.arguments.iter())
                .all(|(c, p)| self.unify(c, p, map, depth + 1))
    }

    /// Whether `ty` mentions any type parameter.
    pub fn contains_type_parameters(&self, ty: &TypeRef) -> bool {
        !ty.star
            && (self.classifiers.is_type_parameter(ty.classifier)
                || ty.arguments.iter().any(|a| self.contains_type_parameters(a)))
    }

    /// Replace every remaining type parameter in `ty` with a star projection.
    pub fn erase_type_parameters(&self, ty: &TypeRef) -> TypeRef {
        if ty.star {
            return ty.clone();
        }
        if self.classifiers.is_type_parameter(ty.classifier) {
            return TypeRef::star();
        }
        if ty.arguments.is_empty() {
            return ty.clone();
        }
        ty.with_arguments(ty.arguments.iter().map(|a| self.erase_type_parameters(a)).collect())
    }
}

/// Structurally replace type parameters bound in `map`.
///
/// The replacement keeps the qualifiers of the occurrence in addition to its
/// own, and is nullable if either is. Returns an equal `TypeRef` when nothing
/// in `ty` is bound.
pub fn substitute(ty: &TypeRef, map: &SubstitutionMap) -> TypeRef {
    if map.is_empty() || ty.star {
        return ty.clone();
    }
    if let Some(replacement) = map.get(&ty.classifier) {
        return TypeRef {
            qualifiers: &replacement.qualifiers + &ty.qualifiers,
            nullable: replacement.nullable || ty.nullable,
            ..replacement.clone()
        };
    }
    if ty.arguments.is_empty() {
        return ty.clone();
    }
    ty.with_arguments(ty.arguments.iter().map(|a| substitute(a, map)).collect())
}

/// Number of star projections anywhere in `ty`.
pub fn count_star_projections(ty: &TypeRef) -> usize {
    if ty.star {
        return 1;
    }
    ty.arguments.iter().map(count_star_projections).sum()
}

/// Whether `general` equals `specific` except that some positions of
/// `general` are star projections. Equal types qualify.
pub fn is_star_generalization(general: &TypeRef, specific: &TypeRef) -> bool {
    if general.star {
        return true;
    }
    general.classifier == specific.classifier
        && general.nullable == specific.nullable
        && general.qualifiers == specific.qualifiers
        && general.arguments.len() == specific.arguments.len()
        && general
            .arguments
            .iter()
            .zip(specific.arguments.iter())
            .all(|(g, s)| is_star_generalization(g, s))
}

#[cfg(test)]
#[path = "../tests/relations_tests.rs"]
mod tests;
