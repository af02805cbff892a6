//! Type references used as injection keys.
//!
//! A [`TypeRef`] is an immutable, structurally compared value: classifier
//! identity, ordered type arguments, a qualifier set, nullability and a star
//! marker. Substitution never mutates a `TypeRef`; it builds a new one.
//!
//! Function types are ordinary applications of one of the built-in function
//! classifiers with the parameter types followed by the return type as
//! arguments, so `(A, B) -> R` is `Function<A, B, R>`.

use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

// =============================================================================
// Identifiers
// =============================================================================

/// Identity of a declared classifier (class, interface, object, type
/// parameter, or one of the built-ins below).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassifierId(pub u32);

impl ClassifierId {
    /// The top type. Every non-null type is assignable to `Any`.
    pub const ANY: Self = Self(0);
    /// `(P...) -> R`
    pub const FUNCTION: Self = Self(1);
    /// `suspend (P...) -> R`
    pub const SUSPEND_FUNCTION: Self = Self(2);
    /// `@Composable (P...) -> R`
    pub const COMPOSABLE_FUNCTION: Self = Self(3);
    /// `Set<E>`
    pub const SET: Self = Self(4);
    /// `Map<K, V>`
    pub const MAP: Self = Self(5);

    /// First id handed out to user classifiers.
    pub const FIRST_USER: u32 = 16;

    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER
    }

    pub const fn is_function(self) -> bool {
        matches!(self.0, 1..=3)
    }
}

/// Identity of a registered qualifier marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QualifierId(pub u32);

/// Fully qualified name of a declaration, used as origin in diagnostics and
/// as the identity of set elements.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FqName(Arc<str>);

impl FqName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `app.Module` + `db` = `app.Module.db`
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            return Self::new(name);
        }
        Self::new(format!("{}.{name}", self.0))
    }

    /// The last segment of the name.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FqName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// QualifierSet
// =============================================================================

/// An unordered set of qualifiers.
///
/// Stored sorted and deduplicated, so equality and hashing do not depend on
/// declaration order. Combining two sets with `+` is a union, which is
/// commutative and associative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct QualifierSet(SmallVec<[QualifierId; 2]>);

impl QualifierSet {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn of(qualifiers: impl IntoIterator<Item = QualifierId>) -> Self {
        let mut ids: SmallVec<[QualifierId; 2]> = qualifiers.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    pub fn single(qualifier: QualifierId) -> Self {
        let mut ids = SmallVec::new();
        ids.push(qualifier);
        Self(ids)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, qualifier: QualifierId) -> bool {
        self.0.binary_search(&qualifier).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = QualifierId> + '_ {
        self.0.iter().copied()
    }

    /// Qualifiers of `self` that are not in `other`.
    pub fn without(&self, other: &QualifierSet) -> QualifierSet {
        Self(self.0.iter().copied().filter(|q| !other.contains(*q)).collect())
    }
}

impl Add for &QualifierSet {
    type Output = QualifierSet;

    fn add(self, rhs: &QualifierSet) -> QualifierSet {
        if rhs.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return rhs.clone();
        }
        QualifierSet::of(self.iter().chain(rhs.iter()))
    }
}

impl Add for QualifierSet {
    type Output = QualifierSet;

    fn add(self, rhs: QualifierSet) -> QualifierSet {
        &self + &rhs
    }
}

// =============================================================================
// TypeRef
// =============================================================================

/// A concrete or partially applied type.
///
/// Two `TypeRef`s are equal iff classifier, arguments, qualifiers and
/// nullability are equal. A star projection is never equal to a concrete
/// argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TypeRef {
    pub classifier: ClassifierId,
    pub arguments: Arc<[TypeRef]>,
    pub qualifiers: QualifierSet,
    pub nullable: bool,
    pub star: bool,
}

impl TypeRef {
    /// A type with no arguments.
    pub fn of(classifier: ClassifierId) -> Self {
        Self::generic(classifier, Vec::new())
    }

    pub fn generic(classifier: ClassifierId, arguments: Vec<TypeRef>) -> Self {
        Self {
            classifier,
            arguments: arguments.into(),
            qualifiers: QualifierSet::empty(),
            nullable: false,
            star: false,
        }
    }

    /// The `*` projection.
    pub fn star() -> Self {
        Self {
            star: true,
            ..Self::of(ClassifierId::ANY)
        }
    }

    pub fn function(parameters: Vec<TypeRef>, returns: TypeRef) -> Self {
        Self::function_of(ClassifierId::FUNCTION, parameters, returns)
    }

    pub fn suspend_function(parameters: Vec<TypeRef>, returns: TypeRef) -> Self {
        Self::function_of(ClassifierId::SUSPEND_FUNCTION, parameters, returns)
    }

    pub fn composable_function(parameters: Vec<TypeRef>, returns: TypeRef) -> Self {
        Self::function_of(ClassifierId::COMPOSABLE_FUNCTION, parameters, returns)
    }

    fn function_of(classifier: ClassifierId, mut parameters: Vec<TypeRef>, returns: TypeRef) -> Self {
        parameters.push(returns);
        Self::generic(classifier, parameters)
    }

    pub fn set_of(element: TypeRef) -> Self {
        Self::generic(ClassifierId::SET, vec![element])
    }

    pub fn map_of(key: TypeRef, value: TypeRef) -> Self {
        Self::generic(ClassifierId::MAP, vec![key, value])
    }

    #[must_use]
    pub fn qualified(mut self, qualifier: QualifierId) -> Self {
        self.qualifiers = &self.qualifiers + &QualifierSet::single(qualifier);
        self
    }

    #[must_use]
    pub fn with_qualifiers(mut self, qualifiers: QualifierSet) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    #[must_use]
    pub fn marked_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn non_null(&self) -> Self {
        Self {
            nullable: false,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn unqualified(&self) -> Self {
        Self {
            qualifiers: QualifierSet::empty(),
            ..self.clone()
        }
    }

    pub fn is_function_type(&self) -> bool {
        !self.star && self.classifier.is_function() && !self.arguments.is_empty()
    }

    /// Parameter types and return type of a function type.
    pub fn function_parts(&self) -> Option<(&[TypeRef], &TypeRef)> {
        if !self.is_function_type() {
            return None;
        }
        let (returns, parameters) = self.arguments.split_last()?;
        Some((parameters, returns))
    }

    pub fn is_set(&self) -> bool {
        !self.star && self.classifier == ClassifierId::SET && self.arguments.len() == 1
    }

    pub fn is_map(&self) -> bool {
        !self.star && self.classifier == ClassifierId::MAP && self.arguments.len() == 2
    }

    /// Element type of `Set<E>`.
    pub fn set_element(&self) -> Option<&TypeRef> {
        self.is_set().then(|| &self.arguments[0])
    }

    /// Key and value types of `Map<K, V>`.
    pub fn map_parts(&self) -> Option<(&TypeRef, &TypeRef)> {
        self.is_map().then(|| (&self.arguments[0], &self.arguments[1]))
    }

    /// Rebuild with new arguments, keeping qualifiers and nullability.
    #[must_use]
    pub fn with_arguments(&self, arguments: Vec<TypeRef>) -> Self {
        Self {
            arguments: arguments.into(),
            ..self.clone()
        }
    }
}
