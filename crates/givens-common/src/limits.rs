//! Centralized limits and thresholds for the binding resolver.
//!
//! Resolution is a recursive depth-first search over declarations supplied by
//! a front-end. A source-level bug (for example a generic binding that requests
//! an ever-larger instantiation of itself) would otherwise recurse until the
//! stack overflows. Every recursive walk in the resolver is bounded by one of
//! the constants below and reports an error when the bound is hit.
//!
//! # Solver recursion limits
//!
//! The solver turns these constants into named presets through
//! `givens_solver::recursion::RecursionProfile`, so call sites never carry
//! raw numbers.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum depth of the binding request chain.
///
/// Each nested dependency request adds one level. A well-formed graph rarely
/// exceeds a few dozen levels; runaway generic expansion hits this bound and
/// is reported as a depth error instead of overflowing the stack.
///
/// ```text
/// // Unbounded generic recursion:
/// fun <T> wrap(inner: Wrapper<Wrapper<T>>): Wrapper<T>
/// // Wrapper<Foo> -> Wrapper<Wrapper<Foo>> -> Wrapper<Wrapper<Wrapper<Foo>>> -> ...
/// ```
pub const MAX_RESOLUTION_DEPTH: u32 = 200;

/// Maximum nesting of module contributions during expansion.
///
/// Modules may include further modules. Expansion happens once per scope
/// before resolution; a module that includes itself (directly or through a
/// chain) is reported as a module cycle, and anything deeper than this bound
/// is reported as a depth error.
pub const MAX_MODULE_EXPANSION_DEPTH: u32 = 32;

/// Maximum depth when walking declared supertypes of a classifier.
///
/// Used by the supertype closure and by `subtype_view`. Declared hierarchies
/// are acyclic in well-formed input; the bound protects against malformed
/// front-end data.
pub const MAX_SUPERTYPE_DEPTH: u32 = 64;

/// Maximum depth of structural type comparison (assignability and
/// unification of nested type arguments).
pub const MAX_TYPE_RELATION_DEPTH: u32 = 100;

// =============================================================================
// Operation Count Limits
// =============================================================================

/// Maximum number of guarded steps in a single resolution walk.
///
/// Bounds total work even when depth stays low (for example a very wide graph
/// that keeps re-entering the same tiers).
pub const MAX_RESOLUTION_STEPS: u32 = 1_000_000;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Initial capacity of the per-build node arena.
pub const NODE_ARENA_INITIAL_CAPACITY: usize = 64;
