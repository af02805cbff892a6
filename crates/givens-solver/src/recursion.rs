//! Bounds for the resolver's recursive walks.
//!
//! Two guards:
//!
//! - [`RecursionGuard`] tracks the keys currently on the walk, so a key seen
//!   twice is reported as a cycle. Module expansion and supertype walks use it.
//! - [`DepthCounter`] only counts. The binding request chain uses it because
//!   revisiting a node there is legal or not depending on providers in the
//!   chain, which the resolver decides itself.
//!
//! Both also carry a step budget so a walk that fans out without getting
//! deeper still terminates. Every successful `enter` must be paired with a
//! `leave`; debug builds panic on drop when one was forgotten.

use givens_common::limits;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Limits for one kind of walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// Nested module includes. Keys are module classifiers.
    ModuleExpansion,
    /// Declared supertypes of a classifier.
    SupertypeWalk,
    /// Nested type arguments in assignability and unification.
    TypeRelation,
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::ModuleExpansion => limits::MAX_MODULE_EXPANSION_DEPTH,
            Self::SupertypeWalk => limits::MAX_SUPERTYPE_DEPTH,
            Self::TypeRelation => limits::MAX_TYPE_RELATION_DEPTH,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::ModuleExpansion | Self::SupertypeWalk | Self::TypeRelation => 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    Entered,
    /// The key is already on the walk.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

impl RecursionResult {
    #[inline]
    pub fn is_entered(self) -> bool {
        matches!(self, Self::Entered)
    }
}

/// Visiting set plus depth and step limits.
pub struct RecursionGuard<K: Hash + Eq + Copy> {
    visiting: FxHashSet<K>,
    depth: u32,
    steps: u32,
    max_depth: u32,
    max_steps: u32,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_steps: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            depth: 0,
            steps: 0,
            max_depth,
            max_steps,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    /// Every call counts against the step budget, entered or not.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.steps = self.steps.saturating_add(1);
        if self.steps > self.max_steps {
            return RecursionResult::IterationExceeded;
        }
        if self.depth >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }
        if !self.visiting.insert(key) {
            return RecursionResult::Cycle;
        }
        self.depth += 1;
        RecursionResult::Entered
    }

    pub fn leave(&mut self, key: K) {
        let removed = self.visiting.remove(&key);
        debug_assert!(removed, "RecursionGuard::leave without a matching enter");
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for RecursionGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.visiting.is_empty() {
            panic!("RecursionGuard dropped with {} keys still entered", self.visiting.len());
        }
    }
}

/// Depth and step limits without a visiting set.
pub struct DepthCounter {
    depth: u32,
    max_depth: u32,
    steps: u32,
    max_steps: u32,
}

impl DepthCounter {
    pub fn new(max_depth: u32, max_steps: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
            steps: 0,
            max_steps,
        }
    }

    /// Anything but `Entered` leaves the depth unchanged, and `leave` must
    /// not be called then. Never returns `Cycle`.
    #[inline]
    pub fn enter(&mut self) -> RecursionResult {
        self.steps = self.steps.saturating_add(1);
        if self.steps > self.max_steps {
            return RecursionResult::IterationExceeded;
        }
        if self.depth >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }
        self.depth += 1;
        RecursionResult::Entered
    }

    #[inline]
    pub fn leave(&mut self) {
        debug_assert!(self.depth > 0, "DepthCounter::leave at depth 0");
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[inline]
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }
}

#[cfg(debug_assertions)]
impl Drop for DepthCounter {
    fn drop(&mut self) {
        if !std::thread::panicking() && self.depth > 0 {
            panic!("DepthCounter dropped at depth {}", self.depth);
        }
    }
}

#[cfg(test)]
#[path = "../tests/recursion_tests.rs"]
mod tests;
