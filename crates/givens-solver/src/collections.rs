//! Multibinding collection merging.
//!
//! `Set<E>` and `Map<K, V>` requests are answered by merging contributions
//! along the scope chain. Merge order, which is also the final iteration
//! order of non-conflicting entries:
//!
//! 1. the parent scope's merged entries
//! 2. global entries from the declaration index (root scope only)
//! 3. this scope's own entries
//!
//! Entries collide when they share a key: the declaration origin for set
//! elements, the explicit key for map entries. The later entry's
//! [`DuplicatePolicy`] decides the outcome.

use crate::callable::{CallableWithReceiver, DuplicatePolicy};
use crate::diagnostics::{DuplicateKey, ResolutionError};
use crate::graph::ScopeId;
use crate::index::DeclarationIndex;
use crate::options::ResolverOptions;
use crate::relations::TypeRelation;
use crate::scope::{Candidate, ResolutionScope, match_declaration};
use crate::types::TypeRef;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Merged entries of one collection type, or `None` when the collection is
/// not declared anywhere in the chain.
pub type MergedEntries = Option<Arc<[CallableWithReceiver]>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CollectionKind {
    Set,
    Map,
}

/// Merges set elements, map entries and interceptors over a scope arena.
#[derive(Clone, Copy)]
pub struct CollectionMerger<'a> {
    relation: TypeRelation<'a>,
    index: &'a DeclarationIndex,
    options: &'a ResolverOptions,
}

impl<'a> CollectionMerger<'a> {
    pub fn new(relation: TypeRelation<'a>, index: &'a DeclarationIndex, options: &'a ResolverOptions) -> Self {
        Self {
            relation,
            index,
            options,
        }
    }

    /// Elements of `set_type` visible from `scope`, substituted for the
    /// requested element type.
    pub fn set_elements(
        &self,
        scopes: &mut [ResolutionScope],
        scope: ScopeId,
        set_type: &TypeRef,
    ) -> Result<MergedEntries, ResolutionError> {
        self.merged(scopes, scope, set_type, CollectionKind::Set)
    }

    /// Entries of `map_type` visible from `scope`.
    pub fn map_entries(
        &self,
        scopes: &mut [ResolutionScope],
        scope: ScopeId,
        map_type: &TypeRef,
    ) -> Result<MergedEntries, ResolutionError> {
        self.merged(scopes, scope, map_type, CollectionKind::Map)
    }

    fn merged(
        &self,
        scopes: &mut [ResolutionScope],
        scope: ScopeId,
        collection: &TypeRef,
        kind: CollectionKind,
    ) -> Result<MergedEntries, ResolutionError> {
        let Some(current) = scopes.get(scope.index()) else {
            return Ok(None);
        };
        let memo = match kind {
            CollectionKind::Set => &current.set_elements_by_type,
            CollectionKind::Map => &current.map_entries_by_type,
        };
        if let Some(cached) = memo.get(collection) {
            return Ok(cached.clone());
        }
        let parent = current.parent;

        let inherited = match parent {
            Some(parent) => self.merged(scopes, parent, collection, kind)?,
            None => None,
        };
        let mut exists = inherited.is_some();
        let mut entries: IndexMap<DuplicateKey, CallableWithReceiver> = IndexMap::new();
        let current = &scopes[scope.index()];
        for entry in inherited.iter().flat_map(|e| e.iter()) {
            if let Some(key) = entry_key(entry, kind) {
                entries.insert(key, entry.clone());
            }
        }

        if parent.is_none() {
            let globals = match kind {
                CollectionKind::Set => self.index.set_elements(),
                CollectionKind::Map => self.index.map_entries(),
            };
            for entry in globals {
                if let Some(matched) = self.matching(entry, collection, kind, current) {
                    insert_entry(&mut entries, matched, collection, &current.name)?;
                }
            }
            exists |= self.index.multibinds().iter().any(|t| *t == collection.non_null());
        }

        let locals = match kind {
            CollectionKind::Set => current.set_elements(),
            CollectionKind::Map => current.map_entries(),
        };
        for entry in locals {
            if let Some(matched) = self.matching(entry, collection, kind, current) {
                insert_entry(&mut entries, matched, collection, &current.name)?;
            }
        }
        exists |= current.multibinds().iter().any(|t| *t == collection.non_null());
        exists |= !entries.is_empty() || self.options.empty_collections_by_default;

        let result: MergedEntries = exists.then(|| entries.into_values().collect());
        trace!(
            scope = %current.name,
            collection = ?kind,
            entries = result.as_ref().map(|r| r.len()),
            "merged collection"
        );
        let current = &mut scopes[scope.index()];
        let memo = match kind {
            CollectionKind::Set => &mut current.set_elements_by_type,
            CollectionKind::Map => &mut current.map_entries_by_type,
        };
        memo.insert(collection.clone(), result.clone());
        Ok(result)
    }

    fn matching(
        &self,
        entry: &CallableWithReceiver,
        collection: &TypeRef,
        kind: CollectionKind,
        scope: &ResolutionScope,
    ) -> Option<CallableWithReceiver> {
        let value_type = match kind {
            CollectionKind::Set => collection.set_element()?,
            CollectionKind::Map => {
                let (key_type, value_type) = collection.map_parts()?;
                let key = entry.callable.map_key.as_ref()?;
                if !self.relation.is_assignable(&key.type_ref, key_type) {
                    return None;
                }
                value_type
            }
        };
        match match_declaration(&self.relation, entry, value_type, scope.call_context)? {
            Candidate::Given {
                callable, receivers, ..
            } => Some(CallableWithReceiver { callable, receivers }),
            _ => None,
        }
    }

    /// Interceptors visible from `scope` that can wrap a binding of `ty`:
    /// ancestors first, global interceptors at the root.
    ///
    /// An interceptor is declared as a function of type `() -> X` with one
    /// parameter receiving the wrapped factory. Interceptors whose other
    /// parameters request `ty` itself are skipped.
    pub fn interceptors(
        &self,
        scopes: &mut [ResolutionScope],
        scope: ScopeId,
        ty: &TypeRef,
    ) -> Arc<[CallableWithReceiver]> {
        let Some(current) = scopes.get(scope.index()) else {
            return Arc::from(Vec::new());
        };
        if let Some(cached) = current.interceptors_by_type.get(ty) {
            return cached.clone();
        }
        let parent = current.parent;
        let mut visible: Vec<CallableWithReceiver> = match parent {
            Some(parent) => self.interceptors(scopes, parent, ty).to_vec(),
            None => Vec::new(),
        };
        let current = &scopes[scope.index()];
        let factory_type = TypeRef::function(Vec::new(), ty.non_null());
        let globals: &[CallableWithReceiver] = if parent.is_none() {
            self.index.interceptors()
        } else {
            &[]
        };
        for entry in globals.iter().chain(current.interceptors()) {
            let Some(Candidate::Given {
                callable, receivers, ..
            }) = match_declaration(&self.relation, entry, &factory_type, current.call_context)
            else {
                continue;
            };
            let depends_on_target = callable
                .value_parameters
                .iter()
                .any(|p| p.type_ref.non_null() == ty.non_null());
            if depends_on_target {
                debug!(interceptor = %callable.fq_name, "interceptor skipped: depends on intercepted type");
                continue;
            }
            visible.push(CallableWithReceiver { callable, receivers });
        }
        let result: Arc<[CallableWithReceiver]> = visible.into();
        scopes[scope.index()]
            .interceptors_by_type
            .insert(ty.clone(), result.clone());
        result
    }
}

fn entry_key(entry: &CallableWithReceiver, kind: CollectionKind) -> Option<DuplicateKey> {
    match kind {
        CollectionKind::Set => Some(DuplicateKey::Element(entry.origin().clone())),
        CollectionKind::Map => entry.callable.map_key.clone().map(DuplicateKey::Key),
    }
}

fn insert_entry(
    entries: &mut IndexMap<DuplicateKey, CallableWithReceiver>,
    entry: CallableWithReceiver,
    collection: &TypeRef,
    scope: &Arc<str>,
) -> Result<(), ResolutionError> {
    let kind = if collection.is_set() {
        CollectionKind::Set
    } else {
        CollectionKind::Map
    };
    let Some(key) = entry_key(&entry, kind) else {
        return Ok(());
    };
    let Some(existing) = entries.get_mut(&key) else {
        entries.insert(key, entry);
        return Ok(());
    };
    match entry.callable.duplicate_policy {
        DuplicatePolicy::Fail => Err(ResolutionError::Duplicate {
            collection: collection.clone(),
            key,
            scope: scope.clone(),
            existing: existing.origin().clone(),
            duplicate: entry.origin().clone(),
        }),
        DuplicatePolicy::Override => {
            trace!(key = ?key, by = %entry.origin(), "collection entry overridden");
            *existing = entry;
            Ok(())
        }
        DuplicatePolicy::Drop => {
            trace!(key = ?key, dropped = %entry.origin(), "collection entry dropped");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "../tests/collections_tests.rs"]
mod tests;
