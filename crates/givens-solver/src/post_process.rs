//! Star-projection merging.
//!
//! After a batch of requests, the same generic declaration may have been
//! instantiated at several types that differ only by star projections (for
//! example `Repo<*>` and `Repo<User>`). Those are one provider invoked at
//! different specialization sites. For each group of callable nodes with the
//! same origin and owner, the node with the fewest star projections becomes
//! canonical, and every node whose type generalizes it is rewritten into a
//! `Delegate` pointing at it. Node ids stay stable, so dependents and cache
//! entries need no rewiring.

use crate::graph::{BindingKind, BindingNode, BindingRequest, NodeId, ScopeId};
use crate::relations::{count_star_projections, is_star_generalization};
use crate::types::FqName;
use indexmap::IndexMap;
use tracing::debug;

/// Rewrite star-projection duplicates into delegates. Returns the number of
/// rewritten nodes.
pub fn merge_star_projections(nodes: &mut [BindingNode]) -> usize {
    let mut groups: IndexMap<(FqName, ScopeId), Vec<NodeId>> = IndexMap::new();
    for node in nodes.iter() {
        if let BindingKind::Callable {
            assisted_parameters, ..
        } = &node.kind
        {
            if !assisted_parameters.is_empty() {
                continue;
            }
            if let Some(origin) = &node.origin {
                groups
                    .entry((origin.clone(), node.owner))
                    .or_default()
                    .push(node.id);
            }
        }
    }

    let mut merged = 0;
    for ((origin, _), members) in groups {
        if members.len() < 2 {
            continue;
        }
        let Some(canonical) = members
            .iter()
            .copied()
            .min_by_key(|id| (count_star_projections(&nodes[id.index()].type_ref), *id))
        else {
            continue;
        };
        let canonical_type = nodes[canonical.index()].type_ref.clone();
        for member in members {
            if member == canonical {
                continue;
            }
            let node = &mut nodes[member.index()];
            if !is_star_generalization(&node.type_ref, &canonical_type) {
                continue;
            }
            debug!(
                origin = %origin,
                node = member.0,
                canonical = canonical.0,
                "merged star-projected instantiation"
            );
            node.kind = BindingKind::Delegate { target: canonical };
            node.dependencies = vec![BindingRequest::new(canonical_type.clone(), origin.clone())];
            node.resolved_dependencies = vec![canonical];
            node.interceptors.clear();
            node.scoped = false;
            let eager = std::mem::take(&mut node.eager);
            nodes[canonical.index()].eager |= eager;
            merged += 1;
        }
    }
    merged
}

#[cfg(test)]
#[path = "../tests/post_process_tests.rs"]
mod tests;
