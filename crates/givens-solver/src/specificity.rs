//! Tie-breaking between candidates of one tier.

use crate::types::TypeRef;

/// More than one candidate qualified. Holds all of them, in tier order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity<C> {
    pub candidates: Vec<C>,
}

/// Pick the candidate to use from one tier.
///
/// - no candidates: `Ok(None)`
/// - one candidate: that candidate, without further checks
/// - several: the single candidate whose declared type equals `requested`
///   exactly; if none or more than one does, [`Ambiguity`] with all of them.
pub fn most_specific_or_fail<C>(
    mut candidates: Vec<C>,
    requested: &TypeRef,
    raw_type: impl Fn(&C) -> &TypeRef,
) -> Result<Option<C>, Ambiguity<C>> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => {
            let mut exact = candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| raw_type(c) == requested)
                .map(|(i, _)| i);
            match (exact.next(), exact.next()) {
                (Some(index), None) => Ok(Some(candidates.swap_remove(index))),
                _ => Err(Ambiguity { candidates }),
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/specificity_tests.rs"]
mod tests;
