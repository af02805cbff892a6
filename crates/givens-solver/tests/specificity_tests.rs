use super::*;
use crate::types::ClassifierId;

fn ty(id: u32) -> TypeRef {
    TypeRef::of(ClassifierId(id))
}

#[test]
fn test_no_candidates() {
    let picked = most_specific_or_fail(Vec::<(u8, TypeRef)>::new(), &ty(20), |c| &c.1);
    assert_eq!(picked, Ok(None));
}

#[test]
fn test_single_candidate_wins_without_exact_match() {
    let picked = most_specific_or_fail(vec![(1u8, ty(21))], &ty(20), |c| &c.1);
    assert_eq!(picked, Ok(Some((1, ty(21)))));
}

#[test]
fn test_exact_match_breaks_tie() {
    let candidates = vec![(1u8, ty(21)), (2, ty(20)), (3, ty(22))];
    let picked = most_specific_or_fail(candidates, &ty(20), |c| &c.1);
    assert_eq!(picked, Ok(Some((2, ty(20)))));
}

#[test]
fn test_no_exact_match_is_ambiguous() {
    let candidates = vec![(1u8, ty(21)), (2, ty(22))];
    let picked = most_specific_or_fail(candidates.clone(), &ty(20), |c| &c.1);
    assert_eq!(picked, Err(Ambiguity { candidates }));
}

#[test]
fn test_two_exact_matches_are_ambiguous() {
    let candidates = vec![(1u8, ty(20)), (2, ty(20))];
    let picked = most_specific_or_fail(candidates, &ty(20), |c| &c.1);
    let Err(ambiguity) = picked else {
        panic!("expected ambiguity");
    };
    assert_eq!(ambiguity.candidates.len(), 2);
    assert_eq!(ambiguity.candidates[0].0, 1);
}
