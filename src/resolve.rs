//! Slot computation for chain convergence.
//!
//! Rules converge toward alphabetical-by-name order within a chain. Given a
//! stable desired set, recomputing against an already-converged chain yields
//! the same slot for every rule, so repeated runs produce no-op replacements
//! rather than drift.

/// Returns the 1-based slot at which `candidate` belongs among the rule
/// names currently live in its chain. An empty (or unknown) chain is slot 1.
///
/// Two rules sharing a name are not disambiguated: the slot of the first
/// occurrence after sorting is returned, which is also what makes the
/// replace path land on the existing copy.
pub fn chain_slot<S>(live: &[S], candidate: &str) -> usize where S: AsRef<str> {
  if live.is_empty() {
    return 1;
  }
  let mut names: Vec<&str> = live.iter().map(|name| name.as_ref()).collect();
  names.push(candidate);
  names.sort_unstable();
  match names.iter().position(|name| *name == candidate) {
    Some(index) => index + 1,
    None => 1,
  }
}
