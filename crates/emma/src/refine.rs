//! Refinement operator: expands a description into its children by adding or
//! narrowing one predicate from the vocabulary.
//!
//! Merge table for an incoming candidate against an existing predicate on the
//! same column (anything not listed is rejected):
//!
//! | existing | incoming | result                                           |
//! |----------|----------|--------------------------------------------------|
//! | InSet    | Equals   | incoming if its value is in the set, else reject |
//! | InSet    | InSet    | intersection (Equals if singleton, reject if empty) |
//!
//! The operator is pure: no deduplication, no pruning, no state across calls.

use crate::description::Description;
use crate::error::EvalError;
use crate::predicate::Predicate;
use crate::vocabulary::Vocabulary;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq)]
pub enum MergeOutcome {
    /// The existing predicate is dropped and this one carries on as the candidate.
    Replace(Predicate),
    /// The candidate cannot be combined with the description.
    Reject,
}

/// Merge `incoming` into `existing`; both must reference the same column.
pub fn merge(existing: &Predicate, incoming: &Predicate) -> MergeOutcome {
    debug_assert_eq!(existing.column(), incoming.column());
    match (existing, incoming) {
        (Predicate::InSet { values, .. }, Predicate::Equals { value, .. }) => {
            if values.contains(value) {
                MergeOutcome::Replace(incoming.clone())
            } else {
                MergeOutcome::Reject
            }
        }
        (Predicate::InSet { column, values: a }, Predicate::InSet { values: b, .. }) => {
            let common: BTreeSet<_> = a.intersection(b).cloned().collect();
            match Predicate::from_value_set(column.as_str(), common) {
                Some(narrowed) => MergeOutcome::Replace(narrowed),
                None => MergeOutcome::Reject,
            }
        }
        _ => MergeOutcome::Reject,
    }
}

/// The child obtained by refining `description` with `option`, if any.
pub fn refine_with(description: &Description, option: &Predicate) -> Option<Description> {
    if description.contains(option) {
        return None;
    }

    let mut incoming = option.clone();
    let mut kept = Vec::with_capacity(description.len() + 1);
    for existing in description.predicates() {
        if existing.column() != incoming.column() {
            kept.push(existing.clone());
            continue;
        }
        match merge(existing, &incoming) {
            MergeOutcome::Replace(merged) => incoming = merged,
            MergeOutcome::Reject => return None,
        }
    }
    kept.push(incoming);
    Some(Description::new(kept))
}

/// Lazy sequence of children, in vocabulary order.
pub fn refinements<'a>(
    description: &'a Description,
    vocabulary: &'a Vocabulary,
) -> impl Iterator<Item = Description> + 'a {
    vocabulary
        .candidates()
        .filter_map(move |option| refine_with(description, option))
}

pub fn refine(description: &Description, vocabulary: &Vocabulary) -> Vec<Description> {
    refinements(description, vocabulary).collect()
}

/// A refinement operator usable by the search controller.
///
/// Implemented by [`Vocabulary`] (the merge rules above) and by any
/// `Fn(&Description) -> Vec<Description>`, for callers bringing their own.
pub trait Refinement: Sync {
    fn refine(&self, description: &Description) -> Vec<Description>;

    /// Fallible form used by the search controller. A failure counts against
    /// `SearchStats::failed` and leaves the description without children.
    fn try_refine(&self, description: &Description) -> Result<Vec<Description>, EvalError> {
        Ok(self.refine(description))
    }
}

impl Refinement for Vocabulary {
    fn refine(&self, description: &Description) -> Vec<Description> {
        refine(description, self)
    }
}

impl<F> Refinement for F
where
    F: Fn(&Description) -> Vec<Description> + Sync,
{
    fn refine(&self, description: &Description) -> Vec<Description> {
        self(description)
    }
}
