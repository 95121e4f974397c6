//! A description is a conjunction of predicates selecting a subgroup.
//!
//! Descriptions are kept in canonical form: predicates sorted by their
//! rendered string, ties broken by structural order. Equality and hashing
//! work on that form, so two descriptions reached through different
//! refinement paths compare equal.

use crate::predicate::{Predicate, Row};
use core::fmt;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Predicate>", into = "Vec<Predicate>")]
pub struct Description {
    predicates: Vec<Predicate>,
}

fn canonical_order(a: &(String, Predicate), b: &(String, Predicate)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

impl Description {
    /// Build a description; predicates are put in canonical order and exact
    /// duplicates are dropped.
    pub fn new(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let predicates = predicates
            .into_iter()
            .map(|p| (p.to_string(), p))
            .sorted_by(canonical_order)
            .map(|(_, p)| p)
            .dedup()
            .collect();
        Self { predicates }
    }

    /// The search root, matching every row.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn contains(&self, predicate: &Predicate) -> bool {
        self.predicates.contains(predicate)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.predicates.iter().map(|p| p.column()).unique().collect()
    }

    pub fn predicate_for(&self, column: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.column() == column)
    }

    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Canonical form used as the deduplication key.
    pub fn canonical(&self) -> Description {
        Description::new(self.predicates.iter().cloned())
    }

    pub fn into_predicates(self) -> Vec<Predicate> {
        self.predicates
    }
}

impl From<Vec<Predicate>> for Description {
    fn from(predicates: Vec<Predicate>) -> Self {
        Self::new(predicates)
    }
}

impl From<Description> for Vec<Predicate> {
    fn from(description: Description) -> Self {
        description.into_predicates()
    }
}

impl FromIterator<Predicate> for Description {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Description::new(iter)
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.predicates.iter().join(", "))
    }
}
