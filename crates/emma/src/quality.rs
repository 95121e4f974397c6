use crate::description::Description;
use crate::error::EvalError;
use core::fmt;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordered tuple of components; lower is more exceptional.
///
/// Components compare lexicographically with `f64::total_cmp`, so later
/// components only break ties of earlier ones. A prefix orders before any
/// longer tuple it starts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QualityScore(Vec<f64>);

impl QualityScore {
    pub fn new(components: impl IntoIterator<Item = f64>) -> Self {
        Self(components.into_iter().collect())
    }

    pub fn components(&self) -> &[f64] {
        &self.0
    }

    pub fn primary(&self) -> Option<f64> {
        self.0.first().copied()
    }

    /// NaN components have no meaningful rank; the search rejects such scores.
    pub fn has_nan(&self) -> bool {
        self.0.iter().any(|x| x.is_nan())
    }
}

impl PartialEq for QualityScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QualityScore {}

impl PartialOrd for QualityScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualityScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

impl From<f64> for QualityScore {
    fn from(x: f64) -> Self {
        Self(vec![x])
    }
}

impl From<(f64, f64)> for QualityScore {
    fn from((a, b): (f64, f64)) -> Self {
        Self(vec![a, b])
    }
}

impl From<(f64, f64, f64)> for QualityScore {
    fn from((a, b, c): (f64, f64, f64)) -> Self {
        Self(vec![a, b, c])
    }
}

impl From<Vec<f64>> for QualityScore {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.iter().join(", "))
    }
}

/// Scores a description. Must be deterministic for a fixed dataset.
pub trait QualityMeasure: Sync {
    fn quality(&self, description: &Description) -> Result<QualityScore, EvalError>;
}

impl<F> QualityMeasure for F
where
    F: Fn(&Description) -> Result<QualityScore, EvalError> + Sync,
{
    fn quality(&self, description: &Description) -> Result<QualityScore, EvalError> {
        self(description)
    }
}

/// Admissibility predicate used for pruning.
///
/// Assumed anti-monotone under refinement: once a description is rejected
/// none of its refinements are visited through it.
pub trait Constraint: Sync {
    fn satisfies(&self, description: &Description) -> Result<bool, EvalError>;
}

impl<F> Constraint for F
where
    F: Fn(&Description) -> Result<bool, EvalError> + Sync,
{
    fn satisfies(&self, description: &Description) -> Result<bool, EvalError> {
        self(description)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAdmissible;

impl Constraint for AlwaysAdmissible {
    fn satisfies(&self, _description: &Description) -> Result<bool, EvalError> {
        Ok(true)
    }
}
