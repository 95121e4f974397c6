use crate::dataframe::description_to_indices;
use crate::description::Description;
use crate::error::EvalError;
use crate::quality::Constraint;
use polars::prelude::*;
use statrs::statistics::Statistics;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct TargetMeanBounds {
    pub column: String,
    /// Exclusive
    pub low: f64,
    /// Exclusive
    pub high: f64,
}

/// Admissible iff the subgroup has at least `min_size` rows and, when
/// configured, the mean of the target column lies strictly between the
/// bounds.
///
/// The size check is anti-monotone under refinement; the target-mean check
/// is not, so pruning with it may skip admissible descendants.
#[derive(Clone, Debug)]
pub struct SupportConstraint {
    df: Arc<DataFrame>,
    min_size: usize,
    target: Option<TargetMeanBounds>,
}

impl SupportConstraint {
    pub fn new(df: Arc<DataFrame>, min_size: usize) -> Self {
        Self {
            df,
            min_size,
            target: None,
        }
    }

    pub fn with_target_mean(mut self, column: impl Into<String>, low: f64, high: f64) -> Self {
        self.target = Some(TargetMeanBounds {
            column: column.into(),
            low,
            high,
        });
        self
    }

    pub fn subgroup_size(&self, description: &Description) -> Result<usize, EvalError> {
        Ok(description_to_indices(&self.df, description)?.len())
    }
}

impl Constraint for SupportConstraint {
    fn satisfies(&self, description: &Description) -> Result<bool, EvalError> {
        let idx = description_to_indices(&self.df, description)?;
        if idx.len() < self.min_size {
            return Ok(false);
        }

        let Some(bounds) = &self.target else {
            return Ok(true);
        };
        let target = self
            .df
            .column(&bounds.column)?
            .as_materialized_series()
            .take(&idx)?
            .cast(&DataType::Float64)?;
        let values: Vec<f64> = target.f64()?.into_iter().flatten().collect();
        if values.is_empty() {
            return Ok(false);
        }
        let mean = values.iter().mean();
        Ok(bounds.low < mean && mean < bounds.high)
    }
}
