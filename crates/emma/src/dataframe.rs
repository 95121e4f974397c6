//! Polars-backed row selection for descriptions.
//!
//! The search engine never touches rows; these helpers are for callers that
//! keep their data in a `DataFrame` and need to materialise subgroups inside
//! their quality and admissibility callbacks.

use crate::description::Description;
use crate::value::Value;
use polars::error::ErrString;
use polars::prelude::*;

/// Extension methods for Series
pub trait EmmSeriesExt {
    /// Values of the series as predicate-comparable cells; nulls become `None`.
    fn to_values(&self) -> PolarsResult<Vec<Option<Value>>>;

    /// String, categorical, enum and boolean series.
    fn is_categorical_like(&self) -> bool;
}

impl EmmSeriesExt for Series {
    fn to_values(&self) -> PolarsResult<Vec<Option<Value>>> {
        let dtype = self.dtype();
        match dtype {
            DataType::Boolean => Ok(self.bool()?.into_iter().map(|o| o.map(Value::Bool)).collect()),
            DataType::String => Ok(self
                .str()?
                .into_iter()
                .map(|o| o.map(|s| Value::Str(s.to_string())))
                .collect()),
            DataType::Categorical(_, _) | DataType::Enum(_, _) => {
                let as_str = self.cast(&DataType::String)?;
                Ok(as_str
                    .str()?
                    .into_iter()
                    .map(|o| o.map(|s| Value::Str(s.to_string())))
                    .collect())
            }
            dt if dt.is_float() => {
                let as_f64 = self.cast(&DataType::Float64)?;
                Ok(as_f64.f64()?.into_iter().map(|o| o.map(Value::Float)).collect())
            }
            dt if dt.is_integer() => {
                let as_i64 = self.cast(&DataType::Int64)?;
                Ok(as_i64.i64()?.into_iter().map(|o| o.map(Value::Int)).collect())
            }
            other => Err(PolarsError::ComputeError(ErrString::from(format!(
                "column '{}' has unsupported dtype for predicates: {other:?}",
                self.name()
            )))),
        }
    }

    fn is_categorical_like(&self) -> bool {
        matches!(
            self.dtype(),
            DataType::Boolean
                | DataType::String
                | DataType::Categorical(_, _)
                | DataType::Enum(_, _)
        )
    }
}

/// Extension methods for DataFrame
pub trait EmmDataFrameExt {
    /// Values of one column by name
    fn column_values(&self, name: &str) -> PolarsResult<Vec<Option<Value>>>;

    /// Row mask of the description (conjunction of its predicates)
    fn description_mask(&self, description: &Description) -> PolarsResult<Vec<bool>>;

    /// Rows selected by the description
    fn subgroup(&self, description: &Description) -> PolarsResult<DataFrame>;
}

impl EmmDataFrameExt for DataFrame {
    fn column_values(&self, name: &str) -> PolarsResult<Vec<Option<Value>>> {
        self.column(name)?.as_materialized_series().to_values()
    }

    fn description_mask(&self, description: &Description) -> PolarsResult<Vec<bool>> {
        let mut mask = vec![true; self.height()];
        for predicate in description.predicates() {
            let values = self.column_values(predicate.column())?;
            for (keep, hit) in mask.iter_mut().zip(predicate.evaluate(&values)) {
                *keep &= hit;
            }
        }
        Ok(mask)
    }

    fn subgroup(&self, description: &Description) -> PolarsResult<DataFrame> {
        let idx = description_to_indices(self, description)?;
        self.take(&idx)
    }
}

/// Row indices (ascending) matched by `description`.
pub fn description_to_indices(
    df: &DataFrame,
    description: &Description,
) -> PolarsResult<UInt32Chunked> {
    let idx: Vec<u32> = df
        .description_mask(description)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, keep)| keep.then_some(i as u32))
        .collect();
    Ok(UInt32Chunked::from_slice(PlSmallStr::from_static("idx"), &idx))
}
