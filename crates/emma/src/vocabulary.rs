use crate::dataframe::EmmSeriesExt;
use crate::error::{EmmError, Result};
use crate::predicate::Predicate;
use crate::value::Value;
use itertools::Itertools;
use polars::prelude::*;

/// Candidate predicates per column, in insertion order.
///
/// Built once before a search and passed in immutably. Every candidate must
/// reference the column it is listed under.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vocabulary {
    columns: Vec<(String, Vec<Predicate>)>,
}

/// Options for discovering a vocabulary from a `DataFrame`.
#[derive(Clone, Debug, Default)]
pub struct VocabularyOptions {
    /// Columns never described (typically the target).
    pub exclude: Vec<String>,
    /// Equal-frequency `InRange` bins per numeric column; `None` skips numeric columns.
    pub numeric_bins: Option<usize>,
    /// Categorical columns with more distinct values than this are skipped.
    pub max_categories: Option<usize>,
}

impl VocabularyOptions {
    pub fn exclude<S: Into<String>>(mut self, column: S) -> Self {
        self.exclude.push(column.into());
        self
    }

    pub fn with_numeric_bins(mut self, bins: usize) -> Self {
        self.numeric_bins = Some(bins);
        self
    }

    pub fn with_max_categories(mut self, max: usize) -> Self {
        self.max_categories = Some(max);
        self
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append candidates for `column`. Repeated columns extend the existing
    /// entry; repeated candidates are kept once.
    pub fn insert<S, I>(&mut self, column: S, options: I) -> Result<()>
    where
        S: Into<String>,
        I: IntoIterator<Item = Predicate>,
    {
        let column = column.into();
        let options: Vec<Predicate> = options.into_iter().collect();
        if let Some(bad) = options.iter().find(|p| p.column() != column) {
            return Err(EmmError::InvalidVocabulary(format!(
                "candidate '{}' listed under column '{}'",
                bad, column
            )));
        }

        let pos = match self.columns.iter().position(|(c, _)| *c == column) {
            Some(pos) => pos,
            None => {
                self.columns.push((column, Vec::new()));
                self.columns.len() - 1
            }
        };
        let entry = &mut self.columns[pos].1;
        for option in options {
            if !entry.contains(&option) {
                entry.push(option);
            }
        }
        Ok(())
    }

    pub fn with_column<S, I>(mut self, column: S, options: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = Predicate>,
    {
        self.insert(column, options)?;
        Ok(self)
    }

    pub fn from_columns<S, I, C>(columns: C) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = Predicate>,
        C: IntoIterator<Item = (S, I)>,
    {
        let mut vocabulary = Self::new();
        for (column, options) in columns {
            vocabulary.insert(column, options)?;
        }
        Ok(vocabulary)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Predicate])> {
        self.columns.iter().map(|(c, o)| (c.as_str(), o.as_slice()))
    }

    /// Every candidate, columns in insertion order.
    pub fn candidates(&self) -> impl Iterator<Item = &Predicate> {
        self.columns.iter().flat_map(|(_, o)| o.iter())
    }

    pub fn options(&self, column: &str) -> Option<&[Predicate]> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, o)| o.as_slice())
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(c, _)| c.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn num_candidates(&self) -> usize {
        self.columns.iter().map(|(_, o)| o.len()).sum()
    }

    /// Upper bound on expansions, `prod(m_i + 1) - 1`, for vocabularies whose
    /// merges never create new predicates (Equals-only columns).
    pub fn expansion_bound(&self) -> u128 {
        self.columns
            .iter()
            .fold(1u128, |acc, (_, o)| acc.saturating_mul(o.len() as u128 + 1))
            - 1
    }

    /// One `Equals` per distinct non-null value of every categorical column
    /// (string, categorical, enum, boolean), in first-seen order. Numeric
    /// columns contribute equal-frequency `InRange` bins when requested.
    pub fn from_dataframe(df: &DataFrame, opts: &VocabularyOptions) -> Result<Self> {
        let mut vocabulary = Self::new();
        for column in df.get_columns() {
            let name = column.name().to_string();
            if opts.exclude.contains(&name) {
                continue;
            }
            let series = column.as_materialized_series();
            if series.is_categorical_like() {
                let distinct: Vec<Value> = series
                    .to_values()?
                    .into_iter()
                    .flatten()
                    .unique()
                    .collect();
                if opts.max_categories.is_some_and(|max| distinct.len() > max) {
                    continue;
                }
                let options = distinct
                    .into_iter()
                    .map(|v| Predicate::equals(name.as_str(), v));
                vocabulary.insert(name.as_str(), options)?;
            } else if series.dtype().is_primitive_numeric() {
                if let Some(bins) = opts.numeric_bins {
                    let options = numeric_bins(&name, &series.to_values()?, bins)?;
                    if !options.is_empty() {
                        vocabulary.insert(name.as_str(), options)?;
                    }
                }
            }
        }
        Ok(vocabulary)
    }
}

fn numeric_bins(column: &str, values: &[Option<Value>], bins: usize) -> Result<Vec<Predicate>> {
    if bins == 0 {
        return Err(EmmError::InvalidConfig(
            "numeric_bins must be at least 1".to_string(),
        ));
    }
    let sorted: Vec<f64> = values
        .iter()
        .flatten()
        .filter_map(Value::as_f64)
        .filter(|x| !x.is_nan())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();
    if sorted.is_empty() {
        return Ok(Vec::new());
    }

    let last = sorted.len() - 1;
    let cut = |i: usize| sorted[(i * last) / bins];
    (0..bins)
        .map(|i| (cut(i), cut(i + 1)))
        .dedup()
        .map(|(low, high)| Predicate::in_range(column, low, high))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_misfiled_candidate() {
        let err = Vocabulary::new().with_column("sex", [Predicate::equals("income", "High")]);
        assert!(matches!(err, Err(EmmError::InvalidVocabulary(_))));
    }

    #[test]
    fn repeated_columns_extend() {
        let mut v = Vocabulary::new();
        v.insert("a", [Predicate::equals("a", 1i64)]).unwrap();
        v.insert("a", [Predicate::equals("a", 1i64), Predicate::equals("a", 2i64)])
            .unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v.num_candidates(), 2);
        assert_eq!(v.expansion_bound(), 2);
    }

    #[test]
    fn numeric_bins_cover_range() {
        let values: Vec<Option<Value>> = (0..=10).map(|i| Some(Value::Int(i))).collect();
        let bins = numeric_bins("x", &values, 2).unwrap();
        assert_eq!(
            bins,
            vec![
                Predicate::in_range("x", 0.0, 5.0).unwrap(),
                Predicate::in_range("x", 5.0, 10.0).unwrap(),
            ]
        );
    }
}
