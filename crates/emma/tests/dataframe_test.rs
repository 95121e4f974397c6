//! Integration tests for the polars helpers: row selection, vocabulary
//! discovery and the support constraint, plus a full search over a
//! generated DataFrame.

use std::sync::Arc;

use emma::constraint::SupportConstraint;
use emma::dataframe::{EmmDataFrameExt, description_to_indices};
use emma::{
    Constraint, Description, Emm, EvalError, ExecutionMode, Predicate, QualityScore,
    SearchConfig, Value, Vocabulary, VocabularyOptions,
};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::Statistics;

fn small_df() -> DataFrame {
    let sex = Series::new(
        PlSmallStr::from_static("sex"),
        ["Male", "Female", "Male", "Female", "Male", "Male"],
    );
    let income_utf8 = Series::new(
        PlSmallStr::from_static("income"),
        ["High", "Low", "Low", "High", "High", "Low"],
    );
    let cats = FrozenCategories::new(["Low", "High"]).unwrap();
    let income = income_utf8
        .cast(&DataType::from_frozen_categories(cats))
        .unwrap();
    let age = Series::new(
        PlSmallStr::from_static("age"),
        [25i64, 32, 47, 51, 38, 29],
    );
    let target = Series::new(
        PlSmallStr::from_static("target"),
        [1.0f64, 0.0, 0.0, 1.0, 1.0, 0.0],
    );
    let columns: Vec<Column> = vec![sex, income, age, target]
        .into_iter()
        .map(|s| s.into())
        .collect();
    DataFrame::new(columns).unwrap()
}

fn indices(df: &DataFrame, d: &Description) -> Vec<u32> {
    description_to_indices(df, d)
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn rows_matching_a_description() {
    let df = small_df();
    let male = Description::new([Predicate::equals("sex", "Male")]);
    assert_eq!(indices(&df, &male), vec![0, 2, 4, 5]);

    let male_young = Description::new([
        Predicate::equals("sex", "Male"),
        Predicate::in_range("age", 20.0, 40.0).unwrap(),
    ]);
    assert_eq!(indices(&df, &male_young), vec![0, 4, 5]);

    // enum columns compare by category name
    let high = Description::new([Predicate::equals("income", "High")]);
    assert_eq!(indices(&df, &high), vec![0, 3, 4]);

    assert_eq!(indices(&df, &Description::empty()), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(df.subgroup(&male_young).unwrap().height(), 3);
}

#[test]
fn unknown_column_is_an_error() {
    let df = small_df();
    let d = Description::new([Predicate::equals("missing", 1i64)]);
    assert!(description_to_indices(&df, &d).is_err());
}

#[test]
fn column_values_by_dtype() {
    let df = small_df();
    assert_eq!(
        df.column_values("age").unwrap()[0],
        Some(Value::Int(25))
    );
    assert_eq!(
        df.column_values("income").unwrap()[1],
        Some(Value::from("Low"))
    );
    assert_eq!(
        df.column_values("target").unwrap()[0],
        Some(Value::Float(1.0))
    );
}

#[test]
fn vocabulary_from_categorical_columns() {
    let df = small_df();
    let opts = VocabularyOptions::default().exclude("target");
    let vocabulary = Vocabulary::from_dataframe(&df, &opts).unwrap();

    assert_eq!(vocabulary.columns(), vec!["sex", "income"]);
    assert_eq!(
        vocabulary.options("sex").unwrap(),
        &[
            Predicate::equals("sex", "Male"),
            Predicate::equals("sex", "Female"),
        ]
    );
    assert_eq!(
        vocabulary.options("income").unwrap(),
        &[
            Predicate::equals("income", "High"),
            Predicate::equals("income", "Low"),
        ]
    );
}

#[test]
fn vocabulary_with_numeric_bins_and_category_cap() {
    let df = small_df();
    let opts = VocabularyOptions::default()
        .exclude("target")
        .with_numeric_bins(2)
        .with_max_categories(1);
    let vocabulary = Vocabulary::from_dataframe(&df, &opts).unwrap();

    // both categorical columns have two values, above the cap
    assert_eq!(vocabulary.columns(), vec!["age"]);
    assert_eq!(
        vocabulary.options("age").unwrap(),
        &[
            Predicate::in_range("age", 25.0, 32.0).unwrap(),
            Predicate::in_range("age", 32.0, 51.0).unwrap(),
        ]
    );
}

#[test]
fn support_constraint_checks_size_and_target_mean() {
    let df = Arc::new(small_df());
    let size_only = SupportConstraint::new(Arc::clone(&df), 3);
    let balanced = SupportConstraint::new(Arc::clone(&df), 3).with_target_mean("target", 0.1, 0.9);

    let male = Description::new([Predicate::equals("sex", "Male")]);
    let female = Description::new([Predicate::equals("sex", "Female")]);
    let high = Description::new([Predicate::equals("income", "High")]);

    assert_eq!(size_only.subgroup_size(&male), Ok(4));
    assert_eq!(size_only.satisfies(&male), Ok(true));
    assert_eq!(size_only.satisfies(&female), Ok(false));
    assert_eq!(size_only.satisfies(&high), Ok(true));

    // mean 0.5
    assert_eq!(balanced.satisfies(&male), Ok(true));
    // mean 1.0
    assert_eq!(balanced.satisfies(&high), Ok(false));
}

fn generated_df(n: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let levels = ["a", "b", "c"];
    let mut columns: Vec<Column> = Vec::new();
    for name in ["x0", "x1", "x2"] {
        let values: Vec<&str> = (0..n).map(|_| levels[rng.random_range(0..3)]).collect();
        columns.push(Series::new(PlSmallStr::from_str(name), values).into());
    }
    let target: Vec<f64> = (0..n)
        .map(|_| if rng.random_bool(0.4) { 1.0 } else { 0.0 })
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("target"), target).into());
    DataFrame::new(columns).unwrap()
}

fn target_mean(df: &DataFrame, d: &Description) -> Result<(f64, usize), EvalError> {
    let idx = description_to_indices(df, d)?;
    let target = df.column("target")?.as_materialized_series().take(&idx)?;
    let values: Vec<f64> = target.f64()?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(EvalError::Degenerate("empty subgroup".into()));
    }
    let n = values.len();
    Ok((values.mean(), n))
}

#[test]
fn search_over_generated_dataframe() {
    let df = Arc::new(generated_df(300, 11));
    let vocabulary =
        Vocabulary::from_dataframe(&df, &VocabularyOptions::default().exclude("target")).unwrap();
    let (overall, _) = target_mean(&df, &Description::empty()).unwrap();

    let quality = |d: &Description| -> Result<QualityScore, EvalError> {
        let (mean, size) = target_mean(&df, d)?;
        Ok(QualityScore::from((
            -(mean - overall).abs(),
            size as f64,
            -(d.len() as f64),
        )))
    };
    let constraint = SupportConstraint::new(Arc::clone(&df), 20);

    let sequential = Emm::new(quality, vocabulary.clone(), constraint.clone())
        .run(5)
        .unwrap();
    let parallel = Emm::new(quality, vocabulary, constraint.clone())
        .with_config(SearchConfig::default().with_execution(ExecutionMode::Parallel))
        .run(5)
        .unwrap();

    assert_eq!(sequential.results.len(), 5);
    assert_eq!(sequential.results, parallel.results);
    for entry in &sequential.results {
        assert!(constraint.subgroup_size(&entry.description).unwrap() >= 20);
    }
    let scores: Vec<&QualityScore> = sequential.results.iter().map(|e| &e.score).collect();
    let mut sorted = scores.clone();
    sorted.sort();
    assert_eq!(scores, sorted);
}
