use emma::constraint::SupportConstraint;
use emma::dataframe::description_to_indices;
use emma::{Description, Emm, EvalError, QualityScore, SearchConfig, Vocabulary, VocabularyOptions};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::Statistics;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// Census-like table: a few categorical columns and a binary income target
// whose rate depends on some of them.
fn generate_census(n_samples: usize, seed: u64) -> PolarsResult<DataFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sexes = ["Male", "Female"];
    let educations = ["HS-grad", "Some-college", "Bachelors", "Masters"];
    let workclasses = ["Private", "Self-emp", "Gov"];
    let races = ["White", "Black", "Asian-Pac-Islander", "Other"];

    let mut sex = Vec::with_capacity(n_samples);
    let mut education = Vec::with_capacity(n_samples);
    let mut workclass = Vec::with_capacity(n_samples);
    let mut race = Vec::with_capacity(n_samples);
    let mut income = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let s = sexes[rng.random_range(0..sexes.len())];
        let e = educations[rng.random_range(0..educations.len())];
        let w = workclasses[rng.random_range(0..workclasses.len())];
        let r = races[rng.random_range(0..races.len())];

        let mut p: f64 = 0.15;
        if s == "Male" {
            p += 0.1;
        }
        if e == "Bachelors" || e == "Masters" {
            p += 0.2;
        }
        if w == "Self-emp" && e == "Masters" {
            p += 0.3;
        }
        income.push(if rng.random_bool(p.min(0.95)) { 1.0 } else { 0.0 });
        sex.push(s);
        education.push(e);
        workclass.push(w);
        race.push(r);
    }

    let cols: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static("sex"), sex).into(),
        Series::new(PlSmallStr::from_static("education"), education).into(),
        Series::new(PlSmallStr::from_static("workclass"), workclass).into(),
        Series::new(PlSmallStr::from_static("race"), race).into(),
        Series::new(PlSmallStr::from_static("income"), income).into(),
    ];
    DataFrame::new(cols)
}

fn income_rate(df: &DataFrame, d: &Description) -> Result<(f64, usize), EvalError> {
    let idx = description_to_indices(df, d)?;
    let income = df.column("income")?.as_materialized_series().take(&idx)?;
    let values: Vec<f64> = income.f64()?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(EvalError::Degenerate("empty subgroup".to_string()));
    }
    let n = values.len();
    Ok((values.mean(), n))
}

fn main() -> emma::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Exceptional subgroups (census-like data) ===");

    let df = Arc::new(generate_census(5000, 7)?);
    println!(
        "DataFrame shape: {{ rows: {}, cols: {} }}",
        df.height(),
        df.width()
    );

    let vocabulary =
        Vocabulary::from_dataframe(&df, &VocabularyOptions::default().exclude("income"))?;
    println!(
        "Vocabulary: {} columns, {} candidates, at most {} subgroups",
        vocabulary.len(),
        vocabulary.num_candidates(),
        vocabulary.expansion_bound() + 1
    );

    let (overall, _) = income_rate(&df, &Description::empty())
        .map_err(|e| emma::EmmError::DataFrame(e.to_string()))?;

    // Deviation of the subgroup's income rate from the population, scaled by
    // the square root of its size; larger subgroups break ties.
    let quality = |d: &Description| -> Result<QualityScore, EvalError> {
        let (rate, size) = income_rate(&df, d)?;
        let deviation = (rate - overall).abs() * (size as f64).sqrt();
        Ok(QualityScore::from((
            -deviation,
            -(size as f64),
            -(d.len() as f64),
        )))
    };
    let constraint =
        SupportConstraint::new(Arc::clone(&df), 101).with_target_mean("income", 0.1, 0.9);

    let config = SearchConfig::new(15).with_execution(emma::ExecutionMode::Parallel);
    let emm = Emm::new(quality, vocabulary, constraint).with_config(config);

    let start = Instant::now();
    let outcome = emm.run_configured()?;
    let duration = start.elapsed();

    println!("Search time: {:.2?}", duration);
    println!(
        "Visited {} descriptions: {} scored, {} pruned, {} duplicates",
        outcome.stats.popped, outcome.stats.scored, outcome.stats.pruned, outcome.stats.duplicates
    );
    println!("Overall income rate: {:.3}", overall);
    for (rank, entry) in outcome.results.iter().enumerate() {
        println!("{:>2}. {}", rank + 1, entry);
    }

    Ok(())
}
