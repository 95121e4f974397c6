//! # emma
//!
//! Exceptional model mining: find the subgroups of a dataset, described by
//! conjunctions of column predicates, whose behaviour on some target deviates
//! most from the population.
//!
//! ## Key Features
//!
//! - **Model agnostic**: quality and admissibility are caller callbacks
//! - **Canonical descriptions**: every subgroup is scored at most once
//! - **Merge-aware refinement**: `InSet` candidates narrow instead of stacking
//! - **Bounded results**: best-of-k retention with stable tie-breaking
//! - **Parallel scoring**: optional rayon execution with identical output
//!
//! ## Example
//!
//! ```rust,ignore
//! use emma::{search, AlwaysAdmissible, Description, Predicate, QualityScore, Vocabulary};
//!
//! let vocabulary = Vocabulary::new()
//!     .with_column("sex", [Predicate::equals("sex", "Male")])?
//!     .with_column("income", [Predicate::equals("income", "High")])?;
//!
//! let quality = |d: &Description| Ok(QualityScore::from(-(d.len() as f64)));
//! let results = search(&vocabulary, 2, quality, AlwaysAdmissible)?;
//! // [income == "High", sex == "Male"] first
//! ```

// Module declarations
pub mod conf;
pub mod constraint;
pub mod dataframe;
pub mod description;
pub mod error;
pub mod predicate;
pub mod quality;
pub mod refine;
pub mod search;
pub mod topk;
pub mod value;
pub mod vocabulary;

pub use conf::{ExecutionMode, FailurePolicy, SearchConfig};
pub use description::Description;
pub use error::{EmmError, EvalError, Result};
pub use predicate::{Predicate, PredicateKind, Row};
pub use quality::{AlwaysAdmissible, Constraint, QualityMeasure, QualityScore};
pub use refine::{MergeOutcome, Refinement, merge, refine, refinements};
pub use search::{CancellationToken, Emm, SearchOutcome, SearchStats, search};
pub use topk::{ResultEntry, TopK};
pub use value::Value;
pub use vocabulary::{Vocabulary, VocabularyOptions};
