//! Search controller: exhaustive breadth-first exploration of the description
//! lattice with deduplication, anti-monotone pruning and top-k retention.
//!
//! Search order overview:
//! 1) Seed the frontier with the empty description.
//! 2) Pop a description, canonicalize it and drop it if already visited.
//! 3) Ask the constraint; inadmissible descriptions are neither scored nor
//!    expanded.
//! 4) Score admissible descriptions, offer them to the top-k selector and
//!    push their refinements to the back of the frontier.
//! 5) Stop when the frontier is empty, or early on cancellation/deadline.
//!
//! In parallel mode a whole frontier level goes through steps 2-3 serially,
//! then scoring and refinement run on the rayon pool and the results are
//! merged back in frontier order. The output matches the sequential mode.

use crate::conf::{ExecutionMode, FailurePolicy, SearchConfig};
use crate::description::Description;
use crate::error::{EvalError, Result};
use crate::quality::{Constraint, QualityMeasure, QualityScore};
use crate::refine::{Refinement, refine};
use crate::topk::{ResultEntry, TopK};
use crate::vocabulary::Vocabulary;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, trace, warn};

/// Shared flag for stopping a running search from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Idle,
    Expanding,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Descriptions taken off the frontier
    pub popped: usize,
    /// Popped descriptions already visited
    pub duplicates: usize,
    /// Rejected by the constraint
    pub pruned: usize,
    /// Successfully scored
    pub scored: usize,
    /// Callback failures (quality, constraint or refinement); NaN scores
    /// count here too
    pub failed: usize,
    /// Descriptions whose refinements were computed, leaves included
    pub expanded: usize,
    /// Children pushed onto the frontier
    pub enqueued: usize,
    /// Children dropped by `max_depth`
    pub depth_limited: usize,
    pub max_frontier: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best first
    pub results: Vec<ResultEntry>,
    pub stats: SearchStats,
}

/// Exceptional model mining over a caller-supplied quality measure,
/// refinement operator and admissibility constraint.
pub struct Emm<Q, R, C> {
    quality: Q,
    refinement: R,
    constraint: C,
    config: SearchConfig,
    cancellation: Option<CancellationToken>,
}

impl<Q, R, C> Emm<Q, R, C>
where
    Q: QualityMeasure,
    R: Refinement,
    C: Constraint,
{
    pub fn new(quality: Q, refinement: R, constraint: C) -> Self {
        Self {
            quality,
            refinement,
            constraint,
            config: SearchConfig::default(),
            cancellation: None,
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The `top_q` most exceptional descriptions, best first.
    pub fn most_exceptional(&self, top_q: usize) -> Result<Vec<ResultEntry>> {
        Ok(self.run(top_q)?.results)
    }

    /// Run one search with the configured `top_q`.
    pub fn run_configured(&self) -> Result<SearchOutcome> {
        self.run(self.config.top_q)
    }

    /// Run one search; `top_q` overrides the configured value.
    pub fn run(&self, top_q: usize) -> Result<SearchOutcome> {
        let config = SearchConfig {
            top_q,
            ..self.config.clone()
        };
        config.validate()?;

        let span = info_span!("emm_search", top_q);
        let _guard = span.enter();

        let mut controller = SearchController::new(self, &config)?;
        controller.run();
        Ok(controller.finish())
    }
}

/// Top-`top_q` search over `vocabulary` with the built-in merge rules.
pub fn search<Q, C>(
    vocabulary: &Vocabulary,
    top_q: usize,
    quality: Q,
    satisfies: C,
) -> Result<Vec<ResultEntry>>
where
    Q: QualityMeasure,
    C: Constraint,
{
    let refinement = |d: &Description| refine(d, vocabulary);
    Emm::new(quality, refinement, satisfies).most_exceptional(top_q)
}

enum Admission {
    Score(Description),
    // constraint failed under FailurePolicy::ExpandChildren
    ExpandOnly(Description),
}

struct Evaluation {
    description: Description,
    outcome: Option<std::result::Result<QualityScore, EvalError>>,
    // None when the description is not expanded
    children: Option<std::result::Result<Vec<Description>, EvalError>>,
}

fn reject_nan(score: QualityScore) -> std::result::Result<QualityScore, EvalError> {
    if score.has_nan() {
        return Err(EvalError::Numerical(format!(
            "quality score {} has a NaN component",
            score
        )));
    }
    Ok(score)
}

// Scoring and refinement of one admitted description. Touches no controller
// state so it can run on the rayon pool.
fn evaluate<Q, R, C>(emm: &Emm<Q, R, C>, policy: FailurePolicy, admission: Admission) -> Evaluation
where
    Q: QualityMeasure,
    R: Refinement,
    C: Constraint,
{
    let (description, outcome) = match admission {
        Admission::Score(description) => {
            let outcome = emm.quality.quality(&description).and_then(reject_nan);
            (description, Some(outcome))
        }
        Admission::ExpandOnly(description) => (description, None),
    };
    let expand = match &outcome {
        Some(Err(_)) => policy == FailurePolicy::ExpandChildren,
        _ => true,
    };
    let children = expand.then(|| emm.refinement.try_refine(&description));
    Evaluation {
        description,
        outcome,
        children,
    }
}

struct SearchController<'a, Q, R, C> {
    emm: &'a Emm<Q, R, C>,
    config: &'a SearchConfig,
    frontier: VecDeque<Description>,
    visited: HashSet<Description>,
    top: TopK,
    stats: SearchStats,
    state: SearchState,
    started: Instant,
}

impl<'a, Q, R, C> SearchController<'a, Q, R, C>
where
    Q: QualityMeasure,
    R: Refinement,
    C: Constraint,
{
    fn new(emm: &'a Emm<Q, R, C>, config: &'a SearchConfig) -> Result<Self> {
        Ok(Self {
            emm,
            config,
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            top: TopK::new(config.top_q)?,
            stats: SearchStats::default(),
            state: SearchState::Idle,
            started: Instant::now(),
        })
    }

    fn run(&mut self) {
        self.started = Instant::now();
        self.frontier.push_back(Description::empty());
        self.state = SearchState::Expanding;

        match self.config.execution {
            ExecutionMode::Sequential => self.run_sequential(),
            ExecutionMode::Parallel => self.run_parallel(),
        }
        self.state = SearchState::Done;
    }

    fn run_sequential(&mut self) {
        while let Some(description) = self.frontier.pop_front() {
            if self.should_stop() {
                self.stats.cancelled = true;
                break;
            }
            if let Some(admission) = self.admit(description) {
                let evaluation = evaluate(self.emm, self.config.failure_policy, admission);
                self.absorb(evaluation);
            }
        }
    }

    fn run_parallel(&mut self) {
        while !self.frontier.is_empty() {
            if self.should_stop() {
                self.stats.cancelled = true;
                break;
            }
            let level: Vec<Description> = self.frontier.drain(..).collect();
            let admitted: Vec<Admission> =
                level.into_iter().filter_map(|d| self.admit(d)).collect();

            let emm = self.emm;
            let policy = self.config.failure_policy;
            let evaluations: Vec<Evaluation> = admitted
                .into_par_iter()
                .map(|admission| evaluate(emm, policy, admission))
                .collect();

            for evaluation in evaluations {
                self.absorb(evaluation);
            }
        }
    }

    fn should_stop(&self) -> bool {
        let cancelled = self
            .emm
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled());
        let expired = self
            .config
            .deadline
            .is_some_and(|deadline| self.started.elapsed() >= deadline);
        cancelled || expired
    }

    // Steps 2-4: canonicalize, deduplicate, check admissibility.
    fn admit(&mut self, description: Description) -> Option<Admission> {
        self.stats.popped += 1;
        let description = description.canonical();
        if !self.visited.insert(description.clone()) {
            self.stats.duplicates += 1;
            return None;
        }

        match self.emm.constraint.satisfies(&description) {
            Ok(true) => Some(Admission::Score(description)),
            Ok(false) => {
                self.stats.pruned += 1;
                debug!(description = %description, "pruned: inadmissible");
                None
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(description = %description, error = %e, "constraint callback failed");
                match self.config.failure_policy {
                    FailurePolicy::SkipSubtree => None,
                    FailurePolicy::ExpandChildren => Some(Admission::ExpandOnly(description)),
                }
            }
        }
    }

    // Step 5 bookkeeping: offer the score, enqueue the children.
    fn absorb(&mut self, evaluation: Evaluation) {
        let Evaluation {
            description,
            outcome,
            children,
        } = evaluation;

        let children = match children {
            Some(Ok(children)) => {
                self.stats.expanded += 1;
                trace!(description = %description, children = children.len(), "expanded");
                children
            }
            Some(Err(e)) => {
                self.stats.failed += 1;
                warn!(description = %description, error = %e, "refinement failed");
                Vec::new()
            }
            None => Vec::new(),
        };

        match outcome {
            Some(Ok(score)) => {
                self.stats.scored += 1;
                self.top.offer(ResultEntry::new(description, score));
            }
            Some(Err(e)) => {
                self.stats.failed += 1;
                warn!(description = %description, error = %e, "quality callback failed");
            }
            None => {}
        }

        for child in children {
            if self.config.max_depth.is_some_and(|max| child.len() > max) {
                self.stats.depth_limited += 1;
                continue;
            }
            self.frontier.push_back(child);
            self.stats.enqueued += 1;
        }
        self.stats.max_frontier = self.stats.max_frontier.max(self.frontier.len());
    }

    fn finish(mut self) -> SearchOutcome {
        debug_assert_eq!(self.state, SearchState::Done);
        self.stats.elapsed = self.started.elapsed();
        info!(
            popped = self.stats.popped,
            scored = self.stats.scored,
            pruned = self.stats.pruned,
            duplicates = self.stats.duplicates,
            failed = self.stats.failed,
            cancelled = self.stats.cancelled,
            elapsed_ms = self.stats.elapsed.as_millis() as u64,
            "search finished"
        );
        SearchOutcome {
            results: self.top.into_sorted_vec(),
            stats: self.stats,
        }
    }
}
