//! EM-style iterative refinement of one candidate motif.
//!
//! A [`Refiner`] alternates between recomputing the best instance per
//! sequence under the current model (E-step) and re-estimating the model
//! from those instances (M-step), as an explicit state machine:
//!
//! ```text
//! Seeded -> Iterating -> ... -> Converged | Exhausted
//! ```
//!
//! Convergence is a fixed-point assignment or a relative score improvement
//! below epsilon; exhaustion is the iteration cap, reported in the result
//! rather than treated as failure. [`Refiner::step`] is the cancellation
//! boundary: callers may stop after any iteration and still
//! [`finish`](Refiner::finish) into a valid [`ScoredMotif`].

use ulva_core::{Result, Scored, Summarizable, UlvaError};

use crate::alphabet::Alphabet;
use crate::evaluate;
use crate::model::MotifModel;
use crate::seed::{self, InstanceAssignment, SeedStrategy};
use crate::seqset::SequenceSet;

/// Absolute slack below which a score change does not count as regression.
const REGRESSION_TOL: f64 = 1e-12;

/// Knobs for one refinement run. Passed by value into each run; never read
/// from process-wide state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefinerConfig {
    /// Smoothing pseudocount added per symbol when estimating the model.
    pub pseudocount: f64,
    /// Relative aggregate-score improvement below which the run converges.
    pub epsilon: f64,
    /// Maximum number of iterations before the run is declared exhausted.
    pub max_iters: usize,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            pseudocount: 0.1,
            epsilon: 1e-4,
            max_iters: 50,
        }
    }
}

/// State of a refinement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinerState {
    /// Initial assignment and model built, no iteration yet.
    Seeded,
    /// At least one iteration done, neither converged nor exhausted.
    Iterating,
    /// Fixed point reached or score improvement below epsilon.
    Converged,
    /// Iteration cap reached; best-so-far result is still valid.
    Exhausted,
}

/// A finalized motif: the model, its instances, and run metadata.
///
/// Immutable once produced; consumed read-only for ranking and
/// deduplication.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredMotif {
    /// Motif width.
    pub width: usize,
    /// Position probability matrix, one row per position.
    pub matrix: Vec<Vec<f64>>,
    /// Consensus sequence (most probable symbol per position).
    pub consensus: String,
    /// `(sequence identifier, offset)` for every assigned instance.
    pub instances: Vec<(String, usize)>,
    /// Aggregate enrichment score (sum of per-sequence best-window scores).
    pub score: f64,
    /// Seed value that initialized the run (0 for deterministic strategies).
    pub seed: u64,
    /// Whether the run reached a fixed point / epsilon convergence.
    pub converged: bool,
    /// Iterations used.
    pub iterations: usize,
    /// Whether any model update fell back to the background model.
    pub degenerate: bool,
}

impl Scored for ScoredMotif {
    fn score(&self) -> f64 {
        self.score
    }
}

impl Summarizable for ScoredMotif {
    fn summary(&self) -> String {
        format!(
            "motif {} (w={}): score {:.3}, {} sites, {} in {} iterations",
            self.consensus,
            self.width,
            self.score,
            self.instances.len(),
            if self.converged { "converged" } else { "exhausted" },
            self.iterations,
        )
    }
}

/// One independent refinement run over a shared sequence set.
#[derive(Debug, Clone)]
pub struct Refiner<'a, A: Alphabet> {
    set: &'a SequenceSet<A>,
    config: RefinerConfig,
    seed_id: u64,
    model: MotifModel<A>,
    assignment: InstanceAssignment,
    score: f64,
    state: RefinerState,
    iterations: usize,
    degenerate: bool,
    /// Model snapshot from before the last M-step, restored if the next
    /// E-step scores worse (keeps the reported score sequence
    /// non-decreasing).
    prev_model: Option<MotifModel<A>>,
}

impl<'a, A: Alphabet> Refiner<'a, A> {
    /// Seed a run: initial assignment per `strategy`, model estimated from
    /// the seeded instances.
    ///
    /// # Errors
    ///
    /// Returns [`UlvaError::NoValidMotif`] when every sequence is shorter
    /// than `width` or the seed yields no instance at all, and
    /// [`UlvaError::InvalidInput`] for bad widths, strategies, or config
    /// values.
    pub fn new(
        set: &'a SequenceSet<A>,
        width: usize,
        strategy: &SeedStrategy,
        config: RefinerConfig,
    ) -> Result<Self> {
        if !(config.epsilon >= 0.0 && config.epsilon.is_finite()) {
            return Err(UlvaError::InvalidInput(format!(
                "epsilon must be a non-negative finite value, got {}",
                config.epsilon
            )));
        }
        if (0..set.len()).all(|i| set.seq_len(i) < width) {
            return Err(UlvaError::NoValidMotif(format!(
                "every sequence is shorter than width {}",
                width
            )));
        }

        let assignment = seed::initial_assignment(set, width, strategy)?;
        let instances = gather_instances(set, &assignment, width);
        if instances.is_empty() {
            return Err(UlvaError::NoValidMotif(
                "seed strategy assigned no instances".into(),
            ));
        }
        let model = MotifModel::from_instances(&instances, config.pseudocount, set.background())?;
        let score = assignment_score(set, &model, &assignment);
        let seed_id = match strategy {
            SeedStrategy::Random { seed } => *seed,
            _ => 0,
        };

        Ok(Self {
            set,
            config,
            seed_id,
            model,
            assignment,
            score,
            state: RefinerState::Seeded,
            iterations: 0,
            degenerate: false,
            prev_model: None,
        })
    }

    /// Current state of the run.
    pub fn state(&self) -> RefinerState {
        self.state
    }

    /// Iterations performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Aggregate score of the current (model, assignment) pair.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Motif width of this run.
    pub fn width(&self) -> usize {
        self.model.width()
    }

    /// Perform one E+M iteration; a no-op once the run is terminal.
    ///
    /// This is the cancellation boundary: state is consistent after every
    /// call, and [`finish`](Self::finish) is valid at any time.
    pub fn step(&mut self) -> RefinerState {
        if matches!(self.state, RefinerState::Converged | RefinerState::Exhausted) {
            return self.state;
        }

        // E-step: best instance per sequence under the current model.
        let (assignment, score) = evaluate::assign(self.set, &self.model);
        self.iterations += 1;

        if score < self.score - REGRESSION_TOL {
            // The last M-step made things worse; fall back to the snapshot
            // paired with the stored assignment and stop.
            if let Some(prev) = self.prev_model.take() {
                self.model = prev;
            }
            self.state = RefinerState::Converged;
            return self.state;
        }

        let fixed_point = assignment == self.assignment;
        let relative_gain = (score - self.score) / self.score.abs().max(1.0);
        self.assignment = assignment;
        self.score = score;
        self.prev_model = None;

        if fixed_point || relative_gain < self.config.epsilon {
            self.state = RefinerState::Converged;
            return self.state;
        }
        if self.iterations >= self.config.max_iters {
            self.state = RefinerState::Exhausted;
            return self.state;
        }

        // M-step: re-estimate the model from the new instances.
        let instances = gather_instances(self.set, &self.assignment, self.model.width());
        self.prev_model = Some(self.model.clone());
        if self.model.update(&instances) {
            self.degenerate = true;
        }
        self.state = RefinerState::Iterating;
        self.state
    }

    /// Run to convergence or exhaustion and finalize.
    pub fn run(mut self) -> ScoredMotif {
        while matches!(self.state, RefinerState::Seeded | RefinerState::Iterating) {
            self.step();
        }
        self.finish()
    }

    /// Finalize the run at its current state into a [`ScoredMotif`].
    pub fn finish(self) -> ScoredMotif {
        let consensus = String::from_utf8_lossy(&self.model.consensus()).into_owned();
        let instances = self
            .assignment
            .offsets()
            .iter()
            .enumerate()
            .filter_map(|(i, off)| off.map(|o| (self.set.id(i).to_string(), o)))
            .collect();
        ScoredMotif {
            width: self.model.width(),
            matrix: self.model.matrix().to_vec(),
            consensus,
            instances,
            score: self.score,
            seed: self.seed_id,
            converged: self.state == RefinerState::Converged,
            iterations: self.iterations,
            degenerate: self.degenerate,
        }
    }
}

/// Instance windows (raw bytes) for every assigned offset.
fn gather_instances<'s, A: Alphabet>(
    set: &'s SequenceSet<A>,
    assignment: &InstanceAssignment,
    width: usize,
) -> Vec<&'s [u8]> {
    assignment
        .offsets()
        .iter()
        .enumerate()
        .filter_map(|(i, off)| off.map(|o| &set.seq(i)[o..o + width]))
        .collect()
}

/// Aggregate score of a fixed assignment under a model. Instances whose
/// window cannot be scored (wildcards) contribute zero, like "no instance".
fn assignment_score<A: Alphabet>(
    set: &SequenceSet<A>,
    model: &MotifModel<A>,
    assignment: &InstanceAssignment,
) -> f64 {
    let width = model.width();
    assignment
        .offsets()
        .iter()
        .enumerate()
        .filter_map(|(i, off)| {
            off.map(|o| model.log_odds_score(&set.codes(i)[o..o + width]))
                .filter(|s| s.is_finite())
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::DnaAlphabet;

    fn dna_set(seqs: &[&str]) -> SequenceSet<DnaAlphabet> {
        SequenceSet::new(
            seqs.iter()
                .enumerate()
                .map(|(i, s)| (format!("seq{}", i), s.as_bytes().to_vec())),
        )
        .unwrap()
    }

    /// Five 20-symbol sequences, each with "ACGTAC" planted at a known offset.
    fn planted_set() -> (SequenceSet<DnaAlphabet>, Vec<usize>) {
        let seqs = [
            "TTGGACGTACTTGGTTGGTT", // 4
            "ACGTACGGTTGGTTAAGGTT", // 0
            "GGTTAAACGTACAAGGTTAA", // 6
            "TTAAGGTTAAGGTTACGTAC", // 14
            "AATTACGTACAATTGGAATT", // 4
        ];
        (dna_set(&seqs), vec![4, 0, 6, 14, 4])
    }

    #[test]
    fn planted_motif_recovered_exactly() {
        let (set, offsets) = planted_set();
        let refiner = Refiner::new(
            &set,
            6,
            &SeedStrategy::FrequentWord,
            RefinerConfig::default(),
        )
        .unwrap();
        let motif = refiner.run();
        assert!(motif.converged, "run should converge: {}", motif.summary());
        assert_eq!(motif.consensus, "ACGTAC");
        let found: Vec<usize> = motif.instances.iter().map(|&(_, o)| o).collect();
        assert_eq!(found, offsets);
        assert!(motif.score > 0.0);
        assert!(!motif.degenerate);
    }

    #[test]
    fn deterministic_given_identical_inputs() {
        let (set, _) = planted_set();
        let run = |seed| {
            Refiner::new(
                &set,
                6,
                &SeedStrategy::Random { seed },
                RefinerConfig::default(),
            )
            .unwrap()
            .run()
        };
        let a = run(123);
        let b = run(123);
        assert_eq!(a.instances, b.instances);
        assert_eq!(a.score.to_bits(), b.score.to_bits(), "scores must be bit-identical");
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn score_sequence_is_monotone() {
        let (set, _) = planted_set();
        let mut refiner = Refiner::new(
            &set,
            6,
            &SeedStrategy::Random { seed: 99 },
            RefinerConfig::default(),
        )
        .unwrap();
        let mut last = refiner.score();
        while matches!(refiner.state(), RefinerState::Seeded | RefinerState::Iterating) {
            refiner.step();
            assert!(
                refiner.score() >= last - 1e-12,
                "score regressed from {} to {}",
                last,
                refiner.score()
            );
            last = refiner.score();
        }
    }

    #[test]
    fn short_sequence_contributes_nothing() {
        let set = dna_set(&["TTGGACGTACTTGG", "ACGTACGGTTGG", "ACG"]);
        let refiner = Refiner::new(
            &set,
            6,
            &SeedStrategy::FrequentWord,
            RefinerConfig::default(),
        )
        .unwrap();
        let motif = refiner.run();
        assert!(motif.instances.iter().all(|(id, _)| id != "seq2"));
        assert_eq!(motif.instances.len(), 2);
    }

    #[test]
    fn all_too_short_is_no_valid_motif() {
        let set = dna_set(&["ACG", "TGCA"]);
        let err = Refiner::new(
            &set,
            8,
            &SeedStrategy::FrequentWord,
            RefinerConfig::default(),
        );
        assert!(matches!(err, Err(UlvaError::NoValidMotif(_))));
    }

    #[test]
    fn exhaustion_is_reported_not_fatal() {
        let (set, _) = planted_set();
        let config = RefinerConfig {
            max_iters: 1,
            epsilon: 0.0,
            ..RefinerConfig::default()
        };
        let motif = Refiner::new(&set, 6, &SeedStrategy::Random { seed: 5 }, config)
            .unwrap()
            .run();
        // One iteration is allowed; the run must still yield a result.
        assert!(motif.iterations <= 1);
        assert!(!motif.instances.is_empty());
    }

    #[test]
    fn step_is_a_cancellation_boundary() {
        let (set, _) = planted_set();
        let mut refiner = Refiner::new(
            &set,
            6,
            &SeedStrategy::Random { seed: 7 },
            RefinerConfig::default(),
        )
        .unwrap();
        refiner.step();
        let motif = refiner.finish();
        // Aborted after one iteration: still a valid, bounds-respecting result.
        for (id, off) in &motif.instances {
            let i: usize = id.strip_prefix("seq").unwrap().parse().unwrap();
            assert!(off + motif.width <= set.seq_len(i));
        }
    }

    #[test]
    fn terminal_step_is_noop() {
        let (set, _) = planted_set();
        let mut refiner = Refiner::new(
            &set,
            6,
            &SeedStrategy::FrequentWord,
            RefinerConfig::default(),
        )
        .unwrap();
        while matches!(refiner.state(), RefinerState::Seeded | RefinerState::Iterating) {
            refiner.step();
        }
        let state = refiner.state();
        let iters = refiner.iterations();
        assert_eq!(refiner.step(), state);
        assert_eq!(refiner.iterations(), iters);
    }
}
