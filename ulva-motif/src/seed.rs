//! Seeding: initial instance assignments for a refinement run.
//!
//! A [`SeedStrategy`] turns a sequence set and a motif width into the
//! initial [`InstanceAssignment`] a [`Refiner`](crate::refine::Refiner)
//! starts from. Strategies are pluggable; randomized ones take an explicit
//! seed value so runs are reproducible.

use std::collections::BTreeMap;

use ulva_core::{Result, UlvaError};

use crate::alphabet::Alphabet;
use crate::evaluate;
use crate::model::MotifModel;
use crate::seqset::{SequenceSet, WILDCARD_CODE};

/// Per-sequence motif start offsets; `None` marks "no instance".
///
/// Paired 1:1 with a motif model during a refinement run. Every `Some`
/// offset satisfies `offset + width <= sequence length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceAssignment {
    offsets: Vec<Option<usize>>,
}

impl InstanceAssignment {
    pub(crate) fn new(offsets: Vec<Option<usize>>) -> Self {
        Self { offsets }
    }

    /// Number of sequences covered (one slot per sequence).
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if the assignment covers no sequences.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset for sequence `i`, or `None` for "no instance".
    pub fn get(&self, i: usize) -> Option<usize> {
        self.offsets[i]
    }

    /// All offsets, in sequence order.
    pub fn offsets(&self) -> &[Option<usize>] {
        &self.offsets
    }

    /// Number of sequences with an assigned instance.
    pub fn instance_count(&self) -> usize {
        self.offsets.iter().filter(|o| o.is_some()).count()
    }
}

/// How the initial candidate offsets are chosen.
#[derive(Debug, Clone)]
pub enum SeedStrategy {
    /// One uniformly random valid offset per sequence, reproducible from
    /// the explicit seed value.
    Random { seed: u64 },
    /// Externally supplied offsets, validated against the bounds invariant.
    Explicit(Vec<Option<usize>>),
    /// Seed every sequence at its closest match to the most frequent
    /// width-length word in the set.
    FrequentWord,
    /// Scan with a supplied probability matrix (e.g. a parsed JASPAR
    /// profile) and seed at each sequence's best-scoring window.
    Profile(Vec<Vec<f64>>),
}

/// Produce the initial assignment for a motif of width `width`.
///
/// Sequences shorter than `width` are always assigned "no instance"; every
/// produced offset satisfies `offset + width <= sequence length`.
///
/// # Errors
///
/// Returns an error if `width` is zero, explicit offsets violate bounds,
/// or a profile matrix does not match `width`.
pub fn initial_assignment<A: Alphabet>(
    set: &SequenceSet<A>,
    width: usize,
    strategy: &SeedStrategy,
) -> Result<InstanceAssignment> {
    if width == 0 {
        return Err(UlvaError::InvalidInput("width must be at least 1".into()));
    }
    match strategy {
        SeedStrategy::Random { seed } => Ok(random_assignment(set, width, *seed)),
        SeedStrategy::Explicit(offsets) => explicit_assignment(set, width, offsets),
        SeedStrategy::FrequentWord => Ok(frequent_word_assignment(set, width)),
        SeedStrategy::Profile(matrix) => profile_assignment(set, width, matrix),
    }
}

fn random_assignment<A: Alphabet>(
    set: &SequenceSet<A>,
    width: usize,
    seed: u64,
) -> InstanceAssignment {
    let mut rng = Xorshift64::new(seed);
    let offsets = (0..set.len())
        .map(|i| {
            let len = set.seq_len(i);
            if len < width {
                None
            } else {
                Some(rng.next_bounded((len - width + 1) as u64) as usize)
            }
        })
        .collect();
    InstanceAssignment::new(offsets)
}

fn explicit_assignment<A: Alphabet>(
    set: &SequenceSet<A>,
    width: usize,
    offsets: &[Option<usize>],
) -> Result<InstanceAssignment> {
    if offsets.len() != set.len() {
        return Err(UlvaError::InvalidInput(format!(
            "{} explicit offsets for {} sequences",
            offsets.len(),
            set.len()
        )));
    }
    for (i, &off) in offsets.iter().enumerate() {
        if let Some(o) = off {
            if set.seq_len(i) < width || o + width > set.seq_len(i) {
                return Err(UlvaError::InvalidInput(format!(
                    "offset {} + width {} exceeds length {} of sequence '{}'",
                    o,
                    width,
                    set.seq_len(i),
                    set.id(i)
                )));
            }
        }
    }
    Ok(InstanceAssignment::new(offsets.to_vec()))
}

/// Most frequent exact word of length `width`, then per-sequence best
/// identity match to it. Ties break toward the lexicographically smallest
/// word and the lowest offset, so the result is deterministic.
fn frequent_word_assignment<A: Alphabet>(set: &SequenceSet<A>, width: usize) -> InstanceAssignment {
    let mut counts: BTreeMap<&[u8], u32> = BTreeMap::new();
    for i in 0..set.len() {
        let codes = set.codes(i);
        if codes.len() < width {
            continue;
        }
        for start in 0..=codes.len() - width {
            let word = &codes[start..start + width];
            if word.contains(&WILDCARD_CODE) {
                continue;
            }
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    // BTreeMap iterates in key order, so the first maximum is the smallest word.
    let best_word: Option<Vec<u8>> = counts
        .iter()
        .fold(None::<(&[u8], u32)>, |acc, (&word, &count)| match acc {
            Some((_, c)) if c >= count => acc,
            _ => Some((word, count)),
        })
        .map(|(word, _)| word.to_vec());

    let offsets = (0..set.len())
        .map(|i| {
            let codes = set.codes(i);
            if codes.len() < width {
                return None;
            }
            let word = best_word.as_deref()?;
            let mut best_off = 0;
            let mut best_matches = -1i64;
            for start in 0..=codes.len() - width {
                let window = &codes[start..start + width];
                let matches = window
                    .iter()
                    .zip(word)
                    .filter(|(&c, &w)| c != WILDCARD_CODE && c == w)
                    .count() as i64;
                if matches > best_matches {
                    best_matches = matches;
                    best_off = start;
                }
            }
            Some(best_off)
        })
        .collect();
    InstanceAssignment::new(offsets)
}

fn profile_assignment<A: Alphabet>(
    set: &SequenceSet<A>,
    width: usize,
    matrix: &[Vec<f64>],
) -> Result<InstanceAssignment> {
    if matrix.len() != width {
        return Err(UlvaError::InvalidInput(format!(
            "profile has {} rows but width {} was requested",
            matrix.len(),
            width
        )));
    }
    // Smooth so profiles with zero entries (raw database counts) become
    // valid probability rows.
    let k = A::size();
    let smoothed: Vec<Vec<f64>> = matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|&p| (p + 0.01) / (1.0 + 0.01 * k as f64))
                .collect()
        })
        .collect();
    let model = MotifModel::<A>::from_matrix(smoothed, set.background())?;

    let offsets = (0..set.len())
        .map(|i| evaluate::best_window(&model, set.codes(i)).map(|(off, _)| off))
        .collect();
    Ok(InstanceAssignment::new(offsets))
}

// ---------------------------------------------------------------------------
// Reproducible RNG
// ---------------------------------------------------------------------------

struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        // Xorshift requires nonzero state.
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_bounded(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
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

    #[test]
    fn random_offsets_in_bounds_and_reproducible() {
        let set = dna_set(&["ACGTACGTACGT", "ACGTACGT", "AC"]);
        let a = initial_assignment(&set, 4, &SeedStrategy::Random { seed: 7 }).unwrap();
        let b = initial_assignment(&set, 4, &SeedStrategy::Random { seed: 7 }).unwrap();
        assert_eq!(a, b, "same seed must reproduce the same assignment");
        for (i, off) in a.offsets().iter().enumerate() {
            match off {
                Some(o) => assert!(o + 4 <= set.seq_len(i)),
                None => assert!(set.seq_len(i) < 4),
            }
        }
        let c = initial_assignment(&set, 4, &SeedStrategy::Random { seed: 8 }).unwrap();
        assert!(a != c || a.offsets().iter().all(|o| o.is_none()), "different seeds should differ");
    }

    #[test]
    fn short_sequence_gets_no_instance() {
        let set = dna_set(&["ACGTACGT", "ACG"]);
        let a = initial_assignment(&set, 6, &SeedStrategy::Random { seed: 1 }).unwrap();
        assert_eq!(a.get(1), None);
        assert_eq!(a.instance_count(), 1);
    }

    #[test]
    fn explicit_offsets_validated() {
        let set = dna_set(&["ACGTACGT", "ACGT"]);
        let ok = initial_assignment(&set, 4, &SeedStrategy::Explicit(vec![Some(4), Some(0)]));
        assert!(ok.is_ok());
        let out_of_bounds =
            initial_assignment(&set, 4, &SeedStrategy::Explicit(vec![Some(5), Some(0)]));
        assert!(out_of_bounds.is_err());
        let wrong_len = initial_assignment(&set, 4, &SeedStrategy::Explicit(vec![Some(0)]));
        assert!(wrong_len.is_err());
    }

    #[test]
    fn frequent_word_finds_planted_sites() {
        // "ACGTAC" planted in every sequence; it is the only repeated 6-mer.
        let set = dna_set(&["TTTTACGTACTT", "GGACGTACGGGG", "ACGTACAAAAAA"]);
        let a = initial_assignment(&set, 6, &SeedStrategy::FrequentWord).unwrap();
        assert_eq!(a.offsets(), &[Some(4), Some(2), Some(0)]);
    }

    #[test]
    fn frequent_word_skips_wildcard_windows() {
        let set = dna_set(&["NNNNNN", "ACGTAC", "ACGTAC"]);
        let a = initial_assignment(&set, 6, &SeedStrategy::FrequentWord).unwrap();
        // The all-wildcard sequence still gets a (best-effort) offset; the
        // word itself comes only from fully scored windows.
        assert_eq!(a.get(1), Some(0));
        assert_eq!(a.get(2), Some(0));
    }

    #[test]
    fn profile_seeds_at_best_window() {
        let set = dna_set(&["TTACGTTT", "ACGTTTTT"]);
        // Sharp profile for "ACG".
        let matrix = vec![
            vec![0.97, 0.01, 0.01, 0.01],
            vec![0.01, 0.97, 0.01, 0.01],
            vec![0.01, 0.01, 0.97, 0.01],
        ];
        let a = initial_assignment(&set, 3, &SeedStrategy::Profile(matrix)).unwrap();
        assert_eq!(a.offsets(), &[Some(2), Some(0)]);
    }

    #[test]
    fn profile_width_mismatch_rejected() {
        let set = dna_set(&["ACGTACGT"]);
        let matrix = vec![vec![0.25; 4]; 3];
        let r = initial_assignment(&set, 4, &SeedStrategy::Profile(matrix));
        assert!(r.is_err());
    }

    #[test]
    fn zero_width_rejected() {
        let set = dna_set(&["ACGT"]);
        let r = initial_assignment(&set, 0, &SeedStrategy::FrequentWord);
        assert!(r.is_err());
    }
}
