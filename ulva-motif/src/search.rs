//! Search orchestration: independent refinement runs, ranking, and
//! deduplication.
//!
//! [`search`] dispatches one [`Refiner`](crate::refine::Refiner) per
//! (width, restart) combination — the first restart of each width seeds
//! from the frequent-word heuristic, the rest from per-run derived random
//! seeds — collects every [`ScoredMotif`], ranks by score, drops
//! near-identical motifs, and returns the top K. Runs share nothing
//! mutable: each reads the immutable set and owns its model, so with the
//! `parallel` feature the grid maps straight onto a worker pool.

use ulva_core::{Result, UlvaError};

use crate::alphabet::Alphabet;
use crate::refine::{Refiner, RefinerConfig, ScoredMotif};
use crate::seed::SeedStrategy;
use crate::seqset::SequenceSet;

/// Search-level configuration; per-run knobs nest in
/// [`RefinerConfig`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    /// Motif widths to search.
    pub widths: Vec<usize>,
    /// Independent restarts per width.
    pub restarts: usize,
    /// Number of distinct motifs to return.
    pub top_k: usize,
    /// Two motifs closer than this (average per-column distance at the
    /// best alignment) are duplicates; only the higher-scoring survives.
    pub dedup_threshold: f64,
    /// Base seed the per-run random seeds derive from.
    pub seed: u64,
    /// Per-run refinement knobs.
    pub refiner: RefinerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            widths: vec![8],
            restarts: 5,
            top_k: 5,
            dedup_threshold: 0.1,
            seed: 42,
            refiner: RefinerConfig::default(),
        }
    }
}

/// Run the full search grid and return the ranked, deduplicated top-K.
///
/// Widths for which every sequence is too short fail individually without
/// aborting the others, as do individual runs.
///
/// # Errors
///
/// Returns [`UlvaError::InvalidInput`] for an empty width list or zero
/// restarts/top-K, and [`UlvaError::NoValidMotif`] when no width produced
/// any motif.
pub fn search<A: Alphabet>(set: &SequenceSet<A>, config: &SearchConfig) -> Result<Vec<ScoredMotif>> {
    if config.widths.is_empty() {
        return Err(UlvaError::InvalidInput("at least one width is required".into()));
    }
    if config.restarts == 0 {
        return Err(UlvaError::InvalidInput("restarts must be at least 1".into()));
    }
    if config.top_k == 0 {
        return Err(UlvaError::InvalidInput("top_k must be at least 1".into()));
    }

    // One strategy per independent run; skip widths no sequence can host.
    let mut runs: Vec<(usize, SeedStrategy)> = Vec::new();
    for &width in &config.widths {
        if (0..set.len()).all(|i| set.seq_len(i) < width) {
            continue;
        }
        for restart in 0..config.restarts {
            let strategy = if restart == 0 {
                SeedStrategy::FrequentWord
            } else {
                SeedStrategy::Random {
                    seed: derive_seed(config.seed, width, restart),
                }
            };
            runs.push((width, strategy));
        }
    }

    #[cfg(feature = "parallel")]
    let results: Vec<Option<ScoredMotif>> = {
        use rayon::prelude::*;
        runs.par_iter()
            .map(|(width, strategy)| {
                Refiner::new(set, *width, strategy, config.refiner.clone())
                    .ok()
                    .map(Refiner::run)
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Option<ScoredMotif>> = runs
        .iter()
        .map(|(width, strategy)| {
            Refiner::new(set, *width, strategy, config.refiner.clone())
                .ok()
                .map(Refiner::run)
        })
        .collect();

    let mut motifs: Vec<ScoredMotif> = results.into_iter().flatten().collect();
    if motifs.is_empty() {
        return Err(UlvaError::NoValidMotif(format!(
            "no width in {:?} produced a motif",
            config.widths
        )));
    }

    // Rank descending by score with deterministic tie-breaks.
    motifs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.width.cmp(&b.width))
            .then_with(|| a.seed.cmp(&b.seed))
            .then_with(|| a.consensus.cmp(&b.consensus))
    });

    let mut kept: Vec<ScoredMotif> = Vec::with_capacity(config.top_k);
    for motif in motifs {
        let duplicate = kept
            .iter()
            .any(|k| motif_distance::<A>(&k.matrix, &motif.matrix) < config.dedup_threshold);
        if !duplicate {
            kept.push(motif);
            if kept.len() == config.top_k {
                break;
            }
        }
    }
    Ok(kept)
}

/// Distance between two motifs: the minimum, over all ungapped alignments
/// with at least half the shorter motif overlapping, of the average
/// per-column total-variation distance. Strand-symmetric alphabets also
/// try the reverse-complement alignment of `b`.
///
/// Ranges over `[0, 1]`; identical (or shifted/reverse-complement
/// identical) motifs are at 0.
pub fn motif_distance<A: Alphabet>(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    let mut best = aligned_distance(a, b);
    if let Some(rc) = reverse_complement_matrix::<A>(b) {
        best = best.min(aligned_distance(a, &rc));
    }
    best
}

fn aligned_distance(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    let la = a.len() as isize;
    let lb = b.len() as isize;
    if la == 0 || lb == 0 {
        return 1.0;
    }
    let min_overlap = ((la.min(lb) as usize) + 1) / 2;
    let mut best = f64::INFINITY;

    // offset = start of b relative to a.
    for offset in (-(lb - 1))..la {
        let start_a = offset.max(0) as usize;
        let start_b = (-offset).max(0) as usize;
        let end_a = la.min(offset + lb) as usize;
        if end_a <= start_a {
            continue;
        }
        let overlap = end_a - start_a;
        if overlap < min_overlap {
            continue;
        }
        let mut total = 0.0;
        for i in 0..overlap {
            total += total_variation(&a[start_a + i], &b[start_b + i]);
        }
        let avg = total / overlap as f64;
        if avg < best {
            best = avg;
        }
    }
    best
}

/// Total variation distance between two distributions: `0.5 * sum |p - q|`.
fn total_variation(p: &[f64], q: &[f64]) -> f64 {
    0.5 * p.iter().zip(q).map(|(x, y)| (x - y).abs()).sum::<f64>()
}

/// Reverse-complement of a probability matrix, if the alphabet defines a
/// complement for every symbol.
fn reverse_complement_matrix<A: Alphabet>(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let k = A::size();
    let complement: Vec<usize> = (0..k).map(A::complement).collect::<Option<_>>()?;
    Some(
        matrix
            .iter()
            .rev()
            .map(|row| {
                let mut rc = vec![0.0; k];
                for (j, &p) in row.iter().enumerate() {
                    rc[complement[j]] = p;
                }
                rc
            })
            .collect(),
    )
}

/// Splitmix-style mixing of the base seed with the run coordinates, so
/// every (width, restart) gets an independent, reproducible seed.
fn derive_seed(base: u64, width: usize, restart: usize) -> u64 {
    let mut x = base
        ^ (width as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (restart as u64).wrapping_mul(0xD1B5_4A32_D192_ED03);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    x.max(1)
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

    fn planted_set() -> SequenceSet<DnaAlphabet> {
        dna_set(&[
            "TTGGACGTACTTGGTTGGTT",
            "ACGTACGGTTGGTTAAGGTT",
            "GGTTAAACGTACAAGGTTAA",
            "TTAAGGTTAAGGTTACGTAC",
            "AATTACGTACAATTGGAATT",
        ])
    }

    #[test]
    fn search_finds_planted_motif() {
        let set = planted_set();
        let config = SearchConfig {
            widths: vec![6],
            restarts: 3,
            ..SearchConfig::default()
        };
        let motifs = search(&set, &config).unwrap();
        assert!(!motifs.is_empty());
        assert_eq!(motifs[0].consensus, "ACGTAC");
        // Ranked descending.
        for pair in motifs.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn restarts_converging_to_same_motif_are_deduplicated() {
        let set = planted_set();
        let config = SearchConfig {
            widths: vec![6],
            restarts: 6,
            top_k: 6,
            ..SearchConfig::default()
        };
        let motifs = search(&set, &config).unwrap();
        // All restarts find the same strong motif; dedup must collapse them.
        let top_like = motifs
            .iter()
            .filter(|m| motif_distance::<DnaAlphabet>(&motifs[0].matrix, &m.matrix) < 0.1)
            .count();
        assert_eq!(top_like, 1, "near-identical motifs must be collapsed");
    }

    #[test]
    fn too_short_width_fails_alone() {
        let set = dna_set(&["ACGTACGTAC", "ACGTACGTGG"]);
        let config = SearchConfig {
            widths: vec![50, 4],
            restarts: 2,
            ..SearchConfig::default()
        };
        // Width 50 is impossible, width 4 still runs.
        let motifs = search(&set, &config).unwrap();
        assert!(motifs.iter().all(|m| m.width == 4));
    }

    #[test]
    fn all_widths_too_short_is_an_error() {
        let set = dna_set(&["ACGT", "ACG"]);
        let config = SearchConfig {
            widths: vec![10, 20],
            ..SearchConfig::default()
        };
        assert!(matches!(
            search(&set, &config),
            Err(UlvaError::NoValidMotif(_))
        ));
    }

    #[test]
    fn config_validation() {
        let set = planted_set();
        for config in [
            SearchConfig { widths: vec![], ..SearchConfig::default() },
            SearchConfig { restarts: 0, ..SearchConfig::default() },
            SearchConfig { top_k: 0, ..SearchConfig::default() },
        ] {
            assert!(matches!(
                search(&set, &config),
                Err(UlvaError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn search_is_reproducible() {
        let set = planted_set();
        let config = SearchConfig {
            widths: vec![5, 6],
            restarts: 4,
            ..SearchConfig::default()
        };
        let a = search(&set, &config).unwrap();
        let b = search(&set, &config).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.consensus, y.consensus);
            assert_eq!(x.score.to_bits(), y.score.to_bits());
            assert_eq!(x.instances, y.instances);
        }
    }

    #[test]
    fn identical_matrices_have_zero_distance() {
        let m = vec![
            vec![0.7, 0.1, 0.1, 0.1],
            vec![0.1, 0.7, 0.1, 0.1],
            vec![0.1, 0.1, 0.7, 0.1],
        ];
        assert!(motif_distance::<DnaAlphabet>(&m, &m) < 1e-12);
    }

    #[test]
    fn reverse_complement_variant_is_a_duplicate() {
        // Sharp "AAC" motif and its reverse complement "GTT".
        let fwd = vec![
            vec![0.97, 0.01, 0.01, 0.01],
            vec![0.97, 0.01, 0.01, 0.01],
            vec![0.01, 0.97, 0.01, 0.01],
        ];
        let rc = vec![
            vec![0.01, 0.01, 0.97, 0.01],
            vec![0.01, 0.01, 0.01, 0.97],
            vec![0.01, 0.01, 0.01, 0.97],
        ];
        assert!(motif_distance::<DnaAlphabet>(&fwd, &rc) < 1e-9);
        // No forward alignment brings them close.
        assert!(aligned_distance(&fwd, &rc) > 0.5);
    }

    #[test]
    fn shifted_variant_is_close() {
        // Same sharp columns, one position shifted.
        let sharp = |idx: usize| {
            let mut row = vec![0.01; 4];
            row[idx] = 0.97;
            row
        };
        let a = vec![sharp(0), sharp(1), sharp(2), sharp(3)];
        let b = vec![sharp(1), sharp(2), sharp(3), sharp(0)];
        let d = motif_distance::<DnaAlphabet>(&a, &b);
        assert!(d < 1e-9, "one-column shift should align, got {}", d);
    }

    #[test]
    fn unrelated_matrices_are_far() {
        let a = vec![vec![0.97, 0.01, 0.01, 0.01]; 4];
        let b = vec![vec![0.01, 0.01, 0.97, 0.01]; 4];
        assert!(motif_distance::<DnaAlphabet>(&a, &b) > 0.5);
    }

    #[test]
    fn derived_seeds_are_distinct_and_stable() {
        let s1 = derive_seed(42, 6, 1);
        let s2 = derive_seed(42, 6, 2);
        let s3 = derive_seed(42, 7, 1);
        assert_ne!(s1, s2);
        assert_ne!(s1, s3);
        assert_eq!(s1, derive_seed(42, 6, 1));
    }
}
