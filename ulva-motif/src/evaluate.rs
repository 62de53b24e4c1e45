//! Batched window scoring and best-instance selection.
//!
//! This is the performance-critical path of the search. Scoring every
//! window of a sequence is expressed as a sliding-window correlation
//! against the flat log-odds matrix: one pass per motif row over the
//! encoded sequence, accumulating into a per-window score buffer, rather
//! than a nested per-window/per-position loop. Wildcard codes poison their
//! windows to negative infinity, which excludes them from selection.
//!
//! With the `parallel` feature the per-sequence evaluation of a whole set
//! runs data-parallel; every sequence reads only the shared immutable
//! model and set and writes only its own output slot.

use crate::alphabet::Alphabet;
use crate::model::MotifModel;
use crate::seed::InstanceAssignment;
use crate::seqset::{SequenceSet, WILDCARD_CODE};

/// Score every valid window of `codes` into `out`.
///
/// `out` is resized to `codes.len() - width + 1` entries; entry `i` holds
/// the log-odds score of the window starting at `i`, or negative infinity
/// if that window contains a wildcard. Clears `out` when the sequence is
/// shorter than the motif.
pub fn score_windows_into<A: Alphabet>(model: &MotifModel<A>, codes: &[u8], out: &mut Vec<f64>) {
    let width = model.width();
    out.clear();
    if codes.len() < width {
        return;
    }
    let n_windows = codes.len() - width + 1;
    out.resize(n_windows, 0.0);

    let k = A::size();
    let log_odds = model.log_odds();
    for row in 0..width {
        let row_scores = &log_odds[row * k..(row + 1) * k];
        let shifted = &codes[row..row + n_windows];
        for (slot, &code) in out.iter_mut().zip(shifted) {
            if code == WILDCARD_CODE {
                *slot = f64::NEG_INFINITY;
            } else {
                *slot += row_scores[code as usize];
            }
        }
    }
}

/// Score every valid window of `codes`, allocating the output buffer.
pub fn score_windows<A: Alphabet>(model: &MotifModel<A>, codes: &[u8]) -> Vec<f64> {
    let mut out = Vec::new();
    score_windows_into(model, codes, &mut out);
    out
}

/// Best-scoring window of one sequence: `(offset, score)`.
///
/// Returns `None` when the sequence is shorter than the motif or no window
/// is fully scored. Ties break to the lowest offset.
pub fn best_window<A: Alphabet>(model: &MotifModel<A>, codes: &[u8]) -> Option<(usize, f64)> {
    let mut scores = Vec::new();
    score_windows_into(model, codes, &mut scores);
    argmax(&scores)
}

fn argmax(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s == f64::NEG_INFINITY {
            continue;
        }
        match best {
            Some((_, b)) if b >= s => {}
            _ => best = Some((i, s)),
        }
    }
    best
}

/// Recompute the best instance per sequence under `model` (the E-step).
///
/// Returns the new assignment together with the aggregate enrichment
/// score: the sum of per-sequence best-window scores, with "no instance"
/// sequences contributing zero. Deterministic regardless of the `parallel`
/// feature; per-sequence results are reduced in sequence order.
pub fn assign<A: Alphabet>(
    set: &SequenceSet<A>,
    model: &MotifModel<A>,
) -> (InstanceAssignment, f64) {
    #[cfg(feature = "parallel")]
    let per_seq: Vec<Option<(usize, f64)>> = {
        use rayon::prelude::*;
        (0..set.len())
            .into_par_iter()
            .map(|i| best_window(model, set.codes(i)))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let per_seq: Vec<Option<(usize, f64)>> = (0..set.len())
        .map(|i| best_window(model, set.codes(i)))
        .collect();

    let mut aggregate = 0.0;
    let offsets = per_seq
        .into_iter()
        .map(|best| {
            best.map(|(off, score)| {
                aggregate += score;
                off
            })
        })
        .collect();
    (InstanceAssignment::new(offsets), aggregate)
}
