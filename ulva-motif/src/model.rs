//! Probabilistic motif models.
//!
//! [`MotifModel`] is a position probability matrix (width × alphabet-size)
//! with a derived log-odds matrix against the set's background model. Rows
//! are always valid distributions: every entry strictly positive via
//! pseudocount smoothing, every row summing to 1. The log-odds matrix is
//! stored flat (row-major) so the window-scoring loop indexes it directly.

use std::marker::PhantomData;

use ulva_core::{Result, UlvaError};

use crate::alphabet::{Alphabet, DnaAlphabet};
use crate::seqset::WILDCARD_CODE;

/// Row-sum tolerance accepted by [`MotifModel::from_matrix`].
const ROW_SUM_TOL: f64 = 1e-6;

/// A position probability matrix over the scored symbols of `A`.
#[derive(Debug, Clone)]
pub struct MotifModel<A: Alphabet> {
    width: usize,
    /// `matrix[pos][symbol]`, each row a probability distribution.
    matrix: Vec<Vec<f64>>,
    /// Flat `width * A::size()` log-odds: `ln(matrix / background)`.
    log_odds: Vec<f64>,
    background: Vec<f64>,
    pseudocount: f64,
    _alphabet: PhantomData<A>,
}

impl<A: Alphabet> MotifModel<A> {
    /// Estimate a model from aligned instance strings by symbol counting
    /// with pseudocount smoothing.
    ///
    /// All instances must have the same length (the motif width). Wildcard
    /// bytes inside an instance contribute no count at their position.
    ///
    /// # Errors
    ///
    /// Returns an error if `instances` is empty, lengths differ,
    /// `pseudocount` is not positive, or `background` has the wrong shape.
    pub fn from_instances(
        instances: &[&[u8]],
        pseudocount: f64,
        background: &[f64],
    ) -> Result<Self> {
        if instances.is_empty() {
            return Err(UlvaError::InvalidInput(
                "at least one instance is required".into(),
            ));
        }
        let width = instances[0].len();
        if width == 0 {
            return Err(UlvaError::InvalidInput("instances must be non-empty".into()));
        }
        for inst in instances {
            if inst.len() != width {
                return Err(UlvaError::InvalidInput(format!(
                    "instance length {} does not match width {}",
                    inst.len(),
                    width
                )));
            }
        }
        if pseudocount <= 0.0 {
            return Err(UlvaError::InvalidInput(format!(
                "pseudocount must be positive, got {}",
                pseudocount
            )));
        }
        let background = validate_background::<A>(background)?;

        let mut model = Self {
            width,
            matrix: vec![vec![0.0; A::size()]; width],
            log_odds: vec![0.0; width * A::size()],
            background,
            pseudocount,
            _alphabet: PhantomData,
        };
        model.recount(instances);
        Ok(model)
    }

    /// Build a model directly from a probability matrix.
    ///
    /// Models built this way carry the default pseudocount (0.1) for any
    /// subsequent [`update`](Self::update) calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix is empty, any row has the wrong
    /// length, any entry is not strictly positive, or any row does not sum
    /// to 1 within tolerance.
    pub fn from_matrix(matrix: Vec<Vec<f64>>, background: &[f64]) -> Result<Self> {
        if matrix.is_empty() {
            return Err(UlvaError::InvalidInput(
                "probability matrix must have at least one row".into(),
            ));
        }
        let k = A::size();
        for (pos, row) in matrix.iter().enumerate() {
            if row.len() != k {
                return Err(UlvaError::InvalidInput(format!(
                    "row {} has {} entries, expected {}",
                    pos,
                    row.len(),
                    k
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOL {
                return Err(UlvaError::InvalidInput(format!(
                    "row {} sums to {}, expected ~1.0",
                    pos, sum
                )));
            }
            for (j, &p) in row.iter().enumerate() {
                if p <= 0.0 {
                    return Err(UlvaError::InvalidInput(format!(
                        "entry ({}, {}) must be strictly positive, got {}",
                        pos, j, p
                    )));
                }
            }
        }
        let background = validate_background::<A>(background)?;

        let width = matrix.len();
        let mut model = Self {
            width,
            matrix,
            log_odds: vec![0.0; width * k],
            background,
            pseudocount: 0.1,
            _alphabet: PhantomData,
        };
        model.refresh_log_odds();
        Ok(model)
    }

    /// Recompute probabilities in place from a new instance set.
    ///
    /// Returns `true` when the update was degenerate: an empty instance set
    /// falls back to the background-derived model (every row equal to the
    /// background distribution), and the run carrying this model should be
    /// flagged as likely low-quality.
    pub fn update(&mut self, instances: &[&[u8]]) -> bool {
        if instances.is_empty() {
            for row in &mut self.matrix {
                row.copy_from_slice(&self.background);
            }
            self.refresh_log_odds();
            return true;
        }
        self.recount(instances);
        false
    }

    /// Motif width (number of positions).
    pub fn width(&self) -> usize {
        self.width
    }

    /// The probability matrix, one row per position.
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    /// Background frequencies this model scores against.
    pub fn background(&self) -> &[f64] {
        &self.background
    }

    /// The flat row-major log-odds matrix (`width * A::size()` entries).
    pub fn log_odds(&self) -> &[f64] {
        &self.log_odds
    }

    /// Log-odds score of one width-length window of symbol codes.
    ///
    /// Returns negative infinity when the window contains a wildcard code,
    /// which excludes it from argmax selection.
    pub fn log_odds_score(&self, window: &[u8]) -> f64 {
        debug_assert_eq!(window.len(), self.width);
        let k = A::size();
        let mut total = 0.0;
        for (pos, &code) in window.iter().enumerate() {
            if code == WILDCARD_CODE {
                return f64::NEG_INFINITY;
            }
            total += self.log_odds[pos * k + code as usize];
        }
        total
    }

    /// Consensus sequence: the most probable symbol at each position.
    pub fn consensus(&self) -> Vec<u8> {
        self.matrix
            .iter()
            .map(|row| {
                let mut best = 0;
                for j in 1..row.len() {
                    if row[j] > row[best] {
                        best = j;
                    }
                }
                A::SYMBOLS[best]
            })
            .collect()
    }

    /// Information content at each position, in bits, relative to the
    /// background: `IC_j = sum_c p_c * log2(p_c / bg_c)`.
    pub fn information_content(&self) -> Vec<f64> {
        self.matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.background)
                    .map(|(&p, &bg)| p * (p / bg).log2())
                    .sum()
            })
            .collect()
    }

    fn recount(&mut self, instances: &[&[u8]]) {
        let pseudocount = self.pseudocount;
        for (pos, row) in self.matrix.iter_mut().enumerate() {
            row.iter_mut().for_each(|p| *p = pseudocount);
            let mut total = row.iter().sum::<f64>();
            for inst in instances {
                if let Some(idx) = A::index(inst[pos]) {
                    row[idx] += 1.0;
                    total += 1.0;
                }
            }
            row.iter_mut().for_each(|p| *p /= total);
        }
        self.refresh_log_odds();
    }

    fn refresh_log_odds(&mut self) {
        let k = A::size();
        for (pos, row) in self.matrix.iter().enumerate() {
            for (j, &p) in row.iter().enumerate() {
                self.log_odds[pos * k + j] = (p / self.background[j]).ln();
            }
        }
    }
}

impl MotifModel<DnaAlphabet> {
    /// Reverse complement of the model: positions reversed, columns swapped
    /// by base complement.
    pub fn reverse_complement(&self) -> Self {
        let matrix: Vec<Vec<f64>> = self
            .matrix
            .iter()
            .rev()
            .map(|row| {
                let mut rc = vec![0.0; row.len()];
                for (j, &p) in row.iter().enumerate() {
                    if let Some(c) = DnaAlphabet::complement(j) {
                        rc[c] = p;
                    }
                }
                rc
            })
            .collect();
        let mut model = Self {
            width: self.width,
            matrix,
            log_odds: vec![0.0; self.log_odds.len()],
            background: self.background.clone(),
            pseudocount: self.pseudocount,
            _alphabet: PhantomData,
        };
        model.refresh_log_odds();
        model
    }
}

fn validate_background<A: Alphabet>(background: &[f64]) -> Result<Vec<f64>> {
    if background.len() != A::size() {
        return Err(UlvaError::InvalidInput(format!(
            "background has {} entries, expected {}",
            background.len(),
            A::size()
        )));
    }
    for (j, &bg) in background.iter().enumerate() {
        if bg <= 0.0 {
            return Err(UlvaError::InvalidInput(format!(
                "background frequency for '{}' must be positive, got {}",
                A::SYMBOLS[j] as char,
                bg
            )));
        }
    }
    Ok(background.to_vec())
}
