//! Immutable sequence sets with a derived background model.
//!
//! [`SequenceSet`] owns the input sequences for the lifetime of a search.
//! Construction uppercases and validates every byte against the alphabet,
//! pre-encodes each sequence into symbol codes for the scoring loops, and
//! estimates the background symbol frequencies by counting. Nothing mutates
//! after construction; every other component reads it shared.

use std::marker::PhantomData;

use ulva_core::{Annotated, Result, Sequence, Summarizable, UlvaError};

use crate::alphabet::Alphabet;

/// Code stored for wildcard symbols in the encoded sequences.
///
/// Scoring treats any window containing this code as invalid.
pub const WILDCARD_CODE: u8 = 0xFF;

/// One input sequence: a stable identifier plus validated uppercase bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    id: String,
    data: Vec<u8>,
}

impl SequenceRecord {
    /// The sequence identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Sequence for SequenceRecord {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Annotated for SequenceRecord {
    fn name(&self) -> &str {
        &self.id
    }
}

/// An ordered, immutable collection of sequences over one alphabet.
///
/// Holds the validated records, a per-sequence symbol-code encoding
/// (`A::index` per byte, [`WILDCARD_CODE`] for wildcards), and the
/// background frequency vector estimated from the whole set.
#[derive(Debug, Clone)]
pub struct SequenceSet<A: Alphabet> {
    records: Vec<SequenceRecord>,
    codes: Vec<Vec<u8>>,
    background: Vec<f64>,
    _alphabet: PhantomData<A>,
}

impl<A: Alphabet> SequenceSet<A> {
    /// Build a sequence set from `(identifier, bytes)` pairs.
    ///
    /// Input is uppercased, then every byte is checked against the
    /// alphabet. Background frequencies are Laplace-smoothed (one count per
    /// scored symbol) so every entry is strictly positive; wildcard symbols
    /// are excluded from the counts.
    ///
    /// # Errors
    ///
    /// Returns [`UlvaError::InvalidAlphabet`] if any byte is outside the
    /// alphabet, or [`UlvaError::InvalidInput`] if the collection is empty.
    pub fn new<I, B>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, B)>,
        B: AsRef<[u8]>,
    {
        let k = A::size();
        let mut validated = Vec::new();
        let mut codes = Vec::new();
        let mut counts = vec![1.0f64; k];

        for (id, bytes) in records {
            let data: Vec<u8> = bytes
                .as_ref()
                .iter()
                .map(|b| b.to_ascii_uppercase())
                .collect();
            let mut encoded = Vec::with_capacity(data.len());
            for (pos, &b) in data.iter().enumerate() {
                match A::index(b) {
                    Some(idx) => {
                        counts[idx] += 1.0;
                        encoded.push(idx as u8);
                    }
                    None if b == A::WILDCARD => encoded.push(WILDCARD_CODE),
                    None => {
                        return Err(UlvaError::InvalidAlphabet(format!(
                            "{} byte '{}' (0x{:02X}) at position {} of sequence '{}'",
                            A::NAME,
                            b as char,
                            b,
                            pos,
                            id
                        )));
                    }
                }
            }
            validated.push(SequenceRecord { id, data });
            codes.push(encoded);
        }

        if validated.is_empty() {
            return Err(UlvaError::InvalidInput(
                "at least one sequence is required".into(),
            ));
        }

        let total: f64 = counts.iter().sum();
        let background = counts.iter().map(|&c| c / total).collect();

        Ok(Self {
            records: validated,
            codes,
            background,
            _alphabet: PhantomData,
        })
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the set holds no sequences.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record at index `i`.
    pub fn record(&self, i: usize) -> &SequenceRecord {
        &self.records[i]
    }

    /// Identifier of sequence `i`.
    pub fn id(&self, i: usize) -> &str {
        self.records[i].id()
    }

    /// Raw uppercase bytes of sequence `i`.
    pub fn seq(&self, i: usize) -> &[u8] {
        self.records[i].as_bytes()
    }

    /// Symbol codes of sequence `i` ([`WILDCARD_CODE`] for wildcards).
    pub fn codes(&self, i: usize) -> &[u8] {
        &self.codes[i]
    }

    /// Length of sequence `i`.
    pub fn seq_len(&self, i: usize) -> usize {
        self.records[i].len()
    }

    /// Symbol at `(sequence, offset)`.
    pub fn symbol(&self, i: usize, offset: usize) -> u8 {
        self.records[i].as_bytes()[offset]
    }

    /// Length of the longest sequence in the set.
    pub fn max_seq_len(&self) -> usize {
        self.records.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Background frequency per scored symbol (sums to 1, all entries > 0).
    pub fn background(&self) -> &[f64] {
        &self.background
    }
}

impl<A: Alphabet> Summarizable for SequenceSet<A> {
    fn summary(&self) -> String {
        let total: usize = self.records.iter().map(|r| r.len()).sum();
        format!(
            "{} set: {} sequences, {} residues",
            A::NAME,
            self.records.len(),
            total
        )
    }
}
