//! Motif format I/O at the engine boundary.
//!
//! Two text formats cross the boundary with reporting/ingestion
//! collaborators: JASPAR profiles come in (typically as the starting point
//! for a profile-seeded search) and discovered motifs go out in MEME
//! minimal format. The engine itself never touches files; both functions
//! work on strings.

use ulva_core::{Result, UlvaError};

use crate::alphabet::Alphabet;
use crate::refine::ScoredMotif;

/// A named probability matrix parsed from a profile database format.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    /// Identifier from the source record.
    pub name: String,
    /// Probability matrix, one row per position (counts are normalized).
    pub matrix: Vec<Vec<f64>>,
}

/// Parse DNA profiles from JASPAR format.
///
/// Each record starts with `>ID name`, followed by four rows labelled
/// A, C, G, T containing bracket-delimited count values. Counts are
/// normalized to probabilities per position; all-zero columns become
/// uniform.
///
/// # Errors
///
/// Returns [`UlvaError::Parse`] on malformed rows (missing brackets,
/// ragged rows, or unparseable numbers).
pub fn parse_jaspar(input: &str) -> Result<Vec<Profile>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let lines: Vec<&str> = input.lines().collect();
    let mut profiles = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        if !line.starts_with('>') {
            i += 1;
            continue;
        }
        let name = line[1..]
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("unnamed")
            .to_string();
        i += 1;

        let mut raw_rows: Vec<Vec<f64>> = Vec::new();
        for label in ['A', 'C', 'G', 'T'] {
            if i >= lines.len() {
                return Err(UlvaError::Parse(format!(
                    "JASPAR profile '{}': expected row '{}' but reached end of input",
                    name, label
                )));
            }
            let row_line = lines[i].trim();
            let open = row_line.find('[').ok_or_else(|| {
                UlvaError::Parse(format!(
                    "JASPAR profile '{}': missing '[' in row '{}'",
                    name, label
                ))
            })?;
            let close = row_line.find(']').ok_or_else(|| {
                UlvaError::Parse(format!(
                    "JASPAR profile '{}': missing ']' in row '{}'",
                    name, label
                ))
            })?;
            if close < open {
                return Err(UlvaError::Parse(format!(
                    "JASPAR profile '{}': ']' before '[' in row '{}'",
                    name, label
                )));
            }
            let values: std::result::Result<Vec<f64>, _> = row_line[open + 1..close]
                .split_whitespace()
                .map(|s| s.parse::<f64>())
                .collect();
            match values {
                Ok(v) => raw_rows.push(v),
                Err(e) => {
                    return Err(UlvaError::Parse(format!(
                        "JASPAR profile '{}': bad value in row '{}': {}",
                        name, label, e
                    )));
                }
            }
            i += 1;
        }

        let width = raw_rows[0].len();
        for (r, row) in raw_rows.iter().enumerate() {
            if row.len() != width {
                return Err(UlvaError::Parse(format!(
                    "JASPAR profile '{}': row {} has {} values, expected {}",
                    name,
                    ['A', 'C', 'G', 'T'][r],
                    row.len(),
                    width
                )));
            }
        }

        // Transpose base-major rows into position-major probability rows.
        let mut matrix = Vec::with_capacity(width);
        for pos in 0..width {
            let col: Vec<f64> = (0..4).map(|base| raw_rows[base][pos]).collect();
            let sum: f64 = col.iter().sum();
            if sum > 0.0 {
                matrix.push(col.iter().map(|&c| c / sum).collect());
            } else {
                matrix.push(vec![0.25; 4]);
            }
        }

        profiles.push(Profile { name, matrix });
    }

    Ok(profiles)
}

/// Write discovered motifs in MEME minimal format.
///
/// The alphabet line and column count come from `A`; each motif is named
/// `motif_<rank>` with its consensus as the alternate name and carries
/// `nsites=` from its instance list.
pub fn write_meme<A: Alphabet>(motifs: &[ScoredMotif]) -> String {
    let mut out = String::new();
    out.push_str("MEME version 5\n\n");
    out.push_str(&format!(
        "ALPHABET= {}\n\n",
        String::from_utf8_lossy(A::SYMBOLS)
    ));

    for (rank, motif) in motifs.iter().enumerate() {
        out.push_str(&format!("MOTIF motif_{} {}\n", rank + 1, motif.consensus));
        out.push_str(&format!(
            "letter-probability matrix: alength= {} w= {} nsites= {}\n",
            A::size(),
            motif.width,
            motif.instances.len()
        ));
        for row in &motif.matrix {
            for value in row {
                out.push_str(&format!(" {:.6}", value));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    out
}
