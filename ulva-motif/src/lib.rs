//! De novo motif discovery for the Ulva ecosystem.
//!
//! Finds short recurring patterns shared across a set of DNA or protein
//! sequences, modelling each motif as a position probability matrix scored
//! by log-odds against the set's background frequencies:
//!
//! - **Alphabets** — [`DnaAlphabet`], [`ProteinAlphabet`]
//! - **Sequence sets** — [`SequenceSet`] with a derived background model
//! - **Motif models** — [`MotifModel`] with log-odds scoring and consensus
//! - **Seeding** — [`SeedStrategy`] (random restart, explicit, frequent
//!   word, profile scan)
//! - **Refinement** — [`Refiner`], an EM-style state machine producing a
//!   [`ScoredMotif`]
//! - **Search** — [`search`] over a (width, restart) grid with ranking and
//!   deduplication
//! - **Formats** — [`parse_jaspar`] profiles in, [`write_meme`] motifs out
//!
//! Enable the `parallel` feature to run independent search runs and the
//! per-sequence scoring pass on a rayon worker pool.
//!
//! # Example
//!
//! ```
//! use ulva_motif::{search, DnaAlphabet, SearchConfig, SequenceSet};
//!
//! // Five sequences, each carrying an occurrence of "ACGTAC".
//! let set = SequenceSet::<DnaAlphabet>::new(vec![
//!     ("s1".to_string(), b"TTGGACGTACTTGGTTGGTT".to_vec()),
//!     ("s2".to_string(), b"ACGTACGGTTGGTTAAGGTT".to_vec()),
//!     ("s3".to_string(), b"GGTTAAACGTACAAGGTTAA".to_vec()),
//!     ("s4".to_string(), b"TTAAGGTTAAGGTTACGTAC".to_vec()),
//!     ("s5".to_string(), b"AATTACGTACAATTGGAATT".to_vec()),
//! ])
//! .unwrap();
//!
//! let config = SearchConfig {
//!     widths: vec![6],
//!     restarts: 2,
//!     ..SearchConfig::default()
//! };
//! let motifs = search(&set, &config).unwrap();
//! assert_eq!(motifs[0].consensus, "ACGTAC");
//! assert_eq!(motifs[0].instances.len(), 5);
//! ```

pub mod alphabet;
pub mod evaluate;
pub mod format;
pub mod model;
pub mod refine;
pub mod search;
pub mod seed;
pub mod seqset;

// Re-export alphabet types
pub use alphabet::{Alphabet, DnaAlphabet, ProteinAlphabet};

// Re-export sequence containers
pub use seqset::{SequenceRecord, SequenceSet, WILDCARD_CODE};

// Re-export the motif model
pub use model::MotifModel;

// Re-export seeding types
pub use seed::{InstanceAssignment, SeedStrategy};

// Re-export refinement types
pub use refine::{Refiner, RefinerConfig, RefinerState, ScoredMotif};

// Re-export search entry points
pub use search::{motif_distance, search, SearchConfig};

// Re-export format I/O
pub use format::{parse_jaspar, write_meme, Profile};
