//! Error types for the alignment engine

use thiserror::Error;

/// Every failure the engine can report. None of these are recoverable within
/// a run: a single bad merge invalidates the column correspondence of the
/// whole alignment, so callers get the error and no partial result.
#[derive(Debug, Error)]
pub enum MsaError {
    /// Empty sequence set, empty sequence, duplicate name, or a residue the
    /// substitution model does not know.
    #[error("invalid input: {0}")]
    Input(String),

    /// The substitution model was asked for a pair it has no entry for.
    #[error("no substitution score defined for pair ('{a}', '{b}')")]
    ScoreLookup { a: char, b: char },

    /// Distance or guide-tree state that can only come from a logic error.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Malformed FASTA text or substitution table.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, MsaError>;
