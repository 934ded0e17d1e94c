//! Error type for building, storing, and loading the kmer index.

use std::path::PathBuf;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors from the kmer index engine.
///
/// An empty suffix-array interval during backward search is not an error.
/// It only means that the search branch does not match, and the branch is dropped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KmerIndexError {
    /// A character outside `ACGT` (or an encoded value outside 1-4).
    #[error("invalid DNA base {0:?}")]
    InvalidBase(char),

    /// A cache line with inconsistent fields, delimiters, counts, or numbers.
    #[error("malformed kmer index cache line: {0}")]
    MalformedCacheLine(String),

    /// The cache file is absent or cannot be read.
    #[error("kmer index cache {} is unavailable: {reason}", .path.display())]
    CacheUnavailable { path: PathBuf, reason: String },

    /// The freshly built index could not be persisted.
    #[error("failed to write kmer index cache {}: {reason}", .path.display())]
    CacheWrite { path: PathBuf, reason: String },

    /// Configuration rejected before any work begins.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The population reference graph could not be parsed or indexed.
    #[error("invalid PRG: {0}")]
    InvalidPrg(String),
}

impl KmerIndexError {
    /// Adds a line number to a [`KmerIndexError::MalformedCacheLine`] error.
    ///
    /// Other errors are returned unchanged.
    pub fn at_line(self, line_num: usize) -> Self {
        match self {
            KmerIndexError::MalformedCacheLine(reason) => {
                KmerIndexError::MalformedCacheLine(format!("line {}: {}", line_num, reason))
            },
            other => other,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        KmerIndexError::MalformedCacheLine(reason.into())
    }
}

//-----------------------------------------------------------------------------
