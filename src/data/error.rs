use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy for the reduction core
// ---------------------------------------------------------------------------

pub type XrfResult<T> = Result<T, XrfError>;

#[derive(Debug, Error)]
pub enum XrfError {
    /// A stage or detector file is missing, unreadable or malformed.
    #[error("cannot ingest {}: {reason}", .path.display())]
    Ingestion { path: PathBuf, reason: String },

    /// The stage table does not factor into a raster, or a reshape was
    /// asked for with the wrong number of values.
    #[error("raster shape mismatch: {0}")]
    Shape(String),

    /// Two spectra that must share a channel axis have different lengths.
    #[error("{name} has {found} channels, expected {expected}")]
    Alignment {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("no spectra loaded")]
    EmptyInput,

    /// The selected window maps to an empty or inverted index range.
    #[error("window [{low}, {high}] selects no channels")]
    DegenerateWindow { low: usize, high: usize },
}

impl XrfError {
    pub fn ingestion(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        XrfError::Ingestion {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the error invalidates the whole loaded dataset rather than a
    /// single derived computation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, XrfError::Ingestion { .. } | XrfError::Shape(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_message_names_the_file() {
        let err = XrfError::ingestion("/scan/7-2.mca", "file not found");
        assert_eq!(err.to_string(), "cannot ingest /scan/7-2.mca: file not found");
        assert!(err.is_fatal());
    }

    #[test]
    fn window_errors_are_not_fatal() {
        assert!(!XrfError::DegenerateWindow { low: 5, high: 2 }.is_fatal());
        assert!(!XrfError::EmptyInput.is_fatal());
        assert!(XrfError::Shape("5 x 2 != 11".into()).is_fatal());
    }
}
