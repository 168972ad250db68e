use thiserror::Error;

/// Coarse classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required input (file, account identifier, currency) was absent.
    Structural,
    /// Extraction + parsing produced nothing usable.
    Extraction,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("no transactions found; the document may not match the expected statement layout")]
    NoTransactions {
        lines_scanned: usize,
        lines_skipped: usize,
    },

    #[error("statement period not found; the document may not match the expected statement layout")]
    PeriodNotFound,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::MissingInput(_) => ErrorKind::Structural,
            IngestError::NoTransactions { .. } | IngestError::PeriodNotFound => ErrorKind::Extraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(IngestError::MissingInput("file").kind(), ErrorKind::Structural);
        assert_eq!(IngestError::PeriodNotFound.kind(), ErrorKind::Extraction);
        let e = IngestError::NoTransactions { lines_scanned: 4, lines_skipped: 1 };
        assert_eq!(e.kind(), ErrorKind::Extraction);
        assert!(e.to_string().starts_with("no transactions found"));
    }
}
