use thiserror::Error;

/// Failures the orchestrator classifies. Per-row variants are logged and the
/// row is skipped; the rest end the run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("record '{uid}' failed: {message}")]
    RowFailed { uid: String, message: String },

    #[error("no entry date for hash {hash} (record '{uid}')")]
    MissingEntryDate { hash: String, uid: String },

    #[error("row stream failed: {message}")]
    RowStream { message: String },
}

impl EtlError {
    pub fn is_row_level(&self) -> bool {
        matches!(self, EtlError::MalformedRow { .. } | EtlError::RowFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_level_classification() {
        assert!(EtlError::MalformedRow { line: 3, message: "x".into() }.is_row_level());
        assert!(EtlError::RowFailed { uid: "a".into(), message: "x".into() }.is_row_level());
        assert!(!EtlError::MissingEntryDate { hash: "h".into(), uid: "a".into() }.is_row_level());
        assert!(!EtlError::RowStream { message: "eof".into() }.is_row_level());
    }

    #[test]
    fn messages_name_the_record() {
        let err = EtlError::MissingEntryDate { hash: "abc".into(), uid: "ug7v899j".into() };
        assert_eq!(err.to_string(), "no entry date for hash abc (record 'ug7v899j')");
    }
}
