// =====================================================
// ADAPTER ERROR TAXONOMY
// =====================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Invalid field mapping or options at startup.
    #[error("{0}")]
    Configuration(String),

    /// Sink unreachable or rejected credentials at startup.
    #[error("{0}")]
    Connection(String),

    /// A data event whose payload is not an object or a collection of objects.
    #[error("{0}")]
    InvalidData(String),

    /// The sink failed a single record's insert.
    #[error("Failed to insert record into {table}: {message}")]
    Insert { table: String, message: String },

    /// Malformed host message.
    #[error("Invalid host message: {0}")]
    Protocol(String),

    #[error("Host channel failure: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Fatal errors terminate the process after the host has been notified.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Configuration(_) | AdapterError::Connection(_) | AdapterError::Io(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Configuration(_) => "configuration",
            AdapterError::Connection(_) => "connection",
            AdapterError::InvalidData(_) => "invalid_data",
            AdapterError::Insert { .. } => "insert",
            AdapterError::Protocol(_) => "protocol",
            AdapterError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_and_channel_errors_are_fatal() {
        assert!(AdapterError::Configuration("bad".to_string()).is_fatal());
        assert!(AdapterError::Connection("down".to_string()).is_fatal());
        assert!(!AdapterError::InvalidData("nope".to_string()).is_fatal());
        assert!(!AdapterError::Insert {
            table: "t".to_string(),
            message: "rejected".to_string(),
        }
        .is_fatal());
        assert!(!AdapterError::Protocol("garbage".to_string()).is_fatal());
    }

    #[test]
    fn insert_error_message_names_the_table() {
        let error = AdapterError::Insert {
            table: "readings".to_string(),
            message: "duplicate key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to insert record into readings: duplicate key"
        );
        assert_eq!(error.kind(), "insert");
    }
}
