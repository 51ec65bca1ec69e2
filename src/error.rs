//! Error types.

/// Errors raised while loading, decoding, lowering, or auditing a query.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// A column index falls outside the catalog.
    #[error("Column index {index} is not present in the catalog")]
    UnresolvableColumnIndex {
        /// Offending column index.
        index: usize,
    },

    /// A table index falls outside the catalog.
    #[error("Table index {index} is not present in the catalog")]
    UnresolvableTableIndex {
        /// Offending table index.
        index: usize,
    },

    /// The query dict does not have one of the documented shapes.
    #[error("Structurally invalid query at {path}: {message}")]
    StructurallyInvalidQuery {
        /// JSON path of the offending node.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// The SQL text could not be parsed.
    #[error("SQL parse error: {0}")]
    SqlParse(#[from] sqlparser::parser::ParserError),

    /// The SQL text uses a construct outside the supported grammar.
    #[error("Unsupported SQL: {message}")]
    UnsupportedSql {
        /// Description of the unsupported construct.
        message: String,
    },

    /// An identifier in the SQL text matches no column in scope.
    #[error("Unknown column '{name}'")]
    UnknownColumn {
        /// Identifier as written.
        name: String,
    },

    /// An identifier in the SQL text matches no table in the catalog.
    #[error("Unknown table '{name}'")]
    UnknownTable {
        /// Identifier as written.
        name: String,
    },

    /// A `tables.json` entry does not follow the Spider column layout.
    #[error("Invalid schema for database '{db_id}': {message}")]
    InvalidSchema {
        /// Database identifier.
        db_id: String,
        /// What was wrong with it.
        message: String,
    },

    /// A required database is missing from the loaded catalogs.
    #[error("Unknown database '{db_id}'")]
    UnknownDatabase {
        /// Database identifier.
        db_id: String,
    },

    /// An output file name would escape the output directory.
    #[error("Invalid output name '{name}': {reason}")]
    InvalidOutputName {
        /// Name as given.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl AuditError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        AuditError::StructurallyInvalidQuery {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        AuditError::UnsupportedSql {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        AuditError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AuditError>;
