use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdvError {
    /// A required identity column is missing from an input table.
    /// Fatal for that table; the message names the offending column.
    #[error("required column `{column}` missing from {table} table")]
    MissingColumn { table: String, column: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl SdvError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SdvError>;
