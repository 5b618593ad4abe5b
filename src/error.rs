use thiserror::Error;

#[derive(Error, Debug)]
pub enum Soft7Error {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
    #[error("Attribute '{field}' could not be validated: {reason}")]
    AttributeValidation { field: String, reason: String },
    #[error("Attribute '{field}' could not be retrieved: {reason}")]
    AttributeRetrieval { field: String, reason: String },
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Graph traversal error: {0}")]
    Traversal(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Entity store error: {0}")]
    Store(String),
    #[error("Entity already exists: {0}")]
    EntityExists(String),
    #[error("External error: {0}")]
    External(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, Soft7Error>;

// Helper conversions
impl From<rusqlite::Error> for Soft7Error {
    fn from(e: rusqlite::Error) -> Self { Self::Store(e.to_string()) }
}
impl From<serde_json::Error> for Soft7Error {
    fn from(e: serde_json::Error) -> Self { Self::External(e.to_string()) }
}
impl From<std::io::Error> for Soft7Error {
    fn from(e: std::io::Error) -> Self { Self::External(e.to_string()) }
}
