use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Malformed permission token: {0}")]
    MalformedPermission(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown province: {0}")]
    UnknownProvince(String),

    #[error("Unknown branch: {0}")]
    UnknownBranch(String),

    #[error("Branch {branch} lies outside the accessible provinces")]
    BranchOutsideScope { branch: String },

    #[error("{field} {value} is outside the caller's scope")]
    OutOfScope { field: &'static str, value: String },

    #[error("Duplicate {field} {value} in {collection}")]
    DuplicateRecord {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid policy configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type AccessResult<T> = Result<T, AccessError>;
