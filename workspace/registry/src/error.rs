use thiserror::Error;

/// Error types for registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input rejected before anything was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced account or dataset does not exist
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// The target may not be modified through the admin surface
    #[error("Protected: {0}")]
    Protected(String),

    /// The actor is not an active superuser
    #[error("Authorization required: {0}")]
    Authorization(String),

    /// Error from password hashing
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Error from media root access
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Runtime error for unexpected situations
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl RegistryError {
    pub fn user_not_found(id: i32) -> Self {
        RegistryError::NotFound { entity: "User", id }
    }

    pub fn dataset_not_found(id: i32) -> Self {
        RegistryError::NotFound { entity: "Dataset", id }
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(error: tokio::task::JoinError) -> Self {
        RegistryError::Runtime(format!("Blocking task failed: {error}"))
    }
}

/// Type alias for Result with RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;
