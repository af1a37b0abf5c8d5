use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid {field}: {value}")]
    InvalidInput { field: &'static str, value: String },
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Integrity violation: {0}")]
    Integrity(String),
    #[error("Cache clear is only permitted in the test runtime (current: {env})")]
    ClearOutsideTest { env: String },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl CoreError {
    pub fn invalid(field: &'static str, value: impl ToString) -> Self {
        CoreError::InvalidInput {
            field,
            value: value.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// True when SQLite rejected the write on a unique, check or foreign key constraint.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            CoreError::Integrity(_) => true,
            CoreError::Db(err) => err.as_database_error().is_some_and(|db| {
                db.is_unique_violation() || db.is_check_violation() || db.is_foreign_key_violation()
            }),
            _ => false,
        }
    }
}
