use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::database::tenant_scope::Retryable;
use crate::types::InputError;

/// Errors surfaced by the workout and personal-record operations.
///
/// `NotFound` covers both a missing row and a row owned by another tenant;
/// the two are indistinguishable by construction since the latter is never
/// visible.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] InputError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(DatabaseError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    pub fn validation(field: &str, message: &str) -> Self {
        ServiceError::Validation(InputError::new(field, message))
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            // Writes rejected by a row policy only happen for rows the
            // caller cannot see
            DatabaseError::ScopeViolation { context, .. } => {
                tracing::warn!("Row scope violation during {}", context);
                ServiceError::NotFound("resource not found".to_string())
            }
            DatabaseError::UniqueViolation { context, .. } => {
                ServiceError::Conflict(format!("{} conflicts with an existing row", context))
            }
            other => ServiceError::Database(other),
        }
    }
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Database(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_database_errors_stay_internal() {
        let err: ServiceError = DatabaseError::ConfigMissing("DATABASE_URL").into();
        assert!(matches!(err, ServiceError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(ServiceError::not_found("workout", 42).to_string(), "workout 42 not found");
    }
}
