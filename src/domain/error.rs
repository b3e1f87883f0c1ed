use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Duplicate name: {message}")]
    DuplicateName { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("No variations: {message}")]
    NoVariations { message: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn duplicate_name(message: impl Into<String>) -> Self {
        Self::DuplicateName {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn no_variations(message: impl Into<String>) -> Self {
        Self::NoVariations {
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the whole call can succeed without caller changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Experiment '7' not found");
        assert_eq!(error.to_string(), "Not found: Experiment '7' not found");
    }

    #[test]
    fn test_invalid_input_error() {
        let error = DomainError::invalid_input("Experiment name cannot be blank");
        assert_eq!(
            error.to_string(),
            "Invalid input: Experiment name cannot be blank"
        );
    }

    #[test]
    fn test_duplicate_name_error() {
        let error = DomainError::duplicate_name("Experiment 'Checkout' already exists");
        assert_eq!(
            error.to_string(),
            "Duplicate name: Experiment 'Checkout' already exists"
        );
    }

    #[test]
    fn test_only_store_unavailable_is_retryable() {
        assert!(DomainError::store_unavailable("connection refused").is_retryable());
        assert!(!DomainError::not_found("x").is_retryable());
        assert!(!DomainError::invalid_input("x").is_retryable());
        assert!(!DomainError::duplicate_name("x").is_retryable());
        assert!(!DomainError::no_variations("x").is_retryable());
        assert!(!DomainError::internal("x").is_retryable());
    }
}
