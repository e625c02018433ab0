use thiserror::Error;

/// Failures surfaced by food resolution and logging.
///
/// Provider-internal failures never appear here directly: the provider chain
/// absorbs them and only reports exhaustion as `NotInCatalog` (nobody knew
/// the food) or `ProviderUnavailable` (somebody failed and might know it on
/// a later attempt).
#[derive(Debug, Error)]
pub enum FoodError {
    #[error("{0}")]
    Validation(String),

    #[error("No nutrition data found for '{0}'")]
    NotInCatalog(String),

    #[error("Nutrition providers are unavailable for '{0}', try again later")]
    ProviderUnavailable(String),

    #[error("Food '{0}' was created concurrently")]
    PersistenceConflict(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl FoodError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}

pub type FoodResult<T> = std::result::Result<T, FoodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_unavailable_is_retryable() {
        assert!(FoodError::ProviderUnavailable("dal".into()).is_retryable());
        assert!(!FoodError::NotInCatalog("dal".into()).is_retryable());
        assert!(!FoodError::validation("bad unit").is_retryable());
    }

    #[test]
    fn test_storage_wraps_anyhow() {
        let err: FoodError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, FoodError::Storage(_)));
        assert_eq!(err.to_string(), "disk full");
    }
}
