//! Request-level error taxonomy.
//!
//! Every failure a translation request can surface maps onto one
//! [`QueryError`] variant with a stable kind string. Failures are isolated
//! to their request; none are fatal to the process.

use crate::provider::{ProviderError, RouteError};
use crate::sqlguard::SqlGuardError;

/// Failure modes of the translate-execute-record pipeline.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The request carried an empty query text.
    #[error("query text must not be empty")]
    EmptyQuery,
    /// The request named a provider this deployment does not know.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// An insights request named an invalid or unknown table or column.
    #[error("{0}")]
    InvalidIdentifier(String),
    /// Translation routing failed (provider unavailable, timed out,
    /// errored, or none were available).
    #[error(transparent)]
    Translation(#[from] RouteError),
    /// The sanitizer rejected the generated SQL.
    #[error("unsafe or invalid SQL ({rule}): {detail}")]
    UnsafeOrInvalidSql {
        /// The violated rule name.
        rule: &'static str,
        /// Human-readable detail.
        detail: String,
    },
    /// The storage engine rejected the sanitized SQL.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// No history record exists with the requested id.
    #[error("history record {0} not found")]
    NotFound(i64),
    /// Plumbing failure (database I/O, task join, serialization).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SqlGuardError> for QueryError {
    fn from(e: SqlGuardError) -> Self {
        Self::UnsafeOrInvalidSql {
            rule: e.rule,
            detail: e.detail,
        }
    }
}

impl QueryError {
    /// Stable error kind, surfaced in structured API errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyQuery | Self::UnknownProvider(_) | Self::InvalidIdentifier(_) => {
                "invalid_request"
            }
            Self::Translation(RouteError::Provider(ProviderError::Unavailable(_))) => {
                "unavailable"
            }
            Self::Translation(RouteError::Provider(ProviderError::Timeout(..))) => "timeout",
            Self::Translation(RouteError::Provider(ProviderError::Backend(..))) => "backend_error",
            Self::Translation(RouteError::NoProviderAvailable { .. }) => "no_provider_available",
            Self::UnsafeOrInvalidSql { .. } => "unsafe_or_invalid_sql",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(QueryError::EmptyQuery.kind(), "invalid_request");
        assert_eq!(
            QueryError::from(RouteError::NoProviderAvailable { tried: vec![] }).kind(),
            "no_provider_available"
        );
        assert_eq!(
            QueryError::from(RouteError::Provider(ProviderError::Timeout(
                ProviderId::Openai,
                std::time::Duration::from_secs(60),
            )))
            .kind(),
            "timeout"
        );
        assert_eq!(QueryError::NotFound(7).kind(), "not_found");
    }

    #[test]
    fn sanitizer_errors_carry_the_rule_name() {
        let err = QueryError::from(SqlGuardError {
            rule: "denied_keyword",
            detail: "keyword DROP is not allowed in read-only queries".to_string(),
        });
        assert_eq!(err.kind(), "unsafe_or_invalid_sql");
        assert!(err.to_string().contains("denied_keyword"));
    }
}
