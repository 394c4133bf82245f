//! Provider selection and fallback routing.
//!
//! The router owns the ordered list of registered backends and attempts
//! them in order until one succeeds or the candidates are exhausted.
//! Selection order per request:
//!
//! 1. the request-level override, when that provider is registered;
//! 2. the process-wide default provider from configuration;
//! 3. the remaining backends, hosted APIs before CLI agents, registration
//!    order within each class.
//!
//! There is no retry within a backend. `Unavailable` and `BackendError`
//! advance to the next candidate; a `Timeout` fails the whole request
//! immediately, since retrying a slow backend wastes the caller's budget.

use std::sync::Arc;
use std::time::Duration;

use super::{ProviderError, ProviderId, TranslationBackend};

/// Which backend operation a routed request invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendOp {
    Translate,
    Label,
}

/// Raw model text together with the provider that produced it.
#[derive(Debug, Clone)]
pub struct RoutedText {
    /// The backend's raw response.
    pub text: String,
    /// The provider that answered.
    pub provider: ProviderId,
}

/// Routing failure.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// A definitive failure from a single backend (currently only timeouts
    /// stop the fallback chain).
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Every registered candidate reported itself unavailable.
    #[error("no translation provider available (tried: {tried:?})")]
    NoProviderAvailable {
        /// Providers attempted, in order.
        tried: Vec<ProviderId>,
    },
}

/// Ordered provider router with deterministic fallback.
pub struct ProviderRouter {
    backends: Vec<Arc<dyn TranslationBackend>>,
    default_provider: Option<ProviderId>,
    timeout: Duration,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.id()).collect::<Vec<_>>(),
            )
            .field("default_provider", &self.default_provider)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderRouter {
    /// Create a router over the registered backends.
    ///
    /// Registration order is the documented fallback priority within each
    /// backend class.
    pub fn new(
        backends: Vec<Arc<dyn TranslationBackend>>,
        default_provider: Option<ProviderId>,
        timeout: Duration,
    ) -> Self {
        Self {
            backends,
            default_provider,
            timeout,
        }
    }

    /// The configured per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Route a translation prompt to the first backend that succeeds.
    pub async fn translate(
        &self,
        prompt: &str,
        requested: Option<ProviderId>,
    ) -> Result<RoutedText, RouteError> {
        self.route(BackendOp::Translate, prompt, requested).await
    }

    /// Route a display-label prompt to the first backend that succeeds.
    pub async fn label(
        &self,
        prompt: &str,
        requested: Option<ProviderId>,
    ) -> Result<RoutedText, RouteError> {
        self.route(BackendOp::Label, prompt, requested).await
    }

    /// Ordered candidate list for a request.
    fn candidates(&self, requested: Option<ProviderId>) -> Vec<&Arc<dyn TranslationBackend>> {
        let mut ordered: Vec<&Arc<dyn TranslationBackend>> = Vec::new();
        fn push<'a>(
            backend: Option<&'a Arc<dyn TranslationBackend>>,
            ordered: &mut Vec<&'a Arc<dyn TranslationBackend>>,
        ) {
            if let Some(backend) = backend {
                if !ordered.iter().any(|b| b.id() == backend.id()) {
                    ordered.push(backend);
                }
            }
        }

        push(
            requested.and_then(|id| self.backends.iter().find(|b| b.id() == id)),
            &mut ordered,
        );
        push(
            self.default_provider
                .and_then(|id| self.backends.iter().find(|b| b.id() == id)),
            &mut ordered,
        );

        // Remaining backends, hosted class first, registration order within.
        let mut rest: Vec<&Arc<dyn TranslationBackend>> = self
            .backends
            .iter()
            .filter(|b| !ordered.iter().any(|o| o.id() == b.id()))
            .collect();
        rest.sort_by_key(|b| b.class());
        ordered.extend(rest);

        ordered
    }

    async fn route(
        &self,
        op: BackendOp,
        prompt: &str,
        requested: Option<ProviderId>,
    ) -> Result<RoutedText, RouteError> {
        let mut tried = Vec::new();
        let mut last_backend_error: Option<ProviderError> = None;

        for backend in self.candidates(requested) {
            let id = backend.id();
            tried.push(id);

            let result = match op {
                BackendOp::Translate => backend.translate(prompt, self.timeout).await,
                BackendOp::Label => backend.label(prompt, self.timeout).await,
            };

            match result {
                Ok(text) => {
                    tracing::debug!(provider = %id, op = ?op, "Provider call succeeded");
                    return Ok(RoutedText { text, provider: id });
                }
                Err(ProviderError::Unavailable(_)) => {
                    tracing::debug!(provider = %id, "Provider unavailable, trying next");
                }
                Err(e @ ProviderError::Timeout(..)) => {
                    tracing::warn!(provider = %id, error = %e, "Provider timed out");
                    return Err(e.into());
                }
                Err(e @ ProviderError::Backend(..)) => {
                    tracing::warn!(provider = %id, error = %e, "Provider failed, trying next");
                    last_backend_error = Some(e);
                }
            }
        }

        match last_backend_error {
            Some(e) => Err(e.into()),
            None => Err(RouteError::NoProviderAvailable { tried }),
        }
    }
}
