//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::config::AppConfig;
use crate::logging::OpTimer;
use crate::provider::{
    AnthropicBackend, CliAgentBackend, OllamaBackend, OpenAiBackend, ProviderRouter,
    TranslationBackend,
};
use crate::service::QueryService;
use crate::{log_banner, log_init_step, log_init_warning, log_success, AppState};

/// Queryloom version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Slack added on top of the worst-case adapter budget so the HTTP layer
/// never cuts off a request the router would still have answered.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Whole-request budget for the timeout layer.
///
/// One request may legally spend a full per-call budget on every
/// candidate, once translating and once labeling, before the fallback
/// chain is exhausted.
fn request_timeout(per_call: Duration, backend_count: usize) -> Duration {
    let calls = u32::try_from(backend_count.max(1)).unwrap_or(u32::MAX).saturating_mul(2);
    per_call
        .saturating_mul(calls)
        .saturating_add(REQUEST_TIMEOUT_MARGIN)
}

/// Create the application with all routes and middleware.
pub async fn create_app(config: AppConfig) -> anyhow::Result<Router> {
    // Start overall timer
    let overall_timer = OpTimer::new("server", "create_app");

    log_banner!(
        format!("🧵 Queryloom v{}", VERSION),
        format!("Database: {}", config.database.path.display())
    );

    // [1/3] Register translation backends, hosted APIs before CLI agents
    let step_timer = OpTimer::new("server", "backends");
    let backends = build_backends(&config);
    let backend_count = backends.len();
    let available: Vec<&str> = backends
        .iter()
        .filter(|b| b.is_available())
        .map(|b| b.id().as_str())
        .collect();
    log_init_step!(
        1,
        3,
        "Providers",
        format!(
            "⚙️ {} registered, available: [{}]",
            backends.len(),
            available.join(", ")
        )
    );
    if available.is_empty() {
        log_init_warning!("No translation provider is available. Query requests will fail.");
    }
    let router = Arc::new(ProviderRouter::new(
        backends,
        config.llm.default_provider,
        config.llm.timeout(),
    ));
    let request_timeout = request_timeout(router.timeout(), backend_count);
    step_timer.finish();

    // [2/3] Open the database-backed query service
    let step_timer = OpTimer::new("server", "service");
    let service = Arc::new(QueryService::new(router, config.database.path.clone()).await?);
    log_init_step!(
        2,
        3,
        "Query Service",
        format!("🗄️  {}", config.database.path.display())
    );
    step_timer.finish();

    let state = AppState {
        config: Arc::new(config),
        service,
    };

    // [3/3] Build the router with middleware
    let step_timer = OpTimer::new("server", "router");
    let app = api::router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    log_init_step!(3, 3, "Router", "🌐 Routes + middleware configured");
    step_timer.finish();

    log_success!("Queryloom ready");
    overall_timer.finish();
    Ok(app)
}

/// Instantiate every known backend in fallback priority order.
fn build_backends(config: &AppConfig) -> Vec<Arc<dyn TranslationBackend>> {
    vec![
        Arc::new(OpenAiBackend::new(config.providers.openai.clone())),
        Arc::new(AnthropicBackend::new(config.providers.anthropic.clone())),
        Arc::new(OllamaBackend::new(config.providers.ollama.clone())),
        Arc::new(CliAgentBackend::claude(&config.providers.cli)),
        Arc::new(CliAgentBackend::cursor_agent(&config.providers.cli)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_timeout_covers_every_sequential_adapter_call() {
        let per_call = Duration::from_secs(60);
        let backends = build_backends(&AppConfig::default());
        let budget = request_timeout(per_call, backends.len());

        // Each candidate may consume the full per-call budget twice,
        // once translating and once labeling.
        let worst_case = per_call * (u32::try_from(backends.len()).unwrap() * 2);
        assert!(budget > worst_case);
        assert_eq!(budget, worst_case + REQUEST_TIMEOUT_MARGIN);
    }

    #[test]
    fn request_timeout_with_no_backends_still_leaves_headroom() {
        let budget = request_timeout(Duration::from_secs(60), 0);
        assert!(budget >= Duration::from_secs(120) + REQUEST_TIMEOUT_MARGIN);
    }
}
