use anyhow::Context;
use axum::Router;
use mediqa_server::middleware::{RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt};
use mediqa_server::{ServiceState, routes};

use crate::config::{Cli, Providers, ServeArgs, create_qa_service};
use crate::{TRACING_TARGET_CONFIG, server};

/// Wires the pipeline and serves the API until shutdown.
pub async fn serve(cli: &Cli, args: ServeArgs) -> anyhow::Result<()> {
    args.server
        .validate()
        .context("invalid server configuration")?;
    args.server.log();

    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        request_timeout_secs = args.recovery.request_timeout,
        "Middleware configuration"
    );

    let settings = cli.settings()?;
    let providers = Providers::connect(&settings)?;
    let qa_service = create_qa_service(&settings, providers, args.populate).await?;
    let router = create_router(ServiceState::new(qa_service), &args.recovery);

    server::serve(router, args.server)
        .await
        .context("server terminated with an error")
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Latency logs
/// 4. Routes (innermost)
fn create_router(state: ServiceState, recovery: &RecoveryConfig) -> Router {
    routes(state)
        .with_latency_logs()
        .with_observability()
        .with_recovery(recovery)
}
