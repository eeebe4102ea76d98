pub mod routes;
pub mod state;

use axum::routing::any;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use state::{AppState, GatewayConfig};

/// Build the axum Router with both ingress surfaces.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState, config: &GatewayConfig) -> Router {
    let web = config.web_prefix.trim_matches('/').to_string();
    let base = config.base_prefix.trim_matches('/').to_string();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Web-exposed invocation
        .route(
            &format!("/{web}/{{package}}/{{item}}"),
            any(routes::invoke::web_invoke),
        )
        .route(
            &format!("/{web}/{{package}}/{{item}}/{{*rest}}"),
            any(routes::invoke::web_invoke_rest),
        )
        // Non-web surface: always rejected
        .route(
            &format!("/{base}/{{package}}/{{item}}"),
            any(routes::invoke::nonweb_reject),
        )
        .route(
            &format!("/{base}/{{package}}/{{item}}/{{*rest}}"),
            any(routes::invoke::nonweb_reject),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the action simulator server.
pub async fn serve(state: AppState, config: GatewayConfig, port: u16) -> anyhow::Result<()> {
    let app = build_router(state, &config);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        "owlocal listening on http://localhost:{port}/{}",
        config.web_prefix
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0`
/// and the OS picks a free port).
pub async fn serve_on(
    state: AppState,
    config: GatewayConfig,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(state, &config);

    tracing::info!(
        "owlocal listening on http://localhost:{actual_port}/{}",
        config.web_prefix
    );

    axum::serve(listener, app).await?;
    Ok(())
}
