// Social Feed Server - posts, replies and likes with transactionally maintained projections

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use social_feed::{app_state::AppState, config::Config, feed_interface::create_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("social_feed=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state (opens the fact store)
    let app_state = AppState::new(config.clone()).await?;
    let app = create_app(app_state.clone());

    let addr = config.server_address();
    info!("Social feed server starting on http://{}", addr);
    info!("  POST   /api/v1/posts                      - Create post");
    info!("  GET    /api/v1/posts/{{id}}                 - Get post with projection");
    info!("  POST   /api/v1/posts/{{id}}/replies         - Append reply");
    info!("  POST   /api/v1/posts/{{id}}/likes           - Record like");
    info!("  POST   /api/v1/posts/{{id}}/reconcile       - Rebuild projection from facts");
    info!("  PUT    /api/v1/users/{{id}}/favorite-team   - Set favorite team");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.shutdown().await;
    info!("Social feed server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
