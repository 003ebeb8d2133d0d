use std::sync::Arc;
use std::time::Duration;

use agent_host::config::ProxyConfig;
use agent_host::proxy::{AppState, StripeProvider, proxy_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ProxyConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Set the missing values in the environment and restart.");
        std::process::exit(1);
    });

    eprintln!("🚀 Agent Host proxy v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);
    eprintln!("   Origin: {}", config.public_origin);
    eprintln!(
        "   Chat webhook: {}",
        if config.chat_webhook.is_some() { "configured" } else { "not configured" }
    );
    eprintln!(
        "   VPS webhook: {}\n",
        if config.vps_webhook.is_some() { "configured" } else { "not configured" }
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let payments = Arc::new(StripeProvider::new(
        client.clone(),
        &config.stripe_api_base,
        config.stripe_secret_key.clone(),
    ));
    let app = proxy_routes(AppState::new(&config, client, payments));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Proxy server started");
    axum::serve(listener, app).await?;

    Ok(())
}
