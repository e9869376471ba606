//! `streamgate gateway`: start the HTTP server.

use streamgate_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if config.upstream.token.is_none() {
        tracing::warn!("No upstream token configured; requests will fail with 401");
    }

    println!("streamgate gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Upstream:  {}", config.upstream.base_url);

    streamgate_gateway::start(config).await?;

    Ok(())
}
