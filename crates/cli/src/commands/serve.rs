//! `snello serve` — Start the web chat.

use super::load_config;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        eprintln!("  Warning: no API key configured; chats will fail until one is set.");
    }

    println!("Snello web chat");
    println!("   Open: http://{}:{}/", config.gateway.host, config.gateway.port);

    snello_gateway::start(config).await?;

    Ok(())
}
