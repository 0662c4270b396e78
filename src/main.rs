use std::sync::Arc;

use anyhow::Context;

use chat_relay::bridge::{Bridge, HelperBridge};
use chat_relay::config::Config;
use chat_relay::llm::create_provider;
use chat_relay::logging;
use chat_relay::relay::Relay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    dotenv::dotenv().ok();

    let config = Config::from_env().context("config error")?;

    let log_guard = logging::init(config.log_dir.as_deref());

    let llm = create_provider(&config.llm).context("LLM provider error")?;

    let bridge: Arc<dyn Bridge> = Arc::new(HelperBridge::new(config.bridge.clone()));

    eprintln!("🤖 Chat Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Target: {}", config.relay.target);
    eprintln!("   Provider: {} (model: {})", config.llm.provider, config.llm.model);
    eprintln!("   Bridge: {}", config.bridge.addr);
    eprintln!("   Mode: {}\n", config.relay.mode);

    let relay = Relay::new(config.relay, llm, bridge);
    relay
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    // The stdin reader thread may still be parked on a read; exit instead of
    // waiting for the runtime to join it.
    drop(log_guard);
    std::process::exit(0);
}
