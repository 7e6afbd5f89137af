use analysis_core::AppConfig;
use analysis_orchestrator::AnalysisOrchestrator;
use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries the report
    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {}", info);
    }));

    let Some(ticker) = std::env::args().nth(1) else {
        bail!("usage: stock-report <TICKER>");
    };

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(
        "Config: timeout {}s, peers x{}, insider window {}d, smart DCF {}",
        config.provider_timeout_secs,
        config.peer_concurrency,
        config.insider_window_days,
        config.dcf.smart
    );

    let orchestrator = AnalysisOrchestrator::from_config(&config);
    let report = orchestrator
        .analyze(&ticker)
        .await
        .with_context(|| format!("analysis of {} failed", ticker))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
