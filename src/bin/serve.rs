use anyhow::Context;
use clap::Parser;
use review_risk::server::{router, AppState};
use review_risk::utils::{logger, validation::Validate};
use review_risk::{ModelArtifact, RiskConfig};

#[derive(Parser)]
#[command(name = "serve")]
#[command(about = "Serve low-review risk predictions over HTTP")]
struct Args {
    /// Path to TOML configuration file (defaults to risk-config.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Model artifact written by the train binary
    #[arg(long, env = "MODEL_PATH")]
    model: Option<String>,

    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Number of SHAP contributions returned per prediction
    #[arg(long)]
    top_features: Option<usize>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RiskConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(model) = args.model {
        config.output.model_path = model;
    }
    if let Some(host) = args.host {
        config.serve.host = host;
    }
    if let Some(port) = args.port {
        config.serve.port = port;
    }
    if let Some(top) = args.top_features {
        config.serve.top_features = top;
    }
    config.serve.json_logs |= args.json_logs;

    logger::init_server_logger(config.serve.json_logs);
    config.validate().context("invalid configuration")?;

    let artifact = ModelArtifact::load(&config.output.model_path)
        .await
        .with_context(|| format!("cannot load model artifact {}", config.output.model_path))?;

    let app = router(AppState::new(artifact, config.serve.top_features));

    let addr = format!("{}:{}", config.serve.host, config.serve.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    tracing::info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
