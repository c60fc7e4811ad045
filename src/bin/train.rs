use clap::Parser;
use review_risk::core::pipeline::load_modeling_data;
use review_risk::model::{train_model, ModelArtifact};
use review_risk::utils::error::{Result, RiskError};
use review_risk::utils::monitor::SystemMonitor;
use review_risk::utils::{logger, validation::Validate};
use review_risk::RiskConfig;
use std::path::Path;

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train the low-review risk model on the modeling table")]
struct Args {
    /// Path to TOML configuration file (defaults to risk-config.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Modeling table produced by data_loader
    #[arg(long, env = "OLIST_MODELING_PATH")]
    modeling_path: Option<String>,

    /// Where to write the model artifact
    #[arg(long, env = "MODEL_PATH")]
    model_path: Option<String>,

    /// Where to write the metrics report
    #[arg(long)]
    report_path: Option<String>,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<RiskConfig> {
    let mut config = RiskConfig::load_or_default(args.config.as_deref())?;

    // 應用命令列覆蓋設定
    if let Some(path) = &args.modeling_path {
        config.data.modeling_path = path.clone();
    }
    if let Some(path) = &args.model_path {
        config.output.model_path = path.clone();
    }
    if let Some(path) = &args.report_path {
        config.output.report_path = path.clone();
    }
    if let Some(enabled) = args.monitor {
        config.monitoring.enabled = enabled;
    }

    config.validate()?;
    Ok(config)
}

async fn write_report(artifact: &ModelArtifact, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(&artifact.report)?).await?;
    tracing::info!("📝 Metrics report written to {}", path);
    Ok(())
}

async fn run(config: &RiskConfig) -> Result<ModelArtifact> {
    let monitor = SystemMonitor::new(config.monitoring.enabled);

    tracing::info!("📂 Loading modeling table from {}", config.data.modeling_path);
    let path = config.data.modeling_path.clone();
    let rows = tokio::task::spawn_blocking(move || load_modeling_data(path))
        .await
        .map_err(|e| RiskError::processing(format!("loader task failed: {}", e)))??;
    monitor.mark_phase("Load modeling table");

    let train_config = config.clone();
    let artifact = tokio::task::spawn_blocking(move || train_model(&rows, &train_config))
        .await
        .map_err(|e| RiskError::processing(format!("training task failed: {}", e)))??;
    monitor.mark_phase("Train");

    artifact.save(&config.output.model_path).await?;
    write_report(&artifact, &config.output.report_path).await?;
    monitor.mark_phase("Save");

    monitor.log_final_stats();
    Ok(artifact)
}

fn print_summary(artifact: &ModelArtifact, config: &RiskConfig) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
    let report = &artifact.report;

    println!("✅ Model {} trained", artifact.version);
    println!(
        "   Split: train {} / validation {} / test {} (cutoffs {} / {})",
        report.train_rows, report.valid_rows, report.test_rows, report.train_end, report.valid_end
    );
    println!("   Trees: {}", report.trees);
    println!(
        "   Test PR-AUC {} (base rate {:.4}), ROC-AUC {}",
        fmt(report.test.pr_auc),
        report.test.base_rate,
        fmt(report.test.roc_auc)
    );
    println!(
        "   Top 10% captures {} of low reviews and {} of 1-star reviews",
        fmt(report.test.top_decile_capture),
        fmt(report.test.one_star_capture)
    );
    println!("📁 Artifact: {}", config.output.model_path);
    println!("📁 Metrics:  {}", config.output.report_path);
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);
    tracing::info!("🚀 Starting model training");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    match run(&config).await {
        Ok(artifact) => print_summary(&artifact, &config),
        Err(e) => {
            tracing::error!(
                "❌ Training failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    }
}
