use clap::Parser;
use review_risk::utils::{logger, validation::Validate};
use review_risk::{DataSource, EtlEngine, LoaderConfig, ModelingPipeline, RiskError};

fn report_failure(stage: &str, e: &RiskError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        stage,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    std::process::exit(e.exit_code().max(1));
}

#[tokio::main]
async fn main() {
    let config = LoaderConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting data_loader");
    tracing::debug!("Loader config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        report_failure("Configuration validation", &e);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let source = match DataSource::from_config(&config) {
        Ok(source) => source,
        Err(e) => report_failure("Opening data source", &e),
    };
    let pipeline = ModelingPipeline::new(source, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Modeling table written");
            println!("✅ Modeling table saved to: {}", output_path);
        }
        Err(e) => report_failure("Data loading", &e),
    }
}
