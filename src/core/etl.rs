use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process...");

        // Extract
        let tables = self.pipeline.extract().await?;
        tracing::info!("Extracted {} orders", tables.orders.len());
        self.monitor.mark_phase("Extract");

        // Transform
        let result = self.pipeline.transform(tables).await?;
        tracing::info!("Joined {} modeling rows", result.rows.len());
        self.monitor.mark_phase("Transform");

        // Load
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.mark_phase("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
