use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Settings of the `data_loader` binary. Both paths can come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "data_loader")]
#[command(about = "Join the Olist CSV tables into a modeling table with the low-review target")]
pub struct LoaderConfig {
    /// Directory (or .zip archive) with the Olist CSV files
    #[arg(long, env = "OLIST_DATA_DIR", default_value = "data")]
    pub data_dir: String,

    /// Output file for the modeling table (.csv or .json)
    #[arg(long = "output", env = "OLIST_MODELING_PATH", default_value = "data/modeling.csv")]
    pub modeling_path: String,

    /// Skip the row count and missing value report
    #[arg(long)]
    pub no_validate: bool,

    /// Log CPU and memory usage per phase
    #[arg(long)]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for LoaderConfig {
    fn data_dir(&self) -> &str {
        &self.data_dir
    }

    fn modeling_path(&self) -> &str {
        &self.modeling_path
    }

    fn validate_enabled(&self) -> bool {
        !self.no_validate
    }
}

impl Validate for LoaderConfig {
    fn validate(&self) -> Result<()> {
        validate_path("data_dir", &self.data_dir)?;
        validate_path("output", &self.modeling_path)?;
        validate_file_extension("output", &self.modeling_path, &["csv", "json"])?;
        Ok(())
    }
}
