pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod features;
pub mod model;
#[cfg(feature = "server")]
pub mod server;
pub mod utils;

pub use adapters::storage::{DataSource, LocalStorage, ZipStorage};
#[cfg(feature = "cli")]
pub use config::LoaderConfig;
pub use config::RiskConfig;
pub use crate::core::{etl::EtlEngine, pipeline::ModelingPipeline};
pub use domain::model::ModelingRow;
pub use model::{train_model, ModelArtifact};
pub use utils::error::{Result, RiskError};
