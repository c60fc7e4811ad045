#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::LoaderConfig;
pub use toml_config::RiskConfig;
