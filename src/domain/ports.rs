use crate::domain::model::{RawTables, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read access to the raw dataset files, addressed by file name.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    fn describe(&self) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn modeling_path(&self) -> &str;
    fn validate_enabled(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawTables>;
    async fn transform(&self, tables: RawTables) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
