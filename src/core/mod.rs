pub mod etl;
pub mod join;
pub mod loader;
pub mod pipeline;

pub use crate::domain::model::{ModelingRow, RawTables, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
