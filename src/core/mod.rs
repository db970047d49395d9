pub mod catalog;
pub mod dedup;
pub mod encoder;
pub mod etl;
pub mod fetcher;
pub mod normalizer;
pub mod parser;
pub mod pipeline;

pub use crate::domain::model::{MergedCatalog, ProxyNode, RunReport, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
