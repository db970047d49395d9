pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{LocalStorage, ReadmeReport, SubconverterCli};
#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::MergeConfig;
pub use core::{
    catalog::SourceCatalog,
    etl::EtlEngine,
    fetcher::{FetchSettings, Fetcher},
    pipeline::{ConversionStep, MergePipeline},
};
pub use utils::error::{MergeError, Result};
