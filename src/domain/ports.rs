use crate::domain::model::{FetchOutcome, RunReport, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn location(&self, path: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<FetchOutcome>>;
    async fn transform(&self, fetched: Vec<FetchOutcome>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<RunReport>;
}

/// include/exclude/rename 規則，原樣交給外部轉換器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRules {
    pub include: String,
    pub exclude: String,
    pub rename: String,
    pub config: String,
}

/// External post-processor that turns a link list into another target format.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, input: &str, target: &str, rules: &FilterRules) -> Result<String>;
}

/// Receives the final node count after a successful merge.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn record_node_count(&self, count: usize) -> Result<()>;
}
