use crate::domain::model::RunReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting merge run...");

        // Extract
        tracing::info!("📥 Fetching subscriptions...");
        let fetched = self.pipeline.extract().await?;
        let reachable = fetched.iter().filter(|o| o.is_success()).count();
        tracing::info!("Fetched {} of {} sources", reachable, fetched.len());

        // Transform
        tracing::info!("🔧 Parsing and deduplicating nodes...");
        let transformed = self.pipeline.transform(fetched).await?;
        tracing::info!("Merged {} unique nodes", transformed.catalog.len());

        // Load
        tracing::info!("💾 Writing outputs...");
        let report = self.pipeline.load(transformed).await?;
        tracing::info!("Output saved to: {}", report.artifact_path);

        Ok(report)
    }
}
