use crate::core::catalog::SourceCatalog;
use crate::core::dedup::Deduplicator;
use crate::core::encoder::CatalogEncoder;
use crate::core::fetcher::Fetcher;
use crate::core::normalizer::ContentNormalizer;
use crate::core::parser::{is_known_scheme, parse_link};
use crate::domain::model::{
    FetchOutcome, MergeSummary, MergedCatalog, ProxyNode, RunReport, SourceReport,
    TransformResult,
};
use crate::domain::ports::{Converter, FilterRules, Pipeline, ReportSink, Storage};
use crate::utils::error::{MergeError, Result};
use std::sync::Arc;

/// Optional post-processing through an external converter.
#[derive(Clone)]
pub struct ConversionStep {
    pub converter: Arc<dyn Converter>,
    pub targets: Vec<String>,
    pub rules: FilterRules,
}

/// fetch → normalize/parse/dedup → encode/write/convert/report
pub struct MergePipeline<S: Storage> {
    storage: S,
    catalog: SourceCatalog,
    fetcher: Fetcher,
    artifact_name: String,
    conversion: Option<ConversionStep>,
    report: Option<Arc<dyn ReportSink>>,
}

impl<S: Storage> MergePipeline<S> {
    pub fn new(storage: S, catalog: SourceCatalog, fetcher: Fetcher, artifact_name: String) -> Self {
        Self {
            storage,
            catalog,
            fetcher,
            artifact_name,
            conversion: None,
            report: None,
        }
    }

    pub fn with_conversion(mut self, conversion: ConversionStep) -> Self {
        self.conversion = Some(conversion);
        self
    }

    pub fn with_report(mut self, report: Arc<dyn ReportSink>) -> Self {
        self.report = Some(report);
        self
    }

    /// Normalize and parse one source's payloads, in payload then line order.
    fn collect_source(outcome: FetchOutcome, summary: &mut MergeSummary) -> Vec<ProxyNode> {
        let mut report = SourceReport {
            source_id: outcome.source.id,
            remarks: outcome.source.remarks.clone(),
            candidates: 0,
            nodes: 0,
            errors: outcome.failures.iter().map(|f| f.reason.to_string()).collect(),
        };
        let mut nodes = Vec::new();

        for payload in &outcome.payloads {
            let normalized = match ContentNormalizer::normalize(payload) {
                Ok(normalized) => normalized,
                Err(e) => {
                    tracing::warn!("[ID {:02}] {}: {}", payload.source_id, payload.url, e);
                    report.errors.push(e.to_string());
                    continue;
                }
            };

            report.candidates += normalized.candidates.len() + normalized.dropped_entries;
            summary.rejected += normalized.dropped_entries;

            for candidate in &normalized.candidates {
                if !is_known_scheme(candidate) {
                    tracing::trace!("[ID {:02}] skipped non-link line", payload.source_id);
                    summary.rejected += 1;
                    continue;
                }
                match parse_link(candidate) {
                    Ok(node) => nodes.push(node),
                    Err(e) => {
                        tracing::debug!("[ID {:02}] rejected {:.60}: {}", payload.source_id, candidate, e);
                        summary.rejected += 1;
                    }
                }
            }
        }

        report.nodes = nodes.len();
        if report.succeeded() {
            tracing::info!(
                "✅ [ID {:02}] {}: {} nodes from {} candidates",
                report.source_id,
                report.remarks,
                report.nodes,
                report.candidates
            );
        }
        summary.candidates += report.candidates;
        summary.parsed += report.nodes;
        summary.sources.push(report);
        nodes
    }

    async fn run_conversion(&self, catalog: &MergedCatalog) -> Vec<String> {
        let Some(step) = &self.conversion else {
            return Vec::new();
        };

        let plain = CatalogEncoder::encode_plain(catalog);
        let mut written = Vec::new();
        for target in &step.targets {
            let converted = match step.converter.convert(&plain, target, &step.rules).await {
                Ok(converted) => converted,
                Err(e) => {
                    tracing::warn!("⚠️ Conversion to {} skipped: {}", target, e);
                    continue;
                }
            };

            let name = format!("sub_merge_{}.txt", target);
            match self.storage.write_file(&name, converted.as_bytes()).await {
                Ok(()) => {
                    let location = self.storage.location(&name);
                    tracing::info!("📁 {} output saved to: {}", target, location);
                    written.push(location);
                }
                Err(e) => tracing::warn!("⚠️ Could not write {}: {}", name, e),
            }
        }
        written
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for MergePipeline<S> {
    async fn extract(&self) -> Result<Vec<FetchOutcome>> {
        Ok(self.fetcher.fetch_all(&self.catalog).await)
    }

    async fn transform(&self, fetched: Vec<FetchOutcome>) -> Result<TransformResult> {
        let mut summary = MergeSummary::default();
        let mut nodes = Vec::new();

        for outcome in fetched {
            nodes.extend(Self::collect_source(outcome, &mut summary));
        }

        let deduped = Deduplicator::dedup(nodes);
        summary.duplicates_removed = deduped.removed;
        summary.unique_nodes = deduped.nodes.len();
        summary.log();

        if deduped.nodes.is_empty() {
            return Err(MergeError::EmptyCatalog {
                attempted: summary.sources_attempted(),
                failed: summary.sources_failed(),
            });
        }

        Ok(TransformResult {
            catalog: MergedCatalog::from_unique(deduped.nodes),
            summary,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<RunReport> {
        let body = CatalogEncoder::encode(&result.catalog);
        self.storage
            .write_file(&self.artifact_name, body.as_bytes())
            .await?;
        let artifact_path = self.storage.location(&self.artifact_name);

        let extra_artifacts = self.run_conversion(&result.catalog).await;

        if let Some(report) = &self.report {
            if let Err(e) = report.record_node_count(result.catalog.len()).await {
                tracing::warn!("⚠️ {}", e.user_friendly_message());
            }
        }

        Ok(RunReport {
            artifact_path,
            extra_artifacts,
            summary: result.summary,
        })
    }
}
