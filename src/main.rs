use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use sub_merge::utils::error::{ErrorSeverity, MergeError};
use sub_merge::utils::{logger, validation::Validate};
use sub_merge::{
    CliArgs, ConversionStep, EtlEngine, Fetcher, LocalStorage, MergeConfig, MergePipeline,
    ReadmeReport, SourceCatalog, SubconverterCli,
};

fn load_config(args: &CliArgs) -> sub_merge::Result<MergeConfig> {
    let mut config = MergeConfig::from_file(&args.config)?;
    if let Some(concurrency) = args.concurrency {
        config.fetch.concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

fn build_pipeline(
    config: &MergeConfig,
    catalog: SourceCatalog,
) -> anyhow::Result<MergePipeline<LocalStorage>> {
    let fetcher = Fetcher::new(config.fetch_settings()).context("building HTTP client")?;
    let storage = LocalStorage::new(config.output.dir.clone());
    let mut pipeline =
        MergePipeline::new(storage, catalog, fetcher, config.output.artifact_name.clone());

    if config.converter.enabled {
        let converter = SubconverterCli::new(
            config.converter.executable.clone(),
            Duration::from_secs(config.converter.timeout_seconds),
        );
        pipeline = pipeline.with_conversion(ConversionStep {
            converter: Arc::new(converter),
            targets: config.converter.targets.clone(),
            rules: config.filter_rules(),
        });
    }

    if let Some(report) = &config.report {
        pipeline = pipeline.with_report(Arc::new(ReadmeReport::new(
            report.readme_file.clone(),
            report.marker.clone(),
            report.label.clone(),
        )));
    }

    Ok(pipeline)
}

fn exit_with(e: &MergeError, code: i32) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting sub-merge CLI");
    tracing::debug!("CLI args: {:?}", args);

    // 設定檔或來源清單有誤時，在任何請求之前就結束
    let config = load_config(&args).unwrap_or_else(|e| exit_with(&e, 1));
    let catalog =
        SourceCatalog::from_file(&config.sources.list_file).unwrap_or_else(|e| exit_with(&e, 1));
    tracing::info!(
        "📋 {} enabled sources from {}",
        catalog.len(),
        config.sources.list_file
    );

    if args.dry_run {
        for source in catalog.sources() {
            println!(
                "[ID {:02}] {} ({:?}): {}",
                source.id,
                source.remarks,
                source.kind,
                source.urls.join(" | ")
            );
        }
        return Ok(());
    }

    let engine = EtlEngine::new(build_pipeline(&config, catalog)?);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ Merge completed successfully!");
            println!("✅ Merged {} nodes", report.summary.unique_nodes);
            println!("📁 Output saved to: {}", report.artifact_path);
            for extra in &report.extra_artifacts {
                println!("📁 Converted output: {}", extra);
            }
        }
        Err(e) => {
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                exit_with(&e, exit_code);
            }
            tracing::warn!("⚠️ {}", e.user_friendly_message());
        }
    }

    Ok(())
}
