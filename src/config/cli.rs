use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "sub-merge")]
#[command(about = "Fetch proxy subscriptions, merge and deduplicate their nodes")]
#[command(version)]
pub struct CliArgs {
    /// TOML configuration file
    #[arg(short, long, default_value = "sub-merge.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// 只列出會被抓取的來源，不發出任何請求
    #[arg(long)]
    pub dry_run: bool,

    /// Override `fetch.concurrency` from the config file
    #[arg(long)]
    pub concurrency: Option<usize>,
}
