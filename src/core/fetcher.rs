use crate::core::catalog::SourceCatalog;
use crate::core::normalizer::ContentNormalizer;
use crate::domain::model::{
    FetchFailure, FetchFailureReason, FetchOutcome, RawPayload, SubscriptionSource,
};
use crate::utils::error::Result;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout: Duration::from_secs(15),
            retry_attempts: 1,
            retry_delay: Duration::from_secs(2),
            user_agent: format!("sub-merge/{}", env!("CARGO_PKG_VERSION")),
            cache_dir: None,
        }
    }
}

/// Bounded fan-out of subscription downloads.
///
/// Each source runs in its own task behind a semaphore; outcomes come back over a
/// channel and are put back into catalog order before being returned.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, settings })
    }

    pub async fn fetch_all(&self, catalog: &SourceCatalog) -> Vec<FetchOutcome> {
        let sources = catalog.sources();
        let workers = self.settings.concurrency.max(1);
        info!(
            "🚀 Fetching {} sources with {} workers (timeout {:?})",
            sources.len(),
            workers,
            self.settings.timeout
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel::<(usize, FetchOutcome)>(sources.len().max(1));

        for (index, source) in sources.iter().cloned().enumerate() {
            let fetcher = self.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = fetcher.fetch_source(source).await;
                if tx.send((index, outcome)).await.is_err() {
                    debug!("Result channel closed before source #{} reported", index);
                }
            });
        }
        drop(tx);

        // fan-in：只在這裡彙整結果，之後依 catalog 順序排列
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; sources.len()];
        while let Some((index, outcome)) = rx.recv().await {
            slots[index] = Some(outcome);
        }

        sources
            .iter()
            .zip(slots)
            .map(|(source, slot)| {
                slot.unwrap_or_else(|| FetchOutcome {
                    source: source.clone(),
                    payloads: Vec::new(),
                    failures: vec![FetchFailure {
                        source_id: source.id,
                        url: source.urls.join("|"),
                        reason: FetchFailureReason::Transport("fetch task aborted".to_string()),
                    }],
                })
            })
            .collect()
    }

    pub async fn fetch_source(&self, source: SubscriptionSource) -> FetchOutcome {
        info!("📥 [ID {:02}] Fetching {}", source.id, source.remarks);

        let mut payloads = Vec::new();
        let mut failures = Vec::new();

        if source.urls.is_empty() {
            failures.push(FetchFailure {
                source_id: source.id,
                url: String::new(),
                reason: FetchFailureReason::NoUrl,
            });
        }

        for (mirror, url) in source.urls.iter().enumerate() {
            match self.fetch_url(url).await {
                Ok(body) => {
                    debug!("[ID {:02}] {} returned {} bytes", source.id, url, body.len());
                    self.write_cache(source.id, mirror, &body).await;
                    payloads.push(RawPayload {
                        source_id: source.id,
                        url: url.clone(),
                        content_kind: ContentNormalizer::detect(&body, source.kind),
                        body,
                    });
                }
                Err(reason) => {
                    let failure = FetchFailure {
                        source_id: source.id,
                        url: url.clone(),
                        reason,
                    };
                    warn!("❌ {}", failure);
                    failures.push(failure);
                }
            }
        }

        FetchOutcome {
            source,
            payloads,
            failures,
        }
    }

    async fn fetch_url(&self, url: &str) -> std::result::Result<String, FetchFailureReason> {
        let attempts = self.settings.retry_attempts + 1;
        let mut attempt = 1;
        loop {
            match self.try_fetch(url).await {
                Ok(body) => return Ok(body),
                Err(reason) if attempt < attempts && is_retryable(&reason) => {
                    debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt, attempts, url, reason, self.settings.retry_delay
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(reason) => return Err(reason),
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<String, FetchFailureReason> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailureReason::Status(status.as_u16()));
        }
        response.text().await.map_err(classify)
    }

    async fn write_cache(&self, source_id: u32, mirror: usize, body: &str) {
        let Some(dir) = &self.settings.cache_dir else {
            return;
        };
        let file_name = if mirror == 0 {
            format!("{:02}.txt", source_id)
        } else {
            format!("{:02}_{}.txt", source_id, mirror)
        };
        let path = dir.join(file_name);

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;
        if let Err(e) = result {
            warn!("Could not write cache file {}: {}", path.display(), e);
        }
    }
}

fn classify(error: reqwest::Error) -> FetchFailureReason {
    if error.is_timeout() {
        FetchFailureReason::Timeout
    } else {
        FetchFailureReason::Transport(error.to_string())
    }
}

fn is_retryable(reason: &FetchFailureReason) -> bool {
    match reason {
        FetchFailureReason::Timeout | FetchFailureReason::Transport(_) => true,
        FetchFailureReason::Status(code) => *code >= 500 || *code == 408 || *code == 429,
        FetchFailureReason::NoUrl => false,
    }
}
