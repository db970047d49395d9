use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 訂閱來源種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Subscription,
    RawText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSource {
    pub id: u32,
    pub remarks: String,
    pub urls: Vec<String>,
    pub kind: SourceKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Base64,
    Yaml,
    PlainText,
}

/// 單一 URL 抓回來的原始內容
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source_id: u32,
    pub url: String,
    pub body: String,
    pub content_kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailureReason {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("source has no URL")]
    NoUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub source_id: u32,
    pub url: String,
    pub reason: FetchFailureReason,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ID {:02}] {}: {}", self.source_id, self.url, self.reason)
    }
}

/// 一個來源的抓取結果；每個 mirror 各自成功或失敗
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: SubscriptionSource,
    pub payloads: Vec<RawPayload>,
    pub failures: Vec<FetchFailure>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        !self.payloads.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    VMess,
    VLess,
    Trojan,
    Shadowsocks,
    ShadowsocksR,
    Hysteria2,
    /// Links we carry through without a dedicated parser; the scheme is kept verbatim.
    Other(String),
}

impl Protocol {
    pub fn tag(&self) -> &str {
        match self {
            Protocol::VMess => "vmess",
            Protocol::VLess => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "ss",
            Protocol::ShadowsocksR => "ssr",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::Other(scheme) => scheme,
        }
    }

    /// Whether the identity field is stable enough to be part of the fingerprint.
    pub fn has_reliable_identity(&self) -> bool {
        !matches!(self, Protocol::Other(_))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyNode {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub identity: String,
    pub display_name: String,
    pub original_link: String,
    /// Protocol specific extras (query parameters, vmess fields, ss method...).
    pub settings: BTreeMap<String, String>,
}

impl ProxyNode {
    pub fn fingerprint(&self) -> Fingerprint {
        let mut key = format!("{}:{}:{}", self.protocol.tag(), self.host, self.port);
        if self.protocol.has_reliable_identity() && !self.identity.is_empty() {
            key.push(':');
            key.push_str(&self.identity);
        }
        Fingerprint(key)
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 去重後、依名稱排序的最終節點集合
#[derive(Debug, Clone, Default)]
pub struct MergedCatalog {
    nodes: Vec<ProxyNode>,
}

impl MergedCatalog {
    pub fn from_unique(mut nodes: Vec<ProxyNode>) -> Self {
        nodes.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.original_link.cmp(&b.original_link))
        });
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ProxyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: u32,
    pub remarks: String,
    pub candidates: usize,
    pub nodes: usize,
    pub errors: Vec<String>,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.nodes > 0
    }
}

/// 整次合併的統計，失敗時也會輸出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub sources: Vec<SourceReport>,
    pub candidates: usize,
    pub parsed: usize,
    pub rejected: usize,
    pub duplicates_removed: usize,
    pub unique_nodes: usize,
}

impl MergeSummary {
    pub fn sources_attempted(&self) -> usize {
        self.sources.len()
    }

    pub fn sources_succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.succeeded()).count()
    }

    pub fn sources_failed(&self) -> usize {
        self.sources_attempted() - self.sources_succeeded()
    }

    pub fn log(&self) {
        tracing::info!(
            "📊 Sources: {} attempted, {} succeeded, {} failed",
            self.sources_attempted(),
            self.sources_succeeded(),
            self.sources_failed()
        );
        for source in self.sources.iter().filter(|s| !s.succeeded()) {
            tracing::warn!(
                "   [ID {:02}] {} contributed no node: {}",
                source.source_id,
                source.remarks,
                if source.errors.is_empty() {
                    "no parsable link".to_string()
                } else {
                    source.errors.join("; ")
                }
            );
        }
        tracing::info!(
            "📊 Nodes: {} candidates, {} parsed, {} rejected, {} duplicates removed, {} unique",
            self.candidates,
            self.parsed,
            self.rejected,
            self.duplicates_removed,
            self.unique_nodes
        );
    }
}

/// Result of the transform stage, handed to load.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub catalog: MergedCatalog,
    pub summary: MergeSummary,
}

/// Result of one full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub artifact_path: String,
    pub extra_artifacts: Vec<String>,
    pub summary: MergeSummary,
}
