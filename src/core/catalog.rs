use crate::domain::model::{SourceKind, SubscriptionSource};
use crate::utils::error::{MergeError, Result};
use crate::utils::validation::validate_url;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SourceType {
    Subscription,
    RawTextUrl,
}

/// sub_list.json 的一筆紀錄；其他欄位（例如 update_method）直接忽略
#[derive(Debug, Deserialize)]
struct SourceRecord {
    id: u32,
    #[serde(default)]
    remarks: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "type")]
    source_type: Option<SourceType>,
    #[serde(default)]
    enabled: bool,
}

/// Ordered list of enabled subscription sources.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: Vec<SubscriptionSource>,
}

impl SourceCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| MergeError::SourceListError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let records: Vec<SourceRecord> =
            serde_json::from_str(content).map_err(|e| MergeError::SourceListError {
                message: format!("invalid source list JSON: {}", e),
            })?;

        let mut seen_ids = HashSet::new();
        let mut sources = Vec::new();

        for record in records {
            if !seen_ids.insert(record.id) {
                return Err(MergeError::SourceListError {
                    message: format!("duplicate source id {}", record.id),
                });
            }
            if !record.enabled {
                continue;
            }

            let urls: Vec<String> = record
                .url
                .split('|')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .filter(|u| match validate_url("url", u) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("⚠️  [ID {:02}] skipping mirror: {}", record.id, e);
                        false
                    }
                })
                .map(String::from)
                .collect();

            if urls.is_empty() {
                tracing::warn!(
                    "⚠️  [ID {:02}] {} is enabled but has no usable URL, skipped",
                    record.id,
                    record.remarks
                );
                continue;
            }

            let kind = match record.source_type {
                Some(SourceType::RawTextUrl) => SourceKind::RawText,
                Some(SourceType::Subscription) | None => SourceKind::Subscription,
            };

            sources.push(SubscriptionSource {
                id: record.id,
                remarks: record.remarks,
                urls,
                kind,
                enabled: true,
            });
        }

        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[SubscriptionSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl From<Vec<SubscriptionSource>> for SourceCatalog {
    fn from(sources: Vec<SubscriptionSource>) -> Self {
        Self {
            sources: sources.into_iter().filter(|s| s.enabled).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_list_keeps_order_and_enabled_only() {
        let json = r#"[
            {"id": 3, "remarks": "third", "url": "https://c.example.com/sub", "type": "subscription", "enabled": true},
            {"id": 1, "remarks": "disabled", "url": "https://a.example.com/sub", "type": "subscription", "enabled": false},
            {"id": 2, "remarks": "raw", "url": "https://b.example.com/raw.txt", "type": "raw_text_url", "enabled": true, "update_method": "auto"}
        ]"#;

        let catalog = SourceCatalog::from_json_str(json).unwrap();
        let ids: Vec<u32> = catalog.sources().iter().map(|s| s.id).collect();

        assert_eq!(ids, vec![3, 2]);
        assert_eq!(catalog.sources()[0].kind, SourceKind::Subscription);
        assert_eq!(catalog.sources()[1].kind, SourceKind::RawText);
    }

    #[test]
    fn test_pipe_delimited_mirrors() {
        let json = r#"[{"id": 7, "remarks": "mirrors", "url": "https://a.example.com/s | https://b.example.com/s||", "enabled": true}]"#;

        let catalog = SourceCatalog::from_json_str(json).unwrap();

        assert_eq!(
            catalog.sources()[0].urls,
            vec!["https://a.example.com/s", "https://b.example.com/s"]
        );
    }

    #[test]
    fn test_invalid_mirror_is_dropped() {
        let json = r#"[{"id": 1, "remarks": "x", "url": "not a url|https://ok.example.com/s", "enabled": true}]"#;

        let catalog = SourceCatalog::from_json_str(json).unwrap();

        assert_eq!(catalog.sources()[0].urls, vec!["https://ok.example.com/s"]);
    }

    #[test]
    fn test_source_without_url_is_skipped() {
        let json = r#"[{"id": 1, "remarks": "empty", "url": "", "enabled": true}]"#;

        let catalog = SourceCatalog::from_json_str(json).unwrap();

        assert!(catalog.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"[
            {"id": 1, "remarks": "a", "url": "https://a.example.com", "enabled": true},
            {"id": 1, "remarks": "b", "url": "https://b.example.com", "enabled": true}
        ]"#;

        assert!(matches!(
            SourceCatalog::from_json_str(json),
            Err(MergeError::SourceListError { .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            SourceCatalog::from_json_str("{not json"),
            Err(MergeError::SourceListError { .. })
        ));
    }
}
