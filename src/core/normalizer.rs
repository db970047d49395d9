use crate::core::encoder::CatalogEncoder;
use crate::core::parser::clash::node_from_clash;
use crate::core::parser::decode_base64_lenient;
use crate::domain::model::{ContentKind, RawPayload, SourceKind};
use serde::Deserialize;
use thiserror::Error;

/// Minimum share of printable characters for a base64 decode to count as text.
const PRINTABLE_RATIO: f64 = 0.9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed YAML: {0}")]
    MalformedYaml(String),
}

/// Candidate links extracted from one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub candidates: Vec<String>,
    /// YAML entries that could not be bridged to a link.
    pub dropped_entries: usize,
}

#[derive(Debug, Deserialize)]
struct ClashDocument {
    #[serde(default)]
    proxies: Option<Vec<serde_yaml::Value>>,
}

pub struct ContentNormalizer;

impl ContentNormalizer {
    /// Sniff the payload format. `RawText` sources are never base64-decoded.
    pub fn detect(body: &str, source_kind: SourceKind) -> ContentKind {
        if source_kind == SourceKind::Subscription {
            if let Some(decoded) = decode_base64_body(body) {
                return if looks_like_yaml(&decoded) {
                    ContentKind::Yaml
                } else {
                    ContentKind::Base64
                };
            }
        }
        if looks_like_yaml(body) {
            ContentKind::Yaml
        } else {
            ContentKind::PlainText
        }
    }

    pub fn normalize(payload: &RawPayload) -> Result<Normalized, NormalizeError> {
        // Yaml 可能是 base64 包起來的，先試著解開
        let text = match payload.content_kind {
            ContentKind::Base64 | ContentKind::Yaml => {
                decode_base64_body(&payload.body).unwrap_or_else(|| payload.body.clone())
            }
            ContentKind::PlainText => payload.body.clone(),
        };

        match payload.content_kind {
            ContentKind::Yaml => Self::normalize_yaml(&text),
            ContentKind::Base64 | ContentKind::PlainText => Ok(Normalized {
                candidates: split_lines(&text),
                dropped_entries: 0,
            }),
        }
    }

    fn normalize_yaml(text: &str) -> Result<Normalized, NormalizeError> {
        let doc: ClashDocument =
            serde_yaml::from_str(text).map_err(|e| NormalizeError::MalformedYaml(e.to_string()))?;

        let mut normalized = Normalized::default();
        for entry in doc.proxies.iter().flatten() {
            match node_from_clash(entry) {
                Ok(node) => normalized
                    .candidates
                    .push(CatalogEncoder::render_link(&node)),
                Err(e) => {
                    tracing::debug!("Dropping YAML proxy entry: {}", e);
                    normalized.dropped_entries += 1;
                }
            }
        }
        Ok(normalized)
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn looks_like_yaml(text: &str) -> bool {
    text.lines()
        .any(|line| line.starts_with("proxies:") || line.starts_with("proxy-groups:"))
}

/// Whole-body base64 test: restricted charset, sane length, and a mostly printable
/// UTF-8 result.
fn decode_base64_body(body: &str) -> Option<String> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty()
        || !compact
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return None;
    }

    let bytes = decode_base64_lenient(&compact)?;
    let text = String::from_utf8(bytes).ok()?;

    let total = text.chars().count();
    if total == 0 {
        return None;
    }
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .count();
    if (printable as f64) / (total as f64) < PRINTABLE_RATIO {
        return None;
    }
    Some(text)
}
