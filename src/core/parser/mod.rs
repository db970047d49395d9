//! Proxy link parsing.
//!
//! Every supported scheme is registered once in [`SCHEMES`] together with the function that
//! parses it. [`parse_link`] picks the entry by prefix; adding a protocol means adding a
//! [`Protocol`](crate::domain::model::Protocol) variant and one table row.

pub mod clash;
pub mod host;
pub mod shadowsocks;
pub mod uri;
pub mod vmess;

use crate::domain::model::ProxyNode;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown link scheme")]
    UnknownScheme,
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("invalid vmess JSON: {0}")]
    InvalidJson(String),
    #[error("malformed address '{0}'")]
    MalformedAddress(String),
    #[error("legacy shadowsocks blob does not split into method:password:host:port")]
    LegacyShadowsocksShape,
    #[error("unsupported proxy type '{0}'")]
    UnsupportedType(String),
}

type ParseFn = fn(&str) -> Result<ProxyNode, ParseError>;

struct SchemeEntry {
    prefix: &'static str,
    parse: ParseFn,
}

static SCHEMES: &[SchemeEntry] = &[
    SchemeEntry { prefix: "vmess://", parse: vmess::parse },
    SchemeEntry { prefix: "vless://", parse: uri::parse_vless },
    SchemeEntry { prefix: "trojan://", parse: uri::parse_trojan },
    SchemeEntry { prefix: "ss://", parse: shadowsocks::parse_ss },
    SchemeEntry { prefix: "ssr://", parse: shadowsocks::parse_ssr },
    SchemeEntry { prefix: "hysteria2://", parse: uri::parse_hysteria2 },
    SchemeEntry { prefix: "hy2://", parse: uri::parse_hysteria2 },
    SchemeEntry { prefix: "socks://", parse: uri::parse_other },
    SchemeEntry { prefix: "socks5://", parse: uri::parse_other },
    SchemeEntry { prefix: "tuic://", parse: uri::parse_other },
    SchemeEntry { prefix: "anytls://", parse: uri::parse_other },
];

/// Parse one candidate line into a node. Scheme matching is case-insensitive.
pub fn parse_link(candidate: &str) -> Result<ProxyNode, ParseError> {
    let link = candidate.trim();
    let entry = SCHEMES
        .iter()
        .find(|e| {
            link.len() >= e.prefix.len()
                && link.as_bytes()[..e.prefix.len()].eq_ignore_ascii_case(e.prefix.as_bytes())
        })
        .ok_or(ParseError::UnknownScheme)?;
    (entry.parse)(link)
}

pub fn is_known_scheme(candidate: &str) -> bool {
    let link = candidate.trim_start();
    SCHEMES.iter().any(|e| {
        link.len() >= e.prefix.len()
            && link.as_bytes()[..e.prefix.len()].eq_ignore_ascii_case(e.prefix.as_bytes())
    })
}

/// Split `scheme://rest` and return `rest`.
pub(crate) fn strip_scheme(link: &str) -> &str {
    link.split_once("://").map(|(_, rest)| rest).unwrap_or(link)
}

/// Decode standard or URL-safe base64, with or without padding and embedded whitespace.
pub fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    let mut cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let trimmed_len = cleaned.trim_end_matches('=').len();
    cleaned.truncate(trimmed_len);
    if cleaned.is_empty() || cleaned.len() % 4 == 1 {
        return None;
    }
    let padding = (4 - cleaned.len() % 4) % 4;
    cleaned.extend(std::iter::repeat('=').take(padding));

    if cleaned.contains('-') || cleaned.contains('_') {
        URL_SAFE.decode(cleaned.as_bytes()).ok()
    } else {
        STANDARD.decode(cleaned.as_bytes()).ok()
    }
}

pub(crate) fn decode_base64_text(input: &str) -> Result<String, ParseError> {
    let bytes = decode_base64_lenient(input).ok_or(ParseError::InvalidBase64)?;
    String::from_utf8(bytes).map_err(|_| ParseError::InvalidBase64)
}

pub(crate) fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Split a `#fragment` off and percent-decode it.
pub(crate) fn split_fragment(link: &str) -> (&str, String) {
    match link.split_once('#') {
        Some((main, name)) => (main, percent_decode(name).trim().to_string()),
        None => (link, String::new()),
    }
}

pub(crate) fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

pub(crate) fn default_name(name: String, host: &str, port: u16) -> String {
    if name.is_empty() {
        format!("{}:{}", host::format_host(host), port)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Protocol;

    #[test]
    fn test_dispatch_by_prefix() {
        let node = parse_link("  trojan://pw@example.com:443#T  ").unwrap();
        assert_eq!(node.protocol, Protocol::Trojan);

        let node = parse_link("HY2://pw@example.com:443#H").unwrap();
        assert_eq!(node.protocol, Protocol::Hysteria2);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert_eq!(
            parse_link("https://example.com/not-a-node"),
            Err(ParseError::UnknownScheme)
        );
        assert_eq!(parse_link(""), Err(ParseError::UnknownScheme));
        assert!(!is_known_scheme("# comment line"));
    }

    #[test]
    fn test_decode_base64_lenient_variants() {
        // "aes-128-gcm:pa?ss" has '?' which encodes differently in the url-safe alphabet
        assert_eq!(
            decode_base64_lenient("YWVzLTEyOC1nY206cGE/c3M=").unwrap(),
            b"aes-128-gcm:pa?ss"
        );
        assert_eq!(
            decode_base64_lenient("YWVzLTEyOC1nY206cGE_c3M").unwrap(),
            b"aes-128-gcm:pa?ss"
        );
        assert_eq!(decode_base64_lenient("aGVs\nbG8").unwrap(), b"hello");
        assert!(decode_base64_lenient("a").is_none());
        assert!(decode_base64_lenient("!!!!").is_none());
    }

    #[test]
    fn test_parse_query_decodes_values() {
        let q = parse_query("type=ws&path=%2Fray&security=tls&flag");
        assert_eq!(q.get("path").map(String::as_str), Some("/ray"));
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.len(), 4);
    }
}
