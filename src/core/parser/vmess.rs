//! `vmess://base64(json)` links.

use super::host::{normalize_host, parse_port};
use super::{decode_base64_text, default_name, strip_scheme, ParseError};
use crate::domain::model::{Protocol, ProxyNode};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keys lifted into dedicated [`ProxyNode`] fields.
const CORE_KEYS: [&str; 4] = ["add", "port", "id", "ps"];

pub fn parse(link: &str) -> Result<ProxyNode, ParseError> {
    let payload = strip_scheme(link).trim();
    // 少數來源在 base64 後面多接一個 #name，忽略之
    let payload = payload.split('#').next().unwrap_or(payload);
    let json_text = decode_base64_text(payload)?;

    let value: Value =
        serde_json::from_str(&json_text).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidJson("not an object".to_string()))?;

    let host = obj
        .get("add")
        .and_then(scalar_to_string)
        .ok_or(ParseError::MissingField("add"))?;
    let host = normalize_host(&host)?;

    let port = obj
        .get("port")
        .and_then(scalar_to_string)
        .ok_or(ParseError::MissingField("port"))?;
    let port = parse_port(&port)?;

    let identity = obj
        .get("id")
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty())
        .ok_or(ParseError::MissingField("id"))?;

    let name = obj
        .get("ps")
        .and_then(scalar_to_string)
        .unwrap_or_default()
        .trim()
        .to_string();

    let settings: BTreeMap<String, String> = obj
        .iter()
        .filter(|(k, _)| !CORE_KEYS.contains(&k.as_str()))
        .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
        .collect();

    Ok(ProxyNode {
        display_name: default_name(name, &host, port),
        protocol: Protocol::VMess,
        host,
        port,
        identity,
        original_link: link.to_string(),
        settings,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn vmess_link(json: &str) -> String {
        format!("vmess://{}", STANDARD.encode(json))
    }

    #[test]
    fn test_parse_vmess() {
        let link = vmess_link(
            r#"{"v":"2","ps":"HK 01","add":"hk.example.com","port":443,"id":"a3482e88-686a-4a58-8126-99c9df64b7bf","aid":"0","net":"ws","path":"/vm","tls":"tls"}"#,
        );
        let node = parse(&link).unwrap();

        assert_eq!(node.protocol, Protocol::VMess);
        assert_eq!(node.host, "hk.example.com");
        assert_eq!(node.port, 443);
        assert_eq!(node.identity, "a3482e88-686a-4a58-8126-99c9df64b7bf");
        assert_eq!(node.display_name, "HK 01");
        assert_eq!(node.setting("net"), Some("ws"));
        assert_eq!(node.setting("v"), Some("2"));
        assert!(node.setting("add").is_none());
    }

    #[test]
    fn test_port_as_string() {
        let link = vmess_link(r#"{"add":"1.2.3.4","port":"8080","id":"u","ps":""}"#);
        let node = parse(&link).unwrap();

        assert_eq!(node.port, 8080);
        assert_eq!(node.display_name, "1.2.3.4:8080");
    }

    #[test]
    fn test_invalid_json_is_dropped() {
        let link = vmess_link("{this is not json");
        assert!(matches!(parse(&link), Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_invalid_base64_is_dropped() {
        assert_eq!(parse("vmess://%%%%"), Err(ParseError::InvalidBase64));
    }

    #[test]
    fn test_missing_id_is_dropped() {
        let link = vmess_link(r#"{"add":"1.2.3.4","port":443}"#);
        assert_eq!(parse(&link), Err(ParseError::MissingField("id")));
    }
}
