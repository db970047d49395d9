//! Bridge from Clash-style YAML proxy dictionaries to [`ProxyNode`].
//!
//! The resulting node is rendered to its canonical link by the encoder, so YAML sources
//! flow through the same parse/dedup path as link lists.

use super::host::{normalize_host, parse_port};
use super::{default_name, ParseError};
use crate::domain::model::{Protocol, ProxyNode};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

pub fn node_from_clash(entry: &Value) -> Result<ProxyNode, ParseError> {
    let map = entry
        .as_mapping()
        .ok_or_else(|| ParseError::UnsupportedType("non-mapping entry".to_string()))?;

    let kind = get_str(map, "type")
        .ok_or(ParseError::MissingField("type"))?
        .to_ascii_lowercase();
    let host = normalize_host(&get_str(map, "server").ok_or(ParseError::MissingField("server"))?)?;
    let port = parse_port(&get_str(map, "port").ok_or(ParseError::MissingField("port"))?)?;
    let name = default_name(get_str(map, "name").unwrap_or_default(), &host, port);

    let mut settings = BTreeMap::new();
    let (protocol, identity) = match kind.as_str() {
        "vmess" => {
            let uuid = require(map, "uuid")?;
            settings.insert("v".to_string(), "2".to_string());
            settings.insert(
                "aid".to_string(),
                get_str(map, "alterId").unwrap_or_else(|| "0".to_string()),
            );
            settings.insert(
                "scy".to_string(),
                get_str(map, "cipher").unwrap_or_else(|| "auto".to_string()),
            );
            settings.insert(
                "net".to_string(),
                get_str(map, "network").unwrap_or_else(|| "tcp".to_string()),
            );
            settings.insert("type".to_string(), "none".to_string());
            if get_bool(map, "tls") {
                settings.insert("tls".to_string(), "tls".to_string());
            }
            insert_opt(&mut settings, "sni", server_name(map));
            insert_opt(&mut settings, "path", ws_path(map).or_else(|| grpc_service(map)));
            insert_opt(&mut settings, "host", ws_host(map));
            (Protocol::VMess, uuid)
        }
        "vless" => {
            let uuid = require(map, "uuid")?;
            transport_settings(map, &mut settings);
            let security = if map.contains_key("reality-opts") {
                "reality"
            } else if get_bool(map, "tls") {
                "tls"
            } else {
                "none"
            };
            settings.insert("security".to_string(), security.to_string());
            insert_opt(&mut settings, "flow", get_str(map, "flow"));
            insert_opt(&mut settings, "fp", get_str(map, "client-fingerprint"));
            if let Some(reality) = get_mapping(map, "reality-opts") {
                insert_opt(&mut settings, "pbk", get_str(reality, "public-key"));
                insert_opt(&mut settings, "sid", get_str(reality, "short-id"));
            }
            (Protocol::VLess, uuid)
        }
        "trojan" => {
            let password = require(map, "password")?;
            transport_settings(map, &mut settings);
            (Protocol::Trojan, password)
        }
        "ss" => {
            let cipher = require(map, "cipher")?;
            let password = require(map, "password")?;
            insert_opt(&mut settings, "plugin", ss_plugin(map));
            (Protocol::Shadowsocks, format!("{}:{}", cipher, password))
        }
        "ssr" => {
            let password = require(map, "password")?;
            settings.insert("method".to_string(), require(map, "cipher")?);
            settings.insert(
                "protocol".to_string(),
                get_str(map, "protocol").unwrap_or_else(|| "origin".to_string()),
            );
            settings.insert(
                "obfs".to_string(),
                get_str(map, "obfs").unwrap_or_else(|| "plain".to_string()),
            );
            if let Some(param) = get_str(map, "protocol-param") {
                settings.insert("protoparam".to_string(), URL_SAFE_NO_PAD.encode(param));
            }
            if let Some(param) = get_str(map, "obfs-param") {
                settings.insert("obfsparam".to_string(), URL_SAFE_NO_PAD.encode(param));
            }
            (Protocol::ShadowsocksR, password)
        }
        "hysteria2" | "hy2" => {
            let password = get_str(map, "password")
                .or_else(|| get_str(map, "auth"))
                .unwrap_or_default();
            insert_opt(&mut settings, "sni", server_name(map));
            insert_opt(&mut settings, "obfs", get_str(map, "obfs"));
            insert_opt(&mut settings, "obfs-password", get_str(map, "obfs-password"));
            if get_bool(map, "skip-cert-verify") {
                settings.insert("insecure".to_string(), "1".to_string());
            }
            (Protocol::Hysteria2, password)
        }
        "socks5" => {
            let identity = match (get_str(map, "username"), get_str(map, "password")) {
                (Some(user), Some(pass)) => STANDARD.encode(format!("{}:{}", user, pass)),
                _ => String::new(),
            };
            (Protocol::Other("socks".to_string()), identity)
        }
        other => return Err(ParseError::UnsupportedType(other.to_string())),
    };

    Ok(ProxyNode {
        protocol,
        host,
        port,
        identity,
        display_name: name,
        original_link: String::new(),
        settings,
    })
}

/// vless/trojan share the same query vocabulary.
fn transport_settings(map: &Mapping, settings: &mut BTreeMap<String, String>) {
    settings.insert(
        "type".to_string(),
        get_str(map, "network").unwrap_or_else(|| "tcp".to_string()),
    );
    insert_opt(settings, "sni", server_name(map));
    insert_opt(settings, "path", ws_path(map));
    insert_opt(settings, "host", ws_host(map));
    insert_opt(settings, "serviceName", grpc_service(map));
    if get_bool(map, "skip-cert-verify") {
        settings.insert("allowInsecure".to_string(), "1".to_string());
    }
}

fn ss_plugin(map: &Mapping) -> Option<String> {
    let plugin = get_str(map, "plugin")?;
    let plugin = match plugin.as_str() {
        "obfs" => "obfs-local".to_string(),
        _ => plugin,
    };
    let mut parts = vec![plugin];
    if let Some(opts) = get_mapping(map, "plugin-opts") {
        let mut pairs: Vec<(String, String)> = opts
            .iter()
            .filter_map(|(k, v)| Some((k.as_str()?.to_string(), scalar(v)?)))
            .collect();
        pairs.sort();
        for (k, v) in pairs {
            match (k.as_str(), v.as_str()) {
                ("mode", mode) if parts[0] == "obfs-local" => parts.push(format!("obfs={}", mode)),
                ("host", host) if parts[0] == "obfs-local" => {
                    parts.push(format!("obfs-host={}", host))
                }
                (_, "true") => parts.push(k.clone()),
                (_, "false") => {}
                _ => parts.push(format!("{}={}", k, v)),
            }
        }
    }
    Some(parts.join(";"))
}

fn server_name(map: &Mapping) -> Option<String> {
    get_str(map, "sni").or_else(|| get_str(map, "servername"))
}

fn ws_path(map: &Mapping) -> Option<String> {
    get_str(get_mapping(map, "ws-opts")?, "path")
}

fn ws_host(map: &Mapping) -> Option<String> {
    let headers = get_mapping(get_mapping(map, "ws-opts")?, "headers")?;
    get_str(headers, "Host").or_else(|| get_str(headers, "host"))
}

fn grpc_service(map: &Mapping) -> Option<String> {
    get_str(get_mapping(map, "grpc-opts")?, "grpc-service-name")
}

fn insert_opt(settings: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        settings.insert(key.to_string(), value);
    }
}

fn require(map: &Mapping, key: &'static str) -> Result<String, ParseError> {
    get_str(map, key)
        .filter(|v| !v.is_empty())
        .ok_or(ParseError::MissingField(key))
}

fn get_mapping<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(key)?.as_mapping()
}

fn get_str(map: &Mapping, key: &str) -> Option<String> {
    scalar(map.get(key)?)
}

fn get_bool(map: &Mapping, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn scalar(value: &Value) -> Option<String> {
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

    fn entry(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_vless_entry() {
        let node = node_from_clash(&entry(
            r#"
name: "VL 1"
type: vless
server: vl.example.com
port: 443
uuid: 11111111-2222-3333-4444-555555555555
network: ws
tls: true
servername: cdn.example.com
ws-opts:
  path: /ws
  headers:
    Host: cdn.example.com
"#,
        ))
        .unwrap();

        assert_eq!(node.protocol, Protocol::VLess);
        assert_eq!(node.identity, "11111111-2222-3333-4444-555555555555");
        assert_eq!(node.setting("type"), Some("ws"));
        assert_eq!(node.setting("security"), Some("tls"));
        assert_eq!(node.setting("sni"), Some("cdn.example.com"));
        assert_eq!(node.setting("path"), Some("/ws"));
        assert_eq!(node.setting("host"), Some("cdn.example.com"));
    }

    #[test]
    fn test_ipv6_mapped_server_unquoted() {
        let node = node_from_clash(&entry(
            "name: x\ntype: trojan\nserver: ::ffff:1.2.3.4\nport: 443\npassword: pw\n",
        ))
        .unwrap();
        assert_eq!(node.host, "1.2.3.4");
    }

    #[test]
    fn test_ss_entry_with_obfs_plugin() {
        let node = node_from_clash(&entry(
            r#"
name: ss1
type: ss
server: 1.2.3.4
port: "8388"
cipher: aes-128-gcm
password: pw
plugin: obfs
plugin-opts:
  mode: http
  host: bing.com
"#,
        ))
        .unwrap();

        assert_eq!(node.identity, "aes-128-gcm:pw");
        assert_eq!(node.port, 8388);
        assert_eq!(node.setting("plugin"), Some("obfs-local;obfs-host=bing.com;obfs=http"));
    }

    #[test]
    fn test_vmess_entry_defaults() {
        let node = node_from_clash(&entry(
            "name: vm\ntype: vmess\nserver: 1.2.3.4\nport: 443\nuuid: u-1\nalterId: 0\ncipher: auto\n",
        ))
        .unwrap();

        assert_eq!(node.protocol, Protocol::VMess);
        assert_eq!(node.setting("net"), Some("tcp"));
        assert_eq!(node.setting("aid"), Some("0"));
    }

    #[test]
    fn test_unsupported_type() {
        let result = node_from_clash(&entry(
            "name: w\ntype: wireguard\nserver: 1.2.3.4\nport: 51820\n",
        ));
        assert_eq!(
            result,
            Err(ParseError::UnsupportedType("wireguard".to_string()))
        );
    }

    #[test]
    fn test_missing_uuid() {
        let result = node_from_clash(&entry("name: v\ntype: vless\nserver: a.com\nport: 1\n"));
        assert_eq!(result, Err(ParseError::MissingField("uuid")));
    }
}
