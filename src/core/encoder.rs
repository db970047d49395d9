use crate::core::parser::host::format_host;
use crate::core::parser::shadowsocks::SSR_MAIN_KEYS;
use crate::domain::model::{MergedCatalog, Protocol, ProxyNode};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::collections::BTreeMap;

/// Turns the merged catalog back into the subscription wire format.
pub struct CatalogEncoder;

impl CatalogEncoder {
    /// Canonical link for a node, rebuilt from its fields rather than copied from the
    /// original text.
    pub fn render_link(node: &ProxyNode) -> String {
        match &node.protocol {
            Protocol::VMess => render_vmess(node),
            Protocol::Shadowsocks => render_ss(node),
            Protocol::ShadowsocksR => render_ssr(node),
            Protocol::VLess | Protocol::Trojan | Protocol::Hysteria2 | Protocol::Other(_) => {
                render_authority(node)
            }
        }
    }

    /// Newline-joined canonical links in catalog order.
    pub fn encode_plain(catalog: &MergedCatalog) -> String {
        catalog
            .nodes()
            .iter()
            .map(Self::render_link)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Base64 of the newline-joined links, the artifact body.
    pub fn encode(catalog: &MergedCatalog) -> String {
        STANDARD.encode(Self::encode_plain(catalog).as_bytes())
    }
}

fn render_query(settings: &BTreeMap<String, String>) -> String {
    settings
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn render_authority(node: &ProxyNode) -> String {
    let mut link = format!("{}://", node.protocol.tag());
    if !node.identity.is_empty() {
        link.push_str(&urlencoding::encode(&node.identity));
        link.push('@');
    }
    link.push_str(&format!("{}:{}", format_host(&node.host), node.port));
    if !node.settings.is_empty() {
        link.push('?');
        link.push_str(&render_query(&node.settings));
    }
    link.push('#');
    link.push_str(&urlencoding::encode(&node.display_name));
    link
}

fn render_vmess(node: &ProxyNode) -> String {
    let mut obj: serde_json::Map<String, serde_json::Value> = node
        .settings
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    obj.insert("add".to_string(), node.host.clone().into());
    obj.insert("port".to_string(), node.port.to_string().into());
    obj.insert("id".to_string(), node.identity.clone().into());
    obj.insert("ps".to_string(), node.display_name.clone().into());

    let json = serde_json::Value::Object(obj).to_string();
    format!("vmess://{}", STANDARD.encode(json.as_bytes()))
}

fn render_ss(node: &ProxyNode) -> String {
    let mut link = format!(
        "ss://{}@{}:{}",
        URL_SAFE_NO_PAD.encode(node.identity.as_bytes()),
        format_host(&node.host),
        node.port
    );
    if !node.settings.is_empty() {
        link.push_str("/?");
        link.push_str(&render_query(&node.settings));
    }
    link.push('#');
    link.push_str(&urlencoding::encode(&node.display_name));
    link
}

fn render_ssr(node: &ProxyNode) -> String {
    let main = format!(
        "{}:{}:{}:{}:{}:{}",
        node.host,
        node.port,
        node.setting("protocol").unwrap_or("origin"),
        node.setting("method").unwrap_or("none"),
        node.setting("obfs").unwrap_or("plain"),
        URL_SAFE_NO_PAD.encode(node.identity.as_bytes())
    );

    let mut params: BTreeMap<&str, String> = node
        .settings
        .iter()
        .filter(|(k, _)| !SSR_MAIN_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    params.insert("remarks", URL_SAFE_NO_PAD.encode(node.display_name.as_bytes()));

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!("ssr://{}", URL_SAFE_NO_PAD.encode(format!("{}/?{}", main, query)))
}
