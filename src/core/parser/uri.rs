//! `identity@host:port?query#name` style links (vless, trojan, hysteria2 and the
//! generic fallbacks).

use super::host::split_host_port;
use super::{default_name, parse_query, percent_decode, split_fragment, strip_scheme, ParseError};
use crate::domain::model::{Protocol, ProxyNode};

pub fn parse_vless(link: &str) -> Result<ProxyNode, ParseError> {
    parse_authority_link(Protocol::VLess, link, true)
}

pub fn parse_trojan(link: &str) -> Result<ProxyNode, ParseError> {
    parse_authority_link(Protocol::Trojan, link, true)
}

pub fn parse_hysteria2(link: &str) -> Result<ProxyNode, ParseError> {
    parse_authority_link(Protocol::Hysteria2, link, false)
}

pub fn parse_other(link: &str) -> Result<ProxyNode, ParseError> {
    let scheme = link
        .split_once("://")
        .map(|(s, _)| s.to_ascii_lowercase())
        .ok_or(ParseError::UnknownScheme)?;
    parse_authority_link(Protocol::Other(scheme), link, false)
}

fn parse_authority_link(
    protocol: Protocol,
    link: &str,
    identity_required: bool,
) -> Result<ProxyNode, ParseError> {
    let (main, name) = split_fragment(strip_scheme(link));
    let (before_query, query) = main.split_once('?').unwrap_or((main, ""));

    let (identity, authority) = match before_query.rsplit_once('@') {
        Some((identity, authority)) => (percent_decode(identity), authority),
        None => (String::new(), before_query),
    };
    // 有些連結在 port 後面帶 "/" 或路徑
    let authority = authority.split('/').next().unwrap_or(authority);

    if identity_required && identity.is_empty() {
        return Err(ParseError::MissingField("identity"));
    }

    let (host, port) = split_host_port(authority)?;

    Ok(ProxyNode {
        display_name: default_name(name, &host, port),
        protocol,
        host,
        port,
        identity,
        original_link: link.to_string(),
        settings: parse_query(query),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vless() {
        let link = "vless://0b6ec6b4-1111-4c2e-9d53-1f2a3b4c5d6e@1.2.3.4:443?type=ws&security=tls&path=%2Fray#%F0%9F%87%BA%F0%9F%87%B8%20US";
        let node = parse_vless(link).unwrap();

        assert_eq!(node.protocol, Protocol::VLess);
        assert_eq!(node.identity, "0b6ec6b4-1111-4c2e-9d53-1f2a3b4c5d6e");
        assert_eq!(node.host, "1.2.3.4");
        assert_eq!(node.port, 443);
        assert_eq!(node.display_name, "🇺🇸 US");
        assert_eq!(node.setting("path"), Some("/ray"));
        assert_eq!(node.setting("security"), Some("tls"));
        assert_eq!(node.original_link, link);
    }

    #[test]
    fn test_parse_trojan_with_trailing_slash_and_ipv6() {
        let node = parse_trojan("trojan://p%40ss@[2001:db8::1]:8443/?sni=a.example.com#T").unwrap();

        assert_eq!(node.identity, "p@ss");
        assert_eq!(node.host, "2001:db8::1");
        assert_eq!(node.port, 8443);
        assert_eq!(node.setting("sni"), Some("a.example.com"));
    }

    #[test]
    fn test_trojan_requires_password() {
        assert_eq!(
            parse_trojan("trojan://example.com:443#x"),
            Err(ParseError::MissingField("identity"))
        );
    }

    #[test]
    fn test_hysteria2_without_auth_and_name() {
        let node = parse_hysteria2("hysteria2://Example.com:8443?obfs=salamander").unwrap();

        assert_eq!(node.identity, "");
        assert_eq!(node.host, "example.com");
        assert_eq!(node.display_name, "example.com:8443");
        assert_eq!(node.setting("obfs"), Some("salamander"));
    }

    #[test]
    fn test_ipv6_mapped_host_normalized() {
        let node = parse_vless("vless://id@[::ffff:1.2.3.4]:443#A").unwrap();
        assert_eq!(node.host, "1.2.3.4");
    }

    #[test]
    fn test_other_scheme_keeps_scheme_tag() {
        let node = parse_other("socks://dXNlcjpwYXNz@5.6.7.8:1080#S").unwrap();
        assert_eq!(node.protocol, Protocol::Other("socks".to_string()));
        assert_eq!(node.port, 1080);
    }

    #[test]
    fn test_bad_port_rejected() {
        assert!(parse_vless("vless://id@1.2.3.4:abc#A").is_err());
    }
}
