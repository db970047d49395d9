//! Shadowsocks (`ss://`) and ShadowsocksR (`ssr://`) links.
//!
//! Both SIP002 (`base64(method:password)@host:port`) and the legacy fully encoded form
//! (`base64(method:password@host:port)`) are accepted. The node identity is always
//! `method:password`, whichever form it came from.

use super::host::{normalize_host, parse_port, split_host_port};
use super::{
    decode_base64_text, default_name, parse_query, percent_decode, split_fragment, strip_scheme,
    ParseError,
};
use crate::domain::model::{Protocol, ProxyNode};

/// Keys of an ssr node's settings that live in the encoded main section, not in the params.
pub const SSR_MAIN_KEYS: [&str; 3] = ["protocol", "method", "obfs"];

pub fn parse_ss(link: &str) -> Result<ProxyNode, ParseError> {
    let (main, name) = split_fragment(strip_scheme(link));
    let (before_query, query) = main.split_once('?').unwrap_or((main, ""));
    let before_query = before_query.trim_end_matches('/');

    let (method, password, host, port) = match before_query.rsplit_once('@') {
        Some((userinfo, authority)) => {
            let userinfo = percent_decode(userinfo);
            let credentials = if userinfo.contains(':') {
                userinfo
            } else {
                decode_base64_text(&userinfo)?
            };
            let (method, password) = credentials
                .split_once(':')
                .ok_or(ParseError::MissingField("password"))?;
            let authority = authority.split('/').next().unwrap_or(authority);
            let (host, port) = split_host_port(authority)?;
            (method.to_string(), password.to_string(), host, port)
        }
        None => parse_legacy_blob(before_query)?,
    };

    if method.is_empty() {
        return Err(ParseError::MissingField("method"));
    }

    Ok(ProxyNode {
        display_name: default_name(name, &host, port),
        protocol: Protocol::Shadowsocks,
        host,
        port,
        identity: format!("{}:{}", method, password),
        original_link: link.to_string(),
        settings: parse_query(query),
    })
}

/// `method:password@host:port`, or the older `method:password:host:port`; anything that
/// does not split cleanly is rejected rather than guessed.
fn parse_legacy_blob(blob: &str) -> Result<(String, String, String, u16), ParseError> {
    let decoded = decode_base64_text(blob)?;
    let decoded = decoded.trim();

    if let Some((credentials, authority)) = decoded.rsplit_once('@') {
        let (method, password) = credentials
            .split_once(':')
            .ok_or(ParseError::LegacyShadowsocksShape)?;
        let (host, port) = split_host_port(authority)?;
        return Ok((method.to_string(), password.to_string(), host, port));
    }

    let parts: Vec<&str> = decoded.split(':').collect();
    match parts.as_slice() {
        [method, password, host, port] => Ok((
            method.to_string(),
            password.to_string(),
            normalize_host(host)?,
            parse_port(port)?,
        )),
        _ => Err(ParseError::LegacyShadowsocksShape),
    }
}

pub fn parse_ssr(link: &str) -> Result<ProxyNode, ParseError> {
    let decoded = decode_base64_text(strip_scheme(link).trim())?;
    let (main, params) = match decoded.split_once("/?") {
        Some((main, params)) => (main, params),
        None => decoded.split_once('?').unwrap_or((decoded.as_str(), "")),
    };

    // host 可能是 IPv6，所以從右邊切
    let mut parts: Vec<&str> = main.rsplitn(6, ':').collect();
    if parts.len() != 6 {
        return Err(ParseError::MalformedAddress(main.to_string()));
    }
    parts.reverse();
    let (host, port, protocol, method, obfs, password_b64) =
        (parts[0], parts[1], parts[2], parts[3], parts[4], parts[5]);

    let host = normalize_host(host)?;
    let port = parse_port(port)?;
    let password = decode_base64_text(password_b64)?;

    let mut settings = parse_query(params);
    let name = settings
        .remove("remarks")
        .and_then(|r| decode_base64_text(&r).ok())
        .unwrap_or_default()
        .trim()
        .to_string();
    settings.insert("protocol".to_string(), protocol.to_string());
    settings.insert("method".to_string(), method.to_string());
    settings.insert("obfs".to_string(), obfs.to_string());

    Ok(ProxyNode {
        display_name: default_name(name, &host, port),
        protocol: Protocol::ShadowsocksR,
        host,
        port,
        identity: password,
        original_link: link.to_string(),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;

    #[test]
    fn test_parse_sip002() {
        let link = format!(
            "ss://{}@1.2.3.4:8388#SS%20Node",
            STANDARD.encode("aes-256-gcm:secret")
        );
        let node = parse_ss(&link).unwrap();

        assert_eq!(node.protocol, Protocol::Shadowsocks);
        assert_eq!(node.identity, "aes-256-gcm:secret");
        assert_eq!(node.host, "1.2.3.4");
        assert_eq!(node.port, 8388);
        assert_eq!(node.display_name, "SS Node");
    }

    #[test]
    fn test_parse_sip002_with_plugin() {
        let link = format!(
            "ss://{}@example.com:443/?plugin=obfs-local%3Bobfs%3Dhttp#P",
            URL_SAFE_NO_PAD.encode("chacha20-ietf-poly1305:pw")
        );
        let node = parse_ss(&link).unwrap();

        assert_eq!(node.identity, "chacha20-ietf-poly1305:pw");
        assert_eq!(node.setting("plugin"), Some("obfs-local;obfs=http"));
    }

    #[test]
    fn test_parse_plain_userinfo() {
        let node = parse_ss("ss://aes-128-gcm:pw@5.6.7.8:1234#plain").unwrap();
        assert_eq!(node.identity, "aes-128-gcm:pw");
    }

    #[test]
    fn test_parse_legacy_form() {
        let link = format!(
            "ss://{}#Legacy",
            STANDARD.encode("aes-256-cfb:legacy-pass@9.8.7.6:8443")
        );
        let node = parse_ss(&link).unwrap();

        assert_eq!(node.identity, "aes-256-cfb:legacy-pass");
        assert_eq!(node.host, "9.8.7.6");
        assert_eq!(node.port, 8443);
    }

    #[test]
    fn test_parse_legacy_colon_form() {
        let link = format!("ss://{}", STANDARD.encode("rc4-md5:pw:9.8.7.6:8443"));
        let node = parse_ss(&link).unwrap();

        assert_eq!(node.identity, "rc4-md5:pw");
        assert_eq!(node.display_name, "9.8.7.6:8443");
    }

    #[test]
    fn test_legacy_blob_with_wrong_shape_is_dropped() {
        let link = format!("ss://{}", STANDARD.encode("rc4-md5:pw:9.8.7.6"));
        assert_eq!(parse_ss(&link), Err(ParseError::LegacyShadowsocksShape));

        let link = format!("ss://{}", STANDARD.encode("a:b:c:d:e"));
        assert_eq!(parse_ss(&link), Err(ParseError::LegacyShadowsocksShape));
    }

    #[test]
    fn test_parse_ssr() {
        let inner = format!(
            "ssr.example.com:8989:auth_aes128_md5:aes-256-cfb:tls1.2_ticket_auth:{}/?obfsparam=&remarks={}&group={}",
            URL_SAFE_NO_PAD.encode("ssr-pass"),
            URL_SAFE_NO_PAD.encode("SSR Node"),
            URL_SAFE_NO_PAD.encode("grp"),
        );
        let link = format!("ssr://{}", URL_SAFE_NO_PAD.encode(inner));
        let node = parse_ssr(&link).unwrap();

        assert_eq!(node.protocol, Protocol::ShadowsocksR);
        assert_eq!(node.host, "ssr.example.com");
        assert_eq!(node.port, 8989);
        assert_eq!(node.identity, "ssr-pass");
        assert_eq!(node.display_name, "SSR Node");
        assert_eq!(node.setting("protocol"), Some("auth_aes128_md5"));
        assert_eq!(node.setting("obfs"), Some("tls1.2_ticket_auth"));
        assert!(node.setting("remarks").is_none());
    }
}
