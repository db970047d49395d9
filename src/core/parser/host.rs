//! Host/port helpers shared by every link format.

use super::ParseError;
use std::net::Ipv6Addr;
use url::Host;

/// Canonical host form used as map key and for re-serialization.
///
/// Brackets are stripped, IPv6-mapped IPv4 literals (`::ffff:1.2.3.4`) collapse to the
/// bare IPv4 form, IPv6 literals are printed in their compressed form and hostnames are
/// lowercased.
pub fn normalize_host(raw: &str) -> Result<String, ParseError> {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'');
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(trimmed);

    if unbracketed.is_empty() {
        return Err(ParseError::MissingField("host"));
    }

    if let Ok(v6) = unbracketed.parse::<Ipv6Addr>() {
        return Ok(match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        });
    }

    match Host::parse(unbracketed) {
        Ok(Host::Ipv4(v4)) => Ok(v4.to_string()),
        Ok(Host::Ipv6(v6)) => Ok(v6.to_string()),
        // 網域不可含 ':'，否則重新輸出時會被當成 IPv6 加上括號
        Ok(Host::Domain(domain)) if !domain.contains(':') => Ok(domain.to_ascii_lowercase()),
        _ => Err(ParseError::MalformedAddress(raw.to_string())),
    }
}

/// Render a normalized host for use inside a URI authority.
pub fn format_host(host: &str) -> String {
    if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

pub fn parse_port(raw: &str) -> Result<u16, ParseError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ParseError::InvalidPort(raw.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Split `host:port` at the rightmost colon, honouring `[v6]:port`.
pub fn split_host_port(authority: &str) -> Result<(String, u16), ParseError> {
    let authority = authority.trim();

    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| ParseError::MalformedAddress(authority.to_string()))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| ParseError::MalformedAddress(authority.to_string()))?;
        return Ok((normalize_host(host)?, parse_port(port)?));
    }

    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| ParseError::MalformedAddress(authority.to_string()))?;
    Ok((normalize_host(host)?, parse_port(port)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_mapped_ipv4_collapses() {
        assert_eq!(normalize_host("::ffff:1.2.3.4").unwrap(), "1.2.3.4");
        assert_eq!(normalize_host("[::ffff:1.2.3.4]").unwrap(), "1.2.3.4");
        assert_eq!(normalize_host("\"::ffff:1.2.3.4\"").unwrap(), "1.2.3.4");
    }

    #[test]
    fn test_plain_ipv6_kept_and_compressed() {
        assert_eq!(
            normalize_host("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap(),
            "2001:db8::1"
        );
        assert_eq!(format_host("2001:db8::1"), "[2001:db8::1]");
    }

    #[test]
    fn test_hostname_lowercased() {
        assert_eq!(normalize_host("Node.Example.COM").unwrap(), "node.example.com");
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("example.com:443").unwrap(),
            ("example.com".to_string(), 443)
        );
        assert_eq!(
            split_host_port("[2001:db8::1]:8443").unwrap(),
            ("2001:db8::1".to_string(), 8443)
        );
        assert_eq!(
            split_host_port("[::ffff:1.2.3.4]:443").unwrap(),
            ("1.2.3.4".to_string(), 443)
        );
    }

    #[test]
    fn test_non_ip_host_with_colon_rejected() {
        assert!(matches!(
            normalize_host("a.example.com:80"),
            Err(ParseError::MalformedAddress(_))
        ));
        assert!(split_host_port("a.example.com:80:443").is_err());
        assert!(normalize_host("bad host").is_err());
        assert!(normalize_host("x<y>.com").is_err());
    }

    #[test]
    fn test_bad_ports_rejected() {
        assert!(split_host_port("example.com:0").is_err());
        assert!(split_host_port("example.com:70000").is_err());
        assert!(split_host_port("example.com").is_err());
        assert!(split_host_port("[2001:db8::1]").is_err());
    }
}
