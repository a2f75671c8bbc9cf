/// Strips an optional `:port` suffix and a trailing root dot from a `Host`
/// header value. Bracketed IPv6 literals keep their brackets.
pub fn host_without_port(raw: &str) -> &str {
    let host = if raw.starts_with('[') {
        match raw.find(']') {
            Some(end) => &raw[..=end],
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => raw,
        }
    };
    host.trim_end_matches('.')
}

/// Whether `host` names the managed domain itself rather than a subdomain.
pub fn is_bare_domain(host: &str, domain: &str) -> bool {
    host_without_port(host).eq_ignore_ascii_case(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_port_and_root_dot() {
        assert_eq!(host_without_port("oast.example:8080"), "oast.example");
        assert_eq!(host_without_port("oast.example."), "oast.example");
        assert_eq!(host_without_port("oast.example"), "oast.example");
        assert_eq!(host_without_port("[::1]:80"), "[::1]");
    }

    #[test]
    fn bare_domain_match_ignores_case_and_port() {
        assert!(is_bare_domain("OAST.example:80", "oast.example"));
        assert!(!is_bare_domain("sub.oast.example", "oast.example"));
    }
}
