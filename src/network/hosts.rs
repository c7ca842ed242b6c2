/*!
 * Host Name Matching
 * Syntax checks and allowed-host pattern matching
 */

use crate::core::limits::{LOCALHOST, MAX_HOSTNAME_LABEL_LEN, MAX_HOSTNAME_LEN};

/// Check that `host` is a syntactically valid DNS host name
///
/// Labels are 1-63 alphanumeric or hyphen characters and may not start or
/// end with a hyphen. A single trailing dot is not accepted.
pub fn is_valid_hostname(host: &str) -> bool {
    if host == LOCALHOST {
        return true;
    }
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_HOSTNAME_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Check that `pattern` is an acceptable allowed-host entry
///
/// Accepts a host name, a leading-dot domain wildcard (".example.com") or "*".
pub fn is_valid_host_pattern(pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_prefix('.') {
        Some(domain) => domain != LOCALHOST && is_valid_hostname(domain),
        None => is_valid_hostname(pattern),
    }
}

/// Check if `host` is covered by an allowed-host pattern
pub fn host_matches(host: &str, pattern: &str) -> bool {
    if pattern == "*" || pattern.eq_ignore_ascii_case(host) {
        return true;
    }

    // ".example.com" matches "example.com" and any subdomain of it
    if let Some(domain) = pattern.strip_prefix('.') {
        let host = host.to_ascii_lowercase();
        let domain = domain.to_ascii_lowercase();
        return host == domain || host.ends_with(&format!(".{}", domain));
    }

    false
}

/// True if every allowed-host entry is exactly "localhost"
pub fn is_localhost_only<'a, I>(hosts: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    hosts.into_iter().all(|h| h == LOCALHOST)
}
