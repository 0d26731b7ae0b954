//! Remote host filtering.
//!
//! By default only loopback clients are served. Allow-list entries may use
//! `*` for any single address segment, e.g. `192.168.178.*` or `10.0.*.*`.

use std::net::IpAddr;

/// Addresses always present in the allow list
pub const DEFAULT_ALLOWED: [&str; 3] = ["::1", "127.0.0.1", "::ffff:127.0.0.1"];

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

#[derive(Debug, Clone)]
pub struct HostFilter {
    allow_remote: bool,
    allowed: Vec<String>,
}

impl Default for HostFilter {
    fn default() -> Self {
        Self::new(false, &[])
    }
}

impl HostFilter {
    /// `extra` entries are added to [`DEFAULT_ALLOWED`].
    pub fn new(allow_remote: bool, extra: &[String]) -> Self {
        let mut allowed: Vec<String> = DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect();
        for entry in extra {
            if !allowed.contains(entry) {
                allowed.push(entry.clone());
            }
        }
        Self {
            allow_remote,
            allowed,
        }
    }

    pub fn allow_remote(&self) -> bool {
        self.allow_remote
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_allowed(&self, remote: IpAddr) -> bool {
        if self.allow_remote {
            return true;
        }

        let remote = remote.to_string();
        let remote = remote.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(&remote);

        self.allowed
            .iter()
            .any(|entry| entry == remote || mask_matches(entry, remote))
    }
}

/// Segment-wise match where `*` stands for any one segment.
fn mask_matches(mask: &str, address: &str) -> bool {
    let mask: Vec<&str> = mask.split(['.', ':']).collect();
    let address: Vec<&str> = address.split(['.', ':']).collect();

    mask.len() == address.len()
        && mask
            .iter()
            .zip(&address)
            .all(|(m, a)| *m == "*" || m == a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_loopback_allowed_by_default() {
        let filter = HostFilter::default();
        assert!(filter.is_allowed(ip("127.0.0.1")));
        assert!(filter.is_allowed(ip("::1")));
        assert!(filter.is_allowed(ip("::ffff:127.0.0.1")));
        assert!(!filter.is_allowed(ip("192.168.1.10")));
    }

    #[test]
    fn test_wildcard_segments() {
        let filter = HostFilter::new(false, &["192.168.178.*".to_string(), "10.0.*.*".to_string()]);
        assert!(filter.is_allowed(ip("192.168.178.20")));
        assert!(filter.is_allowed(ip("10.0.3.4")));
        assert!(filter.is_allowed(ip("::ffff:10.0.3.4")));
        assert!(!filter.is_allowed(ip("192.168.179.20")));
        assert!(!filter.is_allowed(ip("10.1.3.4")));
    }

    #[test]
    fn test_exact_entry() {
        let filter = HostFilter::new(false, &["203.0.113.7".to_string()]);
        assert!(filter.is_allowed(ip("203.0.113.7")));
        assert!(!filter.is_allowed(ip("203.0.113.8")));
    }

    #[test]
    fn test_mask_needs_full_address() {
        assert!(!mask_matches("10.*", "10.0.0.1"));
        assert!(mask_matches("*.*.*.*", "10.0.0.1"));
    }

    #[test]
    fn test_allow_remote() {
        let filter = HostFilter::new(true, &[]);
        assert!(filter.is_allowed(ip("8.8.8.8")));
    }

    #[test]
    fn test_extra_entries_deduplicated() {
        let filter = HostFilter::new(false, &["127.0.0.1".to_string()]);
        assert_eq!(filter.allowed().len(), DEFAULT_ALLOWED.len());
    }
}
