//! Location blocklist and safety-check acknowledgement.

use crate::types::SafetyCheck;
use async_trait::async_trait;
use reqwest::Url;

/// Domains the agent must never browse to.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "maliciousbook.com",
    "evilvideos.com",
    "darkwebforum.com",
    "shadytok.com",
    "suspiciouspins.com",
    "ilanbigio.com",
];

/// Post-action location check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    blocked_domains: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()))
    }
}

impl SafetyPolicy {
    pub fn new(blocked_domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked_domains: blocked_domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn blocked_domains(&self) -> &[String] {
        &self.blocked_domains
    }

    /// True when the URL's host is a blocked domain or one of its subdomains.
    ///
    /// Locations that do not parse as URLs carry no host and are allowed.
    pub fn is_blocked(&self, location: &str) -> bool {
        let Ok(url) = Url::parse(location) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        self.blocked_domains.iter().any(|blocked| {
            host == *blocked
                || host
                    .strip_suffix(blocked.as_str())
                    .map(|prefix| prefix.ends_with('.'))
                    .unwrap_or(false)
        })
    }
}

/// Decides whether pending safety checks may proceed.
#[async_trait]
pub trait SafetyAcknowledger: Send + Sync {
    /// Return true to acknowledge the check and run the action.
    async fn acknowledge(&self, check: &SafetyCheck) -> bool;
}

/// Acknowledges every check.
pub struct AcknowledgeAll;

#[async_trait]
impl SafetyAcknowledger for AcknowledgeAll {
    async fn acknowledge(&self, _check: &SafetyCheck) -> bool {
        true
    }
}

/// Declines every check.
pub struct DeclineAll;

#[async_trait]
impl SafetyAcknowledger for DeclineAll {
    async fn acknowledge(&self, _check: &SafetyCheck) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_domain_and_subdomains() {
        let policy = SafetyPolicy::default();
        assert!(policy.is_blocked("https://maliciousbook.com/feed"));
        assert!(policy.is_blocked("https://www.maliciousbook.com"));
        assert!(policy.is_blocked("http://a.b.SHADYTOK.com/x"));
    }

    #[test]
    fn test_allows_lookalike_domains() {
        let policy = SafetyPolicy::default();
        assert!(!policy.is_blocked("https://notmaliciousbook.com"));
        assert!(!policy.is_blocked("https://maliciousbook.com.example.org"));
        assert!(!policy.is_blocked("https://example.com"));
    }

    #[test]
    fn test_non_url_locations_allowed() {
        let policy = SafetyPolicy::default();
        assert!(!policy.is_blocked("about:blank"));
        assert!(!policy.is_blocked("firefox: Inbox"));
        assert!(!policy.is_blocked(""));
    }

    #[test]
    fn test_custom_list_normalized() {
        let policy = SafetyPolicy::new(vec![" .Example.ORG ".to_string(), String::new()]);
        assert_eq!(policy.blocked_domains(), &["example.org".to_string()]);
        assert!(policy.is_blocked("https://docs.example.org/page"));
    }

    #[tokio::test]
    async fn test_acknowledgers() {
        let check = SafetyCheck {
            id: "sc_1".to_string(),
            code: Some("malicious_instructions".to_string()),
            message: "Check the page".to_string(),
        };
        assert!(AcknowledgeAll.acknowledge(&check).await);
        assert!(!DeclineAll.acknowledge(&check).await);
    }
}
