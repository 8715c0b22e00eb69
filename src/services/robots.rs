// src/services/robots.rs

//! robots.txt policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

use crate::services::fetcher::Fetcher;

/// Robots collaborator, consulted once per site before any listing fetch.
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn is_allowed(&self, site_base_url: &str, path: &str) -> bool;
}

/// Policy that never blocks (`--ignore-robots`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl RobotsPolicy for AllowAll {
    async fn is_allowed(&self, _site_base_url: &str, _path: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    allow: Vec<String>,
    disallow: Vec<String>,
}

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group.
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.extend(
                        value
                            .split(',')
                            .map(|a| a.trim().to_ascii_lowercase())
                            .filter(|a| !a.is_empty()),
                    );
                }
                "allow" if !value.is_empty() => {
                    in_rules = true;
                    current.allow.push(value.to_string());
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current.disallow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }
        Self { groups }
    }

    /// The agent's own group is checked before `*`. Within a group an
    /// `Allow` match overrides any `Disallow` match.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent = user_agent.to_ascii_lowercase();
        let specific = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())));
        let wildcard = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"));

        for group in specific.chain(wildcard) {
            if group.allow.iter().any(|p| path_matches(path, p)) {
                return true;
            }
            if group.disallow.iter().any(|p| path_matches(path, p)) {
                return false;
            }
        }
        true
    }
}

/// Prefix match with `*` wildcards and an optional `$` end anchor.
fn path_matches(path: &str, pattern: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    for (i, part) in parts.iter().enumerate() {
        let last = i + 1 == parts.len();
        if last && anchored {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    !anchored || rest.is_empty()
}

/// Fetches `/robots.txt` once per origin through the fetch collaborator.
///
/// A missing, failing or non-success robots.txt allows everything.
pub struct RobotsTxtPolicy {
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    cache: RwLock<HashMap<String, Arc<RobotsTxt>>>,
}

impl RobotsTxtPolicy {
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn rules_for(&self, origin: &str) -> Arc<RobotsTxt> {
        if let Some(rules) = self.cache.read().await.get(origin) {
            return Arc::clone(rules);
        }

        let robots_url = format!("{origin}/robots.txt");
        let rules = match self.fetcher.fetch(&robots_url).await {
            Ok(page) if page.is_success() => RobotsTxt::parse(&page.body),
            Ok(page) => {
                log::debug!("No robots.txt at {} (HTTP {})", robots_url, page.status);
                RobotsTxt::default()
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", robots_url, e);
                RobotsTxt::default()
            }
        };

        let rules = Arc::new(rules);
        self.cache
            .write()
            .await
            .insert(origin.to_string(), Arc::clone(&rules));
        rules
    }
}

#[async_trait]
impl RobotsPolicy for RobotsTxtPolicy {
    async fn is_allowed(&self, site_base_url: &str, path: &str) -> bool {
        let Ok(base) = Url::parse(site_base_url) else {
            return true;
        };
        let origin = base.origin().ascii_serialization();
        self.rules_for(&origin)
            .await
            .is_allowed(&self.user_agent, path)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::ScraperConfig;
    use crate::services::fetcher::HttpFetcher;
    use crate::services::fetcher::memory::MemoryFetcher;

    #[test]
    fn test_wildcard_group() {
        let robots = RobotsTxt::parse(
            "User-agent: *\nDisallow: /private/\nAllow: /private/public/\nDisallow: /*.pdf$\n",
        );
        assert!(robots.is_allowed("AnyBot", "/inventory"));
        assert!(!robots.is_allowed("AnyBot", "/private/secret"));
        assert!(robots.is_allowed("AnyBot", "/private/public/page"));
        assert!(!robots.is_allowed("AnyBot", "/docs/brochure.pdf"));
        assert!(robots.is_allowed("AnyBot", "/docs/brochure.pdf?x=1"));
    }

    #[test]
    fn test_specific_agent_checked_first() {
        let robots = RobotsTxt::parse(
            "User-agent: *\nDisallow: /\n\nUser-agent: dealer-crawler\nAllow: /inventory\n",
        );
        assert!(!robots.is_allowed("OtherBot", "/inventory"));
        assert!(robots.is_allowed("Mozilla/5.0 (compatible; dealer-crawler/0.1)", "/inventory"));
        // Falls through to `*` when the specific group is silent
        assert!(!robots.is_allowed("dealer-crawler", "/admin"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow:\n");
        assert!(robots.is_allowed("Bot", "/anything"));
        assert!(RobotsTxt::default().is_allowed("Bot", "/"));
    }

    #[test]
    fn test_path_matches() {
        assert!(path_matches("/used/cars", "/used"));
        assert!(path_matches("/a/b/c.php", "/*/c.php"));
        assert!(path_matches("/exact", "/exact$"));
        assert!(!path_matches("/exactly", "/exact$"));
        assert!(!path_matches("/new", "/used"));
    }

    #[tokio::test]
    async fn test_policy_fetches_once_per_origin() {
        let fetcher = Arc::new(
            MemoryFetcher::new().page("https://d.test/robots.txt", "User-agent: *\nDisallow: /inventory\n"),
        );
        let policy = RobotsTxtPolicy::new(fetcher.clone(), "bot");

        assert!(!policy.is_allowed("https://d.test/", "/inventory").await);
        assert!(policy.is_allowed("https://d.test/", "/about").await);
        assert_eq!(fetcher.call_count(), 1);

        // Missing robots.txt allows
        assert!(policy.is_allowed("https://other.test", "/inventory").await);
    }

    #[tokio::test]
    async fn test_policy_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
            .mount(&server)
            .await;

        let fetcher = Arc::new(HttpFetcher::new(&ScraperConfig::default()).unwrap());
        let policy = RobotsTxtPolicy::new(fetcher, "bot");
        assert!(!policy.is_allowed(&server.uri(), "/inventory").await);
    }
}
