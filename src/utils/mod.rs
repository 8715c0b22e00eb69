//! URL helpers shared by the scrapers and the orchestrator.

use url::Url;

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Path plus query of a URL, as matched against robots.txt rules.
pub fn request_path(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        },
        Err(_) => "/".to_string(),
    }
}

/// Comparison key for listing URLs: lowercased, fragment and trailing slash dropped.
pub fn url_key(url_str: &str) -> String {
    let trimmed = url_str.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    without_fragment.trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("https://d.test/inventory?page=2"), "/inventory?page=2");
        assert_eq!(request_path("https://d.test"), "/");
        assert_eq!(request_path("::"), "/");
    }

    #[test]
    fn test_url_key() {
        assert_eq!(
            url_key("https://D.test/Inventory/1/#photos"),
            "https://d.test/inventory/1"
        );
    }
}
