use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Which discovered links may be enqueued relative to the page they were found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnqueueStrategy {
    /// Any http(s) link
    All,
    /// Only links on exactly the same hostname
    #[default]
    SameHostname,
    /// Links on the same registrable domain, subdomains included
    SameDomain,
}

/// Configuration for URL filtering of discovered links
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlFilterConfig {
    /// Scope of links relative to the page they were found on
    #[serde(default)]
    pub strategy: EnqueueStrategy,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            strategy: EnqueueStrategy::default(),
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Static assets never hold product data
pub fn default_exclude_patterns() -> Vec<String> {
    vec![r"\.(jpg|jpeg|png|gif|webp|avif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string()]
}

/// URL filter that uses scope rules and regex patterns to decide which links to enqueue
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(UrlFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    pub fn strategy(&self) -> EnqueueStrategy {
        self.config.strategy
    }

    /// Determine if a link found on `base` should be enqueued
    pub fn should_enqueue(&self, url: &Url, base: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_scope(url, base) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(url_str))
    }

    fn is_in_scope(&self, url: &Url, base: &Url) -> bool {
        match self.config.strategy {
            EnqueueStrategy::All => true,
            EnqueueStrategy::SameHostname => url.host_str() == base.host_str(),
            EnqueueStrategy::SameDomain => match (url.host_str(), base.host_str()) {
                (Some(host), Some(base_host)) => {
                    registrable_domain(host) == registrable_domain(base_host)
                }
                _ => false,
            },
        }
    }
}

/// Last two labels of a hostname, e.g. `www.nike.com` -> `nike.com`
fn registrable_domain(host: &str) -> &str {
    let mut dots = host.rmatch_indices('.');
    dots.next();
    match dots.next() {
        Some((idx, _)) => &host[idx + 1..],
        None => host,
    }
}

/// Create a normalized version of the URL used as the dedup key.
///
/// Drops the fragment, sorts query pairs and strips a trailing slash from
/// non-root paths. Scheme and host are already lowercased by `Url::parse`.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    if normalized.query().is_some() {
        let mut pairs: Vec<(String, String)> = normalized
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            normalized.set_query(None);
        } else {
            pairs.sort();
            normalized.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    let path = normalized.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        normalized.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_filter() {
        let filter = UrlFilter::default();
        let base = url("https://www.nike.com/w/mens-shoes");

        // Static assets are excluded
        assert!(!filter.should_enqueue(&url("https://www.nike.com/img/shoe.jpg"), &base));

        // Same host product pages are accepted
        assert!(filter.should_enqueue(&url("https://www.nike.com/t/air-max-90"), &base));

        // Other hosts are rejected by the default strategy
        assert!(!filter.should_enqueue(&url("https://www.adidas.com/t/samba"), &base));
        assert!(!filter.should_enqueue(&url("https://help.nike.com/"), &base));
    }

    #[test]
    fn test_strategies() {
        let base = url("https://www.nike.com/w/mens-shoes");
        let sub = url("https://help.nike.com/faq");
        let other = url("https://example.org/");

        let same_domain = UrlFilter::new(UrlFilterConfig {
            strategy: EnqueueStrategy::SameDomain,
            ..UrlFilterConfig::default()
        })
        .unwrap();
        assert!(same_domain.should_enqueue(&sub, &base));
        assert!(!same_domain.should_enqueue(&other, &base));

        let all = UrlFilter::new(UrlFilterConfig {
            strategy: EnqueueStrategy::All,
            ..UrlFilterConfig::default()
        })
        .unwrap();
        assert!(all.should_enqueue(&other, &base));
        assert!(!all.should_enqueue(&url("mailto:help@nike.com"), &base));
    }

    #[test]
    fn test_regex_patterns() {
        let config = UrlFilterConfig {
            strategy: EnqueueStrategy::All,
            include_patterns: vec![r"/t/".to_string()],
            exclude_patterns: vec![r"/t/gift-card".to_string()],
        };
        let filter = UrlFilter::new(config).unwrap();
        let base = url("https://www.nike.com/");

        assert!(filter.should_enqueue(&url("https://www.nike.com/t/pegasus-41"), &base));
        assert!(!filter.should_enqueue(&url("https://www.nike.com/w/new"), &base));
        assert!(!filter.should_enqueue(&url("https://www.nike.com/t/gift-card"), &base));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = UrlFilterConfig {
            exclude_patterns: vec!["(".to_string()],
            ..UrlFilterConfig::default()
        };
        assert!(UrlFilter::new(config).is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url(&url("https://WWW.Nike.com/w/mens-shoes/#top")).as_str(),
            "https://www.nike.com/w/mens-shoes"
        );
        assert_eq!(
            normalize_url(&url("https://nike.com/w?b=2&a=1")).as_str(),
            "https://nike.com/w?a=1&b=2"
        );
        assert_eq!(normalize_url(&url("https://nike.com/")).as_str(), "https://nike.com/");
        assert_eq!(normalize_url(&url("https://nike.com/w?")).as_str(), "https://nike.com/w");
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("www.nike.com"), "nike.com");
        assert_eq!(registrable_domain("nike.com"), "nike.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }
}
