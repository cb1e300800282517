use std::collections::HashMap;

/// Lowercases, trims and strips the wildcard prefix and trailing root dot.
/// Returns `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
    let host = raw.trim().to_lowercase();
    let host = host.strip_prefix("*.").unwrap_or(&host);
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// `true` for the apex itself or a strict dot-suffixed descendant of it.
pub fn belongs_to(hostname: &str, apex: &str) -> bool {
    let hostname = hostname.trim().to_lowercase();
    let apex = apex.trim().to_lowercase();
    if apex.is_empty() {
        return false;
    }
    hostname == apex || hostname.ends_with(&format!(".{apex}"))
}

/// Confirmed hostnames of one scan with first-seen provenance.
///
/// Insertion is case-insensitive and idempotent, and only members of the apex
/// are admitted. The set never shrinks.
#[derive(Debug, Clone)]
pub struct SeedSet {
    apex: String,
    order: Vec<String>,
    sources: HashMap<String, String>,
}

impl SeedSet {
    pub fn new(apex: &str) -> Self {
        Self {
            apex: apex.trim().to_lowercase(),
            order: Vec::new(),
            sources: HashMap::new(),
        }
    }

    pub fn apex(&self) -> &str {
        &self.apex
    }

    /// Adds `hostname` if it is a new member of the apex. The first source
    /// reported for a hostname is kept.
    pub fn insert(&mut self, hostname: &str, source: &str) -> bool {
        let Some(host) = normalize(hostname) else {
            return false;
        };
        if !belongs_to(&host, &self.apex) || self.sources.contains_key(&host) {
            return false;
        }
        self.sources.insert(host.clone(), source.to_string());
        self.order.push(host);
        true
    }

    /// Inserts every hostname and returns the ones that were new.
    pub fn extend<I, S>(&mut self, hostnames: I, source: &str) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = Vec::new();
        for hostname in hostnames {
            if self.insert(hostname.as_ref(), source) {
                if let Some(last) = self.order.last() {
                    added.push(last.clone());
                }
            }
        }
        added
    }

    pub fn contains(&self, hostname: &str) -> bool {
        normalize(hostname).is_some_and(|host| self.sources.contains_key(&host))
    }

    pub fn source_of(&self, hostname: &str) -> Option<&str> {
        normalize(hostname).and_then(|host| self.sources.get(&host).map(String::as_str))
    }

    pub fn hostnames(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, HashMap<String, String>) {
        (self.order, self.sources)
    }
}

/// Merges lists keeping the first occurrence of each hostname
/// (case-insensitive), dropping blanks.
pub fn merge_unique<S: AsRef<str>>(lists: &[&[S]]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for item in list.iter() {
            let Some(host) = normalize(item.as_ref()) else {
                continue;
            };
            if seen.insert(host.clone()) {
                merged.push(host);
            }
        }
    }
    merged
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize("  *.API.Example.com. "), Some("api.example.com".into()));
        assert_eq!(normalize("   "), None);
    }

    #[test]
    fn membership_requires_a_dot_boundary() {
        assert!(belongs_to("example.com", "example.com"));
        assert!(belongs_to("x.example.com", "example.com"));
        assert!(!belongs_to("xexample.com", "example.com"));
        assert!(!belongs_to("example.com.evil.net", "example.com"));
    }

    #[test]
    fn first_source_wins_case_insensitively() {
        let mut seed = SeedSet::new("example.com");
        assert!(seed.insert("WWW.example.com", "crtsh"));
        assert!(!seed.insert("www.EXAMPLE.com", "anubis"));
        assert_eq!(seed.len(), 1);
        assert_eq!(seed.source_of("www.example.com"), Some("crtsh"));
    }

    #[test]
    fn foreign_hostnames_are_rejected() {
        let mut seed = SeedSet::new("example.com");
        assert!(!seed.insert("www.example.org", "crtsh"));
        assert!(!seed.insert("badexample.com", "crtsh"));
        assert!(seed.is_empty());
    }

    #[test]
    fn extend_reports_only_new_names() {
        let mut seed = SeedSet::new("example.com");
        seed.insert("a.example.com", "passive");
        let added = seed.extend(["a.example.com", "b.example.com", "B.example.com"], "active");
        assert_eq!(added, vec!["b.example.com".to_string()]);
        assert_eq!(seed.source_of("b.example.com"), Some("active"));
    }

    #[test]
    fn merge_keeps_first_occurrence() {
        let first = ["a.example.com", "B.example.com"];
        let second = ["b.example.com", "c.example.com", ""];
        let merged = merge_unique(&[&first[..], &second[..]]);
        assert_eq!(merged, vec!["a.example.com", "b.example.com", "c.example.com"]);
    }
}

// endregion:     --- Tests
