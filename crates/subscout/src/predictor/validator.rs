use lazy_regex::regex_is_match;
use std::collections::HashSet;

const MAX_HOSTNAME_LEN: usize = 253;

/// RFC 1123 style name: lowercase alphanumeric labels of at most 63 chars,
/// inner hyphens only, no `--`, 253 chars overall.
pub fn is_valid_subdomain(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return false;
    }
    if name.contains("..") || name.contains("--") {
        return false;
    }
    regex_is_match!(
        r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$",
        &name
    )
}

/// The label part of `full` under `apex`.
///
/// `Some("")` for the apex itself, `None` when `full` is outside the apex
/// its labels are malformed, or the whole name is over 253 chars.
pub fn extract_subdomain(full: &str, apex: &str) -> Option<String> {
    let full = full.trim().to_lowercase();
    let apex = apex.trim().to_lowercase();
    if full.is_empty() || apex.is_empty() {
        return None;
    }

    let full = full.strip_prefix("*.").unwrap_or(&full);
    if full.len() > MAX_HOSTNAME_LEN {
        return None;
    }
    if full == apex {
        return Some(String::new());
    }
    let sub = full.strip_suffix(&format!(".{apex}"))?;
    is_valid_subdomain(sub).then(|| sub.to_string())
}

/// Labels of every name strictly under `apex`.
pub fn seed_labels<S: AsRef<str>>(names: &[S], apex: &str) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| extract_subdomain(name.as_ref(), apex))
        .filter(|sub| !sub.is_empty())
        .collect()
}

/// Predictions that are valid names under `apex`, not blocked, first
/// occurrence only.
pub fn accept_predictions(predictions: Vec<String>, apex: &str, blocked: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    predictions
        .into_iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| matches!(extract_subdomain(name, apex), Some(sub) if !sub.is_empty()))
        .filter(|name| !blocked.contains(name) && seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_syntax() {
        assert!(is_valid_subdomain("api"));
        assert!(is_valid_subdomain("dev-api.eu"));
        assert!(!is_valid_subdomain("-api"));
        assert!(!is_valid_subdomain("api."));
        assert!(!is_valid_subdomain("a..b"));
        assert!(!is_valid_subdomain("a--b"));
        assert!(!is_valid_subdomain("under_score"));
        assert!(!is_valid_subdomain(&"a".repeat(64)));
        assert!(!is_valid_subdomain(&["a"; 130].join(".")));
    }

    #[test]
    fn extraction_under_apex() {
        assert_eq!(extract_subdomain("WWW.example.com", "example.com").as_deref(), Some("www"));
        assert_eq!(extract_subdomain("*.dev.example.com", "example.com").as_deref(), Some("dev"));
        assert_eq!(extract_subdomain("example.com", "example.com").as_deref(), Some(""));
        assert_eq!(extract_subdomain("wwwexample.com", "example.com"), None);
        assert_eq!(extract_subdomain("bad_.example.com", "example.com"), None);
    }

    #[test]
    fn predictions_are_filtered() {
        let blocked: HashSet<String> = ["www.example.com".to_string()].into();
        let predictions = vec![
            "www.example.com".to_string(),
            "dev.example.com".to_string(),
            "DEV.example.com".to_string(),
            "example.com".to_string(),
            "dev.other.org".to_string(),
        ];
        assert_eq!(accept_predictions(predictions, "example.com", &blocked), vec!["dev.example.com"]);
    }

    #[test]
    fn long_predictions_are_rejected() {
        let label = "a".repeat(60);
        let full = format!("{label}.{label}.{label}.{label}.example.com");
        assert_eq!(full.len(), 255);
        assert_eq!(extract_subdomain(&full, "example.com"), None);
        assert!(accept_predictions(vec![full], "example.com", &HashSet::new()).is_empty());

        let fits = format!("{}.{label}.{label}.{label}.example.com", "a".repeat(58));
        assert_eq!(fits.len(), 253);
        assert_eq!(accept_predictions(vec![fits.clone()], "example.com", &HashSet::new()), vec![fits]);
    }
}
