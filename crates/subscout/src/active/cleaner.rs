use lazy_regex::{regex, Lazy, Regex};
use std::collections::BTreeSet;

/// Rejection rules, any match drops the line.
fn rules() -> [&'static Lazy<Regex>; 12] {
    [
        // noisy characters
        regex!(r"[!(,%]"),
        // overly specific lines
        regex!(r".{101,}"),
        // likely ids
        regex!(r"[0-9]{4,}"),
        regex!(r"[0-9]{3,}$"),
        // hashes
        regex!(r"[a-z0-9]{32}"),
        regex!(r"[0-9]+[A-Z0-9]{5,}"),
        // deep paths
        regex!(r"/.*/.*/.*/.*/.*/.*/"),
        // uuids
        regex!(r"\w{8}-\w{4}-\w{4}-\w{4}-\w{12}"),
        regex!(r"[0-9]+[a-zA-Z]+[0-9]+[a-zA-Z]+[0-9]+"),
        // low value file types
        regex!(r"\.(png|jpg|jpeg|gif|svg|bmp|ttf|avif|wav|mp4|aac|ajax|css|all)$"),
        regex!(r"^$"),
        regex!(r"^\s+$"),
    ]
}

pub fn is_noise(line: &str) -> bool {
    rules().iter().any(|rule| rule.is_match(line))
}

/// Drops noisy tokens, then dedupes and sorts what is left.
pub fn clean_wordlist<S: AsRef<str>>(words: &[S]) -> Vec<String> {
    words
        .iter()
        .map(AsRef::as_ref)
        .filter(|word| !is_noise(word))
        .map(str::to_string)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_hash_like_tokens() {
        let token = "0123456789abcdef0123456789abcdef0";
        assert_eq!(token.len(), 33);
        assert!(is_noise(token));
    }

    #[test]
    fn rejects_digit_runs() {
        assert!(is_noise("build-12345-x"));
        assert!(is_noise("12345"));
        assert!(is_noise("node123"));
    }

    #[test]
    fn accepts_plain_words() {
        assert!(!is_noise("staging-api"));
        assert!(!is_noise("mail2"));
    }

    #[test]
    fn rejects_misc_noise() {
        assert!(is_noise(""));
        assert!(is_noise("logo.png"));
        assert!(is_noise("a(b"));
        assert!(is_noise(&"x".repeat(101)));
        assert!(!is_noise(&"x".repeat(100)));
        assert!(is_noise("deadbeef-dead-beef-dead-beefdeadbeef"));
    }

    #[test]
    fn clean_sorts_and_dedupes() {
        let cleaned = clean_wordlist(&["dev", "api", "dev", "", "abc12345"]);
        assert_eq!(cleaned, vec!["api", "dev"]);
    }
}
