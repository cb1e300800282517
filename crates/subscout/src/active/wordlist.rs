use std::collections::{HashMap, HashSet};

/// Tokens mined from the labels below `apex`, most frequent first, ties in
/// lexicographic order. Numeric-only fragments are dropped.
pub fn extract_keywords<S: AsRef<str>>(hostnames: &[S], apex: &str) -> Vec<String> {
    let apex = apex.trim().to_lowercase();
    let suffix = format!(".{apex}");
    let mut counts: HashMap<String, usize> = HashMap::new();

    for hostname in hostnames {
        let host = hostname.as_ref().trim().to_lowercase();
        if host == apex {
            continue;
        }
        let labels = host.strip_suffix(&suffix).unwrap_or(&host);

        for label in labels.split('.') {
            let label = label.trim();
            if label.is_empty() || is_numeric(label) {
                continue;
            }
            for token in label.split(['-', '_', '~']) {
                if !token.is_empty() && !is_numeric(token) {
                    *counts.entry(token.to_string()).or_default() += 1;
                }
            }
        }
    }

    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|(a_word, a_count), (b_word, b_count)| {
        b_count.cmp(a_count).then_with(|| a_word.cmp(b_word))
    });
    words.into_iter().map(|(word, _)| word).collect()
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Order-preserving union of several wordlists, lowercased.
pub fn combine_wordlists<S: AsRef<str>>(lists: &[&[S]]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut combined = Vec::new();
    for list in lists {
        for word in list.iter() {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && seen.insert(word.clone()) {
                combined.push(word);
            }
        }
    }
    combined
}

/// Lowercased unique entries of a raw list, for wordlists read from disk.
pub fn unique_words<S: AsRef<str>>(words: &[S]) -> Vec<String> {
    combine_wordlists(&[words])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_from_simple_seed() {
        let words = extract_keywords(&["www.example.com", "api.example.com"], "example.com");
        assert_eq!(words, vec!["api", "www"]);
    }

    #[test]
    fn keywords_rank_by_frequency_and_split_delimiters() {
        let seed = [
            "dev-api.example.com",
            "api.eu.example.com",
            "static_01.example.com",
            "2024.example.com",
            "example.com",
        ];
        let words = extract_keywords(&seed, "example.com");
        assert_eq!(words, vec!["api", "dev", "eu", "static"]);
    }

    #[test]
    fn combine_keeps_first_order() {
        let custom = ["api", "dev"];
        let default = ["DEV", "mail"];
        assert_eq!(
            combine_wordlists(&[&custom[..], &default[..]]),
            vec!["api", "dev", "mail"]
        );
    }
}
