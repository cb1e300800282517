use crate::Result;
use lazy_regex::regex;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_PERMUTATIONS: [&str; 10] = [
    "prod",
    "dev",
    "stage",
    "infra",
    "cfg",
    "ops",
    "production",
    "staging",
    "static",
    "admin",
];

const ALL_JOINS: &[&str] = &[".", "-", ""];

/// Mutates known hostnames with a token set, recursing up to `depth` levels.
pub struct Permutator {
    tokens: Vec<String>,
    depth: usize,
    numbers: u32,
    pool: rayon::ThreadPool,
}

impl Permutator {
    pub fn new(tokens: Vec<String>, depth: usize, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|idx| format!("permutator-{idx}"))
            .build()?;
        Ok(Self {
            tokens: tokens.into_iter().filter(|t| !t.is_empty()).collect(),
            depth,
            numbers: 0,
            pool,
        })
    }

    pub fn with_defaults(depth: usize, threads: usize) -> Result<Self> {
        Self::new(
            DEFAULT_PERMUTATIONS.iter().map(|t| t.to_string()).collect(),
            depth,
            threads,
        )
    }

    /// Also emits numeric neighbours (+/- 1..=n) of digit runs in the first label.
    pub fn with_numbers(mut self, numbers: u32) -> Self {
        self.numbers = numbers;
        self
    }

    /// Candidates derived from `hostnames`. Never returns an input hostname
    /// and never returns the same candidate twice.
    pub fn permute<S: AsRef<str> + Sync>(&self, hostnames: &[S]) -> Vec<String> {
        let hosts: Vec<String> = hostnames
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| h.split('.').count() >= 2 && !h.starts_with('#'))
            .collect();
        let known: HashSet<&str> = hosts.iter().map(String::as_str).collect();

        let per_host: Vec<Vec<String>> = self.pool.install(|| {
            hosts
                .par_iter()
                .map(|host| {
                    let mut out = self.expand(host, &known);
                    if self.numbers > 0 {
                        out.extend(number_variants(host, self.numbers));
                    }
                    out
                })
                .collect()
        });

        let mut seen: HashSet<String> = HashSet::new();
        let results: Vec<String> = per_host
            .into_iter()
            .flatten()
            .filter(|candidate| !known.contains(candidate.as_str()) && seen.insert(candidate.clone()))
            .collect();

        debug!("{:12} - {:?}", "PERMUTATIONS", results.len());
        results
    }

    /// Work queue over `(hostname, remaining depth)`.
    fn expand(&self, host: &str, known: &HashSet<&str>) -> Vec<String> {
        let mut results = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: Vec<(String, usize)> = vec![(host.to_string(), self.depth)];

        while let Some((current, depth)) = queue.pop() {
            if depth < 1 {
                continue;
            }
            for token in &self.tokens {
                for join in joins(&current, token) {
                    let candidate = format!("{token}{join}{current}");
                    if known.contains(candidate.as_str()) || !seen.insert(candidate.clone()) {
                        continue;
                    }
                    if depth > 1 {
                        queue.push((candidate.clone(), depth - 1));
                    }
                    results.push(candidate);
                }
            }
        }

        results
    }
}

/// Joins that do not produce an obvious near-duplicate of `host`.
fn joins(host: &str, token: &str) -> &'static [&'static str] {
    let ends_with_digit = |value: &str| value.ends_with(|c: char| c.is_ascii_digit());

    if host.starts_with(|c: char| c.is_ascii_digit()) {
        return if ends_with_digit(token) { &[] } else { ALL_JOINS };
    }

    let first = host.split('.').next().unwrap_or(host);
    if first == token {
        return &[];
    }
    if token.len() >= 4 && first.starts_with(token) {
        return &[".", "-"];
    }

    let first = strip_digits(first);
    let token = strip_digits(token);
    if first == token {
        &[]
    } else if first.ends_with(&token) {
        &["."]
    } else {
        ALL_JOINS
    }
}

fn strip_digits(value: &str) -> String {
    value.chars().filter(|c| !c.is_ascii_digit()).collect()
}

fn number_variants(host: &str, numbers: u32) -> Vec<String> {
    let Some((first, rest)) = host.split_once('.') else {
        return Vec::new();
    };

    let mut variants = Vec::new();
    for run in regex!(r"[0-9]+").find_iter(first) {
        let Ok(value) = run.as_str().parse::<u64>() else {
            continue;
        };
        for step in 1..=u64::from(numbers) {
            let neighbours = [value.checked_add(step), value.checked_sub(step)];
            for n in neighbours.into_iter().flatten() {
                let label = format!("{}{}{}", &first[..run.start()], n, &first[run.end()..]);
                variants.push(format!("{label}.{rest}"));
            }
        }
    }
    variants
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn joins_follow_overlap_rules() {
        assert_eq!(joins("api.example.com", "dev"), ALL_JOINS);
        assert!(joins("dev.example.com", "dev").is_empty());
        assert_eq!(joins("staging2.example.com", "stag"), &[".", "-"]);
        assert!(joins("dev1.example.com", "dev2").is_empty());
        assert_eq!(joins("mydev.example.com", "dev"), &["."]);
        assert!(joins("1api.example.com", "dev2").is_empty());
        assert_eq!(joins("1api.example.com", "dev"), ALL_JOINS);
    }

    #[test]
    fn single_depth_variants() {
        let permutator = Permutator::new(tokens(&["dev"]), 1, 2).unwrap();
        let out = permutator.permute(&["api.example.com"]);
        assert_eq!(
            out,
            vec!["dev.api.example.com", "dev-api.example.com", "devapi.example.com"]
        );
    }

    #[test]
    fn never_repeats_or_returns_seed() {
        let seed = ["api.example.com", "dev.api.example.com", "www.example.com"];
        let permutator = Permutator::new(tokens(&["dev", "ops", "prod"]), 2, 4).unwrap();
        let out = permutator.permute(&seed);

        let unique: HashSet<&String> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
        for host in seed {
            assert!(!out.iter().any(|c| c == host));
        }
        assert!(out.contains(&"ops.dev-api.example.com".to_string()));
    }

    #[test]
    fn numeric_neighbours() {
        let permutator = Permutator::new(Vec::new(), 1, 1).unwrap().with_numbers(1);
        let out = permutator.permute(&["web2.example.com"]);
        assert_eq!(out, vec!["web3.example.com", "web1.example.com"]);
    }

    #[test]
    fn numeric_neighbours_stop_at_u64_bounds() {
        let permutator = Permutator::new(Vec::new(), 1, 1).unwrap().with_numbers(1);
        let out = permutator.permute(&["web18446744073709551615.example.com"]);
        assert_eq!(out, vec!["web18446744073709551614.example.com"]);

        let out = permutator.permute(&["web0.example.com"]);
        assert_eq!(out, vec!["web1.example.com"]);
    }

    #[test]
    fn skips_single_label_inputs() {
        let permutator = Permutator::with_defaults(1, 1).unwrap();
        assert!(permutator.permute(&["localhost"]).is_empty());
    }
}

// endregion:     --- Tests
