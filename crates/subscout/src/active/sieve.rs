use crate::{Error, Result};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Label-depth range counted from the right: `1` is the TLD, `2` the
/// registrable domain. Unbounded ends are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Level {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Level {
    pub fn exact(level: usize) -> Self {
        Self {
            min: Some(level),
            max: Some(level),
        }
    }

    fn contains(&self, level: usize) -> bool {
        self.min.map_or(true, |min| level >= min) && self.max.map_or(true, |max| level <= max)
    }
}

impl FromStr for Level {
    type Err = Error;

    /// Accepts `""`, `"n"`, `"min:max"`, `":max"` and `"min:"`.
    fn from_str(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Level::default());
        }

        let parse = |part: &str| -> Result<Option<usize>> {
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<usize>()
                .map(Some)
                .map_err(|_| Error::InvalidLevel(spec.to_string()))
        };

        match spec.split_once(':') {
            None => Ok(Level::exact(
                spec.parse().map_err(|_| Error::InvalidLevel(spec.to_string()))?,
            )),
            Some((min, max)) => {
                if max.contains(':') {
                    return Err(Error::InvalidLevel(spec.to_string()));
                }
                Ok(Level {
                    min: parse(min)?,
                    max: parse(max)?,
                })
            }
        }
    }
}

/// Labels of a hostname or URL, without scheme, port or empty labels.
fn domain_parts(input: &str) -> Vec<String> {
    let mut host = input.trim().to_string();
    if host.is_empty() {
        return Vec::new();
    }
    if host.contains("://") {
        if let Some(parsed) = Url::parse(&host).ok().and_then(|url| url.host_str().map(str::to_string)) {
            host = parsed;
        }
    }
    if let Some(idx) = host.find(':') {
        if idx > 0 {
            host.truncate(idx);
        }
    }
    host.split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Emits every suffix of every input whose depth falls in `level`, in first
/// seen order.
///
/// With `top > 0`, suffix frequencies are counted at every depth and only the
/// `top` most frequent suffixes at the depth of `level.min` are kept; results
/// must equal or sit under one of them. Without a lower bound no suffix
/// qualifies and the result is empty.
pub fn sieve<S: AsRef<str>>(hostnames: &[S], level: Level, top: usize) -> Vec<String> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for hostname in hostnames {
        let parts = domain_parts(hostname.as_ref());
        if parts.is_empty() {
            continue;
        }

        for i in 0..parts.len() {
            let suffix = parts[i..].join(".");
            if top > 0 {
                *counts.entry(suffix.clone()).or_default() += 1;
            }
            if level.contains(parts.len() - i) && seen.insert(suffix.clone()) {
                results.push(suffix);
            }
        }
    }

    if top > 0 && !counts.is_empty() {
        let target_level = level.min.unwrap_or(0);
        results = keep_top(results, counts, top, target_level);
    }

    results
}

fn keep_top(results: Vec<String>, counts: HashMap<String, usize>, top: usize, target_level: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(domain, _)| domain.split('.').count() == target_level)
        .collect();
    ranked.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then_with(|| a.cmp(b)));
    ranked.truncate(top);

    let tops: Vec<String> = ranked.into_iter().map(|(domain, _)| domain).collect();
    results
        .into_iter()
        .filter(|domain| {
            tops.iter()
                .any(|top| domain == top || domain.ends_with(&format!(".{top}")))
        })
        .collect()
}

// region:        --- Tests


// endregion:     --- Tests
