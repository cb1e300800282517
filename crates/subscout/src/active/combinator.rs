use crate::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Crosses a wordlist with a domain on a bounded rayon pool.
pub struct Combinator {
    pool: rayon::ThreadPool,
    levels: usize,
}

impl Combinator {
    pub fn new(threads: usize, levels: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|idx| format!("combinator-{idx}"))
            .build()?;
        Ok(Self {
            pool,
            levels: levels.max(1),
        })
    }

    /// `word.domain` for every word. Each extra level prefixes the words again
    /// onto the previous level's output.
    pub fn generate<S: AsRef<str> + Sync>(&self, words: &[S], domain: &str) -> Vec<String> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Vec::new();
        }

        let words: Vec<String> = {
            let mut seen = HashSet::new();
            words
                .iter()
                .map(|word| word.as_ref().trim().to_lowercase())
                .filter(|word| !word.is_empty() && seen.insert(word.clone()))
                .collect()
        };
        debug!("{:12} - {} words x {} level(s)", "COMBINATOR", words.len(), self.levels);

        let mut results: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = vec![domain];

        for _ in 0..self.levels {
            let next: Vec<String> = self.pool.install(|| {
                current
                    .par_iter()
                    .flat_map_iter(|base| words.iter().map(move |word| format!("{word}.{base}")))
                    .collect()
            });

            let mut level = Vec::with_capacity(next.len());
            for candidate in next {
                if seen.insert(candidate.clone()) {
                    results.push(candidate.clone());
                    level.push(candidate);
                }
            }
            current = level;
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_cross_product() {
        let combinator = Combinator::new(2, 1).unwrap();
        let out = combinator.generate(&["dev", "DEV", " api "], "example.com");
        assert_eq!(out.len(), 2);
        assert!(out.contains(&"dev.example.com".to_string()));
        assert!(out.contains(&"api.example.com".to_string()));
    }

    #[test]
    fn second_level_stacks_words() {
        let combinator = Combinator::new(2, 2).unwrap();
        let out = combinator.generate(&["a", "b"], "example.com");
        assert_eq!(out.len(), 6);
        assert!(out.contains(&"a.b.example.com".to_string()));
        assert!(out.contains(&"b.b.example.com".to_string()));
    }
}
