pub mod cleaner;
pub mod combinator;
mod deep;
pub mod downloader;
pub mod permutation;
mod pipeline;
pub mod resolvers;
pub mod sieve;
pub mod wordlist;

pub use pipeline::{ActiveOutcome, ActivePipeline};

use crate::model::ensure_dir;
use crate::Result;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::info;

// region:        --- Staging files

pub const PASSIVE_FILE: &str = "passive_subdomains.txt";
pub const CUSTOM_WORDLIST_FILE: &str = "custom_wordlist.txt";
pub const DEFAULT_WORDLIST_FILE: &str = "six2dez_wordlist.txt";
pub const COMBINED_WORDLIST_FILE: &str = "combined_wordlist.txt";
pub const COMBINATOR_FILE: &str = "mksub_output.txt";
pub const CANDIDATES_FILE: &str = "all_subdomains.txt";
pub const RESOLVED_FILE: &str = "resolved_subdomains.txt";
pub const PERMUTATIONS_FILE: &str = "gotator_output.txt";
pub const PERMUTATIONS_RESOLVED_FILE: &str = "gotator_resolved.txt";
pub const FINAL_FILE: &str = "final_subdomains.txt";

pub fn sieve_file(factor: usize) -> String {
    format!("dsieve_f{factor}.txt")
}

// endregion:     --- Staging files

/// Per-domain staging directory, `<output_dir>/<domain>/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn create(output_dir: &Path, domain: &str) -> Result<Self> {
        let dir = output_dir.join(domain);
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Uniformly samples `cap` candidates when there are more.
pub fn sample_cap(mut candidates: Vec<String>, cap: usize) -> Vec<String> {
    let total = candidates.len();
    if cap == 0 || total <= cap {
        info!("{:12} - {:?}", "CANDIDATES", total);
        return candidates;
    }
    candidates.shuffle(&mut rand::rng());
    candidates.truncate(cap);
    info!("{:12} - limited to {} (from {} total)", "CANDIDATES", cap, total);
    candidates
}
