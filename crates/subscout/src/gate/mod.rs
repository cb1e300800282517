pub mod dns;
pub mod puredns;

use crate::context::ScanContext;
use crate::hostname::{belongs_to, normalize};
use crate::model::{read_lines, write_lines};
use crate::modules::Module;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub use dns::BuiltinDns;
pub use puredns::PureDns;

// region:        --- Jobs

/// Normal and trusted resolver list files.
#[derive(Debug, Clone)]
pub struct ResolverLists {
    pub normal: PathBuf,
    pub trusted: PathBuf,
}

/// Resolve every name listed in `candidates`, write survivors to `output`.
#[derive(Debug, Clone)]
pub struct ResolveJob {
    pub candidates: PathBuf,
    pub resolvers: ResolverLists,
    pub output: PathBuf,
}

/// Resolve `word.domain` for every word of `wordlist` and domain of `domains`.
#[derive(Debug, Clone)]
pub struct BruteforceJob {
    pub wordlist: PathBuf,
    pub domains: PathBuf,
    pub resolvers: ResolverLists,
    pub output: PathBuf,
}

// endregion:     --- Jobs

/// DNS validation backend: candidates in, resolvable subset out.
///
/// Both operations read their input from files and write the resolvable
/// names, one per line, to the job output before returning them. Failures
/// are stage errors and are never retried here.
#[async_trait]
pub trait ResolutionGate: Module + Send + Sync {
    /// Fails when the backend can not be used at all.
    async fn ensure_available(&self) -> Result<()>;

    async fn resolve(&self, ctx: &ScanContext, job: &ResolveJob) -> Result<Vec<String>>;

    async fn bruteforce(&self, ctx: &ScanContext, job: &BruteforceJob) -> Result<Vec<String>>;
}

/// Writes `candidates` to `candidates_path`, resolves them and returns the
/// confirmed members of `apex`, normalized and deduplicated.
#[instrument(name = "gate", level = "info", skip_all, fields(gate = %gate.name()))]
pub async fn stage_and_resolve(
    gate: &dyn ResolutionGate,
    ctx: &ScanContext,
    apex: &str,
    candidates: &[String],
    resolvers: &ResolverLists,
    candidates_path: &Path,
    output: &Path,
) -> Result<Vec<String>> {
    write_lines(candidates_path, candidates)?;
    info!("{:12} - {:?}", "TO RESOLVE", candidates.len());

    let job = ResolveJob {
        candidates: candidates_path.to_path_buf(),
        resolvers: resolvers.clone(),
        output: output.to_path_buf(),
    };
    let resolved = members_only(gate.resolve(ctx, &job).await?, apex);

    info!("{:12} - {:?}/{:?}", "RESOLVED", resolved.len(), candidates.len());
    Ok(resolved)
}

/// Gate output cleaned up before it may touch a seed set.
pub fn members_only(names: Vec<String>, apex: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter_map(|name| normalize(&name))
        .filter(|name| belongs_to(name, apex) && seen.insert(name.clone()))
        .collect()
}

/// Lines of a gate output file. The first whitespace-separated field is the
/// hostname, so `name A 1.2.3.4` style output is accepted too.
pub fn read_gate_output(path: &Path) -> Result<Vec<String>> {
    Ok(read_lines(path)?
        .into_iter()
        .filter_map(|line| line.split_whitespace().next().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_output_is_filtered_to_the_apex() {
        let names = vec![
            "WWW.example.com.".to_string(),
            "www.example.com".to_string(),
            "evil.com".to_string(),
            "notexample.com".to_string(),
        ];
        assert_eq!(members_only(names, "example.com"), vec!["www.example.com"]);
    }

    #[test]
    fn reads_first_field_of_each_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "a.example.com A 1.2.3.4\n\nb.example.com\n").unwrap();
        assert_eq!(read_gate_output(&path).unwrap(), vec!["a.example.com", "b.example.com"]);
    }
}
