use super::{read_gate_output, BruteforceJob, ResolutionGate, ResolveJob, ResolverLists};
use crate::context::ScanContext;
use crate::modules::Module;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

const BINARY: &str = "puredns";
const INSTALL_TARGET: &str = "github.com/d3mondev/puredns/v2@latest";

// region:        --- Module info

/// Drives the external `puredns` binary.
pub struct PureDns {
    auto_install: bool,
}

impl PureDns {
    pub fn new(auto_install: bool) -> Self {
        Self { auto_install }
    }
}

impl Module for PureDns {
    fn name(&self) -> String {
        "gate/puredns".to_string()
    }

    fn description(&self) -> String {
        "Resolve and bruteforce with puredns (wildcard filtering)".to_string()
    }
}

// endregion:     --- Module info

/// `PATH`, then `$GOPATH/bin`, then `$HOME/go/bin`.
pub fn locate_binary(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    let mut candidates = Vec::new();
    if let Some(gopath) = std::env::var_os("GOPATH").filter(|v| !v.is_empty()) {
        candidates.push(Path::new(&gopath).join("bin").join(name));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        candidates.push(Path::new(&home).join("go").join("bin").join(name));
    }
    candidates.into_iter().find(|path| path.is_file())
}

fn rate_args(resolvers: &ResolverLists) -> Vec<String> {
    vec![
        "-r".to_string(),
        resolvers.normal.display().to_string(),
        "--resolvers-trusted".to_string(),
        resolvers.trusted.display().to_string(),
        "-l".to_string(),
        "100".to_string(),
        "--rate-limit-trusted".to_string(),
        "100".to_string(),
        "--wildcard-tests".to_string(),
        "30".to_string(),
        "--wildcard-batch".to_string(),
        "1000000".to_string(),
    ]
}

pub fn resolve_args(job: &ResolveJob) -> Vec<String> {
    let mut args = vec![
        "resolve".to_string(),
        job.candidates.display().to_string(),
        "-w".to_string(),
        job.output.display().to_string(),
    ];
    args.extend(rate_args(&job.resolvers));
    args
}

pub fn bruteforce_args(job: &BruteforceJob) -> Vec<String> {
    let mut args = vec![
        "bruteforce".to_string(),
        job.wordlist.display().to_string(),
        "--domains".to_string(),
        job.domains.display().to_string(),
    ];
    args.extend(rate_args(&job.resolvers));
    args.push("-w".to_string());
    args.push(job.output.display().to_string());
    args
}

impl PureDns {
    fn binary(&self) -> Result<PathBuf> {
        locate_binary(BINARY).ok_or_else(|| Error::ToolNotFound(BINARY.to_string()))
    }

    async fn install(&self) -> Result<()> {
        info!("{:12} - {}", "INSTALL", INSTALL_TARGET);
        let status = Command::new("go")
            .args(["install", INSTALL_TARGET])
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|err| Error::ToolNotFound(format!("go ({err})")))?;

        if !status.success() {
            return Err(Error::ToolFailed(format!("go install exited with {status}")));
        }
        Ok(())
    }

    /// Runs puredns until it exits or the scan context finishes. The child is
    /// killed when the context wins.
    async fn run(&self, ctx: &ScanContext, args: Vec<String>, output: &Path) -> Result<Vec<String>> {
        if ctx.is_done() {
            return Err(Error::Cancelled);
        }
        let binary = self.binary()?;
        debug!("{:12} - {} {}", "EXEC", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if !status.success() {
                    return Err(Error::ToolFailed(format!("{BINARY} exited with {status}")));
                }
            }
            _ = ctx.done() => {
                warn!("{:12} - killing {}", "DEADLINE", BINARY);
                return Err(Error::Cancelled);
            }
        }

        read_gate_output(output)
    }
}

#[async_trait]
impl ResolutionGate for PureDns {
    async fn ensure_available(&self) -> Result<()> {
        if let Some(path) = locate_binary(BINARY) {
            debug!("{:12} - {}", "FOUND", path.display());
            return Ok(());
        }
        if !self.auto_install {
            return Err(Error::ToolNotFound(BINARY.to_string()));
        }
        self.install().await?;
        self.binary().map(|_| ())
    }

    #[instrument(name = "puredns_resolve", level = "debug", skip_all)]
    async fn resolve(&self, ctx: &ScanContext, job: &ResolveJob) -> Result<Vec<String>> {
        self.run(ctx, resolve_args(job), &job.output).await
    }

    #[instrument(name = "puredns_bruteforce", level = "debug", skip_all)]
    async fn bruteforce(&self, ctx: &ScanContext, job: &BruteforceJob) -> Result<Vec<String>> {
        self.run(ctx, bruteforce_args(job), &job.output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists() -> ResolverLists {
        ResolverLists {
            normal: PathBuf::from("r.txt"),
            trusted: PathBuf::from("t.txt"),
        }
    }

    #[test]
    fn resolve_command_line() {
        let job = ResolveJob {
            candidates: PathBuf::from("in.txt"),
            resolvers: lists(),
            output: PathBuf::from("out.txt"),
        };
        assert_eq!(
            resolve_args(&job).join(" "),
            "resolve in.txt -w out.txt -r r.txt --resolvers-trusted t.txt -l 100 \
             --rate-limit-trusted 100 --wildcard-tests 30 --wildcard-batch 1000000"
        );
    }

    #[test]
    fn bruteforce_command_line() {
        let job = BruteforceJob {
            wordlist: PathBuf::from("words.txt"),
            domains: PathBuf::from("domains.txt"),
            resolvers: lists(),
            output: PathBuf::from("out.txt"),
        };
        let args = bruteforce_args(&job);
        assert_eq!(&args[..4], &["bruteforce", "words.txt", "--domains", "domains.txt"]);
        assert_eq!(&args[args.len() - 2..], &["-w", "out.txt"]);
    }

    #[tokio::test]
    async fn cancelled_context_skips_the_run() {
        let ctx = ScanContext::unbounded();
        ctx.cancel();
        let gate = PureDns::new(false);
        let job = ResolveJob {
            candidates: PathBuf::from("in.txt"),
            resolvers: lists(),
            output: PathBuf::from("out.txt"),
        };
        assert!(matches!(gate.resolve(&ctx, &job).await, Err(Error::Cancelled)));
    }
}
