use super::cleaner::clean_wordlist;
use super::combinator::Combinator;
use super::downloader::{Downloader, SIX2DEZ_WORDLIST_URL};
use super::permutation::Permutator;
use super::resolvers::prepare_resolvers;
use super::sieve::{sieve, Level};
use super::wordlist::{combine_wordlists, extract_keywords, unique_words};
use super::*;
use crate::config::ActiveEnumeration;
use crate::context::ScanContext;
use crate::gate::{stage_and_resolve, ResolutionGate, ResolverLists};
use crate::hostname::merge_unique;
use crate::model::{read_lines, write_lines};
use crate::{Error, Result};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const FIRST_SIEVE_FACTOR: usize = 3;

/// Names confirmed by the active stages plus the stage errors met on the way.
#[derive(Debug, Default)]
pub struct ActiveOutcome {
    pub resolved: Vec<String>,
    pub errors: Vec<String>,
}

impl ActiveOutcome {
    fn record(&mut self, stage: &str, err: impl Display) {
        record_error(&mut self.errors, stage, err);
    }
}

pub(super) fn record_error(errors: &mut Vec<String>, stage: &str, err: impl Display) {
    error!("{:12} - {}: {}", "STAGE FAILED", stage, err);
    errors.push(format!("{stage}: {err}"));
}

/// Wordlist mining, sieving, combination and permutation around two
/// resolution passes, plus the optional deep bruteforce.
pub struct ActivePipeline {
    pub(super) settings: ActiveEnumeration,
    pub(super) wordlist: Option<PathBuf>,
    pub(super) deep: bool,
    pub(super) gate: Arc<dyn ResolutionGate>,
    pub(super) downloader: Downloader,
}

impl ActivePipeline {
    pub fn new(
        settings: ActiveEnumeration,
        gate: Arc<dyn ResolutionGate>,
        downloader: Downloader,
    ) -> Self {
        Self {
            settings,
            wordlist: None,
            deep: false,
            gate,
            downloader,
        }
    }

    /// User wordlist replacing the default download.
    pub fn with_wordlist(mut self, wordlist: Option<PathBuf>) -> Self {
        self.wordlist = wordlist;
        self
    }

    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Never fails as a whole: each failing stage is recorded and the
    /// pipeline keeps whatever it had resolved so far.
    #[instrument(name = "active", level = "info", skip_all, fields(domain = apex))]
    pub async fn run(&self, ctx: &ScanContext, seed: &[String], apex: &str) -> ActiveOutcome {
        let mut outcome = ActiveOutcome::default();
        if seed.is_empty() {
            info!("{:12} - no seed, skipping", "ACTIVE");
            return outcome;
        }

        let workspace = match Workspace::create(&self.settings.output_dir, apex) {
            Ok(workspace) => workspace,
            Err(err) => {
                outcome.record("workspace", err);
                return outcome;
            }
        };

        // -- candidates
        let candidates = match self.candidates(&workspace, seed, apex).await {
            Ok(candidates) => candidates,
            Err(err) => {
                outcome.record("candidates", err);
                seed.to_vec()
            }
        };
        let candidates = sample_cap(candidates, self.settings.max_candidates);

        // -- first resolution
        if ctx.is_done() {
            outcome.record("resolve", Error::Cancelled);
            return outcome;
        }
        let resolvers = match prepare_resolvers(&self.downloader, workspace.dir()).await {
            Ok(resolvers) => resolvers,
            Err(err) => {
                outcome.record("resolvers", err);
                return outcome;
            }
        };
        let resolved = match stage_and_resolve(
            self.gate.as_ref(),
            ctx,
            apex,
            &candidates,
            &resolvers,
            &workspace.path(CANDIDATES_FILE),
            &workspace.path(RESOLVED_FILE),
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(err) => {
                outcome.record("resolve", err);
                return outcome;
            }
        };
        outcome.resolved = resolved.clone();

        // -- permutations
        match self.permutations(ctx, &workspace, &resolvers, &resolved, apex).await {
            Ok(permuted) => {
                outcome.resolved = merge_unique(&[&outcome.resolved[..], &permuted[..]]);
            }
            Err(err) => outcome.record("permutations", err),
        }
        info!("{:12} - {:?}", "ACTIVE TOTAL", outcome.resolved.len());

        // -- deep
        if self.deep {
            let found = self
                .run_deep(ctx, &workspace, &resolvers, &outcome.resolved, apex, &mut outcome.errors)
                .await;
            info!("{:12} - {:?}", "DEEP FOUND", found.len());
            outcome.resolved = merge_unique(&[&outcome.resolved[..], &found[..]]);
        }

        outcome
    }

    /// Seed, sieved zones and combined words crossed with the apex.
    async fn candidates(&self, workspace: &Workspace, seed: &[String], apex: &str) -> Result<Vec<String>> {
        write_lines(&workspace.path(PASSIVE_FILE), seed)?;

        let keywords = extract_keywords(seed, apex);
        let cleaned = clean_wordlist(&keywords);
        write_lines(&workspace.path(CUSTOM_WORDLIST_FILE), &cleaned)?;
        info!(
            "{:12} - {} keywords ({} noise removed)",
            "WORDLIST",
            cleaned.len(),
            keywords.len().saturating_sub(cleaned.len())
        );

        let mut sieved = Vec::new();
        for factor in [FIRST_SIEVE_FACTOR, self.settings.dsieve_factor] {
            let zones = sieve(seed, Level::exact(factor), self.settings.dsieve_top);
            write_lines(&workspace.path(&sieve_file(factor)), &zones)?;
            info!("{:12} - f{} {:?}", "SIEVE", factor, zones.len());
            sieved = merge_unique(&[&sieved[..], &zones[..]]);
        }

        let base = match self.base_wordlist(workspace).await {
            Ok(base) => base,
            Err(err) => {
                warn!("{:12} - {}", "WORDLIST", err);
                Vec::new()
            }
        };
        let combined = combine_wordlists(&[&cleaned[..], &base[..]]);
        write_lines(&workspace.path(COMBINED_WORDLIST_FILE), &combined)?;

        let (threads, domain) = (self.settings.threads, apex.to_string());
        let generated = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            Ok(Combinator::new(threads, 1)?.generate(&combined, &domain))
        })
        .await??;
        write_lines(&workspace.path(COMBINATOR_FILE), &generated)?;
        info!("{:12} - {:?}", "COMBINATOR", generated.len());

        Ok(merge_unique(&[seed, &sieved[..], &generated[..]]))
    }

    async fn base_wordlist(&self, workspace: &Workspace) -> Result<Vec<String>> {
        let words = match &self.wordlist {
            Some(path) => {
                if !path.is_file() {
                    return Err(Error::Config(format!("wordlist not found: {}", path.display())));
                }
                read_lines(path)?
            }
            None => {
                self.downloader
                    .cached_lines(SIX2DEZ_WORDLIST_URL, &workspace.path(DEFAULT_WORDLIST_FILE))
                    .await?
            }
        };
        info!("{:12} - {:?} base words", "WORDLIST", words.len());
        Ok(unique_words(&words))
    }

    async fn permutations(
        &self,
        ctx: &ScanContext,
        workspace: &Workspace,
        resolvers: &ResolverLists,
        resolved: &[String],
        apex: &str,
    ) -> Result<Vec<String>> {
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        if ctx.is_done() {
            return Err(Error::Cancelled);
        }

        let (depth, threads, numbers) = (
            self.settings.permutation_depth,
            self.settings.permutation_threads,
            self.settings.permutation_numbers,
        );
        let input = resolved.to_vec();
        let permuted = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            Ok(Permutator::with_defaults(depth, threads)?
                .with_numbers(numbers)
                .permute(&input))
        })
        .await??;
        info!("{:12} - {:?}", "PERMUTATIONS", permuted.len());

        stage_and_resolve(
            self.gate.as_ref(),
            ctx,
            apex,
            &permuted,
            resolvers,
            &workspace.path(PERMUTATIONS_FILE),
            &workspace.path(PERMUTATIONS_RESOLVED_FILE),
        )
        .await
    }
}
