use crate::active::downloader::Downloader;
use crate::active::ActivePipeline;
use crate::config::{Config, ResolverBackend};
use crate::context::ScanContext;
use crate::gate::{BuiltinDns, PureDns, ResolutionGate};
use crate::hostname::SeedSet;
use crate::model::{ScanResult, SourceStat};
use crate::modules::{select_sources, Session, SourceModule};
use crate::output::Reporter;
use crate::passive::{collect_passive, PassiveEngine};
use crate::predictor::{ModelLoop, Predictor, ScriptPredictor};
use crate::probe::probe_web_services;
use crate::tracking::{JsonTracker, Tracker};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

// region:        --- Provenance

pub const ACTIVE_SOURCE: &str = "active";
pub const MODEL_SOURCE: &str = "llm";

// endregion:     --- Provenance

/// Per-run switches coming from the command line.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub active: bool,
    pub deep: bool,
    pub model: bool,
    pub probe: bool,
    pub wordlist: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Runs every stage of a scan, one target domain at a time.
///
/// Collaborators are built from the config and can be swapped before the
/// first scan.
pub struct Scanner {
    config: Config,
    options: ScanOptions,
    session: Session,
    passive: PassiveEngine,
    gate: Arc<dyn ResolutionGate>,
    predictor: Arc<dyn Predictor>,
    tracker: Option<Arc<dyn Tracker>>,
    reporter: Option<Reporter>,
}

impl Scanner {
    pub fn new(config: Config, options: ScanOptions) -> Result<Self> {
        let session = Session::new(&config)?;
        let sources = select_sources(&session, &options.include, &options.exclude);

        let settings = &config.active_enumeration;
        let gate: Arc<dyn ResolutionGate> = match settings.resolver {
            ResolverBackend::Puredns => Arc::new(PureDns::new(settings.auto_install)),
            ResolverBackend::Builtin => Arc::new(BuiltinDns::new(settings.threads)),
        };
        let llm = &config.llm_enumeration;
        let predictor: Arc<dyn Predictor> = Arc::new(ScriptPredictor::new(llm.python.clone(), llm.script.clone()));
        let tracker: Option<Arc<dyn Tracker>> = config
            .tracking
            .enabled
            .then(|| Arc::new(JsonTracker::new(config.tracking.path.clone())) as Arc<dyn Tracker>);

        Ok(Self {
            passive: PassiveEngine::new(session.clone(), sources),
            config,
            options,
            session,
            gate,
            predictor,
            tracker,
            reporter: None,
        })
    }

    pub fn with_sources(mut self, sources: Vec<Arc<dyn SourceModule>>) -> Self {
        self.passive = PassiveEngine::new(self.session.clone(), sources);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn ResolutionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_tracker(mut self, tracker: Option<Arc<dyn Tracker>>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    fn active_wanted(&self) -> bool {
        self.options.active || self.options.deep || self.config.active_enumeration.enabled
    }

    fn model_wanted(&self) -> bool {
        self.options.model || self.config.llm_enumeration.enabled
    }

    /// Checks done once before any domain is scanned. Every error here is fatal.
    pub async fn prepare(&self) -> Result<()> {
        let names = self.passive.source_names();
        if names.is_empty() {
            warn!("{:12} - no passive source enabled", "SOURCES");
        } else {
            info!("{:12} - {}", "SOURCES", names.join(", "));
        }

        if let Some(wordlist) = &self.options.wordlist {
            if !wordlist.is_file() {
                return Err(Error::Config(format!("wordlist not found: {}", wordlist.display())));
            }
        }
        if self.active_wanted() || self.model_wanted() {
            self.gate.ensure_available().await?;
        }
        if self.model_wanted() {
            self.predictor.ensure_available().await?;
        }
        Ok(())
    }

    pub async fn run_scan(&self, domain: &str) -> ScanResult {
        let ctx = ScanContext::new(self.config.timeout());
        self.run_scan_with(&ctx, domain).await
    }

    /// Passive, model after passive, active, model after active, then
    /// probing and tracking. Stage failures are recorded, never returned.
    #[instrument(name = "scan", level = "info", skip_all, fields(domain = domain))]
    pub async fn run_scan_with(&self, ctx: &ScanContext, domain: &str) -> ScanResult {
        let start = Instant::now();
        let domain = domain.trim().to_lowercase();
        let mut seed = SeedSet::new(&domain);
        let mut errors = Vec::new();

        // -- passive
        let stats = collect_passive(self.passive.run(ctx, &domain), &mut seed, self.reporter.as_ref()).await;
        if let Some(err) = passive_failure(&stats, seed.len()) {
            record(&mut errors, "passive reconnaissance", err);
        }

        // -- growth loops
        let llm = &self.config.llm_enumeration;
        if self.model_wanted() && llm.run_after_passive {
            self.model_stage(ctx, &mut seed, &mut errors).await;
        }
        if self.active_wanted() {
            self.active_stage(ctx, &mut seed, &mut errors).await;
        }
        if self.model_wanted() && llm.run_after_active {
            self.model_stage(ctx, &mut seed, &mut errors).await;
        }

        let mut result = ScanResult::from_seed(seed, start.elapsed());
        result.source_stats = stats;
        result.errors = errors;
        result.evaluate_success();

        // -- probe
        if self.options.probe && result.total_subdomains() > 0 {
            result.web_services = probe_web_services(ctx, &self.session.http_client, &result.subdomains).await;
        }

        // -- tracking
        if let Some(tracker) = &self.tracker {
            if let Err(err) = tracker.track_subdomains(&domain, &result.subdomains) {
                error!("{:12} - {}", "TRACKING", err);
            }
        }

        result.duration = start.elapsed();
        info!("{:12} - {} in {:?}", "SCAN DONE", result.total_subdomains(), result.duration);
        result
    }

    async fn active_stage(&self, ctx: &ScanContext, seed: &mut SeedSet, errors: &mut Vec<String>) {
        if ctx.is_done() {
            record(errors, "active enumeration", Error::Cancelled);
            return;
        }
        let pipeline = ActivePipeline::new(
            self.config.active_enumeration.clone(),
            self.gate.clone(),
            Downloader::new(self.session.http_client.clone()),
        )
        .with_wordlist(self.options.wordlist.clone())
        .with_deep(self.options.deep);

        let apex = seed.apex().to_string();
        let outcome = pipeline.run(ctx, seed.hostnames(), &apex).await;
        for err in outcome.errors {
            record(errors, "active enumeration", err);
        }
        self.merge(seed, &outcome.resolved, ACTIVE_SOURCE);
    }

    async fn model_stage(&self, ctx: &ScanContext, seed: &mut SeedSet, errors: &mut Vec<String>) {
        let model = ModelLoop::new(
            self.config.llm_enumeration.clone(),
            self.config.active_enumeration.output_dir.clone(),
            self.predictor.clone(),
            self.gate.clone(),
            Downloader::new(self.session.http_client.clone()),
        );

        let apex = seed.apex().to_string();
        match model.run(ctx, seed.hostnames(), &apex).await {
            Ok(outcome) => {
                for err in outcome.errors {
                    record(errors, "llm enumeration", err);
                }
                self.merge(seed, &outcome.resolved, MODEL_SOURCE);
            }
            Err(err) => record(errors, "llm enumeration", err),
        }
    }

    /// Adds confirmed names to the seed set, reporting the new ones.
    fn merge(&self, seed: &mut SeedSet, names: &[String], source: &str) {
        let added = seed.extend(names, source);
        info!("{:12} - {} +{}", "MERGED", source, added.len());
        if let Some(reporter) = &self.reporter {
            for host in &added {
                reporter.found(host, seed.apex(), source);
            }
        }
    }
}

fn record(errors: &mut Vec<String>, stage: &str, err: impl std::fmt::Display) {
    let message = format!("{stage} failed: {err}");
    warn!("{:12} - {}", "STAGE", message);
    errors.push(message);
}

/// Passive reconnaissance only fails when every source failed and nothing
/// was found.
fn passive_failure(stats: &[SourceStat], found: usize) -> Option<String> {
    if found > 0 || stats.is_empty() {
        return None;
    }
    if stats.iter().all(|stat| stat.errors > 0 || stat.cancelled) {
        return Some(format!("all {} sources failed", stats.len()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stat(results: usize, errors: usize) -> SourceStat {
        SourceStat {
            name: "s".into(),
            duration: Duration::ZERO,
            results,
            errors,
            cancelled: false,
        }
    }

    #[test]
    fn passive_fails_only_when_every_source_failed() {
        assert!(passive_failure(&[stat(0, 1), stat(0, 2)], 0).is_some());
        assert!(passive_failure(&[stat(0, 1), stat(0, 0)], 0).is_none());
        assert!(passive_failure(&[stat(0, 1)], 3).is_none());
        assert!(passive_failure(&[], 0).is_none());
    }

    #[test]
    fn stage_errors_are_prefixed() {
        let mut errors = Vec::new();
        record(&mut errors, "active enumeration", Error::Cancelled);
        assert_eq!(errors, vec!["active enumeration failed: scan deadline reached"]);
    }
}
