use crate::context::ScanContext;
use crate::hostname::SeedSet;
use crate::model::{SourceResult, SourceStat};
use crate::modules::{Session, SourceModule};
use crate::output::Reporter;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

// region:        --- Constants

const AGGREGATE_CHANNEL_CAPACITY: usize = 1024;
const SOURCE_CHANNEL_CAPACITY: usize = 256;

// endregion:     --- Constants

/// Merged stream of every source plus the statistics, available once all
/// sources are done.
pub struct PassiveRun {
    pub results: ReceiverStream<SourceResult>,
    pub stats: JoinHandle<Vec<SourceStat>>,
}

/// Runs all selected sources side by side against one domain.
pub struct PassiveEngine {
    session: Arc<Session>,
    sources: Vec<Arc<dyn SourceModule>>,
}

impl PassiveEngine {
    pub fn new(session: Session, sources: Vec<Arc<dyn SourceModule>>) -> Self {
        Self {
            session: Arc::new(session),
            sources,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// One worker per source. The stream closes when the last worker is done,
    /// or when the context finishes, whichever comes first.
    pub fn run(&self, ctx: &ScanContext, domain: &str) -> PassiveRun {
        let (tx, rx) = mpsc::channel(AGGREGATE_CHANNEL_CAPACITY);

        let workers: Vec<JoinHandle<SourceStat>> = self
            .sources
            .iter()
            .map(|source| {
                let worker = relay(source.clone(), self.session.clone(), ctx.clone(), domain.to_string(), tx.clone());
                tokio::spawn(worker)
            })
            .collect();
        drop(tx);

        let stats = tokio::spawn(async move {
            let mut stats = Vec::with_capacity(workers.len());
            for worker in workers {
                match worker.await {
                    Ok(stat) => stats.push(stat),
                    Err(err) => warn!("{:12} - {}", "SOURCE PANIC", err),
                }
            }
            stats
        });

        PassiveRun {
            results: ReceiverStream::new(rx),
            stats,
        }
    }
}

/// Forwards one source's items to the shared channel, counting them.
async fn relay(
    source: Arc<dyn SourceModule>,
    session: Arc<Session>,
    ctx: ScanContext,
    domain: String,
    out: Sender<SourceResult>,
) -> SourceStat {
    let start = Instant::now();
    let mut stat = SourceStat {
        name: source.name(),
        duration: Default::default(),
        results: 0,
        errors: 0,
        cancelled: false,
    };

    let (tx, mut rx) = mpsc::channel(SOURCE_CHANNEL_CAPACITY);
    let producer = tokio::spawn({
        let source = source.clone();
        async move { source.run(&session, &domain, tx).await }
    });

    loop {
        tokio::select! {
            biased;
            _ = ctx.done() => {
                stat.cancelled = true;
                break;
            }
            item = rx.recv() => {
                let Some(item) = item else { break };
                if item.error.is_some() {
                    stat.errors += 1;
                } else {
                    stat.results += 1;
                }
                if out.send(item).await.is_err() {
                    break;
                }
            }
        }
    }

    // abandoned once the deadline has passed
    producer.abort();
    stat.duration = start.elapsed();
    debug!("{:12} - {} {} results, {} errors", "SOURCE DONE", stat.name, stat.results, stat.errors);
    stat
}

/// Drains a passive run into `seed`, reporting every new hostname.
#[instrument(name = "passive", level = "info", skip_all, fields(domain = seed.apex()))]
pub async fn collect_passive(run: PassiveRun, seed: &mut SeedSet, reporter: Option<&Reporter>) -> Vec<SourceStat> {
    let PassiveRun { mut results, stats } = run;

    while let Some(item) = results.next().await {
        if let Some(err) = &item.error {
            warn!("{:12} - {}: {}", "SOURCE ERROR", item.source, err);
            continue;
        }
        let Some(value) = &item.value else { continue };
        if seed.insert(value, &item.source) {
            if let (Some(reporter), Some(host)) = (reporter, seed.hostnames().last()) {
                reporter.found(host, seed.apex(), &item.source);
            }
        }
    }

    let stats = match stats.await {
        Ok(stats) => stats,
        Err(err) => {
            warn!("{:12} - {}", "STATS", err);
            Vec::new()
        }
    };
    info!("{:12} - {:?}", "PASSIVE", seed.len());
    stats
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Module;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Fixed {
        name: &'static str,
        names: Vec<&'static str>,
        delay: Duration,
        error: Option<&'static str>,
    }

    impl Module for Fixed {
        fn name(&self) -> String {
            self.name.to_string()
        }
        fn description(&self) -> String {
            String::new()
        }
    }

    #[async_trait]
    impl SourceModule for Fixed {
        async fn run(&self, _session: &Session, _domain: &str, results: Sender<SourceResult>) {
            tokio::time::sleep(self.delay).await;
            if let Some(err) = self.error {
                let _ = results.send(SourceResult::failed(self.name, err)).await;
                return;
            }
            for name in &self.names {
                if results.send(SourceResult::found(self.name, *name)).await.is_err() {
                    return;
                }
            }
        }
    }

    fn source(name: &'static str, names: Vec<&'static str>, delay_ms: u64) -> Arc<dyn SourceModule> {
        Arc::new(Fixed {
            name,
            names,
            delay: Duration::from_millis(delay_ms),
            error: None,
        })
    }

    fn engine(sources: Vec<Arc<dyn SourceModule>>) -> PassiveEngine {
        PassiveEngine::new(Session::with_client(Client::new(), HashMap::new()), sources)
    }

    #[tokio::test]
    async fn merges_filters_and_keeps_first_source() {
        let failing: Arc<dyn SourceModule> = Arc::new(Fixed {
            name: "broken",
            names: vec![],
            delay: Duration::ZERO,
            error: Some("rate limit"),
        });
        let engine = engine(vec![
            source("first", vec!["WWW.example.com", "evil-example.com", "example.com.evil.org"], 0),
            source("second", vec!["www.example.com", "api.example.com"], 30),
            failing,
        ]);

        let mut seed = SeedSet::new("example.com");
        let stats = collect_passive(engine.run(&ScanContext::unbounded(), "example.com"), &mut seed, None).await;

        assert_eq!(seed.hostnames(), ["www.example.com", "api.example.com"]);
        assert_eq!(seed.source_of("www.example.com"), Some("first"));
        assert_eq!(stats.len(), 3);
        let broken = stats.iter().find(|s| s.name == "broken").unwrap();
        assert_eq!((broken.results, broken.errors), (0, 1));
    }

    #[tokio::test]
    async fn deadline_keeps_what_arrived() {
        let engine = engine(vec![
            source("fast", vec!["a.example.com"], 0),
            source("slow", vec!["b.example.com"], 5_000),
        ]);
        let ctx = ScanContext::new(Duration::from_millis(200));

        let mut seed = SeedSet::new("example.com");
        let stats = collect_passive(engine.run(&ctx, "example.com"), &mut seed, None).await;

        assert_eq!(seed.hostnames(), ["a.example.com"]);
        let slow = stats.iter().find(|s| s.name == "slow").unwrap();
        assert!(slow.cancelled);
        assert_eq!(slow.results, 0);
    }

    #[tokio::test]
    async fn new_names_are_reported() {
        let engine = engine(vec![source("first", vec!["a.example.com", "A.example.com"], 0)]);
        let (reporter, lines) = Reporter::buffered(crate::output::OutputFormat::Text);
        let mut seed = SeedSet::new("example.com");
        collect_passive(engine.run(&ScanContext::unbounded(), "example.com"), &mut seed, Some(&reporter)).await;
        assert_eq!(*lines.lock().unwrap(), vec!["a.example.com"]);
    }
}

// endregion:     --- Tests
