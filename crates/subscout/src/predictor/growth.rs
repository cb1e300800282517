use super::validator::{accept_predictions, seed_labels};
use super::{PredictionRequest, Predictor};
use crate::active::downloader::Downloader;
use crate::active::resolvers::prepare_resolvers;
use crate::active::Workspace;
use crate::config::LlmEnumeration;
use crate::context::ScanContext;
use crate::gate::{stage_and_resolve, ResolutionGate};
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Debug, Default)]
pub struct ModelOutcome {
    /// Confirmed names that were not part of the seed, in discovery order.
    pub resolved: Vec<String>,
    pub predictor_calls: usize,
    pub errors: Vec<String>,
}

/// Predict, resolve, merge, at most `max_recursion` times.
pub struct ModelLoop {
    settings: LlmEnumeration,
    output_dir: PathBuf,
    predictor: Arc<dyn Predictor>,
    gate: Arc<dyn ResolutionGate>,
    downloader: Downloader,
}

impl ModelLoop {
    pub fn new(
        settings: LlmEnumeration,
        output_dir: PathBuf,
        predictor: Arc<dyn Predictor>,
        gate: Arc<dyn ResolutionGate>,
        downloader: Downloader,
    ) -> Self {
        Self {
            settings,
            output_dir,
            predictor,
            gate,
            downloader,
        }
    }

    /// Fails only when nothing can seed the model or the resolvers can not be
    /// staged. Errors of single iterations end up in the outcome.
    #[instrument(name = "model", level = "info", skip_all, fields(domain = apex))]
    pub async fn run(&self, ctx: &ScanContext, seed: &[String], apex: &str) -> Result<ModelOutcome> {
        if seed_labels(seed, apex).is_empty() {
            return Err(Error::NoSeed("no valid subdomains to seed".into()));
        }

        let workspace = Workspace::create(&self.output_dir, apex)?;
        let resolvers = prepare_resolvers(&self.downloader, workspace.dir()).await?;

        let mut outcome = ModelOutcome::default();
        let mut blocked: HashSet<String> = seed.iter().map(|name| name.trim().to_lowercase()).collect();
        let mut known = blocked.clone();
        let mut current: Vec<String> = seed.to_vec();
        let max = self.settings.max_recursion;
        info!("{:12} - {} seeds, {} rounds max", "MODEL", current.len(), max);

        for iteration in 0..max {
            let stage = format!("llm iteration {}/{}", iteration + 1, max);
            if ctx.is_done() {
                push_error(&mut outcome.errors, &stage, Error::Cancelled);
                break;
            }

            outcome.predictor_calls += 1;
            let request = self.request(&current, &blocked, apex);
            let predictions = match self.predictor.predict(ctx, &request).await {
                Ok(predictions) => predictions,
                Err(err) => {
                    push_error(&mut outcome.errors, &stage, err);
                    continue;
                }
            };

            let predictions = accept_predictions(predictions, apex, &blocked);
            if predictions.is_empty() {
                info!("{:12} - {} no new predictions", "MODEL", stage);
                break;
            }

            let resolved = match stage_and_resolve(
                self.gate.as_ref(),
                ctx,
                apex,
                &predictions,
                &resolvers,
                &workspace.path(&format!("llm_predictions_iter_{iteration}.txt")),
                &workspace.path(&format!("llm_resolved_iter_{iteration}.txt")),
            )
            .await
            {
                Ok(resolved) => resolved,
                Err(err) => {
                    push_error(&mut outcome.errors, &stage, err);
                    break;
                }
            };

            blocked.extend(predictions);
            if resolved.is_empty() {
                info!("{:12} - {} nothing resolved", "MODEL", stage);
                break;
            }

            let fresh: Vec<String> = resolved.into_iter().filter(|name| known.insert(name.clone())).collect();
            info!("{:12} - {} {} new", "MODEL", stage, fresh.len());
            outcome.resolved.extend(fresh.iter().cloned());
            current.extend(fresh);
        }

        info!("{:12} - {:?}", "MODEL TOTAL", outcome.resolved.len());
        Ok(outcome)
    }

    fn request(&self, current: &[String], blocked: &HashSet<String>, apex: &str) -> PredictionRequest {
        let mut blocked: Vec<String> = blocked.iter().cloned().collect();
        blocked.sort();
        PredictionRequest {
            subdomains: seed_labels(current, apex),
            apex: apex.to_string(),
            num_predictions: self.settings.num_predictions,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            blocked: seed_labels(&blocked, apex),
            device: self.settings.device.clone(),
        }
    }
}

fn push_error(errors: &mut Vec<String>, stage: &str, err: Error) {
    error!("{:12} - {}: {}", "STAGE FAILED", stage, err);
    errors.push(format!("{stage}: {err}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::resolvers::{NORMAL_FILE, TRUSTED_FILE};
    use crate::gate::{BruteforceJob, ResolveJob};
    use crate::model::{read_lines, write_lines};
    use crate::modules::Module;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Predicts a fresh `gN` name on every call.
    struct Counting {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl Module for Counting {
        fn name(&self) -> String {
            "predictor/counting".into()
        }
        fn description(&self) -> String {
            String::new()
        }
    }

    #[async_trait]
    impl Predictor for Counting {
        async fn ensure_available(&self) -> Result<()> {
            Ok(())
        }

        async fn predict(&self, _ctx: &ScanContext, request: &PredictionRequest) -> Result<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(Error::Predictor("warming up".into()));
            }
            Ok(vec![format!("g{call}.{}", request.apex), format!("bad_{call}.{}", request.apex)])
        }
    }

    /// Confirms every candidate.
    struct AcceptAll;

    impl Module for AcceptAll {
        fn name(&self) -> String {
            "gate/accept".into()
        }
        fn description(&self) -> String {
            String::new()
        }
    }

    #[async_trait]
    impl ResolutionGate for AcceptAll {
        async fn ensure_available(&self) -> Result<()> {
            Ok(())
        }
        async fn resolve(&self, _ctx: &ScanContext, job: &ResolveJob) -> Result<Vec<String>> {
            let names = read_lines(&job.candidates)?;
            write_lines(&job.output, &names)?;
            Ok(names)
        }
        async fn bruteforce(&self, _ctx: &ScanContext, _job: &BruteforceJob) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn model_loop(dir: &std::path::Path, max_recursion: usize, predictor: Arc<Counting>) -> ModelLoop {
        let ws = dir.join("example.com");
        write_lines(&ws.join(NORMAL_FILE), &["1.1.1.1"]).unwrap();
        write_lines(&ws.join(TRUSTED_FILE), &["8.8.8.8"]).unwrap();
        let settings = LlmEnumeration {
            max_recursion,
            ..Default::default()
        };
        ModelLoop::new(
            settings,
            dir.to_path_buf(),
            predictor,
            Arc::new(AcceptAll),
            Downloader::new(Client::new()),
        )
    }

    fn seed() -> Vec<String> {
        vec!["www.example.com".to_string()]
    }

    #[tokio::test]
    async fn predictor_calls_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Arc::new(Counting { calls: AtomicUsize::new(0), fail_first: false });
        let model = model_loop(dir.path(), 3, predictor.clone());

        let outcome = model.run(&ScanContext::unbounded(), &seed(), "example.com").await.unwrap();

        assert_eq!(predictor.calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.predictor_calls, 3);
        assert_eq!(outcome.resolved, vec!["g0.example.com", "g1.example.com", "g2.example.com"]);
        assert!(dir.path().join("example.com/llm_predictions_iter_2.txt").is_file());
    }

    #[tokio::test]
    async fn predictor_failure_only_costs_one_round() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Arc::new(Counting { calls: AtomicUsize::new(0), fail_first: true });
        let model = model_loop(dir.path(), 2, predictor);

        let outcome = model.run(&ScanContext::unbounded(), &seed(), "example.com").await.unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.resolved, vec!["g1.example.com"]);
    }

    #[tokio::test]
    async fn apex_alone_can_not_seed() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Arc::new(Counting { calls: AtomicUsize::new(0), fail_first: false });
        let model = model_loop(dir.path(), 2, predictor);
        let seed = vec!["example.com".to_string()];
        assert!(matches!(
            model.run(&ScanContext::unbounded(), &seed, "example.com").await,
            Err(Error::NoSeed(_))
        ));
    }
}
