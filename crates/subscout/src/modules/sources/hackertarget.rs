use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct HackerTarget {}

impl HackerTarget {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for HackerTarget {
    fn name(&self) -> String {
        "hackertarget".to_string()
    }

    fn description(&self) -> String {
        "Host search of api.hackertarget.com".to_string()
    }
}

// endregion:     --- Module info

/// The answer is `host,ip` CSV, one host per line.
fn first_field(line: &str) -> &str {
    line.split(',').next().unwrap_or_default().trim()
}

#[async_trait]
impl SourceModule for HackerTarget {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let body: Result<String> = async {
            let url = format!("https://api.hackertarget.com/hostsearch/?q={}", domain);
            let res = http_request(&session.http_client, &url).await?;
            Ok(ensure_success(res, &self.name())?.text().await?)
        }
        .await;

        match body {
            Ok(body) => {
                for line in body.lines().map(first_field).filter(|host| *host != domain) {
                    if !emitter.found(line).await {
                        return;
                    }
                }
                debug!("{} collected", emitter.count());
            }
            Err(err) => emitter.failed(err).await,
        }
    }
}
