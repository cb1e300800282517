use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct ShrewdEye {}

impl ShrewdEye {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for ShrewdEye {
    fn name(&self) -> String {
        "shrewdeye".to_string()
    }

    fn description(&self) -> String {
        "Plain-text domain lists of shrewdeye.app".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SourceModule for ShrewdEye {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let url = format!("https://shrewdeye.app/domains/{}.txt", domain);

        let res = match http_request(&session.http_client, &url).await {
            Ok(res) => res,
            Err(err) => return emitter.failed(err).await,
        };
        // unknown domain
        if res.status() == StatusCode::NOT_FOUND {
            debug!("no list for {}", domain);
            return;
        }
        let body = match ensure_success(res, &self.name()) {
            Ok(res) => res.text().await,
            Err(err) => return emitter.failed(err).await,
        };
        let body = match body {
            Ok(body) => body,
            Err(err) => return emitter.failed(err).await,
        };

        for line in body.lines().filter(|line| !line.trim().eq_ignore_ascii_case(domain)) {
            if !emitter.found(line).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}
