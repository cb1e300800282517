use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request_with_headers, Module, Session};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct CrtSh {}

impl CrtSh {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for CrtSh {
    fn name(&self) -> String {
        "crtsh".to_string()
    }

    fn description(&self) -> String {
        "Certificate transparency logs from crt.sh".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

impl CrtSh {
    async fn fetch(&self, session: &Session, domain: &str) -> Result<Vec<CrtShEntry>> {
        let url = format!("https://crt.sh/?q=%25.{}&output=json", domain);
        let res = http_request_with_headers(&session.http_client, &url, &[("Accept", "application/json")]).await?;
        let res = ensure_success(res, &self.name())?;
        Ok(res.json().await?)
    }
}

#[async_trait]
impl SourceModule for CrtSh {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let entries = match self.fetch(session, domain).await {
            Ok(entries) => entries,
            Err(err) => return emitter.failed(err).await,
        };

        // one certificate can carry several names
        for name in entries.iter().flat_map(|entry| entry.name_value.split('\n')) {
            if name.trim().eq_ignore_ascii_case(domain) {
                continue;
            }
            if !emitter.found(name).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}
