use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct AlienVault {}

impl AlienVault {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for AlienVault {
    fn name(&self) -> String {
        "alienvault".to_string()
    }

    fn description(&self) -> String {
        "Passive DNS of AlienVault OTX".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PassiveDnsResponse {
    detail: String,
    error: String,
    passive_dns: Vec<PassiveDnsRecord>,
}

#[derive(Debug, Deserialize)]
struct PassiveDnsRecord {
    hostname: String,
}

impl AlienVault {
    async fn fetch(&self, session: &Session, domain: &str) -> Result<Vec<PassiveDnsRecord>> {
        let url = format!("https://otx.alienvault.com/api/v1/indicators/domain/{}/passive_dns", domain);
        let res = http_request(&session.http_client, &url).await?;
        let body: PassiveDnsResponse = ensure_success(res, &self.name())?.json().await?;

        if !body.error.is_empty() {
            return Err(Error::InvalidHttpResponse(format!("{}: {}, {}", self.name(), body.error, body.detail)));
        }
        Ok(body.passive_dns)
    }
}

#[async_trait]
impl SourceModule for AlienVault {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let records = match self.fetch(session, domain).await {
            Ok(records) => records,
            Err(err) => return emitter.failed(err).await,
        };

        for record in records {
            if !emitter.found(&record.hostname).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}
