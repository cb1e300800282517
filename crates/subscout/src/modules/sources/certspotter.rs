use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request_with_headers, Module, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct CertSpotter {}

impl CertSpotter {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for CertSpotter {
    fn name(&self) -> String {
        "certspotter".to_string()
    }

    fn description(&self) -> String {
        "Certificate issuances from SSLMate Cert Spotter".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct Issuance {
    id: String,
    #[serde(default)]
    dns_names: Vec<String>,
}

impl CertSpotter {
    /// Issuances after `after`, the first page when it is `None`.
    async fn issuances(&self, session: &Session, domain: &str, key: &str, after: Option<&str>) -> Result<Vec<Issuance>> {
        let mut url = format!(
            "https://api.certspotter.com/v1/issuances?domain={}&include_subdomains=true&expand=dns_names",
            domain
        );
        if let Some(after) = after {
            url.push_str(&format!("&after={after}"));
        }
        let bearer = format!("Bearer {key}");
        let res = http_request_with_headers(&session.http_client, &url, &[("Authorization", bearer.as_str())]).await?;
        Ok(ensure_success(res, &self.name())?.json().await?)
    }
}

#[async_trait]
impl SourceModule for CertSpotter {
    fn api_key(&self) -> Option<&'static str> {
        Some("certspotter")
    }

    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let Some(key) = session.key(&self.name()) else {
            return emitter.failed(Error::Config("certspotter api key not configured".into())).await;
        };

        let mut after: Option<String> = None;
        loop {
            let page = match self.issuances(session, domain, key, after.as_deref()).await {
                Ok(page) => page,
                Err(err) => return emitter.failed(err).await,
            };
            let Some(last) = page.last().map(|issuance| issuance.id.clone()) else {
                break;
            };

            for name in page.iter().flat_map(|issuance| &issuance.dns_names) {
                if !emitter.found(name).await {
                    return;
                }
            }
            if after.as_deref() == Some(last.as_str()) {
                break;
            }
            after = Some(last);
        }
        debug!("{} collected", emitter.count());
    }
}
