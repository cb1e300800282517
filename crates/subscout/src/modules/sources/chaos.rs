use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request_with_headers, Module, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct Chaos {}

impl Chaos {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for Chaos {
    fn name(&self) -> String {
        "chaos".to_string()
    }

    fn description(&self) -> String {
        "ProjectDiscovery Chaos dataset".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct ChaosResponse {
    #[serde(default)]
    subdomains: Vec<String>,
}

/// Chaos answers with bare labels, qualified here.
fn qualify(name: &str, domain: &str) -> String {
    let name = name.trim();
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.{domain}")
    }
}

impl Chaos {
    async fn fetch(&self, session: &Session, domain: &str) -> Result<Vec<String>> {
        let key = session
            .key(&self.name())
            .ok_or_else(|| Error::Config(format!("{} api key not configured", self.name())))?;
        let url = format!("https://dns.projectdiscovery.io/dns/{}/subdomains", domain);
        let res = http_request_with_headers(&session.http_client, &url, &[("Authorization", key)]).await?;
        let body: ChaosResponse = ensure_success(res, &self.name())?.json().await?;
        Ok(body.subdomains)
    }
}

#[async_trait]
impl SourceModule for Chaos {
    fn api_key(&self) -> Option<&'static str> {
        Some("chaos")
    }

    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let names = match self.fetch(session, domain).await {
            Ok(names) => names,
            Err(err) => return emitter.failed(err).await,
        };

        for name in names.iter().filter(|name| !name.trim().is_empty()) {
            if !emitter.found(&qualify(name, domain)).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_labels_get_the_domain() {
        assert_eq!(qualify("www", "example.com"), "www.example.com");
        assert_eq!(qualify("api.example.com", "example.com"), "api.example.com");
    }
}
