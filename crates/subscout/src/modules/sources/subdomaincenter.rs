use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct SubdomainCenter {}

impl SubdomainCenter {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for SubdomainCenter {
    fn name(&self) -> String {
        "subdomaincenter".to_string()
    }

    fn description(&self) -> String {
        "api.subdomain.center, beta endpoint with a key".to_string()
    }
}

// endregion:     --- Module info

/// The key is optional and switches to the beta endpoint.
fn endpoint(domain: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("https://api.subdomain.center/beta/?domain={domain}&engine=cuttlefish&auth={key}"),
        None => format!("https://api.subdomain.center/?domain={domain}&engine=cuttlefish"),
    }
}

impl SubdomainCenter {
    async fn fetch(&self, session: &Session, domain: &str) -> Result<Vec<String>> {
        let url = endpoint(domain, session.key(&self.name()));
        let res = http_request(&session.http_client, &url).await?;
        Ok(ensure_success(res, &self.name())?.json().await?)
    }
}

#[async_trait]
impl SourceModule for SubdomainCenter {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        match self.fetch(session, domain).await {
            Ok(names) => {
                for name in &names {
                    if !emitter.found(name).await {
                        return;
                    }
                }
                debug!("{} collected", emitter.count());
            }
            Err(err) => emitter.failed(err).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_selects_beta_endpoint() {
        assert_eq!(
            endpoint("example.com", None),
            "https://api.subdomain.center/?domain=example.com&engine=cuttlefish"
        );
        assert!(endpoint("example.com", Some("k")).contains("/beta/?domain=example.com&engine=cuttlefish&auth=k"));
    }
}
