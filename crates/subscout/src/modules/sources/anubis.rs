use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct Anubis {}

impl Anubis {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for Anubis {
    fn name(&self) -> String {
        "anubis".to_string()
    }

    fn description(&self) -> String {
        "Subdomain database of anubisdb.com".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SourceModule for Anubis {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let url = format!("https://anubisdb.com/anubis/subdomains/{}", domain);

        let res = match http_request(&session.http_client, &url).await {
            Ok(res) => res,
            Err(err) => return emitter.failed(err).await,
        };
        let names: Vec<String> = match ensure_success(res, &self.name()) {
            Ok(res) => match res.json().await {
                Ok(names) => names,
                Err(err) => return emitter.failed(err).await,
            },
            Err(err) => return emitter.failed(err).await,
        };

        for name in names.iter().filter(|name| !name.trim().eq_ignore_ascii_case(domain)) {
            if !emitter.found(name).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}
