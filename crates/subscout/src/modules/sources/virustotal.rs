use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request_with_headers, Module, Session};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct VirusTotal {}

impl VirusTotal {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for VirusTotal {
    fn name(&self) -> String {
        "virustotal".to_string()
    }

    fn description(&self) -> String {
        "VirusTotal v3 domain relationships".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<Item>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    cursor: String,
}

fn page_url(domain: &str, cursor: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("https://www.virustotal.com/api/v3/domains/{domain}/subdomains"))
        .map_err(|err| Error::InvalidHttpResponse(format!("virustotal url: {err}")))?;
    url.query_pairs_mut().append_pair("limit", "40");
    if !cursor.is_empty() {
        url.query_pairs_mut().append_pair("cursor", cursor);
    }
    Ok(url)
}

impl VirusTotal {
    async fn page(&self, session: &Session, domain: &str, key: &str, cursor: &str) -> Result<Page> {
        let url = page_url(domain, cursor)?;
        let res = http_request_with_headers(&session.http_client, url.as_str(), &[("x-apikey", key)]).await?;
        Ok(ensure_success(res, &self.name())?.json().await?)
    }
}

#[async_trait]
impl SourceModule for VirusTotal {
    fn api_key(&self) -> Option<&'static str> {
        Some("virustotal")
    }

    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let Some(key) = session.key(&self.name()) else {
            return emitter.failed(Error::Config("virustotal api key not configured".into())).await;
        };

        // follow the cursor until the last page
        let mut cursor = String::new();
        loop {
            let page = match self.page(session, domain, key, &cursor).await {
                Ok(page) => page,
                Err(err) => return emitter.failed(err).await,
            };
            for item in &page.data {
                if !emitter.found(&item.id).await {
                    return;
                }
            }
            if page.meta.cursor.is_empty() || page.meta.cursor == cursor {
                break;
            }
            cursor = page.meta.cursor;
        }
        debug!("{} collected", emitter.count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_query_encoded() {
        let first = page_url("example.com", "").unwrap();
        assert_eq!(
            first.as_str(),
            "https://www.virustotal.com/api/v3/domains/example.com/subdomains?limit=40"
        );

        let next = page_url("example.com", "a+b/c=&d").unwrap();
        let cursor = next.query_pairs().find(|(k, _)| k == "cursor").map(|(_, v)| v.into_owned());
        assert_eq!(cursor.as_deref(), Some("a+b/c=&d"));
        assert_eq!(next.query_pairs().count(), 2);
    }
}
