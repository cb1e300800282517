use super::{Emitter, SourceModule};
use crate::model::SourceResult;
use crate::modules::{ensure_success, http_request, Module, Session};
use crate::Result;
use async_trait::async_trait;
use lazy_regex::regex;
use reqwest::Url;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument, trace};

// region:        --- Module info

pub struct WebArchive {}

impl WebArchive {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for WebArchive {
    fn name(&self) -> String {
        "webarchive".to_string()
    }
    fn description(&self) -> String {
        "Archived URLs from web.archive.org".to_string()
    }
}

// endregion:     --- Module info

/// Hostname of an archived URL line. Lines are percent-decoded first and, for
/// encoded lines, leftovers of double-encoded separators are stripped.
pub fn host_of(line: &str) -> Option<String> {
    let decoded = percent_decode(line.trim());
    let candidate = if decoded.contains("://") {
        Url::parse(&decoded).ok().and_then(|url| url.host_str().map(str::to_string))
    } else {
        None
    };

    let host = match candidate {
        Some(host) => host,
        None => regex!(r"([a-zA-Z0-9.-]+\.[a-zA-Z0-9.-]+)").find(&decoded)?.as_str().to_string(),
    };
    let host = host.to_lowercase();
    if !line.contains('%') {
        return Some(host);
    }
    let host = host
        .strip_prefix("25")
        .or_else(|| host.strip_prefix("2f"))
        .unwrap_or(&host);
    Some(host.to_string())
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl WebArchive {
    async fn fetch(&self, session: &Session, domain: &str) -> Result<String> {
        let url = format!(
            "http://web.archive.org/cdx/search/cdx?url=*.{}/*&output=txt&fl=original&collapse=urlkey",
            domain
        );
        let res = http_request(&session.http_client, &url).await?;
        Ok(ensure_success(res, &self.name())?.text().await?)
    }
}

#[async_trait]
impl SourceModule for WebArchive {
    #[instrument(name = "enumerate", level = "debug", fields(module = %self.name()), skip_all)]
    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>) {
        let mut emitter = Emitter::new(self.name(), domain, &results);
        let body = match self.fetch(session, domain).await {
            Ok(body) => body,
            Err(err) => return emitter.failed(err).await,
        };

        for host in body.lines().filter_map(host_of) {
            trace!("Collecting: {:?}", host);
            if !emitter.found(&host).await {
                return;
            }
        }
        debug!("{} collected", emitter.count());
    }
}
