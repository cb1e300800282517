pub mod sources;

use crate::config::Config;
use crate::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

pub use sources::{all_sources, select_sources, SourceModule};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub trait Module {
    fn name(&self) -> String;
    fn description(&self) -> String;
}

// region:        --- Session

/// HTTP client and API keys shared by every source of a run.
#[derive(Clone)]
pub struct Session {
    pub http_client: Client,
    keys: HashMap<String, String>,
}

impl Session {
    /// Client timeout is three seconds per configured minute of scan timeout.
    pub fn new(config: &Config) -> Result<Self> {
        let http_timeout = Duration::from_secs(config.default_settings.timeout * 3);
        let http_client = Client::builder()
            .timeout(http_timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(100)
            .build()?;
        debug!("HTTP Client created: {:?}", http_client);

        let keys = config
            .api_keys
            .keys()
            .filter_map(|name| config.api_key(name).map(|key| (name.to_lowercase(), key.to_string())))
            .collect();
        Ok(Self { http_client, keys })
    }

    pub fn with_client(http_client: Client, keys: HashMap<String, String>) -> Self {
        Self { http_client, keys }
    }

    pub fn key(&self, source: &str) -> Option<&str> {
        self.keys.get(source).map(String::as_str)
    }
}

// endregion:     --- Session

pub fn display_all(session: &Session) {
    println!("\nSources");
    for module in all_sources() {
        let key = match module.api_key() {
            Some(name) if session.key(name).is_some() => "key configured",
            Some(_) => "key missing",
            None => "",
        };
        println!("- {:20}{:55}{}", module.name(), module.description(), key);
    }
}

// region:        --- HTTP requests

#[instrument(name = "HTTP_request", level = "debug", skip_all, fields(url = url))]
pub async fn http_request(http_client: &Client, url: &str) -> Result<Response> {
    http_request_with_headers(http_client, url, &[]).await
}

#[instrument(name = "HTTP_request", level = "debug", skip_all, fields(url = url))]
pub async fn http_request_with_headers(
    http_client: &Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Response> {
    debug!("Sending request");
    let mut request = http_client.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    match request.send().await {
        Ok(res) => {
            info!("Receive with status: {}", res.status());
            debug!("Response: {:?}", res);
            Ok(res)
        }
        Err(err) => {
            error!("Reason: {}", err);
            Err(Error::Reqwest(err))
        }
    }
}

/// Maps auth and rate-limit statuses to their errors, any other failure to
/// `InvalidHttpResponse`.
pub fn ensure_success(res: Response, origin: &str) -> Result<Response> {
    match res.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized(origin.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited(origin.to_string())),
        status if !status.is_success() => {
            Err(Error::InvalidHttpResponse(format!("{origin}: status {status}")))
        }
        _ => Ok(res),
    }
}

// endregion:     --- HTTP requests
