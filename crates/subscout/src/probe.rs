use crate::context::ScanContext;
use crate::modules::http_request;
use futures::{stream, StreamExt};
use reqwest::Client;
use tracing::{debug, info, instrument};

const PROBE_CONCURRENCY: usize = 50;

/// Any HTTP answer counts, whatever its status.
async fn probe(http_client: &Client, host: &str) -> Option<String> {
    for scheme in ["https", "http"] {
        let url = format!("{scheme}://{host}");
        match http_request(http_client, &url).await {
            Ok(res) => {
                debug!("{:12} - {} {}", "PROBE", url, res.status());
                return Some(url);
            }
            Err(_) => continue,
        }
    }
    None
}

/// URLs of the hosts answering over https, or http as a fallback.
#[instrument(name = "probe", level = "info", skip_all)]
pub async fn probe_web_services(ctx: &ScanContext, http_client: &Client, hosts: &[String]) -> Vec<String> {
    let probes = stream::iter(hosts)
        .map(|host| probe(http_client, host))
        .buffer_unordered(PROBE_CONCURRENCY)
        .filter_map(|url| async move { url })
        .take_until(ctx.done());

    let mut services: Vec<String> = probes.collect().await;
    services.sort();
    info!("{:12} - {:?}/{:?}", "WEB SERVICES", services.len(), hosts.len());
    services
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finished_context_probes_nothing() {
        let ctx = ScanContext::unbounded();
        ctx.cancel();
        let hosts = vec!["www.example.invalid".to_string()];
        assert!(probe_web_services(&ctx, &Client::new(), &hosts).await.is_empty());
    }
}
