use super::{BruteforceJob, ResolutionGate, ResolveJob, ResolverLists};
use crate::context::ScanContext;
use crate::model::{read_lines, write_lines};
use crate::modules::Module;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

// region:        --- Constants

const RESOLVE_DNS_TIMEOUT_MS: u64 = 4000;
const RESOLVE_DNS_CONCURRENCY: usize = 100;
const WILDCARD_PROBES: usize = 2;

// endregion:     --- Constants

pub type DnsResolver = Arc<TokioAsyncResolver>;

// region:        --- Module info

/// In-process resolution with hickory, no external binary needed.
pub struct BuiltinDns {
    concurrency: usize,
}

impl BuiltinDns {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for BuiltinDns {
    fn default() -> Self {
        Self::new(RESOLVE_DNS_CONCURRENCY)
    }
}

impl Module for BuiltinDns {
    fn name(&self) -> String {
        "gate/builtin".to_string()
    }

    fn description(&self) -> String {
        "Resolve with the built-in async resolver and wildcard probing".to_string()
    }
}

// endregion:     --- Module info

/// IPs of a resolver list. `ip:port` entries keep only their address.
pub fn parse_resolver_ips<S: AsRef<str>>(lines: &[S]) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter_map(|line| {
            let line = line.as_ref().trim();
            line.parse::<IpAddr>()
                .ok()
                .or_else(|| line.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        })
        .filter(|ip| seen.insert(*ip))
        .collect()
}

pub fn new_resolver(ips: &[IpAddr]) -> DnsResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_millis(RESOLVE_DNS_TIMEOUT_MS);
    opts.attempts = 2;
    debug!("DNS resolver options: {:?}", opts);

    let config = if ips.is_empty() {
        ResolverConfig::default()
    } else {
        let group = NameServerConfigGroup::from_ips_clear(ips, 53, true);
        ResolverConfig::from_parts(None, vec![], group)
    };
    Arc::new(TokioAsyncResolver::tokio(config, opts))
}

pub async fn lookup(dns_resolver: &DnsResolver, hostname: &str) -> Option<HashSet<IpAddr>> {
    match dns_resolver.lookup_ip(format!("{hostname}.")).await {
        Ok(lookup_ip) => {
            let ips: HashSet<IpAddr> = lookup_ip.iter().collect();
            (!ips.is_empty()).then_some(ips)
        }
        Err(err) => {
            debug!("{:12} - {} {}", "NOT RESOLVED", hostname, err);
            None
        }
    }
}

fn parent_zone(hostname: &str) -> Option<&str> {
    hostname.split_once('.').map(|(_, parent)| parent).filter(|p| p.contains('.'))
}

fn random_label() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

impl BuiltinDns {
    fn resolvers(&self, lists: &ResolverLists) -> Result<(DnsResolver, DnsResolver)> {
        let normal = parse_resolver_ips(&read_lines(&lists.normal)?);
        let trusted = parse_resolver_ips(&read_lines(&lists.trusted)?);
        if normal.is_empty() && trusted.is_empty() {
            warn!("{:12} - no resolvers listed, using system defaults", "RESOLVERS");
        }
        let normal_resolver = new_resolver(if normal.is_empty() { &trusted } else { &normal });
        let trusted_resolver = new_resolver(if trusted.is_empty() { &normal } else { &trusted });
        Ok((normal_resolver, trusted_resolver))
    }

    /// Addresses a random label resolves to under each parent zone, for zones
    /// that answer for anything.
    async fn wildcard_zones(&self, resolver: &DnsResolver, names: &[String]) -> HashMap<String, HashSet<IpAddr>> {
        let parents: HashSet<String> = names
            .iter()
            .filter_map(|name| parent_zone(name).map(str::to_string))
            .collect();

        stream::iter(parents)
            .map(|parent| {
                let resolver = resolver.clone();
                async move {
                    let mut answers = HashSet::new();
                    for _ in 0..WILDCARD_PROBES {
                        let probe = format!("{}.{}", random_label(), parent);
                        if let Some(ips) = lookup(&resolver, &probe).await {
                            answers.extend(ips);
                        }
                    }
                    (!answers.is_empty()).then_some((parent, answers))
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|zone| async move { zone })
            .collect()
            .await
    }

    async fn resolve_names(&self, ctx: &ScanContext, names: Vec<String>, lists: &ResolverLists) -> Result<Vec<String>> {
        let (normal, trusted) = self.resolvers(lists)?;

        let answered: Vec<(String, HashSet<IpAddr>)> = stream::iter(names)
            .map(|name| {
                let normal = normal.clone();
                async move { lookup(&normal, &name).await.map(|ips| (name, ips)) }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|answer| async move { answer })
            .take_until(Box::pin(ctx.done()))
            .collect()
            .await;

        let names: Vec<String> = answered.iter().map(|(name, _)| name.clone()).collect();
        let wildcards = self.wildcard_zones(&trusted, &names).await;
        if !wildcards.is_empty() {
            info!("{:12} - {:?}", "WILDCARDS", wildcards.keys().collect::<Vec<_>>());
        }

        let confirmed: Vec<String> = stream::iter(answered)
            .filter(|(name, ips)| {
                let keep = match parent_zone(name).and_then(|parent| wildcards.get(parent)) {
                    Some(wildcard_ips) => !ips.is_subset(wildcard_ips),
                    None => true,
                };
                async move { keep }
            })
            .map(|(name, _)| {
                let trusted = trusted.clone();
                async move { lookup(&trusted, &name).await.map(|_| name) }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|name| async move { name })
            .take_until(Box::pin(ctx.done()))
            .collect()
            .await;

        if ctx.is_done() {
            warn!("{:12} - keeping {} partial answers", "DEADLINE", confirmed.len());
        }
        Ok(confirmed)
    }
}

#[async_trait]
impl ResolutionGate for BuiltinDns {
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    #[instrument(name = "builtin_resolve", level = "debug", skip_all)]
    async fn resolve(&self, ctx: &ScanContext, job: &ResolveJob) -> Result<Vec<String>> {
        if ctx.is_done() {
            return Err(Error::Cancelled);
        }
        let names = read_lines(&job.candidates)?;
        let resolved = self.resolve_names(ctx, names, &job.resolvers).await?;
        write_lines(&job.output, &resolved)?;
        Ok(resolved)
    }

    #[instrument(name = "builtin_bruteforce", level = "debug", skip_all)]
    async fn bruteforce(&self, ctx: &ScanContext, job: &BruteforceJob) -> Result<Vec<String>> {
        if ctx.is_done() {
            return Err(Error::Cancelled);
        }
        let words = read_lines(&job.wordlist)?;
        let domains = read_lines(&job.domains)?;
        let names: Vec<String> = domains
            .iter()
            .flat_map(|domain| words.iter().map(move |word| format!("{word}.{domain}")))
            .collect();
        debug!("{:12} - {:?}", "BRUTEFORCE", names.len());

        let resolved = self.resolve_names(ctx, names, &job.resolvers).await?;
        write_lines(&job.output, &resolved)?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_lines_parse_to_ips() {
        let ips = parse_resolver_ips(&["1.1.1.1", "8.8.8.8:53", "1.1.1.1", "2001:4860:4860::8888", "junk"]);
        assert_eq!(ips.len(), 3);
        assert_eq!(ips[1], "8.8.8.8".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn parent_zone_stops_above_the_registrable_domain() {
        assert_eq!(parent_zone("a.b.example.com"), Some("b.example.com"));
        assert_eq!(parent_zone("a.example.com"), Some("example.com"));
        assert_eq!(parent_zone("example.com"), None);
    }

    #[test]
    fn random_labels_are_dns_safe() {
        let label = random_label();
        assert_eq!(label.len(), 12);
        assert!(label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn cancelled_context_skips_resolution() {
        let ctx = ScanContext::unbounded();
        ctx.cancel();
        let dir = tempfile::tempdir().unwrap();
        let job = ResolveJob {
            candidates: dir.path().join("in.txt"),
            resolvers: ResolverLists {
                normal: dir.path().join("r.txt"),
                trusted: dir.path().join("t.txt"),
            },
            output: dir.path().join("out.txt"),
        };
        let gate = BuiltinDns::default();
        assert!(matches!(gate.resolve(&ctx, &job).await, Err(Error::Cancelled)));
    }
}
