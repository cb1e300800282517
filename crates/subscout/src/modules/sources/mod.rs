pub mod alienvault;
pub mod anubis;
pub mod certspotter;
pub mod chaos;
pub mod crtsh;
pub mod hackertarget;
pub mod shrewdeye;
pub mod subdomaincenter;
pub mod virustotal;
pub mod webarchive;

use super::{Module, Session};
use crate::hostname::{belongs_to, normalize};
use crate::model::SourceResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

/// A passive source streaming the hostnames it knows for a domain.
///
/// `run` reports failures as error items on the channel and returns once its
/// stream is exhausted or the receiver is gone.
#[async_trait]
pub trait SourceModule: Module + Send + Sync {
    /// Name of the API key the source needs, if any.
    fn api_key(&self) -> Option<&'static str> {
        None
    }

    async fn run(&self, session: &Session, domain: &str, results: Sender<SourceResult>);
}

pub fn all_sources() -> Vec<Arc<dyn SourceModule>> {
    vec![
        Arc::new(alienvault::AlienVault::new()),
        Arc::new(anubis::Anubis::new()),
        Arc::new(certspotter::CertSpotter::new()),
        Arc::new(chaos::Chaos::new()),
        Arc::new(crtsh::CrtSh::new()),
        Arc::new(hackertarget::HackerTarget::new()),
        Arc::new(shrewdeye::ShrewdEye::new()),
        Arc::new(subdomaincenter::SubdomainCenter::new()),
        Arc::new(virustotal::VirusTotal::new()),
        Arc::new(webarchive::WebArchive::new()),
    ]
}

/// Sources to run for the given include/exclude lists.
///
/// Includes win over excludes. Selections naming no known source, or
/// excluding every source, fall back to the full registry. Keyed sources
/// are dropped when their key is not configured.
pub fn select_sources(session: &Session, include: &[String], exclude: &[String]) -> Vec<Arc<dyn SourceModule>> {
    select_from(all_sources(), session, include, exclude)
}

pub fn select_from(
    registry: Vec<Arc<dyn SourceModule>>,
    session: &Session,
    include: &[String],
    exclude: &[String],
) -> Vec<Arc<dyn SourceModule>> {
    let known: HashSet<String> = registry.iter().map(|source| source.name()).collect();
    let names = |list: &[String]| -> HashSet<String> {
        list.iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .filter(|name| {
                let ok = known.contains(name);
                if !ok {
                    warn!("{:12} - {}", "UNKNOWN SRC", name);
                }
                ok
            })
            .collect()
    };

    if !include.is_empty() && !exclude.is_empty() {
        warn!("{:12} - both include and exclude given, exclude ignored", "SOURCES");
    }

    let mut selected: Vec<Arc<dyn SourceModule>> = if !include.is_empty() {
        let wanted = names(include);
        if wanted.is_empty() {
            warn!("{:12} - no valid source selected, using all", "SOURCES");
            registry
        } else {
            registry.into_iter().filter(|s| wanted.contains(&s.name())).collect()
        }
    } else if !exclude.is_empty() {
        let unwanted = names(exclude);
        let kept: Vec<_> = registry.iter().filter(|s| !unwanted.contains(&s.name())).cloned().collect();
        if kept.is_empty() {
            warn!("{:12} - every source excluded, using all", "SOURCES");
            registry
        } else {
            kept
        }
    } else {
        registry
    };

    selected.retain(|source| match source.api_key() {
        Some(key) if session.key(key).is_none() => {
            debug!("{:12} - {} (no api key)", "SKIP SOURCE", source.name());
            false
        }
        _ => true,
    });
    selected
}

/// Deduplicating sender shared by the adapters. Names outside the domain
/// are dropped.
pub(crate) struct Emitter<'a> {
    source: String,
    domain: &'a str,
    results: &'a Sender<SourceResult>,
    seen: HashSet<String>,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(source: String, domain: &'a str, results: &'a Sender<SourceResult>) -> Self {
        Self {
            source,
            domain,
            results,
            seen: HashSet::new(),
        }
    }

    /// Sends `raw` once. Returns `false` when the receiver has gone away.
    pub(crate) async fn found(&mut self, raw: &str) -> bool {
        let Some(host) = normalize(raw) else {
            return true;
        };
        if !belongs_to(&host, self.domain) || !self.seen.insert(host.clone()) {
            return true;
        }
        self.results.send(SourceResult::found(&self.source, host)).await.is_ok()
    }

    pub(crate) async fn failed(&self, err: impl ToString) {
        let _ = self.results.send(SourceResult::failed(&self.source, err)).await;
    }

    pub(crate) fn count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use std::collections::HashMap;

    fn session(keys: &[(&str, &str)]) -> Session {
        let keys: HashMap<String, String> = keys.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Session::with_client(Client::new(), keys)
    }

    fn names(sources: &[Arc<dyn SourceModule>]) -> Vec<String> {
        sources.iter().map(|s| s.name()).collect()
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyless_registry_by_default() {
        let selected = names(&select_sources(&session(&[]), &[], &[]));
        assert_eq!(selected.len(), 7);
        assert!(!selected.contains(&"virustotal".to_string()));
        assert!(selected.contains(&"crtsh".to_string()));
    }

    #[test]
    fn keyed_sources_need_a_key() {
        let with_key = session(&[("virustotal", "k")]);
        assert!(names(&select_sources(&with_key, &[], &[])).contains(&"virustotal".to_string()));
        let selected = names(&select_sources(&with_key, &list(&["crtsh"]), &[]));
        assert_eq!(selected, vec!["crtsh"]);
    }

    #[test]
    fn include_wins_over_exclude() {
        let selected = names(&select_sources(&session(&[]), &list(&["crtsh", "nope"]), &list(&["crtsh"])));
        assert_eq!(selected, vec!["crtsh"]);
    }

    #[test]
    fn invalid_selections_fall_back_to_all() {
        let all = names(&select_sources(&session(&[]), &[], &[]));
        assert_eq!(names(&select_sources(&session(&[]), &list(&["nope"]), &[])), all);
        assert_eq!(names(&select_sources(&session(&[]), &[], &all)), all);
    }

    #[tokio::test]
    async fn emitter_deduplicates() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut emitter = Emitter::new("crtsh".into(), "example.com", &tx);
        assert!(emitter.found("WWW.example.com").await);
        assert!(emitter.found("www.example.com.").await);
        assert!(emitter.found("  ").await);
        assert!(emitter.found("www.example.org").await);
        assert_eq!(emitter.count(), 1);
        drop(tx);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.value.as_deref(), Some("www.example.com"));
        assert!(rx.recv().await.is_none());
    }
}
