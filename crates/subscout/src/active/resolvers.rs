use super::downloader::{
    is_fresh, Downloader, RESOLVERS_PUBLIC_DNS_URL, RESOLVERS_TRICKEST_TRUSTED_URL,
    RESOLVERS_TRICKEST_URL,
};
use crate::gate::ResolverLists;
use crate::model::write_lines;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const RESOLVERS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub const NORMAL_FILE: &str = "resolvers.txt";
pub const TRUSTED_FILE: &str = "resolvers_trusted.txt";

/// Only digits, dots and colons.
pub fn is_valid_resolver(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':')
}

/// Staged resolver lists in `dir`, refreshed when older than a day.
#[instrument(name = "resolvers", level = "info", skip_all)]
pub async fn prepare_resolvers(downloader: &Downloader, dir: &Path) -> Result<ResolverLists> {
    let lists = ResolverLists {
        normal: dir.join(NORMAL_FILE),
        trusted: dir.join(TRUSTED_FILE),
    };

    if is_fresh(&lists.normal, RESOLVERS_MAX_AGE) && is_fresh(&lists.trusted, RESOLVERS_MAX_AGE) {
        debug!("{:12} - fresh within 24h", "CACHED");
        return Ok(lists);
    }

    let mut normal = Vec::new();
    for url in [RESOLVERS_TRICKEST_URL, RESOLVERS_PUBLIC_DNS_URL] {
        match downloader.fetch_lines(url).await {
            Ok(lines) => normal.extend(lines),
            Err(err) => warn!("{:12} - {} {}", "DOWNLOAD", url, err),
        }
    }
    let trusted = match downloader.fetch_lines(RESOLVERS_TRICKEST_TRUSTED_URL).await {
        Ok(lines) => lines,
        Err(err) => {
            warn!("{:12} - {} {}", "DOWNLOAD", RESOLVERS_TRICKEST_TRUSTED_URL, err);
            Vec::new()
        }
    };

    let (normal, trusted) = finalize(normal, trusted)?;
    info!("{:12} - normal {} / trusted {}", "RESOLVERS", normal.len(), trusted.len());
    write_lines(&lists.normal, &normal)?;
    write_lines(&lists.trusted, &trusted)?;
    Ok(lists)
}

/// Validated, deduplicated lists. An empty list borrows the other one.
pub fn finalize(normal: Vec<String>, trusted: Vec<String>) -> Result<(Vec<String>, Vec<String>)> {
    let clean = |lines: Vec<String>| -> Vec<String> {
        let mut seen = HashSet::new();
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| is_valid_resolver(line) && seen.insert(line.clone()))
            .collect()
    };
    let normal = clean(normal);
    let trusted = clean(trusted);

    match (normal.is_empty(), trusted.is_empty()) {
        (true, true) => Err(Error::ToolFailed("no resolvers downloaded from any source".into())),
        (true, false) => Ok((trusted.clone(), trusted)),
        (false, true) => Ok((normal.clone(), normal)),
        (false, false) => Ok((normal, trusted)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn lines(list: &[&str]) -> Vec<String> {
        list.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn validates_resolver_lines() {
        assert!(is_valid_resolver("1.1.1.1"));
        assert!(is_valid_resolver("1.1.1.1:53"));
        assert!(!is_valid_resolver("dns.google"));
        assert!(!is_valid_resolver(""));
    }

    #[test]
    fn missing_list_falls_back_to_the_other() {
        let (normal, trusted) = finalize(lines(&["1.1.1.1", "1.1.1.1", "x"]), Vec::new()).unwrap();
        assert_eq!(normal, vec!["1.1.1.1"]);
        assert_eq!(trusted, vec!["1.1.1.1"]);
        assert!(finalize(lines(&["nope"]), Vec::new()).is_err());
    }

    #[tokio::test]
    async fn fresh_files_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        write_lines(&dir.path().join(NORMAL_FILE), &["9.9.9.9"]).unwrap();
        write_lines(&dir.path().join(TRUSTED_FILE), &["1.1.1.1"]).unwrap();
        let downloader = Downloader::new(Client::new());
        let lists = prepare_resolvers(&downloader, dir.path()).await.unwrap();
        assert_eq!(lists.normal, dir.path().join(NORMAL_FILE));
    }
}
