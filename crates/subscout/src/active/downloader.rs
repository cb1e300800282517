use crate::model::{read_lines, write_lines};
use crate::modules::{ensure_success, http_request};
use crate::Result;
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, instrument};

// region:        --- Urls

pub const SIX2DEZ_WORDLIST_URL: &str =
    "https://gist.githubusercontent.com/six2dez/a307a04a222fab5a57466c51e1569acf/raw";

pub const RESOLVERS_TRICKEST_URL: &str =
    "https://raw.githubusercontent.com/trickest/resolvers/main/resolvers.txt";
pub const RESOLVERS_TRICKEST_TRUSTED_URL: &str =
    "https://raw.githubusercontent.com/trickest/resolvers/main/resolvers-trusted.txt";
pub const RESOLVERS_PUBLIC_DNS_URL: &str = "https://public-dns.info/nameservers.txt";

const TRICKEST_WORDLISTS: &str = "https://raw.githubusercontent.com/trickest/wordlists/main";

/// Trickest level wordlist tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Level2,
    Level3,
    Levels4Plus,
}

impl Tier {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Tier::Level2 => "level2",
            Tier::Level3 => "level3",
            Tier::Levels4Plus => "levels4plus",
        }
    }

    /// Inventory list then cloud list for this tier.
    pub fn urls(&self) -> [String; 2] {
        let stem = self.file_stem();
        [
            format!("{TRICKEST_WORDLISTS}/inventory/levels/{stem}.txt"),
            format!("{TRICKEST_WORDLISTS}/cloud/levels/{stem}.txt"),
        ]
    }
}

// endregion:     --- Urls

/// Fetches remote lists over the shared HTTP client, caching them on disk.
#[derive(Clone)]
pub struct Downloader {
    http_client: Client,
}

impl Downloader {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Trimmed, non-empty, non-comment lines of a remote text file.
    #[instrument(name = "download", level = "debug", skip_all, fields(url = url))]
    pub async fn fetch_lines(&self, url: &str) -> Result<Vec<String>> {
        let res = http_request(&self.http_client, url).await?;
        let body = ensure_success(res, url)?.text().await?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    /// Downloads `url` into `path` unless the file already exists.
    pub async fn cached(&self, url: &str, path: &Path) -> Result<PathBuf> {
        if path.is_file() {
            debug!("{:12} - {}", "CACHED", path.display());
            return Ok(path.to_path_buf());
        }
        let lines = self.fetch_lines(url).await?;
        write_lines(path, &lines)?;
        Ok(path.to_path_buf())
    }

    /// Cached lines of `url`.
    pub async fn cached_lines(&self, url: &str, path: &Path) -> Result<Vec<String>> {
        let path = self.cached(url, path).await?;
        read_lines(&path)
    }
}

/// `true` when `path` exists and was modified less than `max_age` ago.
pub fn is_fresh(path: &Path, max_age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < max_age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_urls() {
        let [inventory, cloud] = Tier::Level3.urls();
        assert_eq!(
            inventory,
            "https://raw.githubusercontent.com/trickest/wordlists/main/inventory/levels/level3.txt"
        );
        assert!(cloud.ends_with("/cloud/levels/level3.txt"));
    }

    #[test]
    fn freshness_of_new_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        assert!(!is_fresh(&path, Duration::from_secs(60)));
        fs::write(&path, "x\n").unwrap();
        assert!(is_fresh(&path, Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn cached_file_skips_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        fs::write(&path, "dev\napi\n").unwrap();
        let downloader = Downloader::new(Client::new());
        let lines = downloader
            .cached_lines("http://127.0.0.1:9/unreachable", &path)
            .await
            .unwrap();
        assert_eq!(lines, vec!["dev", "api"]);
    }
}
