use crate::model::ensure_dir;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    New,
    Active,
    Dead,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Status::New => "NEW",
            Status::Active => "ACTIVE",
            Status::Dead => "DEAD",
        };
        f.write_str(status)
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "NEW" => Ok(Status::New),
            "ACTIVE" => Ok(Status::Active),
            "DEAD" => Ok(Status::Dead),
            other => Err(Error::CliUsage(format!("unknown status {other}, expected NEW, ACTIVE or DEAD"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSubdomain {
    pub domain: String,
    pub subdomain: String,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen: OffsetDateTime,
    /// Last scan that found the name.
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

/// Lifecycle of every hostname across scans.
pub trait Tracker: Send + Sync {
    /// Records the complete set found by one scan of `domain`.
    fn track_subdomains(&self, domain: &str, current: &[String]) -> Result<()>;

    /// Records of `domain` (all domains when `None`), newest first.
    fn query(&self, domain: Option<&str>, status: Option<Status>) -> Result<Vec<TrackedSubdomain>>;
}

/// Tracker persisted as one JSON document.
pub struct JsonTracker {
    path: PathBuf,
}

impl JsonTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<Vec<TrackedSubdomain>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, records: &[TrackedSubdomain]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        // write-then-rename
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Applies one scan to the stored records.
///
/// Seen names become `NEW` the first time and `ACTIVE` afterwards, stored
/// names missing from the scan become `DEAD`.
pub fn apply_scan(records: &mut Vec<TrackedSubdomain>, domain: &str, current: &[String], now: OffsetDateTime) {
    let current: HashSet<String> = current.iter().map(|name| name.trim().to_lowercase()).collect();

    for record in records.iter_mut().filter(|r| r.domain == domain) {
        if current.contains(&record.subdomain) {
            record.status = Status::Active;
            record.last_seen = now;
        } else if record.status != Status::Dead {
            debug!("{:12} - {}", "DEAD", record.subdomain);
            record.status = Status::Dead;
        }
    }

    let known: HashSet<String> = records
        .iter()
        .filter(|r| r.domain == domain)
        .map(|r| r.subdomain.clone())
        .collect();
    let mut fresh: Vec<&String> = current.iter().filter(|name| !known.contains(*name)).collect();
    fresh.sort();
    for subdomain in fresh {
        records.push(TrackedSubdomain {
            domain: domain.to_string(),
            subdomain: subdomain.clone(),
            status: Status::New,
            first_seen: now,
            last_seen: now,
        });
    }
}

impl Tracker for JsonTracker {
    #[instrument(name = "tracking", level = "info", skip_all, fields(domain = domain))]
    fn track_subdomains(&self, domain: &str, current: &[String]) -> Result<()> {
        let mut records = self.load()?;
        apply_scan(&mut records, domain, current, OffsetDateTime::now_utc());
        self.save(&records)?;

        let count = |status| records.iter().filter(|r| r.domain == domain && r.status == status).count();
        info!(
            "{:12} - new {} / active {} / dead {}",
            "TRACKED",
            count(Status::New),
            count(Status::Active),
            count(Status::Dead)
        );
        Ok(())
    }

    fn query(&self, domain: Option<&str>, status: Option<Status>) -> Result<Vec<TrackedSubdomain>> {
        let mut records: Vec<TrackedSubdomain> = self
            .load()?
            .into_iter()
            .filter(|r| domain.map_or(true, |d| r.domain == d))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain).then(b.first_seen.cmp(&a.first_seen)));
        Ok(records)
    }
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn status_of(records: &[TrackedSubdomain], name: &str) -> Status {
        records.iter().find(|r| r.subdomain == name).map(|r| r.status).unwrap()
    }

    #[test]
    fn lifecycle_across_scans() {
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let t1 = t0 + Duration::days(1);
        let mut records = Vec::new();

        apply_scan(&mut records, "example.com", &names(&["a.example.com", "b.example.com"]), t0);
        assert_eq!(status_of(&records, "a.example.com"), Status::New);

        apply_scan(&mut records, "example.com", &names(&["a.example.com", "c.example.com"]), t1);
        assert_eq!(status_of(&records, "a.example.com"), Status::Active);
        assert_eq!(status_of(&records, "b.example.com"), Status::Dead);
        assert_eq!(status_of(&records, "c.example.com"), Status::New);

        let b = records.iter().find(|r| r.subdomain == "b.example.com").unwrap();
        assert_eq!(b.last_seen, t0);
        let a = records.iter().find(|r| r.subdomain == "a.example.com").unwrap();
        assert_eq!((a.first_seen, a.last_seen), (t0, t1));
    }

    #[test]
    fn other_domains_are_untouched() {
        let mut records = Vec::new();
        apply_scan(&mut records, "example.org", &names(&["x.example.org"]), OffsetDateTime::UNIX_EPOCH);
        apply_scan(&mut records, "example.com", &names(&["a.example.com"]), OffsetDateTime::UNIX_EPOCH);
        assert_eq!(status_of(&records, "x.example.org"), Status::New);
    }

    #[test]
    fn json_file_roundtrip_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonTracker::new(dir.path().join("db/tracking.json"));
        tracker.track_subdomains("example.com", &names(&["a.example.com", "b.example.com"])).unwrap();
        tracker.track_subdomains("example.com", &names(&["a.example.com"])).unwrap();

        let all = tracker.query(Some("example.com"), None).unwrap();
        assert_eq!(all.len(), 2);
        let dead = tracker.query(None, Some(Status::Dead)).unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].subdomain, "b.example.com");

        let raw = fs::read_to_string(tracker.path()).unwrap();
        assert!(raw.contains("\"status\": \"DEAD\""));
    }

    #[test]
    fn status_parsing() {
        assert_eq!("active".parse::<Status>().unwrap(), Status::Active);
        assert!("gone".parse::<Status>().is_err());
    }
}

// endregion:     --- Tests
