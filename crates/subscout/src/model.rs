use crate::hostname::SeedSet;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

// region:        --- Models

/// One item of a source stream. Error items carry no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    pub value: Option<String>,
    pub source: String,
    pub error: Option<String>,
}

impl SourceResult {
    pub fn found(source: &str, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            source: source.to_string(),
            error: None,
        }
    }

    pub fn failed(source: &str, error: impl ToString) -> Self {
        Self {
            value: None,
            source: source.to_string(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStat {
    pub name: String,
    pub duration: Duration,
    pub results: usize,
    pub errors: usize,
    /// The scan deadline cut the source off before its stream closed.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub domain: String,
    pub duration: Duration,
    pub subdomains: Vec<String>,
    pub sources: HashMap<String, String>,
    pub source_stats: Vec<SourceStat>,
    pub web_services: Vec<String>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl ScanResult {
    pub fn from_seed(seed: SeedSet, duration: Duration) -> Self {
        let domain = seed.apex().to_string();
        let (subdomains, sources) = seed.into_parts();
        Self {
            domain,
            duration,
            subdomains,
            sources,
            source_stats: Vec::new(),
            web_services: Vec::new(),
            errors: Vec::new(),
            success: false,
        }
    }

    pub fn total_subdomains(&self) -> usize {
        self.subdomains.len()
    }

    /// A scan succeeds when nothing failed or when it still found names.
    pub fn evaluate_success(&mut self) {
        self.success = self.errors.is_empty() || self.total_subdomains() > 0;
    }

    pub fn records(&self) -> Vec<SubdomainRecord> {
        self.subdomains
            .iter()
            .map(|host| SubdomainRecord {
                host: host.clone(),
                input: self.domain.clone(),
                source: self.sources.get(host).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// JSON-lines output record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdomainRecord {
    pub host: String,
    pub input: String,
    pub source: String,
}

// endregion:     --- Models

// region:        --- Exporting utils

pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        Ok(false)
    } else {
        fs::create_dir_all(dir)?;
        Ok(true)
    }
}

/// Writes one entry per line, newline-terminated.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Reads trimmed lines, skipping blanks and `#` comments. A missing file
/// reads as empty.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

// endregion:     --- Exporting utils

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rule_accepts_partial_results() {
        let mut seed = SeedSet::new("example.com");
        seed.insert("www.example.com", "crtsh");
        let mut result = ScanResult::from_seed(seed, Duration::from_secs(1));
        result.errors.push("active enumeration failed".into());
        result.evaluate_success();
        assert!(result.success);

        let mut empty = ScanResult::from_seed(SeedSet::new("example.com"), Duration::ZERO);
        empty.errors.push("passive failed".into());
        empty.evaluate_success();
        assert!(!empty.success);
    }

    #[test]
    fn records_carry_provenance() {
        let mut seed = SeedSet::new("example.com");
        seed.insert("api.example.com", "anubis");
        let result = ScanResult::from_seed(seed, Duration::ZERO);
        let records = result.records();
        assert_eq!(records[0].source, "anubis");
        assert_eq!(records[0].input, "example.com");
    }

    #[test]
    fn lines_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/list.txt");
        write_lines(&path, &["a.example.com", "", "# note", "b.example.com"]).unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["a.example.com", "b.example.com"]);
        assert!(read_lines(&dir.path().join("missing.txt")).unwrap().is_empty());
    }
}

// endregion:     --- Tests
