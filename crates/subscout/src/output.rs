use crate::model::{ScanResult, SourceStat, SubdomainRecord};
use crate::Result;
use colored::Colorize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone)]
enum Sink {
    Stdout,
    Buffer(Arc<Mutex<Vec<String>>>),
}

/// Prints confirmed hostnames on stdout as soon as they are merged.
///
/// One reporter is handed to the scanner for the whole run. Diagnostics go
/// through tracing on stderr, so stdout only carries results.
#[derive(Clone)]
pub struct Reporter {
    format: OutputFormat,
    sink: Sink,
}

impl Reporter {
    pub fn stdout(format: OutputFormat) -> Self {
        Self {
            format,
            sink: Sink::Stdout,
        }
    }

    /// Reporter keeping its lines in memory.
    pub fn buffered(format: OutputFormat) -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let reporter = Self {
            format,
            sink: Sink::Buffer(lines.clone()),
        };
        (reporter, lines)
    }

    pub fn found(&self, host: &str, input: &str, source: &str) {
        let record = SubdomainRecord {
            host: host.to_string(),
            input: input.to_string(),
            source: source.to_string(),
        };
        let line = render(&record, self.format);
        match &self.sink {
            Sink::Stdout => println!("{line}"),
            Sink::Buffer(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }
}

pub fn render(record: &SubdomainRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => record.host.clone(),
        OutputFormat::Json => serde_json::to_string(record).unwrap_or_else(|_| record.host.clone()),
    }
}

pub fn summary_line(result: &ScanResult) -> String {
    format!(
        "# Found {} subdomains for {} in {}",
        result.total_subdomains(),
        result.domain,
        format_duration(result.duration)
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.3}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn print_summary(result: &ScanResult) {
    eprintln!("\n{}", summary_line(result).green());
    if !result.web_services.is_empty() {
        eprintln!(
            "{}",
            format!("# Web services: {} hosts responding to HTTP/HTTPS", result.web_services.len()).cyan()
        );
    }
    for err in &result.errors {
        eprintln!("{} {}", "[ERR]".red(), err);
    }
}

pub fn stats_table(domain: &str, stats: &[SourceStat]) -> String {
    let mut stats = stats.to_vec();
    stats.sort_by(|a, b| a.name.cmp(&b.name));

    let mut table = String::new();
    let _ = writeln!(table, "{}", format!("Source statistics for {domain}").cyan());
    let _ = writeln!(table, " {:20} {:15} {:12} {:10}", "Source", "Duration", "Results", "Errors");
    let _ = writeln!(table, "{}", "─".repeat(60).cyan());
    for stat in &stats {
        let mut duration = format_duration(stat.duration);
        if stat.cancelled {
            duration.push_str(" (timeout)");
        }
        let errors = if stat.errors > 0 {
            stat.errors.to_string().red().to_string()
        } else {
            stat.errors.to_string()
        };
        let _ = writeln!(table, " {:20} {:15} {:12} {:10}", stat.name, duration, stat.results, errors);
    }
    table
}

/// Rewrites `path` with every result so far: hostnames for text, JSON lines
/// plus a summary comment per domain for JSON.
pub fn write_output_file(path: &Path, results: &[ScanResult], format: OutputFormat) -> Result<()> {
    let mut content = String::new();
    for result in results {
        for record in result.records() {
            content.push_str(&render(&record, format));
            content.push('\n');
        }
        if format == OutputFormat::Json {
            content.push('\n');
            content.push_str(&summary_line(result));
            content.push('\n');
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::model::ensure_dir(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostname::SeedSet;

    fn result() -> ScanResult {
        let mut seed = SeedSet::new("example.com");
        seed.insert("www.example.com", "crtsh");
        seed.insert("api.example.com", "active");
        ScanResult::from_seed(seed, Duration::from_millis(1500))
    }

    #[test]
    fn json_lines_carry_host_input_source() {
        let (reporter, lines) = Reporter::buffered(OutputFormat::Json);
        reporter.found("www.example.com", "example.com", "crtsh");
        let lines = lines.lock().unwrap();
        assert_eq!(
            lines[0],
            r#"{"host":"www.example.com","input":"example.com","source":"crtsh"}"#
        );
    }

    #[test]
    fn summary_names_count_and_domain() {
        assert_eq!(summary_line(&result()), "# Found 2 subdomains for example.com in 1.500s");
    }

    #[test]
    fn output_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_output_file(&path, &[result()], OutputFormat::Text).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "www.example.com\napi.example.com\n");

        write_output_file(&path, &[result()], OutputFormat::Json).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""source":"active""#));
        assert!(content.trim_end().ends_with("# Found 2 subdomains for example.com in 1.500s"));
    }
}

// endregion:     --- Tests
