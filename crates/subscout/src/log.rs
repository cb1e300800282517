use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(silent: bool, verbose: bool) -> Self {
        match (silent, verbose) {
            (true, _) => Verbosity::Silent,
            (false, true) => Verbosity::Verbose,
            _ => Verbosity::Normal,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Installs the global subscriber. Logs go to stderr so stdout only carries
/// results; `log_file` adds a plain-text copy in `output_dir`.
pub fn init_tracing_subscriber(verbosity: Verbosity, log_file: Option<(&Path, &str)>) {
    // base for the subscriber
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_span_events(FmtSpan::CLOSE);

    if let Some((output_dir, filename)) = log_file {
        let filename = format!("{}.log", filename);
        let file_appender = RollingFileAppender::new(Rotation::NEVER, output_dir, filename);
        let finished = subscriber
            .with_ansi(false)
            .with_file(false)
            .with_target(false)
            .with_writer(file_appender)
            .finish();

        // terminal output as an additional layer
        let stderr_layer = layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .with_file(false)
            .with_target(false)
            .with_writer(std::io::stderr);

        tracing::subscriber::set_global_default(finished.with(stderr_layer))
            .expect("Unable to set global subscriber with 2 layer");
    } else {
        let finished = subscriber
            .with_ansi(true)
            .with_file(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(finished)
            .expect("Unable to set global subscriber");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_wins_over_verbose() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Silent);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, false).directive(), "info");
    }
}
