use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use subscout::config::Config;
use subscout::log::{init_tracing_subscriber, Verbosity};
use subscout::model::{ensure_dir, read_lines, ScanResult};
use subscout::modules::{self, Session};
use subscout::output::{print_summary, stats_table, write_output_file, OutputFormat, Reporter};
use subscout::scan::{ScanOptions, Scanner};
use subscout::tracking::{JsonTracker, Status, Tracker};
use subscout::{Error, Result};
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = cli().get_matches();

    let outcome = match cli.subcommand() {
        Some(("sources", args)) => list_sources(args),
        Some(("scan", args)) => scan(args),
        Some(("track", args)) => track(args),

        // fallback if a cmd is not handled (should not possible)
        _ => Err(Error::CliUsage("Command not handled".into())),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {}", "[ERR]".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

// region:        --- Cli

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Config file (default: config.yaml, config/config.yaml, ~/.subscout/config.yaml)")
}

fn flag(name: &'static str, short: Option<char>, help: &'static str) -> Arg {
    let arg = Arg::new(name).long(name).action(ArgAction::SetTrue).help(help);
    match short {
        Some(short) => arg.short(short),
        None => arg,
    }
}

fn list_arg(name: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(name)
        .short(short)
        .long(name)
        .value_name("LIST")
        .value_delimiter(',')
        .action(ArgAction::Append)
        .help(help)
}

fn cli() -> Command {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about("Passive, active and model-driven subdomain enumeration")
        .subcommand(Command::new("sources").about("List passive sources").arg(config_arg()))
        .subcommand(
            Command::new("scan")
                .about("Enumerate subdomains of one or more domains")
                .arg(
                    Arg::new("domain")
                        .short('d')
                        .long("domain")
                        .value_name("DOMAIN")
                        .help("Target domain")
                        .conflicts_with("list"),
                )
                .arg(
                    Arg::new("list")
                        .short('l')
                        .long("list")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("File with one target domain per line"),
                )
                .group(clap::ArgGroup::new("targets").args(["domain", "list"]).required(true))
                .arg(config_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Write results to a file"),
                )
                .arg(flag("json", Some('j'), "JSON lines output {host, input, source}"))
                .arg(flag("silent", None, "Only print results"))
                .arg(flag("stats", None, "Print per-source statistics"))
                .arg(flag("verbose", Some('v'), "Debug logs"))
                .arg(list_arg("sources", 's', "Only use these sources"))
                .arg(list_arg("exclude", 'e', "Skip these sources"))
                .arg(flag("active", None, "Run active enumeration"))
                .arg(flag("deep", None, "Run the deep bruteforce after active enumeration"))
                .arg(flag("model", None, "Run model-driven prediction"))
                .arg(flag("probe", None, "Probe found hosts over HTTP(S)"))
                .arg(
                    Arg::new("wordlist")
                        .short('w')
                        .long("wordlist")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Wordlist for active enumeration (default: downloaded list)"),
                )
                .arg(flag("logs", None, "Save logs into a .log file")),
        )
        .subcommand(
            Command::new("track")
                .about("Show tracked subdomains")
                .arg(Arg::new("domain").value_name("DOMAIN").index(1).help("Tracked domain"))
                .arg(flag("all", None, "Every tracked domain"))
                .arg(
                    Arg::new("status")
                        .long("status")
                        .value_name("STATUS")
                        .value_parser(["NEW", "ACTIVE", "DEAD", "new", "active", "dead"])
                        .help("Only records with this status"),
                )
                .arg(config_arg()),
        )
        .arg_required_else_help(true)
}

// endregion:     --- Cli

// region:        --- Commands

fn load_config(args: &ArgMatches) -> Result<Config> {
    Config::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))
}

fn list_sources(args: &ArgMatches) -> Result<bool> {
    // listing works without a config file
    let config = load_config(args).unwrap_or_default();
    modules::display_all(&Session::new(&config)?);
    Ok(true)
}

fn track(args: &ArgMatches) -> Result<bool> {
    let config = load_config(args)?;
    if !config.tracking.enabled {
        return Err(Error::Config("tracking is not enabled".into()));
    }
    let domain = args.get_one::<String>("domain");
    if domain.is_none() && !args.get_flag("all") {
        return Err(Error::CliUsage("give a domain or --all".into()));
    }
    let status = args.get_one::<String>("status").map(|s| s.parse::<Status>()).transpose()?;

    let tracker = JsonTracker::new(config.tracking.path.clone());
    let records = tracker.query(domain.map(String::as_str), status)?;
    println!(" {:30} {:40} {:8} {:22} {:22}", "Domain", "Subdomain", "Status", "First seen", "Last seen");
    for record in &records {
        let status = match record.status {
            Status::New => record.status.to_string().green(),
            Status::Active => record.status.to_string().cyan(),
            Status::Dead => record.status.to_string().red(),
        };
        println!(
            " {:30} {:40} {:8} {:22} {:22}",
            record.domain,
            record.subdomain,
            status,
            record.first_seen.format(&Rfc3339)?,
            record.last_seen.format(&Rfc3339)?
        );
    }
    println!("\n{} records", records.len());
    Ok(true)
}

fn targets(args: &ArgMatches) -> Result<Vec<String>> {
    if let Some(domain) = args.get_one::<String>("domain") {
        return Ok(vec![domain.trim().to_lowercase()]);
    }
    let Some(list) = args.get_one::<PathBuf>("list") else {
        return Err(Error::CliUsage("no domains provided".into()));
    };
    let domains = read_lines(list)?;
    if domains.is_empty() {
        return Err(Error::CliUsage(format!("no valid domains found in {}", list.display())));
    }
    Ok(domains.into_iter().map(|d| d.to_lowercase()).collect())
}

fn scan(args: &ArgMatches) -> Result<bool> {
    let silent = args.get_flag("silent");
    let config = load_config(args)?;

    let log_dir = config.active_enumeration.output_dir.join("logs");
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let log_name = format!("run_{timestamp}");
    if args.get_flag("logs") {
        ensure_dir(&log_dir)?;
    }
    init_tracing_subscriber(
        Verbosity::from_flags(silent, args.get_flag("verbose")),
        args.get_flag("logs").then(|| (log_dir.as_path(), log_name.as_str())),
    );

    let domains = targets(args)?;
    let list = |name: &str| -> Vec<String> {
        args.get_many::<String>(name)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };
    let options = ScanOptions {
        active: args.get_flag("active"),
        deep: args.get_flag("deep"),
        model: args.get_flag("model"),
        probe: args.get_flag("probe"),
        wordlist: args.get_one::<PathBuf>("wordlist").cloned(),
        include: list("sources"),
        exclude: list("exclude"),
    };
    let format = if args.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let scanner = Scanner::new(config, options)?.with_reporter(Reporter::stdout(format));
    let output = args.get_one::<PathBuf>("output").map(PathBuf::as_path);
    run_scans(&scanner, &domains, output, format, silent, args.get_flag("stats"))
}

#[tokio::main]
async fn run_scans(
    scanner: &Scanner,
    domains: &[String],
    output: Option<&Path>,
    format: OutputFormat,
    silent: bool,
    stats: bool,
) -> Result<bool> {
    scanner.prepare().await?;

    let mut results: Vec<ScanResult> = Vec::with_capacity(domains.len());
    for domain in domains {
        info!("{:12} - {}", "SCANNING", domain);
        let result = scanner.run_scan(domain).await;

        if !silent {
            print_summary(&result);
        }
        if stats {
            eprintln!("\n{}", stats_table(&result.domain, &result.source_stats));
        }
        results.push(result);

        if let Some(path) = output {
            if let Err(err) = write_output_file(path, &results, format) {
                error!("{:12} - {}", "OUTPUT", err);
            }
        }
    }

    Ok(results.iter().all(|result| result.success))
}

// endregion:     --- Commands
