mod bench;
mod db;
mod models;
mod schema;

use anyhow::Result;
use bench::{Runner, Strategy};
use clap::{ArgGroup, Parser};
use db::{Database, DbConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "jobbench")]
#[command(about = "Benchmark eager, join, lazy and JSON-aggregate loading of jobs, companies and files")]
#[command(group(ArgGroup::new("strategy").args(["eager", "join", "lazy", "json"])))]
struct Cli {
    /// Run eager loading example
    #[arg(long)]
    eager: bool,

    /// Run join example
    #[arg(long)]
    join: bool,

    /// Run lazy loading example
    #[arg(long)]
    lazy: bool,

    /// Run JSON aggregate example
    #[arg(long)]
    json: bool,

    /// Run all examples and print metrics (the default)
    #[arg(long)]
    all: bool,

    /// Path to the SQLite database holding company, jobs and files
    #[arg(long = "database", env = "DB_PATH")]
    database: Option<PathBuf>,

    /// Database name, used as `<name>.db` in the data directory when no path is given
    #[arg(long, env = "DB_NAME", default_value = "jobbench")]
    db_name: String,

    /// Directory the JSON output files are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Connection attempts before giving up
    #[arg(long, env = "DB_MAX_RETRIES", default_value = "30",
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Seconds to wait between connection attempts
    #[arg(long, env = "DB_RETRY_INTERVAL_SECS", default_value = "2")]
    retry_interval_secs: u64,

    /// Number of jobs the lazy strategy loads
    #[arg(long, env = "LAZY_LIMIT", default_value = "50")]
    lazy_limit: u32,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Single(Strategy),
    All,
}

impl Cli {
    /// No flag at all means "run everything"; `--all` wins over a single flag.
    fn mode(&self) -> Mode {
        if self.all {
            return Mode::All;
        }
        match (self.eager, self.join, self.lazy, self.json) {
            (true, _, _, _) => Mode::Single(Strategy::Eager),
            (_, true, _, _) => Mode::Single(Strategy::Join),
            (_, _, true, _) => Mode::Single(Strategy::Lazy),
            (_, _, _, true) => Mode::Single(Strategy::Aggregate),
            _ => Mode::All,
        }
    }

    fn db_config(&self) -> DbConfig {
        DbConfig {
            path: self
                .database
                .clone()
                .unwrap_or_else(|| DbConfig::default_path(&self.db_name)),
            max_retries: self.max_retries,
            retry_interval: Duration::from_secs(self.retry_interval_secs),
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobbench=info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let db = Database::connect(&cli.db_config())?;
    let runner = Runner::new(&db, &cli.output_dir, cli.lazy_limit);

    match cli.mode() {
        Mode::Single(strategy) => {
            runner.run(strategy)?;
        }
        Mode::All => {
            runner.run_all()?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Benchmark aborted");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["jobbench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("Failed to parse args")
    }

    #[test]
    fn test_no_flag_runs_all() {
        assert_eq!(parse(&[]).mode(), Mode::All);
        assert_eq!(parse(&["--all"]).mode(), Mode::All);
    }

    #[test]
    fn test_single_strategy_flags() {
        assert_eq!(parse(&["--eager"]).mode(), Mode::Single(Strategy::Eager));
        assert_eq!(parse(&["--join"]).mode(), Mode::Single(Strategy::Join));
        assert_eq!(parse(&["--lazy"]).mode(), Mode::Single(Strategy::Lazy));
        assert_eq!(parse(&["--json"]).mode(), Mode::Single(Strategy::Aggregate));
    }

    #[test]
    fn test_all_subsumes_single_flag() {
        assert_eq!(parse(&["--all", "--lazy"]).mode(), Mode::All);
    }

    #[test]
    fn test_single_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["jobbench", "--eager", "--join"]).is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        assert!(Cli::try_parse_from(["jobbench", "--max-retries", "0"]).is_err());
    }

    #[test]
    fn test_db_config_from_flags() {
        let cli = parse(&[
            "--database",
            "/tmp/bench.db",
            "--max-retries",
            "3",
            "--retry-interval-secs",
            "1",
        ]);
        let config = cli.db_config();
        assert_eq!(config.path, PathBuf::from("/tmp/bench.db"));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_db_name_picks_default_file() {
        let config = parse(&["--db-name", "gorm"]).db_config();
        assert_eq!(config.path.file_name().unwrap(), "gorm.db");

        let config = parse(&["--db-name", "gorm", "--database", "/tmp/x.db"]).db_config();
        assert_eq!(config.path, PathBuf::from("/tmp/x.db"));
    }
}
