//! polyglot CLI: runs entry scripts and reports on their exchanges.

use std::{
    error::Error,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use polyglot::{config::ExchangeConfig, logging, runtime::source::is_host_path, Engine};

#[derive(Parser)]
#[command(
    name = "polyglot",
    about = "Evaluate scripts that exchange values across languages",
    version
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the configured log level: "silent", "error", "warn", "info", "debug", "trace"
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an entry file; its language is picked by extension
    Run {
        file: PathBuf,

        /// Print the exchange diagnostics after running
        #[arg(long)]
        report: bool,
    },
    /// Run every host file in a directory and report on each
    Check { dir: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ExchangeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => fail(&e),
        },
        None => ExchangeConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Err(e) = logging::init(&config.log) {
        fail(&e);
    }

    let succeeded = match &cli.command {
        Command::Run { file, report } => run(&config, file, *report),
        Command::Check { dir } => check(&config, dir),
    };
    if !succeeded {
        process::exit(1);
    }
}

fn build_engine(config: &ExchangeConfig, journal: bool) -> Option<Engine> {
    match Engine::builder()
        .with_bundled_languages()
        .config(config)
        .journal(config.journal || journal)
        .build()
    {
        Ok(engine) => Some(engine),
        Err(e) => {
            print_error(&e);
            None
        }
    }
}

fn run(config: &ExchangeConfig, file: &Path, report: bool) -> bool {
    let Some(engine) = build_engine(config, report) else {
        return false;
    };
    let result = engine.eval_file(file);
    if let Err(e) = &result {
        print_error(e);
    }
    if report {
        print!("{}", engine.report());
    }
    result.is_ok()
}

fn check(config: &ExchangeConfig, dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("error: cannot read `{}`: {e}", dir.display());
            return false;
        }
    };
    let mut hosts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && is_host_path(path))
        .collect();
    hosts.sort();

    let mut succeeded = true;
    for host in hosts {
        println!("== {}", host.display());
        let Some(engine) = build_engine(config, true) else {
            return false;
        };
        if let Err(e) = engine.eval_file(&host) {
            print_error(&e);
            succeeded = false;
        }
        let report = engine.report();
        if report.is_empty() {
            println!("no findings");
        } else {
            print!("{report}");
        }
        succeeded &= !report.has_errors();
    }
    succeeded
}

fn print_error(err: &dyn Error) {
    eprintln!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

fn fail(err: &dyn Error) -> ! {
    print_error(err);
    process::exit(1);
}
