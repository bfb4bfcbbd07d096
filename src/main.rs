//! stagehand CLI - staged copy of a repository version

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use stagehand::transport::TransportRegistry;
use stagehand::{Config, RepositoryCopier, RepositoryEndpoint};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "staged copy of a repository version to a live target")]
#[command(version)]
struct Cli {
    /// config file (toml)
    #[arg(short, long, env = "STAGEHAND_CONFIG")]
    config: Option<PathBuf>,

    /// enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// copy a version from a source repository to a target repository
    Copy {
        /// source repository url (file:// or scp://)
        #[arg(short, long)]
        source: String,

        /// target repository url (file:// or scp://)
        #[arg(short, long)]
        target: String,

        /// version being copied
        #[arg(short, long)]
        version: String,

        /// id used to look up source credentials
        #[arg(long, default_value = "source")]
        source_id: String,

        /// id used to look up target credentials
        #[arg(long, default_value = "target")]
        target_id: String,
    },

    /// print the effective configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(debug: bool) {
    logger(debug, env_logger::Env::default()).init();
}

/// info by default, debug with `--debug`; RUST_LOG overrides either
fn logger(debug: bool, env: env_logger::Env<'_>) -> env_logger::Builder {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env.default_filter_or(level))
}

fn run(cli: Cli) -> stagehand::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Copy {
            source,
            target,
            version,
            source_id,
            target_id,
        } => {
            let source = RepositoryEndpoint::parse(source_id, &source)?;
            let target = RepositoryEndpoint::parse(target_id, &target)?;

            let copier = RepositoryCopier::new(TransportRegistry, config.clone(), config);
            let report = copier.copy(&source, &target, &version)?;

            println!("copied {} from {} to {}", version, source, target);
            println!(
                "{} files, {} metadata merged, {} metadata new, {} renames",
                report.downloaded,
                report.metadata.merged.len(),
                report.metadata.new.len(),
                report.renames
            );
        }

        Commands::Config => {
            let content = toml::to_string_pretty(&config)?;
            print!("{}", content);
        }
    }

    Ok(())
}
