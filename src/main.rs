mod cli;
mod error;

use crate::cli::{Cli, Command, Selection};
use crate::error::{ErrorKind, Result};
use buildfleet_config::Config;
use buildfleet_db::{Database, Repository};
use buildfleet_gitlab::{Builder, HttpTransport};
use buildfleet_pipeline::{BuildMatrix, Context};
use buildfleet_shell::{LocalShell, ShellHandle};
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "{err}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins; otherwise `--verbose`/`--quiet` pick the level.
fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::INFO,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Analyze(selection) => {
            let db = open_database(&config).await?;
            let ctx = context(&config, &db);
            let report = match selection {
                Selection { ids, .. } if !ids.is_empty() => buildfleet_pipeline::analyze_ids(&ctx, &ids).await,
                Selection { limit, .. } => {
                    buildfleet_pipeline::analyze(&ctx, limit.unwrap_or(config.analysis.limit)).await
                },
            };
            db.close().await;
            let report = report.or_raise(|| ErrorKind::Pipeline)?;
            println!(
                "packages: {} ok, {} failed; versions: {} resolved, {} failed",
                report.packages_ok, report.packages_failed, report.versions_resolved, report.versions_failed
            );
        },
        Command::TriggerBuilds(selection) => {
            let builder = builder(&config)?;
            let db = open_database(&config).await?;
            let ctx = context(&config, &db);
            let report = match selection {
                Selection { ids, .. } if !ids.is_empty() => {
                    buildfleet_pipeline::trigger_builds_for(&ctx, &builder, &ids).await
                },
                Selection { limit, .. } => {
                    buildfleet_pipeline::trigger_builds(&ctx, &builder, limit.unwrap_or(config.builds.limit)).await
                },
            };
            db.close().await;
            let report = report.or_raise(|| ErrorKind::Pipeline)?;
            println!("builds: {} triggered, {} failed, {} skipped", report.triggered, report.failed, report.skipped);
        },
        Command::PipelineStatus { statuses, page_size, max_pages } => {
            let builder = builder(&config)?;
            for status in statuses {
                let count = builder.status_count(status, page_size, max_pages).await.or_raise(|| ErrorKind::Builder)?;
                println!("{status}: {count}");
            }
        },
        Command::AddPackage { url } => {
            let db = open_database(&config).await?;
            let package = Repository::from(&db).insert_package(&url).await;
            db.close().await;
            let package = package.or_raise(|| ErrorKind::Database)?;
            if let Some(id) = package.id {
                println!("{id}\t{}", package.url);
            }
        },
    }
    Ok(())
}

async fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
    }
    Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)
}

fn context(config: &Config, db: &Database) -> Context {
    let shell: ShellHandle = Arc::new(LocalShell::new());
    let matrix = BuildMatrix::new(
        config.matrix.platforms.iter().copied(),
        config.matrix.swift_versions.iter().copied(),
    );
    Context::new(shell, Repository::from(db), &config.checkouts, matrix).with_concurrency(config.analysis.concurrency)
}

fn builder(config: &Config) -> Result<Builder> {
    let transport = HttpTransport::new(config.gitlab.timeout()).or_raise(|| ErrorKind::Builder)?;
    Ok(Builder::new(Arc::new(transport), config.api_base_url())
        .with_project(&config.gitlab.base_url, config.gitlab.project_id)
        .with_branch(&config.gitlab.branch)
        .with_credentials(config.gitlab.credentials()))
}
