//! Command-line interface.

use buildfleet_gitlab::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, PipelineStatus};
use buildfleet_models::PackageId;
use clap::builder::RangedU64ValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "buildfleet", version, about)]
pub struct Cli {
    /// Configuration file (defaults to `buildfleet.toml` in the user config directory).
    #[arg(long, short, global = true, env = "BUILDFLEET_CONFIG")]
    pub config: Option<PathBuf>,
    /// More logging; repeat for trace output.
    #[arg(long, short, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Only log errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh checkouts, reconcile versions and resolve manifests.
    Analyze(Selection),
    /// Trigger builds for whatever the build matrix is missing.
    TriggerBuilds(Selection),
    /// Count builder pipelines by status.
    PipelineStatus {
        /// Statuses to count (repeatable).
        #[arg(long = "status", short, default_values_t = [PipelineStatus::Pending, PipelineStatus::Running])]
        statuses: Vec<PipelineStatus>,
        /// Pipelines per page (the API allows at most 100).
        #[arg(
            long,
            default_value_t = DEFAULT_PAGE_SIZE,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=100),
        )]
        page_size: usize,
        /// Stop after this many pages, even if there are more.
        #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
        max_pages: usize,
    },
    /// Add a package repository to the catalog.
    AddPackage {
        /// Clone URL of the repository.
        url: String,
    },
}

/// Which packages a run works on.
#[derive(Debug, Args)]
pub struct Selection {
    /// Packages to process; the configured limit when omitted.
    #[arg(long, short, conflicts_with = "ids")]
    pub limit: Option<usize>,
    /// Process these packages instead of selecting candidates (repeatable).
    #[arg(long = "id", value_parser = parse_package_id)]
    pub ids: Vec<PackageId>,
}

fn parse_package_id(value: &str) -> Result<PackageId, String> {
    value.trim().parse::<i64>().map(PackageId).map_err(|_| format!("invalid package id: {value}"))
}
