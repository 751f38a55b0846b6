//! Resolve command - discover the mods of a project and print the load set.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::{Path, PathBuf};

use kiln_resolve::{
    BuiltinSource, CandidateSource, DirectorySource, ExplicitSource, ModLocation, ModResolver, ResolveError,
    ResolvedSet, ResolverConfig,
};
use kiln_semver::Version;

use crate::config::{HostConfig, KilnConfig};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Mods directory (can be used multiple times, overrides kiln.toml)
    #[arg(short = 'm', long = "mods", value_name = "DIR", action = clap::ArgAction::Append)]
    pub mods: Vec<PathBuf>,

    /// Archive or directory loaded like a classpath entry
    #[arg(long, value_name = "PATH", action = clap::ArgAction::Append)]
    pub classpath: Vec<PathBuf>,

    /// Mark mods from the mods directories as needing remapping
    #[arg(long)]
    pub remap: bool,

    /// Mod that must be part of the result
    #[arg(short = 'p', long = "preselect", value_name = "ID", action = clap::ArgAction::Append)]
    pub preselect: Vec<String>,

    /// Discovery timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub discovery_timeout: Option<u64>,

    /// Solver timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub solver_timeout: Option<u64>,

    /// Number of discovery workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Working directory
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

fn parse_version(value: &str, field: &str) -> Result<Version> {
    Version::parse(value).with_context(|| format!("Invalid {} \"{}\" in kiln.toml", field, value))
}

fn host_source(host: &HostConfig) -> Result<BuiltinSource> {
    let min_runtime = host
        .min_runtime
        .as_deref()
        .map(|v| parse_version(v, "host.min_runtime"))
        .transpose()?;

    Ok(BuiltinSource::host(
        &host.id,
        parse_version(&host.version, "host.version")?,
        &host.runtime_id,
        parse_version(&host.runtime_version, "host.runtime_version")?,
        min_runtime,
    ))
}

/// Apply command line overrides on top of the file configuration
fn resolver_config(args: &ResolveArgs, config: Option<&KilnConfig>) -> ResolverConfig {
    let mut resolver = config.map(|c| c.resolver.clone()).unwrap_or_default();

    if let Some(secs) = args.discovery_timeout {
        resolver.discovery_timeout_secs = secs;
    }
    if let Some(secs) = args.solver_timeout {
        resolver.solver_timeout_secs = secs;
    }
    if args.workers.is_some() {
        resolver.worker_threads = args.workers;
    }

    resolver
}

fn sources(args: &ResolveArgs, working_dir: &Path, config: Option<&KilnConfig>) -> Result<Vec<Box<dyn CandidateSource>>> {
    let mut sources: Vec<Box<dyn CandidateSource>> = Vec::new();

    if let Some(host) = config.and_then(|c| c.host.as_ref()) {
        sources.push(Box::new(host_source(host)?));
    }

    let mods_dirs = if args.mods.is_empty() {
        config
            .map(|c| c.mods_dirs())
            .filter(|dirs| !dirs.is_empty())
            .unwrap_or_else(|| vec![working_dir.join("mods")])
    } else {
        args.mods.iter().map(|m| working_dir.join(m)).collect()
    };
    for dir in mods_dirs {
        sources.push(Box::new(DirectorySource::new(dir).with_remap(args.remap)));
    }

    let mut classpath = ExplicitSource::new();
    let entries = config.map(|c| c.classpath_entries()).unwrap_or_default();
    for entry in entries.into_iter().chain(args.classpath.iter().map(|c| working_dir.join(c))) {
        classpath = classpath.with_path(entry, false);
    }
    sources.push(Box::new(classpath));

    Ok(sources)
}

fn location(location: &ModLocation) -> String {
    match location {
        ModLocation::Builtin(_) => "builtin".to_string(),
        other => other.to_string(),
    }
}

fn print_resolved(resolved: &ResolvedSet) {
    println!(
        "{} Resolved {} mods",
        style("Success:").green().bold(),
        resolved.len()
    );
    for record in resolved.mods() {
        let depth = "  ".repeat(record.depth as usize);
        println!(
            "  {}{} {} {}",
            depth,
            style(record.identifier()).cyan(),
            style(record.version()).yellow(),
            style(format!("({})", location(&record.location))).dim()
        );
    }

    if !resolved.warnings().is_empty() {
        eprintln!("{}", style("Warnings:").yellow().bold());
        eprintln!("{}", resolved.describe_warnings());
    }
    if !resolved.failures().is_empty() {
        eprintln!("{}", style("Skipped:").yellow().bold());
        for failure in resolved.failures() {
            eprintln!("  - {}", failure);
        }
    }
}

pub async fn execute(args: ResolveArgs) -> Result<i32> {
    let working_dir = args.working_dir.canonicalize()
        .context("Failed to resolve working directory")?;

    let config = KilnConfig::load(&working_dir)?;
    if let Some(config) = &config {
        log::debug!("Using {}", config.base_dir.join(crate::config::CONFIG_FILE).display());
    }

    let sources = sources(&args, &working_dir, config.as_ref())?;
    let resolver = ModResolver::new(resolver_config(&args, config.as_ref()));

    match resolver.resolve(&sources, &args.preselect).await {
        Ok(resolved) => {
            print_resolved(&resolved);
            Ok(0)
        }
        Err(ResolveError::Unresolvable(failure)) => {
            eprintln!("{} {}", style("Error:").red().bold(), failure);
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}
