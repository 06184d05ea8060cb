#![deny(unsafe_code)]

//! moddef CLI: run discovery passes over a mods directory.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use moddef_config::{FailurePolicy, LoaderConfig};
use moddef_core::manifest::discover_packages;
use moddef_core::{
    DefinitionLoader, EventChannel, EventRecorder, LoadOutcome, LoadReport, Registry,
    TracingObserver, resolver,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// moddef: convention-based definition discovery for mod packages.
#[derive(Parser)]
#[command(name = "moddef", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "moddef.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the package load order.
    Order {
        /// Directory holding one subdirectory per package.
        mods: PathBuf,
    },

    /// Run a load pass and report what was found.
    Scan {
        mods: PathBuf,

        /// Abort on the first file or package error.
        #[arg(long)]
        strict: bool,

        /// Print every discovery event.
        #[arg(long)]
        events: bool,

        /// Print the sealed registry as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the current record for an id and what it overrides.
    Get { mods: PathBuf, id: String },

    /// List the current records of one type.
    List {
        mods: PathBuf,
        #[arg(value_name = "TYPE")]
        type_name: String,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config.logging.level))),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Order { mods } => cmd_order(&config, &mods)?,
        Commands::Scan {
            mods,
            strict,
            events,
            json,
        } => cmd_scan(config, mods, strict, events, json).await?,
        Commands::Get { mods, id } => cmd_get(config, mods, &id).await?,
        Commands::List { mods, type_name } => cmd_list(config, mods, &type_name).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn log_filter(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// Run a load pass on the blocking pool.
async fn run_pass(config: LoaderConfig, mods: PathBuf, mut events: EventChannel) -> Result<LoadOutcome> {
    let outcome = tokio::task::spawn_blocking(move || -> Result<LoadOutcome> {
        let loader = DefinitionLoader::new(config)?;
        Ok(loader.load_dir(&mods, &mut events)?)
    })
    .await??;
    Ok(outcome)
}

fn cmd_order(config: &LoaderConfig, mods: &Path) -> Result<()> {
    let listing = discover_packages(mods, &config.discovery.manifest_file)?;
    let plan = resolver::resolve(listing.packages.iter().map(|p| &p.manifest))?;

    for (position, id) in plan.order.iter().enumerate() {
        println!("{:>3}. {id}", position + 1);
    }
    for error in &plan.rejected {
        println!("  skipped: {error}");
    }
    for broken in &listing.broken {
        println!("  broken: {}: {}", broken.dir.display(), broken.error);
    }
    Ok(())
}

async fn cmd_scan(mut config: LoaderConfig, mods: PathBuf, strict: bool, events: bool, json: bool) -> Result<()> {
    if strict {
        config.discovery.failure_policy = FailurePolicy::Strict;
    }

    let recorder = EventRecorder::new();
    let reader = recorder.reader();
    let mut channel = EventChannel::new().with(TracingObserver);
    if events {
        channel.subscribe(recorder);
    }

    let outcome = run_pass(config, mods, channel).await?;

    for event in reader.events() {
        println!("{event}");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.registry)?);
    } else {
        print!("{}", render_report(&outcome.report, &outcome.registry));
    }
    Ok(())
}

async fn cmd_get(config: LoaderConfig, mods: PathBuf, id: &str) -> Result<()> {
    let outcome = run_pass(config, mods, EventChannel::new()).await?;
    match describe_record(&outcome.registry, id) {
        Some(description) => print!("{description}"),
        None => bail!("no definition with id {id:?}"),
    }
    Ok(())
}

async fn cmd_list(config: LoaderConfig, mods: PathBuf, type_name: &str) -> Result<()> {
    let outcome = run_pass(config, mods, EventChannel::new()).await?;
    let mut found = false;
    for record in outcome.registry.all_of_type(type_name) {
        found = true;
        println!("{}\t{}\t{}", record.id, record.source_package, record.source_path);
    }
    if !found {
        let known: Vec<&str> = outcome.registry.types().map(|t| t.as_str()).collect();
        eprintln!("No definitions of type {type_name:?}. Known types: {}", known.join(", "));
    }
    Ok(())
}

fn cmd_config(config_path: &Path, config: &LoaderConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<LoaderConfig> {
    if path.exists() {
        Ok(LoaderConfig::load(path).await?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(LoaderConfig::default())
    }
}

fn render_report(report: &LoadReport, registry: &Registry) -> String {
    let summary = report.summary();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} definitions from {} packages ({} overridden, {} errors)",
        registry.len(),
        summary.packages,
        summary.overridden,
        summary.errors
    );
    let _ = writeln!(out, "load order: {}", report.load_order.join(", "));

    for error in &report.manifest_errors {
        let _ = writeln!(out, "error: {error}");
    }
    for package in report.packages.iter().filter(|p| !p.is_clean()) {
        let _ = writeln!(out, "{}:", package.package);
        if let Some(error) = &package.error {
            let _ = writeln!(out, "  dropped: {error}");
        }
        for error in &package.file_errors {
            let _ = writeln!(out, "  {}: {}", error.path, error.kind);
        }
    }
    out
}

fn describe_record(registry: &Registry, id: &str) -> Option<String> {
    let mut chain = registry.override_chain(id);
    let current = chain.next()?;

    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", current.id, current.type_name);
    let _ = writeln!(
        out,
        "  from {}:{} via {}",
        current.source_package, current.source_path, current.tier
    );
    for previous in chain {
        let _ = writeln!(
            out,
            "  overrides {}:{}",
            previous.source_package, previous.source_path
        );
    }
    let payload = serde_json::to_string_pretty(&current.payload).unwrap_or_default();
    let _ = writeln!(out, "{payload}");
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moddef_core::PackageManifest;
    use moddef_test_utils::TestModTree;
    use pretty_assertions::assert_eq;

    fn tree() -> TestModTree {
        let tree = TestModTree::new();
        tree.package(&PackageManifest::new("base"))
            .package(&PackageManifest::new("patch").with_dependency("base"))
            .definition("base", "Definitions/Weather/rain.json", "rain")
            .definition("patch", "Definitions/Weather/rain.json", "rain")
            .file("patch", "Definitions/Weather/bad.json", "{");
        tree
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0, "warn"), "warn");
        assert_eq!(log_filter(1, "warn"), "debug");
        assert_eq!(log_filter(5, "warn"), "trace");
    }

    #[test_log::test(tokio::test)]
    async fn test_run_pass_and_describe() {
        let tree = tree();
        let outcome = run_pass(LoaderConfig::default(), tree.path().to_path_buf(), EventChannel::new())
            .await
            .unwrap();

        let description = describe_record(&outcome.registry, "rain").unwrap();
        let lines: Vec<&str> = description.lines().take(3).collect();
        assert_eq!(
            lines,
            vec![
                "rain (Weather)",
                "  from patch:Definitions/Weather/rain.json via path mapping",
                "  overrides base:Definitions/Weather/rain.json",
            ]
        );
        assert!(describe_record(&outcome.registry, "missing").is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_render_report_lists_errors() {
        let tree = tree();
        let outcome = run_pass(LoaderConfig::default(), tree.path().to_path_buf(), EventChannel::new())
            .await
            .unwrap();

        let rendered = render_report(&outcome.report, &outcome.registry);
        assert!(rendered.starts_with("1 definitions from 2 packages (1 overridden, 1 errors)"));
        assert!(rendered.contains("load order: base, patch"));
        assert!(rendered.contains("patch:\n  Definitions/Weather/bad.json: malformed payload"));
    }

    #[test_log::test(tokio::test)]
    async fn test_strict_pass_fails() {
        let tree = tree();
        let mut config = LoaderConfig::default();
        config.discovery.failure_policy = FailurePolicy::Strict;
        let result = run_pass(config, tree.path().to_path_buf(), EventChannel::new()).await;
        assert!(result.is_err());
    }
}
