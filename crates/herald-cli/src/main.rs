//! CLI binary for dispatching recorded events and inspecting plugin configuration.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use herald_plugins::{
    default_registry, ConfigAgent, Configuration, DispatchReport, Dispatcher, PluginRegistry,
    PluginStatus,
};
use herald_scm::{FakeScmClient, GitHubClient, SharedScmClient};
use herald_types::NormalizedEvent;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Route repository events to label and comment plugins",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a recorded normalized event to the enabled plugins
    Dispatch {
        /// Plugin configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Normalized event (JSON)
        #[arg(short, long)]
        event: PathBuf,

        /// Run against an in-memory provider instead of GitHub
        #[arg(long)]
        dry_run: bool,

        /// Labels already on the issue, for dry runs (comma separated)
        #[arg(long, value_delimiter = ',', requires = "dry_run")]
        labels: Vec<String>,

        /// Bot login used for dry runs
        #[arg(long, default_value = "herald-bot", requires = "dry_run")]
        bot_name: String,

        /// GitHub API base URL (for GitHub Enterprise)
        #[arg(long)]
        api_url: Option<String>,

        /// Print the dispatch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print help for every registered plugin
    Help {
        /// Plugin configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Print the aggregate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a configuration against the registered plugins
    Validate {
        /// Plugin configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = default_registry().context("failed to register built-in plugins")?;

    match cli.command {
        Commands::Dispatch {
            config,
            event,
            dry_run,
            labels,
            bot_name,
            api_url,
            json,
        } => {
            let options = DispatchOptions {
                dry_run,
                labels,
                bot_name,
                api_url,
                json,
            };
            cmd_dispatch(registry, &config, &event, options).await?;
        }
        Commands::Help { config, json } => {
            cmd_help(&registry, &config, json)?;
        }
        Commands::Validate { config } => {
            cmd_validate(&registry, &config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Configuration> {
    Configuration::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

struct DispatchOptions {
    dry_run: bool,
    labels: Vec<String>,
    bot_name: String,
    api_url: Option<String>,
    json: bool,
}

async fn cmd_dispatch(
    registry: PluginRegistry,
    config_path: &Path,
    event_path: &Path,
    options: DispatchOptions,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("failed to read event from {}", event_path.display()))?;
    let event: NormalizedEvent = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a normalized event", event_path.display()))?;

    let fake = options.dry_run.then(|| {
        let fake = Arc::new(FakeScmClient::new(options.bot_name.clone()));
        let seeded: Vec<&str> = options.labels.iter().map(String::as_str).collect();
        fake.set_labels(&event.issue_ref(), &seeded);
        fake
    });
    let scm: SharedScmClient = match fake {
        Some(ref fake) => fake.clone(),
        None => {
            let mut client = GitHubClient::from_env().context("GITHUB_TOKEN must be set")?;
            if let Some(url) = options.api_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
    };
    tracing::info!(provider = scm.name(), event = %event, "Dispatching recorded event");

    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(ConfigAgent::new(config)), scm);
    tracing::debug!(plugins = ?dispatcher.matched_plugins(&event), "Matched plugins");
    let report = dispatcher.dispatch(event).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(fake) = fake {
        let mutations = fake.mutations();
        println!("\nDry run: {} provider mutation(s) recorded", mutations.len());
        for call in &mutations {
            println!("  {:?}", call);
        }
    }
    Ok(())
}

fn print_report(report: &DispatchReport) {
    println!("Dispatch {} for {}", report.dispatch_id, report.event);
    if report.plugins.is_empty() {
        println!("No enabled plugin handles this event");
        return;
    }
    for entry in &report.plugins {
        let status = match entry.status {
            PluginStatus::Succeeded => "OK",
            PluginStatus::PartiallyFailed => "PARTIAL",
            PluginStatus::Failed => "FAILED",
            PluginStatus::Panicked => "PANICKED",
        };
        println!(
            "  [{}] {} ({} action(s), {}ms)",
            status,
            entry.plugin,
            entry.actions.len(),
            entry.duration_ms
        );
        for action in &entry.actions {
            println!("      {}", serde_json::to_string(action).unwrap_or_default());
        }
        if let Some(ref error) = entry.error {
            println!("      error: {}", error);
        }
        for error in &entry.step_errors {
            println!("      step error: {}", error);
        }
    }
}

fn cmd_help(registry: &PluginRegistry, config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let aggregate = registry.aggregate_help(&config, &[]);

    if json {
        println!("{}", serde_json::to_string_pretty(&aggregate)?);
        return Ok(());
    }

    let featured = aggregate.featured_commands();
    if !featured.is_empty() {
        println!("Featured commands:");
        for (plugin, command) in &featured {
            println!("  {}  {} ({})", command.usage, command.description, plugin);
        }
        println!();
    }

    for (name, help) in &aggregate.plugin_help {
        println!("{} [{}]", name, help.events.join(", "));
        println!("  {}", help.description);
        for command in &help.commands {
            println!("  {}  {}", command.usage, command.description);
            if !command.examples.is_empty() {
                println!("    e.g. {}", command.examples.join(", "));
            }
        }
        let enabled: Vec<&str> = aggregate
            .all_repos
            .iter()
            .filter(|repo| config.enables_key(repo, name))
            .map(String::as_str)
            .collect();
        if enabled.is_empty() {
            println!("  enabled in: (nowhere)");
        } else {
            println!("  enabled in: {}", enabled.join(", "));
        }
        println!();
    }
    Ok(())
}

fn cmd_validate(registry: &PluginRegistry, config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let unknown = registry.unknown_plugins(&config);

    if unknown.is_empty() {
        let referenced: Vec<&str> = config.referenced_plugins().into_iter().collect();
        println!(
            "Configuration is valid ({} entries, enabled plugins: {})",
            config.plugins.len(),
            referenced.join(", ")
        );
        return Ok(());
    }

    for (key, name) in &unknown {
        println!("[ERROR] {}: unknown plugin '{}'", key, name);
    }
    println!("Known plugins: {}", registry.plugin_names().join(", "));
    std::process::exit(1);
}
