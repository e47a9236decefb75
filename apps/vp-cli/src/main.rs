use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vp_protocol::VcrAction;

mod session;

use session::{CliResult, SessionConfig, open_proxy, parse_assignment};

#[derive(Parser)]
#[command(name = "vp-cli")]
#[command(
    about = "VizProxy CLI - drive visualization proxies against an in-memory server",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported extensions and the builder that handles each
    Extensions {
        /// Path to the session YAML file
        session_path: PathBuf,
    },
    /// Open a file and print its ids, timesteps, features and properties
    Inspect {
        /// Path to the session YAML file
        session_path: PathBuf,
        /// File to open, as known to the server
        file: PathBuf,
    },
    /// Open a file and move to a timestep
    Step {
        /// Path to the session YAML file
        session_path: PathBuf,
        /// File to open, as known to the server
        file: PathBuf,
        /// Target timestep index
        index: usize,
    },
    /// Open a file and apply property values
    Set {
        /// Path to the session YAML file
        session_path: PathBuf,
        /// File to open, as known to the server
        file: PathBuf,
        /// Assignments of the form name=value
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

fn main() -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extensions { session_path } => cmd_extensions(&session_path),
        Commands::Inspect { session_path, file } => cmd_inspect(&session_path, &file),
        Commands::Step {
            session_path,
            file,
            index,
        } => cmd_step(&session_path, &file, index),
        Commands::Set {
            session_path,
            file,
            assignments,
        } => cmd_set(&session_path, &file, &assignments),
    }
}

fn cmd_extensions(session_path: &Path) -> CliResult<()> {
    let config = SessionConfig::load(session_path)?;
    let registry = config.registry();
    let extensions = registry.extensions();

    if extensions.is_empty() {
        println!("No builders registered");
        return Ok(());
    }
    println!("Supported extensions:");
    for extension in extensions {
        let names = registry.builder_names(&extension);
        let active = names.last().map(String::as_str).unwrap_or("-");
        if names.len() > 1 {
            let shadowed = names[..names.len() - 1].join(", ");
            println!("  .{} -> {} (also: {})", extension, active, shadowed);
        } else {
            println!("  .{} -> {}", extension, active);
        }
    }
    Ok(())
}

fn cmd_inspect(session_path: &Path, file: &Path) -> CliResult<()> {
    let config = SessionConfig::load(session_path)?;
    let (_server, proxy) = open_proxy(&config, file)?;
    let view = proxy.snapshot();

    println!("File: {}", proxy.uri().display());
    println!(
        "  Ids: file={} view={} representation={}",
        view.ids.file, view.ids.view, view.ids.representation
    );
    println!("  Timesteps: {:?}", view.timesteps);

    if view.features.is_empty() {
        println!("  Features: none");
    } else {
        println!("  Features:");
        for (category, feature) in &view.features {
            let allowed: Vec<&str> = feature.allowed.iter().map(String::as_str).collect();
            println!("    {} [{}]", category, allowed.join(", "));
        }
    }

    println!("  Properties:");
    for (name, property) in &view.properties {
        let value = if property.values.is_empty() {
            property.value.clone().unwrap_or_else(|| "<none>".to_string())
        } else {
            property.values.join(", ")
        };
        println!("    {} = {}", name, value);
    }

    match &view.active {
        Some(active) => println!("  Active feature: {} / {}", active.category, active.feature),
        None => println!("  Active feature: none"),
    }
    Ok(())
}

fn cmd_step(session_path: &Path, file: &Path, index: usize) -> CliResult<()> {
    let config = SessionConfig::load(session_path)?;
    let (server, proxy) = open_proxy(&config, file)?;

    let count = proxy.timesteps().len();
    if index >= count {
        println!("Timestep {} is out of range ({} available)", index, count);
    }
    let stepped = proxy.set_timestep(index).wait()?;

    let actions: Vec<&str> = server.vcr_actions().iter().map(VcrAction::as_str).collect();
    println!("Current timestep: {}", proxy.current_timestep());
    if stepped {
        println!("  Steps: {}", actions.join(" "));
    } else {
        println!("  No steps taken");
    }
    Ok(())
}

fn cmd_set(session_path: &Path, file: &Path, assignments: &[String]) -> CliResult<()> {
    let config = SessionConfig::load(session_path)?;
    let pairs = assignments
        .iter()
        .map(|arg| parse_assignment(arg))
        .collect::<CliResult<Vec<_>>>()?;

    let (_server, proxy) = open_proxy(&config, file)?;
    let changed = proxy.set_properties(pairs.clone()).wait()?;

    println!("Changed {} of {} properties", changed, pairs.len());
    for (name, _) in &pairs {
        match proxy.property(name) {
            Some(value) => println!("  {} = {}", name, value),
            None => println!("  {} is not set", name),
        }
    }
    Ok(())
}
