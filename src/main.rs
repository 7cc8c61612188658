//! Conditional container CLI
//!
//! Inspect widget configurations and evaluate them against user profiles.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conditional_container::{decide, ContainerConfig, DiagnosticSink, Profile};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "conditional-container")]
#[command(author, version, about = "Evaluate conditional-container visibility rules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a container configuration against a user profile
    Evaluate {
        /// Path to the widget configuration JSON
        config: PathBuf,

        /// Path to the profile JSON; omit to evaluate as an unauthenticated
        /// user
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Surface skipped conditions and sign-in state on stderr
        #[arg(long)]
        preview: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the conditions in a widget configuration
    Rules {
        /// Path to the widget configuration JSON
        config: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            config,
            profile,
            preview,
            format,
        } => cmd_evaluate(&config, profile.as_deref(), preview, &format),
        Commands::Rules { config, format } => cmd_rules(&config, &format),
    }
}

struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn notify(&self, message: &str) {
        eprintln!("note: {}", message);
    }
}

fn cmd_evaluate(
    config_path: &Path,
    profile_path: Option<&Path>,
    preview: bool,
    format: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    let profile = profile_path.map(load_profile).transpose()?;

    let sink = StderrSink;
    let diagnostics = preview.then_some(&sink as &dyn DiagnosticSink);
    let visible = decide(&config, profile.as_ref(), diagnostics);

    if format == "json" {
        println!("{}", serde_json::json!({ "visible": visible }));
    } else {
        println!("{}", if visible { "show" } else { "hide" });
    }

    // Exit code mirrors the decision so scripts can branch on it
    if !visible {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_rules(config_path: &Path, format: &str) -> Result<()> {
    let config = load_config(config_path)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&config.conditions)?);
        return Ok(());
    }

    println!(
        "Conditional mode: {}",
        if config.is_conditional() {
            "enabled"
        } else {
            "disabled"
        }
    );

    if config.conditions.is_empty() {
        println!("No conditions configured");
        return Ok(());
    }

    println!("Conditions ({} total):", config.conditions.len());
    for (index, rule) in config.conditions.iter().enumerate() {
        println!(
            "{:>3}. {} {} \"{}\" -> {}",
            index + 1,
            rule.user_key,
            rule.logic,
            rule.user_value,
            rule.visibility
        );
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ContainerConfig> {
    ContainerConfig::load_from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn load_profile(path: &Path) -> Result<Profile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse profile JSON in {}", path.display()))?;

    Profile::from_json_value(value)
        .context("Profile JSON must be an object of attributes")
}
