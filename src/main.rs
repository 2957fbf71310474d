//! Lifecycle configuration inspection tool.
//!
//! Validates a lifecycle registry file and reports, per endpoint, the
//! lifecycle state and the headers that will be attached on the wire.

use anyhow::{Context, Result};
use axum_lifecycle::{LifecycleHeaders, LifecycleRegistry};
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "lifecycle-report",
    about = "Inspect and validate API lifecycle configuration",
    version
)]
struct Args {
    /// Path to the lifecycle configuration file
    #[arg(short, long, default_value = "lifecycle.yaml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: Level,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = LifecycleRegistry::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    if args.validate {
        println!(
            "Configuration is valid ({} endpoints)",
            registry.endpoints.len()
        );
        return Ok(());
    }

    if args.json {
        print_json_report(&registry)?;
    } else {
        print_report(&registry)?;
    }

    Ok(())
}

fn print_report(registry: &LifecycleRegistry) -> Result<()> {
    for endpoint in &registry.endpoints {
        let lifecycle = &endpoint.lifecycle;

        println!("{} ({})", endpoint.id, endpoint.path);
        if !endpoint.methods.is_empty() {
            println!("  methods: {}", endpoint.methods.join(", "));
        }
        if let Some(version) = &lifecycle.version {
            println!("  version: {}", version);
        }
        if lifecycle.is_deprecated() {
            match lifecycle.days_until_sunset() {
                Some(days) if days < 0 => {
                    println!("  status: deprecated, sunset {} days ago", -days)
                }
                Some(days) => println!("  status: deprecated, sunset in {} days", days),
                None => println!("  status: deprecated, no sunset date"),
            }
        } else {
            println!("  status: active");
        }

        let headers =
            LifecycleHeaders::render(lifecycle, Some(&endpoint.path), &registry.settings)?;
        println!("  headers:");
        for (name, value) in headers.header_map() {
            println!("    {}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }

    Ok(())
}

fn print_json_report(registry: &LifecycleRegistry) -> Result<()> {
    let mut report = Vec::new();

    for endpoint in &registry.endpoints {
        let lifecycle = &endpoint.lifecycle;
        let headers =
            LifecycleHeaders::render(lifecycle, Some(&endpoint.path), &registry.settings)?;

        let rendered: serde_json::Map<String, serde_json::Value> = headers
            .header_map()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    serde_json::Value::String(value.to_str().unwrap_or("<binary>").to_string()),
                )
            })
            .collect();

        report.push(serde_json::json!({
            "id": endpoint.id,
            "path": endpoint.path,
            "methods": endpoint.methods,
            "deprecated": lifecycle.is_deprecated(),
            "past_sunset": lifecycle.is_past_sunset(),
            "days_until_sunset": lifecycle.days_until_sunset(),
            "headers": rendered,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
