//! Linguard CLI - Command-line interface for the Linguard daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use linguard_sdk::{HealthResponse, LinguardClient};
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(name = "linguard-cli")]
#[command(about = "Linguard translation gateway CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon HTTP URL
    #[arg(long, env = "LINGUARD_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a piece of text
    Translate {
        /// Text to translate
        text: String,

        /// Source language code
        #[arg(short, long)]
        from: String,

        /// Target language code
        #[arg(short, long)]
        to: String,
    },

    /// List languages supported by the engine
    Languages,

    /// Show composite health (exit code 1 unless Healthy)
    Health,

    /// Show hosting process metrics
    Metrics,

    /// Show uptime, engine state and cache statistics
    Stats,

    /// Start the engine (e.g. after it failed)
    StartEngine,
}

#[derive(Tabled)]
struct LanguageRow {
    code: String,
    name: String,
}

#[derive(Tabled)]
struct CheckRow {
    check: String,
    status: String,
    description: String,
}

#[derive(Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

fn paint_status(status: &str) -> ColoredString {
    match status {
        "Healthy" | "READY" => status.green().bold(),
        "Degraded" | "STARTING" | "DEGRADED" | "RESTARTING" => status.yellow().bold(),
        _ => status.red().bold(),
    }
}

fn mib(bytes: u64) -> String {
    format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
}

fn print_health(health: &HealthResponse) {
    println!(
        "  {} {}  ({:.1} ms)",
        "Status:".bold(),
        paint_status(&health.status),
        health.total_duration_ms
    );
    println!(
        "  {} {}",
        "Engine:".bold(),
        paint_status(&health.supervisor.state)
    );
    if let Some(pid) = health.supervisor.pid {
        println!("  {} {}", "PID:".bold(), pid);
    }
    if health.supervisor.restart_attempts > 0 {
        println!(
            "  {} {}",
            "Restarts:".bold(),
            health.supervisor.restart_attempts
        );
    }
    if let Some(error) = &health.supervisor.last_error {
        println!("  {} {}", "Last error:".bold(), error.red());
    }
    println!();

    let rows: Vec<CheckRow> = health
        .checks
        .iter()
        .map(|check| CheckRow {
            check: check.name.clone(),
            status: check.status.clone(),
            description: check.description.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = LinguardClient::new(&cli.url).context("Invalid daemon URL")?;

    match cli.command {
        Commands::Translate { text, from, to } => {
            let response = client
                .translate(text, from, to)
                .await
                .context("Translation failed")?;

            println!("{}", response.translated_text);
            let origin = if response.cached { "cache" } else { "engine" };
            println!(
                "{}",
                format!("({} ms, from {})", response.latency_ms, origin).dimmed()
            );
        }

        Commands::Languages => {
            let response = client
                .languages()
                .await
                .context("Failed to list languages")?;

            let rows: Vec<LanguageRow> = response
                .languages
                .into_iter()
                .map(|(code, name)| LanguageRow { code, name })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Health => {
            println!("{}", "Linguard Health".cyan().bold());
            println!();

            let health = client.health().await.context("Failed to reach daemon")?;
            print_health(&health);
            if !health.is_healthy() {
                anyhow::bail!("engine is {}", health.status);
            }
        }

        Commands::Metrics => {
            let m = client.metrics().await.context("Failed to read metrics")?;
            let rows = vec![
                MetricRow {
                    metric: "CPU",
                    value: format!("{:.1}%", m.cpu_usage_percent),
                },
                MetricRow {
                    metric: "Resident memory",
                    value: mib(m.memory_rss_bytes),
                },
                MetricRow {
                    metric: "Virtual memory",
                    value: mib(m.virtual_memory_bytes),
                },
                MetricRow {
                    metric: "Threads",
                    value: m.thread_count.to_string(),
                },
                MetricRow {
                    metric: "Uptime",
                    value: format!("{} s", m.uptime_secs),
                },
                MetricRow {
                    metric: "Host memory",
                    value: format!(
                        "{} / {}",
                        mib(m.host_used_memory_bytes),
                        mib(m.host_total_memory_bytes)
                    ),
                },
                MetricRow {
                    metric: "CPUs",
                    value: m.cpu_count.to_string(),
                },
            ];
            println!("{}", Table::new(rows));
        }

        Commands::Stats => {
            let stats = client.stats().await.context("Failed to read stats")?;

            println!("{}", "Linguard Stats".cyan().bold());
            println!();
            println!("  {} {}", "URL:".bold(), client.base_url());
            println!("  {} {}", "Version:".bold(), stats.version);
            println!("  {} {} seconds", "Uptime:".bold(), stats.uptime_secs);
            println!(
                "  {} {}",
                "Engine:".bold(),
                paint_status(&stats.engine_state)
            );
            println!();
            println!("  {} {}", "Cache entries:".bold(), stats.cache.entries);
            println!("  {} {}", "Hits:".bold(), stats.cache.hits);
            println!("  {} {}", "Misses:".bold(), stats.cache.misses);
            println!("  {} {}", "Joined:".bold(), stats.cache.joined);
            println!("  {} {}", "Engine calls:".bold(), stats.cache.computations);
            println!("  {} {}", "Evictions:".bold(), stats.cache.evictions);
        }

        Commands::StartEngine => {
            println!("{}", "Starting engine...".cyan().bold());
            let status = client
                .start_engine()
                .await
                .context("Engine start failed")?;
            println!(
                "{} {}",
                "✓ Engine is".green().bold(),
                paint_status(&status.state)
            );
            if let Some(pid) = status.pid {
                println!("  {} {}", "PID:".bold(), pid);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_translate() {
        let cli = Cli::try_parse_from([
            "linguard-cli",
            "--url",
            "http://engine:9000",
            "translate",
            "hello",
            "--from",
            "en",
            "--to",
            "ko",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://engine:9000");
        match cli.command {
            Commands::Translate { text, from, to } => {
                assert_eq!(text, "hello");
                assert_eq!(from, "en");
                assert_eq!(to, "ko");
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_translate_requires_languages() {
        assert!(Cli::try_parse_from(["linguard-cli", "translate", "hello"]).is_err());
    }

    #[test]
    fn test_parse_start_engine() {
        let cli = Cli::try_parse_from(["linguard-cli", "start-engine"]).unwrap();
        assert!(matches!(cli.command, Commands::StartEngine));
    }
}
