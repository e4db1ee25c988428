//! Dissonance - headless match runner
//!
//! Plays an AI-only match on a synthetic feature feed and prints the
//! game-end report.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use dissonance::audio::generate_feed;
use dissonance::core::config::GameConfig;
use dissonance::core::error::{DissonanceError, Result};
use dissonance::simulation::{GameEndReport, HeadlessRunner};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

/// Headless match runner - AI against AI on a synthetic track
#[derive(Parser, Debug)]
#[command(name = "dissonance")]
#[command(about = "Run an AI-only match and print the game-end report")]
struct Args {
    /// TOML configuration file (defaults for missing keys)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of AI players
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(2..))]
    players: u16,

    /// Simulated match length in seconds
    #[arg(long, default_value_t = 300)]
    duration_secs: u64,

    /// Tempo of the synthetic track
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: Format,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dissonance=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    let duration_ms = args.duration_secs * 1000;
    tracing::info!(seed, players = args.players, duration_ms, bpm = args.bpm, "starting headless match");

    let feed = Arc::new(generate_feed(seed, duration_ms, args.bpm)?);
    let mut runner = HeadlessRunner::new(Arc::new(config), feed, seed, args.players as usize)?;
    let report = runner.run(duration_ms)?;

    match args.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(DissonanceError::from)?;
            println!("{}", json);
        }
        Format::Text => print_text(&report, seed),
    }
    Ok(())
}

fn print_text(report: &GameEndReport, seed: u64) {
    println!("=== DISSONANCE ===");
    println!("seed: {}", seed);
    match report.winner {
        Some(winner) => println!("winner: {}", winner),
        None => println!("winner: none (time limit)"),
    }
    println!("duration: {:.1}s over {} beats", report.duration_ms as f64 / 1000.0, report.beats);
    for player in &report.players {
        let stats = &player.stats;
        println!();
        println!(
            "{}{}",
            player.player,
            if player.lost { " (lost)" } else { "" }
        );
        println!(
            "  neurons built: {}  potentials built: {}  epsp swallowed: {}",
            stats.total_neurons_built(),
            stats.total_potentials_built(),
            stats.epsp_swallowed
        );
        for resource in &player.resources {
            println!(
                "  {:<10} {:>7.1} / {:>7.1}  gathered {:>8.1}  spent {:>8.1}",
                resource.kind.to_string(),
                resource.current,
                resource.limit,
                resource.gathered,
                resource.spent
            );
        }
        let researched: Vec<String> = player
            .technologies
            .iter()
            .filter(|t| t.level > 0)
            .map(|t| format!("{} {}", t.kind, t.level))
            .collect();
        if !researched.is_empty() {
            println!("  technologies: {}", researched.join(", "));
        }
    }
}
