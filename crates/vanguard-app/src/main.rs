//! Headless runner: advances a universe for a fixed tick budget and writes
//! the cosmic journal to the log.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vanguard_core::{TickSummary, Universe, UniverseConfig, UniverseObserver};
use vanguard_mind::NeuralMind;

#[derive(Debug, Parser)]
#[command(name = "vanguard", about = "Chaotic-attractor agent universe, headless")]
struct Args {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 20_000)]
    ticks: u64,

    /// Number of agent slots in the universe.
    #[arg(long, default_value_t = 16)]
    population: usize,

    /// RNG seed; omit for a fresh universe every run.
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks between journal reports (0 disables them).
    #[arg(long, default_value_t = 1_000)]
    report_interval: u32,

    /// Run without learned minds; agents steer on instinct alone.
    #[arg(long)]
    no_minds: bool,

    /// Enable lineage inheritance with the given probability.
    #[arg(long)]
    lineage: Option<f32>,

    /// Write the final frame snapshot as JSON to this path.
    #[arg(long)]
    frame_out: Option<PathBuf>,
}

/// Journal sink: forwards each report to the structured log.
struct JournalObserver;

impl UniverseObserver for JournalObserver {
    fn on_report(&mut self, summary: &TickSummary) {
        info!(
            tick = summary.tick.0,
            souls = summary.souls,
            parasites = summary.parasites,
            judges = summary.judges,
            mean_mood = summary.mean_mood,
            mean_fear = summary.mean_fear,
            mean_energy = summary.mean_energy,
            rebirths = summary.rebirths,
            conversions = summary.conversions,
            deaths = summary.total_deaths,
            legends = summary.legendary_lives,
            top_score = summary.top_score,
            "journal"
        );
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn run(universe: &mut Universe, ticks: u64, stop: &AtomicBool) -> u64 {
    let mut completed = 0;
    while completed < ticks && !stop.load(Ordering::Relaxed) {
        universe.step();
        completed += 1;
    }
    completed
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = UniverseConfig {
        population: args.population,
        rng_seed: args.seed,
        report_interval: args.report_interval,
        ..UniverseConfig::default()
    };
    if let Some(probability) = args.lineage {
        config.lineage_probability = probability;
    }

    let mut universe = Universe::with_observer(config, Box::new(JournalObserver))
        .context("configuring universe")?;
    if !args.no_minds {
        universe.install_minds(NeuralMind::runner);
    }

    info!(
        population = args.population,
        ticks = args.ticks,
        seed = args.seed,
        minds = !args.no_minds,
        "universe ready"
    );

    let stop = AtomicBool::new(false);
    let completed = run(&mut universe, args.ticks, &stop);

    let memory = universe.memory();
    info!(
        ticks = completed,
        deaths = memory.total_deaths(),
        legends = memory.legendary_lives(),
        archived_trails = memory.canvas_len(),
        top_score = memory.best().map(|elite| elite.score),
        "universe halted"
    );

    if let Some(path) = args.frame_out {
        let frame = universe.frame();
        let encoded = serde_json::to_vec_pretty(&frame).context("encoding frame snapshot")?;
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        file.write_all(&encoded)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), agents = frame.agents.len(), "frame written");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_honors_the_stop_flag() {
        let config = UniverseConfig {
            population: 4,
            rng_seed: Some(1),
            report_interval: 0,
            ..UniverseConfig::default()
        };
        let mut universe = Universe::new(config).expect("valid config");
        let stop = AtomicBool::new(true);
        assert_eq!(run(&mut universe, 100, &stop), 0);

        let stop = AtomicBool::new(false);
        assert_eq!(run(&mut universe, 25, &stop), 25);
    }

    #[test]
    fn cli_parses_defaults() {
        let args = Args::parse_from(["vanguard"]);
        assert_eq!(args.ticks, 20_000);
        assert_eq!(args.population, 16);
        assert!(!args.no_minds);
        assert!(args.seed.is_none());
    }
}
