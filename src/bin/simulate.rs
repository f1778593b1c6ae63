use std::collections::VecDeque;
use std::time::Instant;

use clap::Parser;
use log::{error, info};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use qsnork::config::Config;
use qsnork::logging;
use qsnork::simulation::{Episode, Simulation, Termination};
use qsnork::telemetry::{LogSink, Telemetry, TelemetrySink};

#[derive(Parser)]
#[command(
    name = "qsnork simulator",
    about = "Train tabular Q-learning snakes."
)]
struct Opts {
    /// JSON configuration, missing fields use the defaults.
    #[arg(long)]
    config: Option<Config>,
    /// Overrides the board width of the configuration.
    #[arg(long)]
    width: Option<usize>,
    /// Overrides the board height of the configuration.
    #[arg(long)]
    height: Option<usize>,
    #[arg(short, long, default_value_t = 1000)]
    episodes: usize,
    /// Independent runs, each with its own table.
    #[arg(short, long, default_value_t = 1)]
    runs: usize,
    /// Seed of the first run, the following runs increment it.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides the telemetry interval of the configuration.
    #[arg(long)]
    telemetry_interval: Option<usize>,
    /// Print telemetry as JSON lines to stdout.
    #[arg(long)]
    json: bool,
    /// Print the board during the last episode of every run.
    #[arg(short, long)]
    verbose: bool,
}

/// Summary of a finished run.
struct RunResult {
    run: usize,
    best: usize,
    recent_average: f64,
    lifetime_score: usize,
    exploration_rate: f64,
    terminations: [usize; 4],
}

#[tokio::main]
async fn main() {
    logging();

    let Opts {
        config,
        width,
        height,
        episodes,
        runs,
        seed,
        telemetry_interval,
        json,
        verbose,
    } = Opts::parse();

    let mut config = config.unwrap_or_default();
    if let Some(width) = width {
        config.board.width = width;
    }
    if let Some(height) = height {
        config.board.height = height;
    }
    if let Some(interval) = telemetry_interval {
        config.episode.telemetry_interval = interval;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }
    info!("Config: {config}");

    let start = Instant::now();

    let (sender, mut receiver) = mpsc::unbounded_channel::<Telemetry>();
    let printer = tokio::spawn(async move {
        let mut log = LogSink;
        while let Some(telemetry) = receiver.recv().await {
            if json {
                match serde_json::to_string(&telemetry) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!("Telemetry: {e}"),
                }
            } else {
                log.push(telemetry);
            }
        }
    });

    let mut handles = Vec::with_capacity(runs);
    for run in 0..runs {
        let config = config.clone();
        let sender = sender.clone();
        let seed = seed.map(|s| s.wrapping_add(run as u64));
        handles.push(tokio::task::spawn_blocking(move || {
            Simulation::new(config, seed).map(|sim| {
                let sim = sim.with_run(run).with_telemetry(sender);
                train(sim, run, episodes, verbose)
            })
        }));
    }
    drop(sender);

    let mut results = Vec::with_capacity(runs);
    for handle in handles {
        match handle.await {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => error!("Invalid configuration: {e}"),
            Err(e) => error!("Run failed: {e}"),
        }
    }
    if let Err(e) = printer.await {
        error!("Telemetry printer failed: {e}");
    }

    for r in &results {
        let [collision, no_escape, starved, trapped] = r.terminations;
        println!(
            "{}: {} best={} recent={:.2} lifetime={} ε={:.4} (collision={} no_escape={} starved={} trapped={})",
            "Finish Run".bright_green(),
            r.run,
            r.best,
            r.recent_average,
            r.lifetime_score,
            r.exploration_rate,
            collision,
            no_escape,
            starved,
            trapped
        );
    }
    println!(
        "Result: {} runs of {} episodes in {}ms",
        results.len(),
        episodes,
        start.elapsed().as_millis()
    );
}

/// Number of episodes the recent average is taken over.
const RECENT: usize = 100;

fn train(mut sim: Simulation, run: usize, episodes: usize, verbose: bool) -> RunResult {
    let mut best = 0;
    let mut recent = VecDeque::with_capacity(RECENT);
    let mut terminations = [0; 4];

    for i in 0..episodes {
        let episode = if verbose && i + 1 == episodes {
            loop {
                println!("{:?}", sim.world());
                if sim.tick().status.is_terminal() {
                    break sim.last_episode();
                }
            }
        } else {
            Some(sim.run_episode())
        };
        let Some(Episode {
            score, termination, ..
        }) = episode
        else {
            continue;
        };

        best = best.max(score);
        if recent.len() == RECENT {
            recent.pop_front();
        }
        recent.push_back(score);
        terminations[match termination {
            Termination::Collision(_) => 0,
            Termination::NoEscape => 1,
            Termination::Starved => 2,
            Termination::Trapped => 3,
        }] += 1;
    }

    RunResult {
        run,
        best,
        recent_average: recent.iter().sum::<usize>() as f64 / recent.len().max(1) as f64,
        lifetime_score: sim.lifetime_score(),
        exploration_rate: sim.agent().exploration_rate(),
        terminations,
    }
}
