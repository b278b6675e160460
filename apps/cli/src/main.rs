#![deny(warnings)]

//! Headless driver: plays a number of sends and prints the dashboard.

use anyhow::{Context, Result};
use gauntlet_core::{short_signature, GameConfig};
use gauntlet_runtime::GameSession;
use persistence::SaveStore;
use relay::{HttpRelay, RelayConfig};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Contents of the optional YAML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    game: GameConfig,
    relay: RelayConfig,
}

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    rounds: Option<u32>,
    strategy: Option<String>,
    seed: Option<u64>,
    save: Option<String>,
    reset: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--rounds" => args.rounds = it.next().and_then(|s| s.parse().ok()),
            "--strategy" => args.strategy = it.next(),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--save" => args.save = it.next(),
            "--reset" => args.reset = true,
            _ => {}
        }
    }
    args
}

fn load_config(path: Option<&str>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))
}

/// Load saved progress if there is a store, then apply `--reset`.
async fn restore(
    mut session: GameSession,
    store: Option<&SaveStore>,
    reset: bool,
) -> Result<GameSession> {
    if let Some(store) = store {
        session = session.load(store).await?;
    }
    if reset {
        session.reset();
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        ?args,
        "starting gauntlet"
    );

    let mut file = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        file.game.rng_seed = seed;
    }
    let rounds = args.rounds.unwrap_or(10);

    let mut session = GameSession::new(file.game.clone())?;
    if file.game.use_real_relay {
        session = session.with_relay(Arc::new(HttpRelay::new(file.relay)?));
    }
    let store = match &args.save {
        Some(url) => Some(SaveStore::open(url).await?),
        None => None,
    };
    let session = restore(session, store.as_ref(), args.reset).await?;

    let ids = session.catalog().ids();
    for round in 0..rounds {
        // Stand-in for the wall-clock timer: one condition change per 3 sends.
        if round % 3 == 0 {
            session.tick();
        }
        let condition = session.current_condition();
        let id = args
            .strategy
            .clone()
            .unwrap_or_else(|| ids[round as usize % ids.len()].to_string());
        let report = session.send(&id).await?;
        let o = &report.outcome;
        println!(
            "#{:<3} {:<9} net={:<8} {:<7} cost={} latency={}ms delta={:+} {}",
            round + 1,
            o.strategy_id,
            condition.tier,
            if o.success { "LANDED" } else { "FAILED" },
            o.cost.round_dp(6),
            o.latency_ms.round_dp(0),
            report.delta.round_dp(2),
            o.signature
                .as_deref()
                .map(short_signature)
                .or_else(|| o.error_message.clone())
                .unwrap_or_default(),
        );
        if report.leveled_up {
            println!("     LEVEL UP -> {}", report.state.level());
        }
    }

    if let Some(store) = &store {
        session.save(store).await?;
    }

    let state = session.state();
    let dash = session.dashboard();
    println!(
        "Dashboard | score: {} | level: {} ({:.1}% to {}) | success: {}/{} ({:.1}%) \
         | total cost: {} SOL | avg: {} SOL",
        state.score.round_dp(2),
        dash.level,
        dash.level_progress_pct,
        dash.next_level_score,
        state.successes,
        state.attempts,
        dash.success_rate_pct,
        state.total_cost.round_dp(4),
        dash.average_cost.round_dp(6),
    );
    Ok(())
}
