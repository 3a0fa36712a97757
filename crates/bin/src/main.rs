//! Arena - headless simulation runner.

mod viruses;

use arena::{Config, Simulation};
use futures_util::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use viruses::VirusField;

const DEFAULT_CONFIG_PATH: &str = "arena.toml";

/// Simulation plus the state the runner keeps around it.
struct World {
    sim: Simulation,
    viruses: VirusField,
    rng: StdRng,
    /// Smoothed tick duration in milliseconds.
    update_time_avg: f64,
}

impl World {
    fn new(config: Config) -> anyhow::Result<Self> {
        let rng = match config.server.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };
        let viruses = VirusField::new(
            config.virus.amount,
            config.virus.mass,
            config.world.width,
            config.world.height,
        );
        let sim = Simulation::new(config)?;
        Ok(Self {
            sim,
            viruses,
            rng,
            update_time_avg: 0.0,
        })
    }

    fn tick(&mut self) {
        let now = std::time::Instant::now();
        let report = self.sim.tick(now, self.viruses.viruses());

        if !report.consumed_viruses.is_empty() {
            self.viruses.remove(&report.consumed_viruses);
            let added = self.viruses.refill(self.sim.geometry(), &mut self.rng);
            debug!("Respawned {} viruses", added);
        }
        if let Some(leaderboard) = report.leaderboard {
            let names: Vec<&str> = leaderboard
                .iter()
                .map(|e| e.name.as_deref().unwrap_or("unnamed"))
                .collect();
            info!("Leaderboard: {}", names.join(", "));
        }
    }
}

async fn run_game_loop(state: Arc<RwLock<World>>, tick_interval_ms: u64) {
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    {
        let mut world = state.write().await;
        let World { sim, viruses, rng, .. } = &mut *world;
        let added = viruses.refill(sim.geometry(), rng);
        info!("World initialized: {} viruses", added);
        sim.spawn_bots(std::time::Instant::now());
    }

    loop {
        let scheduled = ticker.tick().await;

        // Always run the most recent tick when the loop falls behind
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        let mut world = state.write().await;
        let tick_start = std::time::Instant::now();
        world.tick();
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        world.update_time_avg = world.update_time_avg * 0.5 + tick_ms * 0.5;

        let tick_budget = tick_interval_ms as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms, avg: {:.3}ms) - {} players",
                world.sim.tick_count,
                tick_ms,
                tick_budget,
                world.update_time_avg,
                world.sim.players.len()
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Arena simulation v{}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path)?;
    info!("Loaded configuration from {}", path);
    info!("  World: {}x{}", config.world.width, config.world.height);
    info!("  Tick: {}ms, bots: {}", config.server.tick_interval_ms, config.server.bots);

    let tick_interval_ms = config.server.tick_interval_ms;
    let state = Arc::new(RwLock::new(World::new(config)?));

    tokio::select! {
        _ = run_game_loop(state.clone(), tick_interval_ms) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }

    let world = state.read().await;
    info!(
        "Ran {} ticks, {} players alive, total mass {:.1}",
        world.sim.tick_count,
        world.sim.players.len(),
        world.sim.players.get_total_mass()
    );
    Ok(())
}
