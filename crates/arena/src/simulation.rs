//! Owned world state and the per-tick driver.

use crate::ai::BotManager;
use crate::config::Config;
use crate::entity::{MoveParams, Virus, VIRUS_EAT_MASS};
use crate::error::ArenaError;
use crate::geometry::{Geometry, StandardGeometry};
use crate::player::{ClientData, Player};
use crate::player_manager::{EatOutcome, LeaderboardEntry, PlayerManager};
use fixedbitset::FixedBitSet;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Ticks between two statistics log lines.
const STATS_INTERVAL_TICKS: u64 = 400;

/// Everything that happened during one tick that the outer server may need
/// to broadcast or act on.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Resolved cross-player eats, in resolution order.
    pub eaten: Vec<EatOutcome>,
    /// Players that lost their last cell this tick.
    pub deaths: Vec<u32>,
    /// Players kicked for missing heartbeats.
    pub evicted: Vec<u32>,
    /// Indexes into the virus snapshot of viruses eaten this tick.
    pub consumed_viruses: Vec<usize>,
    /// New leaderboard, present only when it changed.
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

/// The authoritative simulation.
pub struct Simulation {
    pub config: Config,
    pub players: PlayerManager,
    pub bots: BotManager,
    pub tick_count: u64,

    // Joined but not yet spawned
    pending: Vec<Player>,
    geometry: Box<dyn Geometry>,
    rng: StdRng,
    init_mass_log: f64,
    next_player_id: u32,
    leaderboard: Vec<LeaderboardEntry>,
}

impl Simulation {
    /// Create a simulation with the standard geometry.
    pub fn new(config: Config) -> Result<Self, ArenaError> {
        Self::with_geometry(config, Box::new(StandardGeometry))
    }

    /// Create a simulation with a custom geometry provider.
    pub fn with_geometry(config: Config, geometry: Box<dyn Geometry>) -> Result<Self, ArenaError> {
        config.validate()?;

        let rng = match config.server.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let init_mass_log = geometry.log(config.player.default_mass, config.player.slow_base);

        Ok(Self {
            config,
            players: PlayerManager::new(),
            bots: BotManager::new(),
            tick_count: 0,
            pending: Vec::new(),
            geometry,
            rng,
            init_mass_log,
            next_player_id: 1,
            leaderboard: Vec::new(),
        })
    }

    #[inline]
    pub fn geometry(&self) -> &dyn Geometry {
        self.geometry.as_ref()
    }

    /// Last published leaderboard.
    pub fn leaderboard(&self) -> &[LeaderboardEntry] {
        &self.leaderboard
    }

    /// Register a connecting player. It takes part in the simulation once
    /// [`spawn_player`](Self::spawn_player) is called.
    pub fn add_player(&mut self, now: Instant) -> u32 {
        let id = self.allocate_player_id();
        self.pending.push(Player::new(id, now, &mut self.rng));
        info!("Player {} connected", id);
        id
    }

    fn allocate_player_id(&mut self) -> u32 {
        let id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1);
        id
    }

    /// Spawn a registered player with one cell of the default mass.
    ///
    /// A player whose last cell was eaten is registered again under the same
    /// id and can be spawned the same way.
    pub fn spawn_player(&mut self, id: u32, position: Option<DVec2>) -> Result<(), ArenaError> {
        if self.players.get(id).is_some() {
            return Err(ArenaError::AlreadySpawned(id));
        }
        let index = self
            .pending
            .iter()
            .position(|p| p.id == id)
            .ok_or(ArenaError::PlayerNotFound(id))?;

        let position = position.unwrap_or_else(|| self.random_spawn_position());
        let mut player = self.pending.swap_remove(index);
        player.init(position, self.config.player.default_mass, self.geometry.as_ref());
        info!(
            "Player {} ({}) spawned at ({:.0}, {:.0})",
            id,
            player.name.as_deref().unwrap_or("unnamed"),
            position.x,
            position.y
        );
        self.players.push_new(player);
        Ok(())
    }

    /// Random position where a spawn-sized cell fits inside the world.
    pub fn random_spawn_position(&mut self) -> DVec2 {
        let radius = self.geometry.mass_to_radius(self.config.player.default_mass);
        let width = self.config.world.width;
        let height = self.config.world.height;
        DVec2::new(
            self.rng.random_range(radius.min(width / 2.0)..=(width - radius).max(width / 2.0)),
            self.rng.random_range(radius.min(height / 2.0)..=(height - radius).max(height / 2.0)),
        )
    }

    fn live_player_mut(&mut self, id: u32) -> Result<&mut Player, ArenaError> {
        if self.pending.iter().any(|p| p.id == id) {
            return Err(ArenaError::NotSpawned(id));
        }
        self.players.get_mut(id).ok_or(ArenaError::PlayerNotFound(id))
    }

    fn any_player_mut(&mut self, id: u32) -> Result<&mut Player, ArenaError> {
        if let Some(player) = self.pending.iter_mut().find(|p| p.id == id) {
            return Ok(player);
        }
        self.players.get_mut(id).ok_or(ArenaError::PlayerNotFound(id))
    }

    /// Update a player's desired offset (also a heartbeat).
    pub fn set_target(&mut self, id: u32, target: DVec2, now: Instant) -> Result<(), ArenaError> {
        self.live_player_mut(id)?.set_target(target, now);
        Ok(())
    }

    pub fn heartbeat(&mut self, id: u32, now: Instant) -> Result<(), ArenaError> {
        self.any_player_mut(id)?.set_last_heartbeat(now);
        Ok(())
    }

    /// Apply client metadata; allowed before spawning.
    pub fn client_data(&mut self, id: u32, data: ClientData, now: Instant) -> Result<(), ArenaError> {
        self.any_player_mut(id)?.client_provided_data(data, now);
        Ok(())
    }

    /// Player-initiated split.
    pub fn split(&mut self, id: u32, now: Instant) -> Result<(), ArenaError> {
        let max_cells = self.config.player.max_cells;
        let default_mass = self.config.player.default_mass;
        let geometry = self.geometry.as_ref();
        if self.pending.iter().any(|p| p.id == id) {
            return Err(ArenaError::NotSpawned(id));
        }
        let player = self.players.get_mut(id).ok_or(ArenaError::PlayerNotFound(id))?;
        player.user_split(max_cells, default_mass, now, geometry);
        Ok(())
    }

    /// Disconnect a player. Unknown ids are ignored.
    pub fn remove_player(&mut self, id: u32) -> Option<Player> {
        self.bots.remove_bot(id);
        if let Some(index) = self.pending.iter().position(|p| p.id == id) {
            return Some(self.pending.swap_remove(index));
        }
        let removed = self.players.remove_player_by_id(id);
        if removed.is_some() {
            info!("Player {} disconnected", id);
        }
        removed
    }

    /// Add and spawn a bot player.
    pub fn add_bot(&mut self, now: Instant) -> u32 {
        let id = self.allocate_player_id();
        self.bots.add_bot(id, &mut self.rng);
        self.spawn_bot_player(id, now);
        info!("Bot {} joined", id);
        id
    }

    /// Create and spawn the player driven by bot `id` at a random position.
    fn spawn_bot_player(&mut self, id: u32, now: Instant) {
        let name = self.bots.get_bot(id).map(|b| b.name.clone());
        let position = self.random_spawn_position();
        let mut player = Player::new(id, now, &mut self.rng);
        player.name = name;
        player.init(position, self.config.player.default_mass, self.geometry.as_ref());
        self.players.push_new(player);
    }

    /// Spawn the number of bots requested by the configuration.
    pub fn spawn_bots(&mut self, now: Instant) {
        let count = self.config.server.bots;
        for _ in 0..count {
            self.add_bot(now);
        }
        if count > 0 {
            info!("Spawned {} bots", count);
        }
    }

    /// Run one simulation tick.
    pub fn tick(&mut self, now: Instant, viruses: &[Virus]) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport {
            tick: self.tick_count,
            ..Default::default()
        };

        if self.tick_count % self.config.server.decay_interval_ticks == 0 {
            self.players.shrink_cells(
                self.config.player.mass_loss_rate,
                self.config.player.default_mass,
                self.config.player.min_mass_loss,
                self.geometry.as_ref(),
            );
        }

        report.evicted = self.evict_idle(now);

        self.process_bot_respawns(now);
        self.update_bots(now, viruses);

        self.move_players(now, viruses);
        report.consumed_viruses = self.consume_viruses(now, viruses);

        report.eaten = self.process_collisions();
        report.deaths = report
            .eaten
            .iter()
            .filter(|e| e.victim_died)
            .map(|e| e.loser.player_id)
            .collect();

        if self.tick_count % self.config.server.leaderboard_interval_ticks == 0 {
            let top = self.players.get_top_players();
            if top != self.leaderboard {
                self.leaderboard = top.clone();
                report.leaderboard = Some(top);
            }
        }

        if self.tick_count % STATS_INTERVAL_TICKS == 0 {
            let cells: usize = self.players.players().iter().map(|p| p.cells().len()).sum();
            debug!(
                "Tick #{}: {} players, {} cells, total mass {:.1}",
                self.tick_count,
                self.players.len(),
                cells,
                self.players.get_total_mass()
            );
        }

        report
    }

    fn evict_idle(&mut self, now: Instant) -> Vec<u32> {
        let max_interval = Duration::from_millis(self.config.server.max_heartbeat_interval_ms);

        for bot in &self.bots.bots {
            if let Some(player) = self.players.get_mut(bot.id) {
                player.set_last_heartbeat(now);
            }
        }

        let mut evicted: Vec<u32> = self
            .players
            .evict_idle(now, max_interval)
            .into_iter()
            .map(|p| p.id)
            .collect();
        self.pending.retain(|p| {
            let idle = now.saturating_duration_since(p.last_heartbeat) > max_interval;
            if idle {
                evicted.push(p.id);
            }
            !idle
        });

        for id in &evicted {
            info!("Player {} kicked: no heartbeat for over {:?}", id, max_interval);
        }
        evicted
    }

    fn process_bot_respawns(&mut self, now: Instant) {
        for id in self.bots.get_respawn_list(&self.players) {
            self.spawn_bot_player(id, now);
            debug!("Bot {} respawned", id);
        }
    }

    fn update_bots(&mut self, now: Instant, viruses: &[Virus]) {
        if self.bots.bots.is_empty() {
            return;
        }
        self.bots.update(&self.players, viruses, &self.config, &mut self.rng);

        let geometry = self.geometry.as_ref();
        for bot in &self.bots.bots {
            let Some(player) = self.players.get_mut(bot.id) else {
                continue;
            };
            let offset = bot.target - player.position;
            player.set_target(offset, now);
            if bot.split_requested {
                player.user_split(
                    self.config.player.max_cells,
                    self.config.player.default_mass,
                    now,
                    geometry,
                );
            }
        }
    }

    fn move_players(&mut self, now: Instant, viruses: &[Virus]) {
        let params = MoveParams {
            slow_base: self.config.player.slow_base,
            init_mass_log: self.init_mass_log,
            game_width: self.config.world.width,
            game_height: self.config.world.height,
            viruses,
        };
        let geometry = self.geometry.as_ref();
        for player in self.players.players_mut() {
            player.move_cells(&params, now, geometry, &mut self.rng);
        }
    }

    /// Let every cell heavy enough swallow the viruses whose centre it covers,
    /// then blow those cells apart. Each virus is consumed at most once.
    fn consume_viruses(&mut self, now: Instant, viruses: &[Virus]) -> Vec<usize> {
        if viruses.is_empty() {
            return Vec::new();
        }

        let geometry = self.geometry.as_ref();
        let max_cells = self.config.player.max_cells;
        let default_mass = self.config.player.default_mass;
        let mut eaten = FixedBitSet::with_capacity(viruses.len());
        let mut consumed = Vec::new();

        for player in self.players.players_mut() {
            let mut cells_to_split = Vec::new();
            for (index, cell) in player.cells().iter().enumerate() {
                if cell.mass() < VIRUS_EAT_MASS {
                    continue;
                }
                let radius_sq = cell.radius() * cell.radius();
                for (v, virus) in viruses.iter().enumerate() {
                    if eaten.contains(v) || virus.mass >= cell.mass() {
                        continue;
                    }
                    if cell.position.distance_squared(virus.position) <= radius_sq {
                        eaten.insert(v);
                        consumed.push(v);
                        if cells_to_split.last() != Some(&index) {
                            cells_to_split.push(index);
                        }
                    }
                }
            }

            if !cells_to_split.is_empty() {
                debug!("Player {} popped on {} virus(es)", player.id, cells_to_split.len());
                player.virus_split(&cells_to_split, max_cells, default_mass, now, geometry);
            }
        }

        consumed
    }

    /// Resolve every eat. Dead human players go back to the joined-but-not-
    /// spawned list so they can respawn under the same id; dead bots are
    /// respawned by the bot pass on the next tick.
    fn process_collisions(&mut self) -> Vec<EatOutcome> {
        let geometry = self.geometry.as_ref();
        let mut eaten = Vec::new();
        let mut dead = Vec::new();
        self.players.handle_collisions(geometry, |manager, loser, winner| {
            if let Some((outcome, victim)) = manager.resolve_eat(loser, winner, geometry) {
                eaten.push(outcome);
                dead.extend(victim);
            }
        });

        for player in dead {
            if !self.bots.is_bot(player.id) {
                self.pending.push(player);
            }
        }
        eaten
    }
}
