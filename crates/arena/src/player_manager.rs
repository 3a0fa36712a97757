//! Player collection, cross-player eating and leaderboard queries.

use crate::entity::Cell;
use crate::geometry::Geometry;
use crate::player::{CellRef, Player};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Number of entries returned by [`PlayerManager::get_top_players`].
pub const LEADERBOARD_SIZE: usize = 10;

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub id: u32,
    pub name: Option<String>,
}

/// Result of resolving one eat event.
#[derive(Debug, Clone, PartialEq)]
pub struct EatOutcome {
    pub loser: CellRef,
    pub winner: CellRef,
    /// Mass moved from the loser to the winner.
    pub mass: f64,
    /// The loser's player lost its last cell and was removed.
    pub victim_died: bool,
}

/// All live players, in insertion order.
///
/// Indices are only valid until the next mutation: removals shift them and
/// [`get_top_players`](Self::get_top_players) reorders the collection.
#[derive(Debug, Default)]
pub struct PlayerManager {
    players: Vec<Player>,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[inline]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[inline]
    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn push_new(&mut self, player: Player) {
        self.players.push(player);
    }

    pub fn find_index_by_id(&self, id: u32) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Remove a player by id. Unknown ids are ignored.
    pub fn remove_player_by_id(&mut self, id: u32) -> Option<Player> {
        self.find_index_by_id(id)
            .map(|index| self.remove_player_by_index(index))
    }

    pub fn remove_player_by_index(&mut self, index: usize) -> Player {
        self.players.remove(index)
    }

    /// Apply mass decay to every player.
    pub fn shrink_cells(
        &mut self,
        rate: f64,
        default_mass: f64,
        min_mass_loss: f64,
        geometry: &dyn Geometry,
    ) {
        for player in &mut self.players {
            player.lose_mass_if_needed(rate, default_mass, min_mass_loss, geometry);
        }
    }

    /// Remove one cell. Returns true if its player has no cells left.
    pub fn remove_cell(&mut self, player_index: usize, cell_index: usize) -> bool {
        self.players[player_index].remove_cell(cell_index)
    }

    pub fn get_cell(&self, player_index: usize, cell_index: usize) -> &Cell {
        self.players[player_index].cell(cell_index)
    }

    /// Resolve a stable cell reference to current indices.
    pub fn locate(&self, cell: CellRef) -> Option<(usize, usize)> {
        let player_index = self.find_index_by_id(cell.player_id)?;
        let cell_index = self.players[player_index].cell_index(cell.cell_id)?;
        Some((player_index, cell_index))
    }

    /// Find every cross-player eat and hand it to `callback(manager, loser, winner)`.
    ///
    /// Events are collected against the state at the start of the sweep and
    /// only then passed to the callback, which is free to mutate the manager.
    /// Callbacks must tolerate references to cells that an earlier event
    /// already removed.
    pub fn handle_collisions<F>(&mut self, geometry: &dyn Geometry, mut callback: F)
    where
        F: FnMut(&mut Self, CellRef, CellRef),
    {
        let mut events = Vec::new();
        for (a, player_a) in self.players.iter().enumerate() {
            for player_b in &self.players[a + 1..] {
                Player::check_for_collisions(player_a, player_b, geometry, |loser, winner| {
                    events.push((loser, winner));
                });
            }
        }

        if !events.is_empty() {
            debug!("Collision sweep found {} eat events", events.len());
        }
        for (loser, winner) in events {
            callback(self, loser, winner);
        }
    }

    /// Standard eat resolution: move the loser's mass into the winner, remove
    /// the loser cell and evict its player once it has no cells left. The
    /// evicted player is handed back so the caller can keep it for a respawn.
    ///
    /// Returns None if either cell is gone already.
    pub fn resolve_eat(
        &mut self,
        loser: CellRef,
        winner: CellRef,
        geometry: &dyn Geometry,
    ) -> Option<(EatOutcome, Option<Player>)> {
        let (loser_player, loser_cell) = self.locate(loser)?;
        let (winner_player, winner_cell) = self.locate(winner)?;

        let mass = self.get_cell(loser_player, loser_cell).mass();
        self.players[winner_player].change_cell_mass(winner_cell, mass, geometry);

        let victim_died = self.remove_cell(loser_player, loser_cell);
        let victim = if victim_died {
            let victim = self.remove_player_by_index(loser_player);
            info!(
                "Player {} ({}) was eaten by player {}",
                victim.id,
                victim.name.as_deref().unwrap_or("unnamed"),
                winner.player_id
            );
            Some(victim)
        } else {
            None
        };

        let outcome = EatOutcome {
            loser,
            winner,
            mass,
            victim_died,
        };
        Some((outcome, victim))
    }

    /// Remove and return every player whose last heartbeat is older than
    /// `max_interval`.
    pub fn evict_idle(&mut self, now: Instant, max_interval: Duration) -> Vec<Player> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while index < self.players.len() {
            let idle = now.saturating_duration_since(self.players[index].last_heartbeat);
            if idle > max_interval {
                evicted.push(self.remove_player_by_index(index));
            } else {
                index += 1;
            }
        }
        evicted
    }

    /// Sort players by descending total mass and return the top
    /// [`LEADERBOARD_SIZE`].
    ///
    /// This reorders the collection; any index taken before the call is stale.
    pub fn get_top_players(&mut self) -> Vec<LeaderboardEntry> {
        self.players
            .sort_by(|a, b| b.mass_total().total_cmp(&a.mass_total()));
        self.players
            .iter()
            .take(LEADERBOARD_SIZE)
            .map(|p| LeaderboardEntry {
                id: p.id,
                name: p.name.clone(),
            })
            .collect()
    }

    /// Total mass held by all players.
    pub fn get_total_mass(&self) -> f64 {
        self.players.iter().map(Player::mass_total).sum()
    }
}
