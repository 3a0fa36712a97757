use super::bot_player::Bot;
use crate::config::Config;
use crate::entity::Virus;
use crate::player_manager::PlayerManager;
use rand::Rng;

/// Bot manager.
#[derive(Debug, Default)]
pub struct BotManager {
    /// Active bots.
    pub bots: Vec<Bot>,
}

impl BotManager {
    /// Create a new bot manager.
    pub fn new() -> Self {
        Self { bots: Vec::new() }
    }

    /// Register a bot driving the player with the given id.
    pub fn add_bot<R: Rng + ?Sized>(&mut self, id: u32, rng: &mut R) -> &Bot {
        self.bots.push(Bot::new(id, rng));
        &self.bots[self.bots.len() - 1]
    }

    /// Remove a bot by ID.
    pub fn remove_bot(&mut self, id: u32) {
        self.bots.retain(|b| b.id != id);
    }

    /// Get a bot by ID.
    pub fn get_bot(&self, id: u32) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id == id)
    }

    pub fn is_bot(&self, id: u32) -> bool {
        self.get_bot(id).is_some()
    }

    /// Update every bot whose player is alive.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        players: &PlayerManager,
        viruses: &[Virus],
        config: &Config,
        rng: &mut R,
    ) {
        for bot in &mut self.bots {
            if let Some(me) = players.get(bot.id) {
                bot.update(me, players.players(), viruses, config, rng);
            }
        }
    }

    /// Get bot IDs whose player is gone and needs to respawn.
    pub fn get_respawn_list(&self, players: &PlayerManager) -> Vec<u32> {
        self.bots
            .iter()
            .filter(|b| players.get(b.id).is_none())
            .map(|b| b.id)
            .collect()
    }
}
