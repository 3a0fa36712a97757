use crate::config::Config;
use crate::entity::{Virus, VIRUS_EAT_MASS};
use crate::player::Player;
use glam::DVec2;
use rand::Rng;
use std::f64::consts::TAU;
use tracing::debug;

/// Bot names to use.
const BOT_NAMES: &[&str] = &[
    "Bot", "Hunter", "Hungry", "Nomnom", "Blob", "Cell", "Eater", "Seeker",
    "Roamer", "Wanderer", "Ghost", "Shadow", "Swift", "Tiny", "Big", "Mega",
];

/// Mass ratio needed before one cell can swallow another.
const EAT_RATIO: f64 = 1.25;
/// How far around its largest cell a bot looks.
const SEARCH_RADIUS: f64 = 1500.0;
/// Ticks between two decisions.
const DECISION_TICKS: u32 = 2;
/// Distance a fresh split cell can realistically cover.
const SPLIT_REACH: f64 = 350.0;

/// A bot player controlled by AI.
#[derive(Debug)]
pub struct Bot {
    /// Bot ID (same as its player id).
    pub id: u32,
    /// Bot name.
    pub name: String,
    /// Current target position in world coordinates.
    pub target: DVec2,
    /// Ticks until next decision.
    pub decision_cooldown: u32,
    /// Whether the bot wants to split.
    pub split_requested: bool,
    /// Cooldown for splitting (ticks).
    pub split_cooldown: u32,
}

impl Bot {
    /// Create a new bot with the given ID.
    pub fn new<R: Rng + ?Sized>(id: u32, rng: &mut R) -> Self {
        let name_idx = rng.random_range(0..BOT_NAMES.len());
        let name = format!("{}{}", BOT_NAMES[name_idx], id % 100);

        Self {
            id,
            name,
            target: DVec2::ZERO,
            decision_cooldown: 0,
            split_requested: false,
            split_cooldown: 0,
        }
    }

    /// Update the bot AI.
    ///
    /// Every other player's cell pulls the bot (prey) or pushes it away
    /// (threats) with a strength that falls off with distance; viruses repel
    /// cells big enough to pop on them. Prey within split reach triggers a
    /// split request.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        me: &Player,
        players: &[Player],
        viruses: &[Virus],
        config: &Config,
        rng: &mut R,
    ) {
        self.split_requested = false;

        if self.split_cooldown > 0 {
            self.split_cooldown -= 1;
        }

        let Some(largest) = me.largest_cell() else {
            return;
        };
        let my_pos = largest.position;
        let my_mass = largest.mass();
        let my_radius = largest.radius();

        if self.decision_cooldown > 0 {
            self.decision_cooldown -= 1;
            return;
        }
        self.decision_cooldown = DECISION_TICKS;

        let can_split = me.cells().len() * 2 <= config.player.max_cells && self.split_cooldown == 0;

        let mut result = DVec2::ZERO;
        let mut prey: Option<(DVec2, f64)> = None;

        let others = players
            .iter()
            .filter(|p| p.id != self.id)
            .flat_map(|p| p.cells());
        for cell in others {
            let displacement = cell.position - my_pos;
            let mut dist = displacement.length();
            if dist > SEARCH_RADIUS {
                continue;
            }

            let influence = if my_mass > cell.mass() * EAT_RATIO {
                cell.mass().sqrt()
            } else if cell.mass() > my_mass * EAT_RATIO {
                -(cell.mass() / my_mass).ln().max(0.1) * 10.0
            } else {
                -0.5
            };

            if influence < 0.0 {
                dist -= my_radius + cell.radius();
            }
            let dist = dist.max(1.0);
            result += displacement.normalize_or_zero() * (influence / dist);

            // halving must still leave the eater big enough
            if can_split && my_mass / 2.0 > cell.mass() * EAT_RATIO && dist < SPLIT_REACH {
                let bigger = prey.is_none_or(|(_, mass)| cell.mass() > mass);
                if bigger {
                    prey = Some((cell.position, cell.mass()));
                }
            }
        }

        if my_mass >= VIRUS_EAT_MASS {
            for virus in viruses {
                if virus.mass >= my_mass {
                    continue;
                }
                let displacement = virus.position - my_pos;
                let dist = (displacement.length() - my_radius - virus.radius).max(1.0);
                if dist < SEARCH_RADIUS {
                    result -= displacement.normalize_or_zero() * (100.0 / dist);
                }
            }
        }

        if let Some((prey_pos, prey_mass)) = prey {
            debug!("Bot {} targeting prey of mass {:.1} for split", self.id, prey_mass);
            self.target = prey_pos;
            self.split_cooldown = 15;
            self.split_requested = true;
        } else if result.length() > 1e-3 {
            self.target = my_pos + result.normalize() * 2000.0;
        } else {
            let angle = rng.random_range(0.0..TAU);
            self.target = my_pos + DVec2::new(angle.cos(), angle.sin()) * 400.0;
        }

        self.target.x = self.target.x.clamp(0.0, config.world.width);
        self.target.y = self.target.y.clamp(0.0, config.world.height);
    }
}
