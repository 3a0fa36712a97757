//! Player state and cell lifecycle.

use crate::entity::{
    Cell, MoveParams, WhoAteWho, MIN_SPEED, PUSHING_AWAY_SPEED, SPLIT_CELL_SPEED,
};
use crate::geometry::Geometry;
use fixedbitset::FixedBitSet;
use glam::DVec2;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cooldown after a split during which sibling cells push apart instead of merging.
pub const MERGE_TIMER: Duration = Duration::from_secs(15);

/// Display metadata supplied by the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientData {
    pub name: String,
    pub screen_width: f64,
    pub screen_height: f64,
}

/// Stable reference to a cell: owner id plus the cell's own id.
///
/// Positional indices shift whenever a cell or player is removed, so
/// collision events never carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub player_id: u32,
    pub cell_id: u32,
}

impl CellRef {
    pub fn new(player_id: u32, cell_id: u32) -> Self {
        Self { player_id, cell_id }
    }
}

/// What to do with a colliding same-owner pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAction {
    Keep,
    /// Drop the second cell of the pair once the sweep is over.
    RemoveSecond,
}

/// A player and the cells it owns.
#[derive(Debug, Clone)]
pub struct Player {
    /// Unique player ID, stable for the session.
    pub id: u32,
    /// Player name (None until the client sends it).
    pub name: Option<String>,
    /// Display hue, 0..=360.
    pub hue: u16,
    pub screen_width: Option<f64>,
    pub screen_height: Option<f64>,
    cells: Vec<Cell>,
    mass_total: f64,
    /// Centroid of all owned cells, refreshed every move.
    pub position: DVec2,
    /// Desired offset relative to `position`, as sent by the client.
    pub target: DVec2,
    /// Cells may merge again once this instant has passed.
    pub time_to_merge: Option<Instant>,
    /// Last time the client proved it is alive.
    pub last_heartbeat: Instant,
    next_cell_id: u32,
}

impl Player {
    /// Create a new, not yet spawned player.
    pub fn new<R: Rng + ?Sized>(id: u32, now: Instant, rng: &mut R) -> Self {
        Self {
            id,
            name: None,
            hue: rng.random_range(0..=360),
            screen_width: None,
            screen_height: None,
            cells: Vec::new(),
            mass_total: 0.0,
            position: DVec2::ZERO,
            target: DVec2::ZERO,
            time_to_merge: None,
            last_heartbeat: now,
            next_cell_id: 0,
        }
    }

    /// (Re)spawn with a single cell of `default_mass` at `position`.
    pub fn init(&mut self, position: DVec2, default_mass: f64, geometry: &dyn Geometry) {
        let id = self.allocate_cell_id();
        self.cells = vec![Cell::new(id, position, default_mass, MIN_SPEED, geometry)];
        self.mass_total = default_mass;
        self.position = position;
        self.target = DVec2::ZERO;
        self.time_to_merge = None;
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// Current position of the cell with the given id.
    pub fn cell_index(&self, cell_id: u32) -> Option<usize> {
        self.cells.iter().position(|c| c.id == cell_id)
    }

    /// Sum of all owned cell masses.
    #[inline]
    pub fn mass_total(&self) -> f64 {
        self.mass_total
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.cells.is_empty()
    }

    /// The heaviest owned cell, if any.
    pub fn largest_cell(&self) -> Option<&Cell> {
        self.cells.iter().max_by(|a, b| a.mass().total_cmp(&b.mass()))
    }

    /// Apply client metadata; also counts as a heartbeat.
    pub fn client_provided_data(&mut self, data: ClientData, now: Instant) {
        self.name = Some(data.name);
        self.screen_width = Some(data.screen_width);
        self.screen_height = Some(data.screen_height);
        self.set_last_heartbeat(now);
    }

    pub fn set_last_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// Store the client's desired offset; also counts as a heartbeat.
    pub fn set_target(&mut self, target: DVec2, now: Instant) {
        self.target = target;
        self.set_last_heartbeat(now);
    }

    fn set_last_split(&mut self, now: Instant) {
        self.time_to_merge = Some(now + MERGE_TIMER);
    }

    /// Whether sibling cells are allowed to merge at `now`.
    pub fn can_merge(&self, now: Instant) -> bool {
        self.time_to_merge.is_none_or(|t| t < now)
    }

    fn allocate_cell_id(&mut self) -> u32 {
        let id = self.next_cell_id;
        self.next_cell_id = self.next_cell_id.wrapping_add(1);
        id
    }

    /// Shrink every cell above the spawn mass by `rate / 1000` of its mass.
    ///
    /// A cell is skipped if the loss would take it to or below `default_mass`,
    /// and decay stops once the player's total drops to `min_mass_loss`.
    pub fn lose_mass_if_needed(
        &mut self,
        rate: f64,
        default_mass: f64,
        min_mass_loss: f64,
        geometry: &dyn Geometry,
    ) {
        let fraction = rate / 1000.0;
        for index in 0..self.cells.len() {
            let mass = self.cells[index].mass();
            if mass * (1.0 - fraction) > default_mass && self.mass_total > min_mass_loss {
                self.change_cell_mass(index, -mass * fraction, geometry);
            }
        }
    }

    pub fn change_cell_mass(&mut self, index: usize, delta: f64, geometry: &dyn Geometry) {
        self.cells[index].add_mass(delta, geometry);
        self.mass_total += delta;
    }

    /// Move a cell without touching its mass (operator teleport, scripted setups).
    pub fn set_cell_position(&mut self, index: usize, position: DVec2) {
        self.cells[index].position = position;
    }

    /// Remove a cell. Returns true if the player has no cells left.
    pub fn remove_cell(&mut self, index: usize) -> bool {
        let cell = self.cells.remove(index);
        self.mass_total -= cell.mass();
        self.cells.is_empty()
    }

    /// Split one cell into up to `max_requested_pieces` cells of equal mass.
    ///
    /// No piece may end up lighter than `default_mass`, so the piece count is
    /// capped at `floor(mass / default_mass)`. Fewer than two pieces is a
    /// no-op. New cells are appended with burst speed and the merge cooldown
    /// restarts. Returns the number of cells created.
    pub fn split_cell(
        &mut self,
        index: usize,
        max_requested_pieces: usize,
        default_mass: f64,
        now: Instant,
        geometry: &dyn Geometry,
    ) -> usize {
        let parent = &self.cells[index];
        let max_allowed_pieces = (parent.mass() / default_mass).floor() as usize;
        let pieces = max_allowed_pieces.min(max_requested_pieces);
        if pieces < 2 {
            return 0;
        }

        let piece_mass = parent.mass() / pieces as f64;
        let position = parent.position;
        for _ in 1..pieces {
            let id = self.allocate_cell_id();
            self.cells
                .push(Cell::new(id, position, piece_mass, SPLIT_CELL_SPEED, geometry));
        }
        self.cells[index].set_mass(piece_mass, geometry);
        self.set_last_split(now);

        debug!(
            "Player {} split cell {} into {} pieces of {:.2}",
            self.id, index, pieces, piece_mass
        );
        pieces - 1
    }

    /// Blow the given cells apart after they ate a virus, filling the player
    /// up to `max_cells`.
    pub fn virus_split(
        &mut self,
        cell_indexes: &[usize],
        max_cells: usize,
        default_mass: f64,
        now: Instant,
        geometry: &dyn Geometry,
    ) {
        for &index in cell_indexes {
            let requested = (max_cells + 1).saturating_sub(self.cells.len());
            self.split_cell(index, requested, default_mass, now, geometry);
        }
    }

    /// Player-initiated split: halve every cell, or only the biggest ones
    /// when doubling all of them would exceed `max_cells`.
    pub fn user_split(
        &mut self,
        max_cells: usize,
        default_mass: f64,
        now: Instant,
        geometry: &dyn Geometry,
    ) {
        let count = self.cells.len();
        let cells_to_split = if count * 2 > max_cells {
            self.cells.sort_by(|a, b| b.mass().total_cmp(&a.mass()));
            max_cells.saturating_sub(count)
        } else {
            count
        };

        for index in 0..cells_to_split {
            self.split_cell(index, 2, default_mass, now, geometry);
        }
    }

    /// Call `on_collision` for every overlapping pair of this player's cells.
    ///
    /// Cells marked for removal are skipped for the rest of the sweep and
    /// dropped in a single pass at the end.
    pub fn enumerate_colliding_cells<F>(&mut self, geometry: &dyn Geometry, mut on_collision: F)
    where
        F: FnMut(&mut Cell, &mut Cell) -> PairAction,
    {
        let len = self.cells.len();
        let mut removed = FixedBitSet::with_capacity(len);

        for a in 0..len {
            if removed.contains(a) {
                continue;
            }
            for b in (a + 1)..len {
                if removed.contains(b) {
                    continue;
                }
                let test = geometry.circle_circle(self.cells[a].to_circle(), self.cells[b].to_circle());
                if !test.colliding {
                    continue;
                }

                let (head, tail) = self.cells.split_at_mut(b);
                if on_collision(&mut head[a], &mut tail[0]) == PairAction::RemoveSecond {
                    removed.insert(b);
                }
            }
        }

        if removed.count_ones(..) > 0 {
            let mut index = 0;
            self.cells.retain(|_| {
                let keep = !removed.contains(index);
                index += 1;
                keep
            });
        }
    }

    /// Absorb every overlapping sibling into the first cell of the pair.
    pub fn merge_colliding_cells(&mut self, geometry: &dyn Geometry) {
        self.enumerate_colliding_cells(geometry, |a, b| {
            a.add_mass(b.mass(), geometry);
            PairAction::RemoveSecond
        });
    }

    /// Nudge overlapping siblings apart along the line between their centres.
    pub fn push_away_colliding_cells(&mut self, geometry: &dyn Geometry) {
        self.enumerate_colliding_cells(geometry, |a, b| {
            let mut push = (b.position - a.position).normalize_or_zero() * PUSHING_AWAY_SPEED;
            if push == DVec2::ZERO {
                push = DVec2::Y;
            }
            a.position -= push;
            b.position += push;
            PairAction::Keep
        });
    }

    /// Advance the player one tick.
    ///
    /// Siblings are merged or pushed apart first, depending on the merge
    /// cooldown; then every cell moves, is clamped to the world and the
    /// centroid is recomputed.
    pub fn move_cells<R: Rng + ?Sized>(
        &mut self,
        params: &MoveParams<'_>,
        now: Instant,
        geometry: &dyn Geometry,
        rng: &mut R,
    ) {
        if self.cells.len() > 1 {
            if self.can_merge(now) {
                self.merge_colliding_cells(geometry);
            } else {
                self.push_away_colliding_cells(geometry);
            }
        }

        if self.cells.is_empty() {
            return;
        }

        let mut sum = DVec2::ZERO;
        for cell in &mut self.cells {
            cell.move_toward(self.position, self.target, params, geometry, rng);
            let padding = cell.radius() / 3.0;
            geometry.adjust_for_boundaries(
                &mut cell.position,
                padding,
                0.0,
                params.game_width,
                params.game_height,
            );
            sum += cell.position;
        }
        self.position = sum / self.cells.len() as f64;
    }

    /// Test every cell of `a` against every cell of `b` and report each eat as
    /// `callback(loser, winner)`.
    pub fn check_for_collisions<F>(a: &Player, b: &Player, geometry: &dyn Geometry, mut callback: F)
    where
        F: FnMut(CellRef, CellRef),
    {
        for cell_a in &a.cells {
            for cell_b in &b.cells {
                let ref_a = CellRef::new(a.id, cell_a.id);
                let ref_b = CellRef::new(b.id, cell_b.id);
                match Cell::check_who_ate_who(Some(cell_a), Some(cell_b), geometry) {
                    WhoAteWho::AAteB => callback(ref_b, ref_a),
                    WhoAteWho::BAteA => callback(ref_a, ref_b),
                    WhoAteWho::None => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Virus;
    use crate::geometry::StandardGeometry;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const DEFAULT_MASS: f64 = 10.0;

    fn params(viruses: &[Virus]) -> MoveParams<'_> {
        MoveParams {
            slow_base: 4.5,
            init_mass_log: StandardGeometry.log(DEFAULT_MASS, 4.5),
            game_width: 5000.0,
            game_height: 5000.0,
            viruses,
        }
    }

    fn spawned(id: u32, x: f64, y: f64, mass: f64, now: Instant) -> Player {
        let mut rng = StdRng::seed_from_u64(id as u64);
        let mut player = Player::new(id, now, &mut rng);
        player.init(DVec2::new(x, y), mass, &StandardGeometry);
        player
    }

    fn cell_mass_sum(player: &Player) -> f64 {
        player.cells().iter().map(Cell::mass).sum()
    }

    #[test]
    fn test_init_creates_single_cell() {
        let now = Instant::now();
        let player = spawned(1, 100.0, 200.0, DEFAULT_MASS, now);

        assert_eq!(player.cells().len(), 1);
        assert_eq!(player.mass_total(), DEFAULT_MASS);
        assert_eq!(player.position, DVec2::new(100.0, 200.0));
        assert_eq!(player.target, DVec2::ZERO);
        assert_eq!(player.cell(0).speed, MIN_SPEED);
        assert!(player.hue <= 360);
    }

    #[test]
    fn test_client_provided_data_refreshes_heartbeat() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, DEFAULT_MASS, now);
        let later = now + Duration::from_secs(3);

        player.client_provided_data(
            ClientData {
                name: "blob".to_string(),
                screen_width: 1920.0,
                screen_height: 1080.0,
            },
            later,
        );

        assert_eq!(player.name.as_deref(), Some("blob"));
        assert_eq!(player.screen_width, Some(1920.0));
        assert_eq!(player.last_heartbeat, later);
    }

    #[test]
    fn test_user_split_halves_single_cell() {
        let now = Instant::now();
        let mut player = spawned(1, 500.0, 500.0, 40.0, now);

        player.user_split(16, DEFAULT_MASS, now, &StandardGeometry);

        assert_eq!(player.cells().len(), 2);
        assert!(player.cells().iter().all(|c| c.mass() == 20.0));
        assert_eq!(player.mass_total(), 40.0);
        assert_eq!(player.time_to_merge, Some(now + MERGE_TIMER));
        assert_eq!(player.cell(1).speed, SPLIT_CELL_SPEED);
    }

    #[test]
    fn test_split_below_twice_default_mass_is_noop() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 19.0, now);

        assert_eq!(player.split_cell(0, 8, DEFAULT_MASS, now, &StandardGeometry), 0);
        assert_eq!(player.cells().len(), 1);
        assert_eq!(player.cell(0).mass(), 19.0);
        assert_eq!(player.time_to_merge, None);
    }

    #[test]
    fn test_split_is_capped_by_default_mass() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 35.0, now);

        assert_eq!(player.split_cell(0, 8, DEFAULT_MASS, now, &StandardGeometry), 2);
        assert_eq!(player.cells().len(), 3);
        assert!(player.cells().iter().all(|c| c.mass() >= DEFAULT_MASS));
        assert!((cell_mass_sum(&player) - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_cell_ids_stay_unique_after_split() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 80.0, now);
        player.split_cell(0, 8, DEFAULT_MASS, now, &StandardGeometry);

        let mut ids: Vec<u32> = player.cells().iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_virus_split_fills_up_to_max_cells() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 1000.0, now);

        player.virus_split(&[0], 16, DEFAULT_MASS, now, &StandardGeometry);

        assert_eq!(player.cells().len(), 16);
        assert!((cell_mass_sum(&player) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_virus_split_at_cap_is_noop() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 1000.0, now);
        player.virus_split(&[0], 4, DEFAULT_MASS, now, &StandardGeometry);
        assert_eq!(player.cells().len(), 4);

        player.virus_split(&[0, 1], 4, DEFAULT_MASS, now, &StandardGeometry);
        assert_eq!(player.cells().len(), 4);
    }

    #[test]
    fn test_user_split_near_cap_splits_biggest_first() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 100.0, now);
        // 100 -> 3 cells of 33.3, then feed one of them
        player.split_cell(0, 3, DEFAULT_MASS, now, &StandardGeometry);
        player.change_cell_mass(2, 50.0, &StandardGeometry);

        player.user_split(4, DEFAULT_MASS, now, &StandardGeometry);

        assert_eq!(player.cells().len(), 4);
        // the fed cell was sorted to the front and halved
        assert!((player.cell(0).mass() - (100.0 / 3.0 + 50.0) / 2.0).abs() < 1e-9);
        assert!((cell_mass_sum(&player) - 150.0).abs() < 1e-9);
        assert!((player.mass_total() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_user_split_respects_max_cells() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 1600.0, now);
        for _ in 0..6 {
            player.user_split(16, DEFAULT_MASS, now, &StandardGeometry);
            assert!(player.cells().len() <= 16);
        }
        assert_eq!(player.cells().len(), 16);
    }

    #[test]
    fn test_merge_conserves_mass() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 60.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);

        player.merge_colliding_cells(&StandardGeometry);

        assert_eq!(player.cells().len(), 1);
        assert_eq!(player.cell(0).mass(), 60.0);
        assert_eq!(player.mass_total(), 60.0);
    }

    #[test]
    fn test_merge_chains_through_a_sweep() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 80.0, now);
        player.split_cell(0, 8, DEFAULT_MASS, now, &StandardGeometry);
        assert_eq!(player.cells().len(), 8);

        player.merge_colliding_cells(&StandardGeometry);

        assert_eq!(player.cells().len(), 1);
        assert!((player.cell(0).mass() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_push_away_separates_coincident_cells() {
        let now = Instant::now();
        let mut player = spawned(1, 100.0, 100.0, 40.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);

        player.push_away_colliding_cells(&StandardGeometry);

        assert_eq!(player.cells().len(), 2);
        assert_eq!(player.cell(0).position, DVec2::new(100.0, 100.0 - 1.0));
        assert_eq!(player.cell(1).position, DVec2::new(100.0, 100.0 + 1.0));
    }

    #[test]
    fn test_push_away_along_centre_line() {
        let now = Instant::now();
        let mut player = spawned(1, 100.0, 100.0, 40.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);
        let mut moved = player.clone();
        moved.cells[1].position.x += 10.0;

        moved.push_away_colliding_cells(&StandardGeometry);

        assert!((moved.cell(0).position.x - (100.0 - PUSHING_AWAY_SPEED)).abs() < 1e-9);
        assert!((moved.cell(1).position.x - (110.0 + PUSHING_AWAY_SPEED)).abs() < 1e-9);
    }

    #[test]
    fn test_move_pushes_during_cooldown_and_merges_after() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(3);
        let mut player = spawned(1, 1000.0, 1000.0, 40.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);

        player.move_cells(&params(&[]), now + Duration::from_secs(1), &StandardGeometry, &mut rng);
        assert_eq!(player.cells().len(), 2);

        player.move_cells(&params(&[]), now + Duration::from_secs(16), &StandardGeometry, &mut rng);
        assert_eq!(player.cells().len(), 1);
        assert_eq!(player.cell(0).mass(), 40.0);
    }

    #[test]
    fn test_move_updates_centroid() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(3);
        let mut player = spawned(1, 1000.0, 1000.0, 40.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);
        player.set_target(DVec2::new(500.0, 0.0), now);

        player.move_cells(&params(&[]), now, &StandardGeometry, &mut rng);

        let mean = (player.cell(0).position + player.cell(1).position) / 2.0;
        assert!((player.position - mean).length() < 1e-9);
        assert!(player.position.x > 1000.0);
    }

    #[test]
    fn test_move_clamps_to_world() {
        let now = Instant::now();
        let mut rng = StdRng::seed_from_u64(3);
        let mut player = spawned(1, 1.0, 1.0, DEFAULT_MASS, now);
        player.set_target(DVec2::new(-500.0, -500.0), now);

        player.move_cells(&params(&[]), now, &StandardGeometry, &mut rng);

        let padding = player.cell(0).radius() / 3.0;
        assert_eq!(player.cell(0).position, DVec2::new(padding, padding));
    }

    #[test]
    fn test_decay_never_goes_below_default_mass() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 200.0, now);
        player.split_cell(0, 20, DEFAULT_MASS, now, &StandardGeometry);
        player.change_cell_mass(0, 300.0, &StandardGeometry);

        for _ in 0..5000 {
            player.lose_mass_if_needed(1.0, DEFAULT_MASS, 0.0, &StandardGeometry);
        }

        assert!(player.cells().iter().all(|c| c.mass() >= DEFAULT_MASS));
        assert!((player.mass_total() - cell_mass_sum(&player)).abs() < 1e-6);
    }

    #[test]
    fn test_decay_stops_at_min_mass_loss() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 100.0, now);

        for _ in 0..5000 {
            player.lose_mass_if_needed(1.0, DEFAULT_MASS, 50.0, &StandardGeometry);
        }

        assert!(player.mass_total() <= 50.0);
        assert!(player.mass_total() > 49.0);
    }

    #[test]
    fn test_remove_cell_reports_empty() {
        let now = Instant::now();
        let mut player = spawned(1, 0.0, 0.0, 40.0, now);
        player.split_cell(0, 2, DEFAULT_MASS, now, &StandardGeometry);

        assert!(!player.remove_cell(1));
        assert_eq!(player.mass_total(), 20.0);
        assert!(player.remove_cell(0));
        assert!(!player.is_alive());
        assert_eq!(player.mass_total(), 0.0);
    }

    #[test]
    fn test_check_for_collisions_reports_loser_then_winner() {
        let now = Instant::now();
        let big = spawned(1, 500.0, 500.0, 100.0, now);
        let small = spawned(2, 505.0, 500.0, 50.0, now);
        let mut events = Vec::new();

        Player::check_for_collisions(&big, &small, &StandardGeometry, |loser, winner| {
            events.push((loser, winner));
        });

        assert_eq!(events, vec![(CellRef::new(2, 0), CellRef::new(1, 0))]);
    }
}
