//! Tint/territory overlay and frozen-tile propagation (spec §4.6).

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Position;
use crate::config::constants::{FREEZE_TOLERANCE, NEUTRAL_THRESHOLD, STRENGTH_CAP, TRAIL_DECAY};
use crate::grid::{TerrainGrid, TerrainType};
use crate::ids::Owner;
use crate::team::Teams;

/// Clippy's reference tint color (glossary: "Clippy ... its color is the
/// reference for the frozen predicate").
pub const CLIPPY_TINT: [f32; 3] = [0.0, 255.0, 170.0];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct TrailChannel {
    color: [f32; 3],
    strength: f32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct TumorChannel {
    strength: f32,
}

/// Per-tile trail + tumor influence channels, decayed and accumulated each
/// step, blended into a computed tint (spec §4.6).
#[derive(Resource, Debug, Clone)]
pub struct TintField {
    width: i32,
    height: i32,
    trail: Vec<TrailChannel>,
    tumor: Vec<TumorChannel>,
    computed: Vec<[u8; 3]>,
}

impl TintField {
    pub fn new(width: i32, height: i32) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            trail: vec![TrailChannel::default(); n],
            tumor: vec![TumorChannel::default(); n],
            computed: vec![[0, 0, 0]; n],
        }
    }

    #[inline]
    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    pub fn computed_at(&self, pos: Position) -> [u8; 3] {
        self.index(pos).map(|i| self.computed[i]).unwrap_or([0, 0, 0])
    }

    pub fn trail_strength_at(&self, pos: Position) -> f32 {
        self.index(pos).map(|i| self.trail[i].strength).unwrap_or(0.0)
    }

    pub fn tumor_strength_at(&self, pos: Position) -> f32 {
        self.index(pos).map(|i| self.tumor[i].strength).unwrap_or(0.0)
    }

    /// Decays both channels toward zero by `TrailDecay`, clamped at zero
    /// (spec §4.6).
    fn decay(&mut self) {
        for c in self.trail.iter_mut() {
            c.strength = (c.strength - TRAIL_DECAY).max(0.0);
        }
        for c in self.tumor.iter_mut() {
            c.strength = (c.strength - TRAIL_DECAY).max(0.0);
        }
    }

    /// Adds `weight` of `color` at `center`, Manhattan radius `radius`,
    /// falling off linearly with distance, saturating at `STRENGTH_CAP`.
    fn accumulate_trail(&mut self, center: Position, radius: i32, weight: f32, color: [f32; 3]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let dist = dx.abs() + dy.abs();
                if dist > radius {
                    continue;
                }
                let pos = center.offset(dx, dy);
                if let Some(i) = self.index(pos) {
                    let falloff = 1.0 - (dist as f32 / (radius + 1) as f32);
                    let add = weight * falloff;
                    let c = &mut self.trail[i];
                    let total = (c.strength + add).min(STRENGTH_CAP);
                    if c.strength + add > 0.0 {
                        let blend = add / (c.strength + add).max(0.0001);
                        c.color = [
                            c.color[0] * (1.0 - blend) + color[0] * blend,
                            c.color[1] * (1.0 - blend) + color[1] * blend,
                            c.color[2] * (1.0 - blend) + color[2] * blend,
                        ];
                    }
                    c.strength = total;
                }
            }
        }
    }

    fn accumulate_tumor(&mut self, center: Position, radius: i32, weight: f32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let dist = dx.abs() + dy.abs();
                if dist > radius {
                    continue;
                }
                let pos = center.offset(dx, dy);
                if let Some(i) = self.index(pos) {
                    let falloff = 1.0 - (dist as f32 / (radius + 1) as f32);
                    let c = &mut self.tumor[i];
                    c.strength = (c.strength + weight * falloff).min(STRENGTH_CAP);
                }
            }
        }
    }

    /// Re-blends `computed` from `trail`+`tumor`, zeroing water tiles
    /// (spec §4.6: "clippy cannot freeze water").
    fn recompute_blend(&mut self, terrain: &TerrainGrid) {
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position::new(x, y);
                let i = self.index(pos).unwrap();
                if terrain.terrain_at(pos) == TerrainType::Water {
                    self.computed[i] = [0, 0, 0];
                    continue;
                }
                let trail = self.trail[i];
                let tumor = self.tumor[i];
                let total = trail.strength + tumor.strength;
                if total <= 0.0 {
                    self.computed[i] = [0, 0, 0];
                    continue;
                }
                let trail_w = trail.strength / total;
                let tumor_w = tumor.strength / total;
                let blended = [
                    trail.color[0] * trail_w + CLIPPY_TINT[0] * tumor_w,
                    trail.color[1] * trail_w + CLIPPY_TINT[1] * tumor_w,
                    trail.color[2] * trail_w + CLIPPY_TINT[2] * tumor_w,
                ];
                let intensity = (total / STRENGTH_CAP).clamp(0.0, 1.0);
                self.computed[i] = [
                    (blended[0] * intensity) as u8,
                    (blended[1] * intensity) as u8,
                    (blended[2] * intensity) as u8,
                ];
            }
        }
    }

    /// Frozen iff computed tint is within `FREEZE_TOLERANCE` of the clippy
    /// reference color (spec §4.6).
    pub fn is_tile_frozen(&self, pos: Position) -> bool {
        let c = self.computed_at(pos);
        let dist_sq: f32 = (0..3)
            .map(|k| {
                let d = c[k] as f32 - CLIPPY_TINT[k];
                d * d
            })
            .sum();
        dist_sq.sqrt() <= FREEZE_TOLERANCE
    }

    /// Territory scoring at episode end (spec §4.6): each tile with
    /// intensity >= NEUTRAL_THRESHOLD is attributed to the nearest team
    /// color by squared RGB distance; clippy scores as a pseudo-team
    /// (index `MAX_TEAMS`).
    pub fn territory_scores(&self, teams: &Teams) -> Vec<u32> {
        let mut scores = vec![0u32; crate::ids::MAX_TEAMS + 1];
        for i in 0..self.computed.len() {
            let c = self.computed[i];
            let intensity = c[0] as f32 + c[1] as f32 + c[2] as f32;
            if intensity < NEUTRAL_THRESHOLD {
                continue;
            }
            let mut best_idx = crate::ids::MAX_TEAMS;
            let mut best_dist = f32::MAX;
            for (idx, team) in teams.0.iter().enumerate() {
                let d = squared_rgb_distance(c, team.color);
                if d < best_dist {
                    best_dist = d;
                    best_idx = idx;
                }
            }
            let clippy_dist = squared_rgb_distance(c, [CLIPPY_TINT[0] as u8, CLIPPY_TINT[1] as u8, CLIPPY_TINT[2] as u8]);
            if clippy_dist < best_dist {
                best_idx = crate::ids::MAX_TEAMS;
            }
            scores[best_idx] += 1;
        }
        scores
    }
}

fn squared_rgb_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    (0..3)
        .map(|k| {
            let d = a[k] as f32 - b[k] as f32;
            d * d
        })
        .sum()
}

pub fn team_trail_color(owner: Owner, teams: &Teams) -> [f32; 3] {
    match owner.team_id() {
        Some(id) => {
            let c = teams.get(id).color;
            [c[0] as f32, c[1] as f32, c[2] as f32]
        }
        None => CLIPPY_TINT,
    }
}

/// Step 13 of the scheduler (spec §4.1): decay, accumulate from agents /
/// lanterns / tumors, re-blend.
pub struct TintAccumulation {
    pub agents: Vec<(Position, Owner)>,
    pub lanterns: Vec<(Position, Owner)>,
    pub tumors: Vec<Position>,
}

pub fn recompute_tint_field(field: &mut TintField, terrain: &TerrainGrid, teams: &Teams, contrib: &TintAccumulation) {
    field.decay();
    for (pos, owner) in &contrib.agents {
        field.accumulate_trail(*pos, 2, crate::config::constants::TRAIL_STRENGTH_AGENT, team_trail_color(*owner, teams));
    }
    for (pos, owner) in &contrib.lanterns {
        field.accumulate_trail(*pos, 2, crate::config::constants::TRAIL_STRENGTH_LANTERN, team_trail_color(*owner, teams));
    }
    for pos in &contrib.tumors {
        field.accumulate_tumor(*pos, 2, crate::config::constants::TUMOR_INCREMENT_BASE);
    }
    field.recompute_blend(terrain);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_clamps_at_zero() {
        let mut field = TintField::new(10, 10);
        field.accumulate_trail(Position::new(5, 5), 0, 5.0, [255.0, 0.0, 0.0]);
        for _ in 0..10 {
            field.decay();
        }
        assert_eq!(field.trail_strength_at(Position::new(5, 5)), 0.0);
    }

    #[test]
    fn strength_never_exceeds_cap() {
        let mut field = TintField::new(10, 10);
        for _ in 0..100 {
            field.accumulate_trail(Position::new(5, 5), 0, 1000.0, [255.0, 0.0, 0.0]);
        }
        assert!(field.trail_strength_at(Position::new(5, 5)) <= STRENGTH_CAP);
    }

    #[test]
    fn water_tile_always_unfrozen() {
        let mut terrain = TerrainGrid::new(10, 10);
        terrain.set(
            Position::new(5, 5),
            crate::grid::TerrainCell {
                terrain: TerrainType::Water,
                elevation: 0,
            },
        );
        let teams = Teams::new(100);
        let mut field = TintField::new(10, 10);
        let contrib = TintAccumulation {
            agents: vec![],
            lanterns: vec![],
            tumors: vec![Position::new(5, 5)],
        };
        recompute_tint_field(&mut field, &terrain, &teams, &contrib);
        assert!(!field.is_tile_frozen(Position::new(5, 5)));
    }

    #[test]
    fn heavy_tumor_accumulation_freezes_tile() {
        let terrain = TerrainGrid::new(10, 10);
        let teams = Teams::new(100);
        let mut field = TintField::new(10, 10);
        for _ in 0..20 {
            let contrib = TintAccumulation {
                agents: vec![],
                lanterns: vec![],
                tumors: vec![Position::new(5, 5)],
            };
            recompute_tint_field(&mut field, &terrain, &teams, &contrib);
        }
        assert!(field.is_tile_frozen(Position::new(5, 5)));
    }
}
