//! One-shot procedural placement of world resources

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::config::GameConfig;
use crate::util::vector::Vector2;

use super::world::{Resource, ResourceKind};

#[derive(Debug, thiserror::Error)]
pub enum WorldGenError {
    #[error("No scales configured for {0:?}")]
    MissingScales(ResourceKind),

    #[error("River band covers the whole map, gold ore cannot be placed")]
    NoDryLand,
}

/// Sequential id allocation plus shared placement helpers
struct Generator<'a, R: Rng> {
    config: &'a GameConfig,
    rng: &'a mut R,
    resources: Vec<Resource>,
}

impl<'a, R: Rng> Generator<'a, R> {
    fn push(&mut self, position: Vector2, kind: ResourceKind, scales: &[f32]) -> Result<(), WorldGenError> {
        let size = *scales
            .choose(self.rng)
            .ok_or(WorldGenError::MissingScales(kind))?;
        let angle = (self.rng.gen::<f32>() - 0.5) * std::f32::consts::PI;
        let id = self.resources.len() as u32;
        self.resources.push(Resource::new(id, position, kind, size, angle));
        Ok(())
    }

    /// Draw `count` uniform points inside one cell and keep those not
    /// rejected by `blocked(y)`. Rejected draws are not retried.
    fn fill_cell(
        &mut self,
        cell_x: u32,
        cell_y: u32,
        count: u32,
        kind: ResourceKind,
        scales: &[f32],
        blocked: impl Fn(&GameConfig, f32) -> bool,
    ) -> Result<(), WorldGenError> {
        let area = self.config.area_size();
        let x0 = area * cell_x as f32;
        let y0 = area * cell_y as f32;

        for _ in 0..count {
            let x = self.rng.gen_range(x0..x0 + area);
            let y = self.rng.gen_range(y0..y0 + area);
            if blocked(self.config, y) {
                continue;
            }
            self.push(Vector2::new(x, y), kind, scales)?;
        }
        Ok(())
    }

    fn anywhere(&mut self) -> Vector2 {
        let max = self.config.map_size;
        Vector2::new(self.rng.gen_range(0.0..max), self.rng.gen_range(0.0..max))
    }
}

/// Populate the map. Ids are sequential from 0 in placement order.
///
/// Each grid cell draws a fixed number of tree and bush candidates and drops
/// those landing in a forbidden band, so density thins out near the river and
/// in the snow. Rocks go anywhere; gold ore is resampled until it lands on
/// dry land.
pub fn generate<R: Rng>(config: &GameConfig, rng: &mut R) -> Result<Vec<Resource>, WorldGenError> {
    if config.river_width >= config.map_size {
        return Err(WorldGenError::NoDryLand);
    }

    let mut gen = Generator {
        config,
        rng,
        resources: Vec::new(),
    };
    for cell_x in 0..config.area_count {
        for cell_y in 0..config.area_count {
            gen.fill_cell(
                cell_x,
                cell_y,
                config.trees_per_area,
                ResourceKind::Wood,
                &config.tree_scales,
                |c, y| c.in_river(y) || c.in_snow(y),
            )?;
            gen.fill_cell(
                cell_x,
                cell_y,
                config.bushes_per_area,
                ResourceKind::Food,
                &config.bush_scales,
                |c, y| c.in_river(y),
            )?;
        }
    }

    for _ in 0..config.total_rocks {
        let position = gen.anywhere();
        gen.push(position, ResourceKind::Stone, &config.rock_scales)?;
    }

    for _ in 0..config.gold_ores {
        let position = loop {
            let candidate = gen.anywhere();
            if !config.in_river(candidate.y) {
                break candidate;
            }
        };
        gen.push(position, ResourceKind::Points, &config.rock_scales)?;
    }

    info!(resources = gen.resources.len(), "World generated");
    Ok(gen.resources)
}
