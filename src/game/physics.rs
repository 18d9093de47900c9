//! Player movement integration and world constraints

use crate::config::GameConfig;
use crate::util::vector::Vector2;

use super::world::Player;

/// Movement integrator
pub struct MovementSystem;

impl MovementSystem {
    /// Advance one living player by `delta` milliseconds.
    ///
    /// Drag is `decel^delta`, so the result does not depend on how the
    /// elapsed time is split into ticks.
    pub fn integrate(player: &mut Player, delta: f32, config: &GameConfig) {
        if !player.alive {
            return;
        }
        let delta = delta.max(0.0);

        let heading = player
            .movement_angle
            .map(Vector2::from_angle)
            .unwrap_or(Vector2::ZERO);

        player.velocity.scale(config.player_decel.powf(delta));

        let mut speed = player.speed_factor * config.player_speed * delta;
        if config.in_snow(player.position.y) {
            speed *= config.snow_speed_factor;
        }
        player.velocity += heading * speed;

        let mut step = player.velocity;
        step.scale(delta * 2.0);
        player.position += step;

        if config.in_river(player.position.y) {
            player.velocity.x += config.water_current * delta;
        }

        Self::constrain(player, config);
    }

    /// Keep the player's whole body on the map. A non-finite position is
    /// moved to the map center and a non-finite velocity is zeroed.
    pub fn constrain(player: &mut Player, config: &GameConfig) {
        if !player.velocity.is_finite() {
            player.velocity = Vector2::ZERO;
        }
        if !player.position.is_finite() {
            let center = config.map_size / 2.0;
            player.position = Vector2::new(center, center);
        }
        // An oversized player is pinned to the center instead of inverting the box
        let inset = player.size.min(config.map_size / 2.0);
        player.position.clamp_to(
            Vector2::new(inset, inset),
            Vector2::new(config.map_size - inset, config.map_size - inset),
        );
    }
}
