//! Attack timing

use crate::ws::protocol::ServerMsg;

use super::world::Player;

/// Combat system for attack cooldowns
pub struct CombatSystem;

impl CombatSystem {
    /// Check if the player's cooldown has elapsed at `now` (wall-clock ms)
    pub fn can_attack(player: &Player, now: u64, cooldown_ms: u64) -> bool {
        match player.last_attack_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= cooldown_ms,
        }
    }

    /// Fire an attack if one is requested and off cooldown.
    /// Returns whether an attack fired.
    pub fn check_attack(player: &mut Player, now: u64, cooldown_ms: u64) -> bool {
        if !(player.manual_attack || player.auto_attack) {
            return false;
        }
        if !Self::can_attack(player, now, cooldown_ms) {
            return false;
        }
        player.last_attack_at = Some(now);
        player.send(ServerMsg::Attack { id: player.id });
        true
    }
}
