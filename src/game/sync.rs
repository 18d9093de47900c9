//! Visibility culling and outbound state assembly

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::GameConfig;
use crate::util::vector::Vector2;
use crate::ws::protocol::ServerMsg;

use super::world::{Player, Resource, World};

/// Decides which simulation ticks produce network output
pub struct SendThrottle {
    /// Ticks left until the next broadcast
    until_send: u32,
    /// Broadcast interval in ticks
    send_rate: u32,
}

impl SendThrottle {
    /// The first tick always broadcasts
    pub fn new(send_rate: u32) -> Self {
        Self {
            until_send: 1,
            send_rate: send_rate.max(1),
        }
    }

    /// Advance one tick; true if this tick broadcasts
    pub fn should_send(&mut self) -> bool {
        self.until_send -= 1;
        if self.until_send == 0 {
            self.until_send = self.send_rate;
            true
        } else {
            false
        }
    }
}

/// One entry of the player state array
#[derive(Debug, Clone, Serialize)]
pub struct PlayerRecord(
    pub usize,
    pub f32,
    pub f32,
    pub f32,
    pub i32,
    pub u8,
    pub u8,
    pub Option<String>,
    pub u8,
    pub u8,
    pub u8,
    pub u8,
);

impl PlayerRecord {
    pub fn of(player: &Player, world: &World) -> Self {
        let clan = player.clan.as_deref().and_then(|tag| world.clan(tag));
        let is_owner = clan.map_or(false, |c| c.owner_id == player.id);
        PlayerRecord(
            player.id,
            player.position.x,
            player.position.y,
            player.aim_angle,
            player.held_item,
            0,
            0,
            clan.map(|c| c.tag.clone()),
            is_owner as u8,
            0,
            0,
            0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry(pub usize, pub String, pub i64);

/// Flatten tuple records into one array
pub fn flatten<T: Serialize>(records: &[T]) -> Vec<Value> {
    let mut out = Vec::new();
    for record in records {
        match serde_json::to_value(record) {
            Ok(Value::Array(fields)) => out.extend(fields),
            Ok(other) => out.push(other),
            Err(e) => warn!(error = %e, "Failed to serialize record"),
        }
    }
    out
}

/// Point-in-rectangle test against the viewport centered on `center`
pub fn in_view(center: Vector2, point: Vector2, config: &GameConfig) -> bool {
    (point.x - center.x).abs() < config.max_screen_width
        && (point.y - center.y).abs() < config.max_screen_height
}

pub struct SyncSystem;

impl SyncSystem {
    /// Resources in view of `center`
    pub fn visible_resources<'a>(
        resources: &'a [Resource],
        center: Vector2,
        config: &'a GameConfig,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        resources
            .iter()
            .filter(move |r| in_view(center, r.position(), config))
    }

    /// Payloads of resources in view that this player has not seen yet.
    /// Returned resources are marked as seen.
    pub fn disclose(player: &mut Player, resources: &[Resource], config: &GameConfig) -> Vec<Value> {
        let mut data = Vec::new();
        for resource in Self::visible_resources(resources, player.position, config) {
            if player.seen_resources.insert(resource.id()) {
                data.extend_from_slice(resource.payload());
            }
        }
        data
    }

    /// Disclosure pass for one player, sending `NewObjects` if anything is new
    pub fn disclose_to(world: &mut World, id: usize) {
        let World {
            players,
            resources,
            config,
            ..
        } = world;
        let Some(player) = players.get_mut(id).and_then(Option::as_mut) else {
            return;
        };
        let data = Self::disclose(player, resources, config);
        if !data.is_empty() {
            player.send(ServerMsg::NewObjects { data });
        }
    }

    /// State records of every living player, in slot order
    pub fn player_records(world: &World) -> Vec<PlayerRecord> {
        world.alive().map(|p| PlayerRecord::of(p, world)).collect()
    }

    /// `[x, y]` of the player's fellow clan members, or `None` outside a clan
    pub fn minimap(world: &World, id: usize) -> Option<Vec<Value>> {
        let player = world.player(id)?;
        let clan = world.clan(player.clan.as_deref()?)?;
        let positions: Vec<(f32, f32)> = clan
            .members
            .iter()
            .filter(|m| m.id != id)
            .filter_map(|m| world.resolve(m.id, m.session_id))
            .map(|p| (p.position.x, p.position.y))
            .collect();
        Some(flatten(&positions))
    }

    /// Living, named players ranked by points. Ties keep slot order.
    pub fn leaderboard(world: &World) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = world
            .alive()
            .filter_map(|p| {
                p.name
                    .as_ref()
                    .map(|name| LeaderboardEntry(p.id, name.clone(), p.points))
            })
            .collect();
        entries.sort_by(|a, b| b.2.cmp(&a.2));
        entries
    }

    /// Produce all network output for one broadcast tick
    pub fn broadcast(world: &mut World) {
        let ids: Vec<usize> = world.alive().map(|p| p.id).collect();
        for &id in &ids {
            Self::disclose_to(world, id);
        }

        let players = flatten(&Self::player_records(world));
        for &id in &ids {
            world.send_to(id, ServerMsg::Players { data: players.clone() });
            if let Some(data) = Self::minimap(world, id) {
                world.send_to(id, ServerMsg::Minimap { data });
            }
        }

        let leaderboard = flatten(&Self::leaderboard(world));
        world.broadcast(ServerMsg::Leaderboard { data: leaderboard });
    }
}
