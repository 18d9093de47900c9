//! World state: player slots, static resources and clans

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::util::vector::Vector2;
use crate::ws::connection::Connection;
use crate::ws::protocol::{ClanInfo, PlayerStatus, ServerMsg};

pub const MAX_HEALTH: f32 = 100.0;

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    /// Slot index, stable for the lifetime of the connection
    pub id: usize,
    pub connection: Connection,

    /// `None` until the first join
    pub name: Option<String>,
    pub skin: u32,
    pub alive: bool,

    // Position and movement
    pub position: Vector2,
    pub velocity: Vector2,
    pub aim_angle: f32,
    pub movement_angle: Option<f32>,
    /// Collision radius
    pub size: f32,
    pub speed_factor: f32,

    pub health: f32,
    pub held_item: i32,

    // Resources
    pub points: i64,
    pub food: u32,
    pub wood: u32,
    pub stone: u32,
    pub kills: u32,

    // Leveling
    pub xp: u32,
    pub max_xp: u32,
    pub level: u32,

    // Combat
    pub manual_attack: bool,
    pub auto_attack: bool,
    pub last_attack_at: Option<u64>,
    pub last_ping_at: Option<u64>,

    /// Resource ids already disclosed to this player
    pub seen_resources: HashSet<u32>,
    /// Tag of the clan this player belongs to
    pub clan: Option<String>,
    /// Operator rights granted through chat login
    pub is_operator: bool,
}

impl Player {
    pub fn new(id: usize, connection: Connection, radius: f32) -> Self {
        Self {
            id,
            connection,
            name: None,
            skin: 0,
            alive: false,
            position: Vector2::ZERO,
            velocity: Vector2::ZERO,
            aim_angle: 0.0,
            movement_angle: None,
            size: radius,
            speed_factor: 1.0,
            health: MAX_HEALTH,
            held_item: -1,
            points: 0,
            food: 0,
            wood: 0,
            stone: 0,
            kills: 0,
            xp: 0,
            max_xp: 100,
            level: 1,
            manual_attack: false,
            auto_attack: false,
            last_attack_at: None,
            last_ping_at: None,
            seen_resources: HashSet::new(),
            clan: None,
            is_operator: false,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.connection.session_id()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    pub fn send(&self, msg: ServerMsg) {
        self.connection.send(msg);
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            session_id: self.session_id(),
            id: self.id,
            name: self.display_name().to_string(),
            x: self.position.x,
            y: self.position.y,
            aim: self.aim_angle,
            health: self.health,
            max_health: MAX_HEALTH,
            size: self.size,
            skin: self.skin,
        }
    }
}

/// Kind of harvestable world object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Tree
    Wood,
    /// Bush
    Food,
    /// Rock
    Stone,
    /// Gold ore
    Points,
}

impl ResourceKind {
    /// Numeric code used on the wire
    pub fn code(self) -> u8 {
        match self {
            ResourceKind::Wood => 0,
            ResourceKind::Food => 1,
            ResourceKind::Stone => 2,
            ResourceKind::Points => 3,
        }
    }
}

/// Static world object. Immutable once generated.
#[derive(Debug, Clone)]
pub struct Resource {
    id: u32,
    position: Vector2,
    kind: ResourceKind,
    size: f32,
    angle: f32,
    payload: Vec<Value>,
}

impl Resource {
    pub fn new(id: u32, position: Vector2, kind: ResourceKind, size: f32, angle: f32) -> Self {
        let payload = vec![
            json!(id),
            json!(position.x),
            json!(position.y),
            json!(angle),
            json!(size),
            json!(kind.code()),
            Value::Null,
            json!(-1),
        ];
        Self {
            id,
            position,
            kind,
            size,
            angle,
            payload,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Serialized record sent on first disclosure
    pub fn payload(&self) -> &[Value] {
        &self.payload
    }
}

/// Roster entry. The player is resolved on demand through the world, keyed
/// by slot and session so a reused slot never resolves to a stale member.
#[derive(Debug, Clone, PartialEq)]
pub struct ClanMember {
    pub id: usize,
    pub session_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Clan {
    pub tag: String,
    pub owner_id: usize,
    pub members: Vec<ClanMember>,
}

impl Clan {
    pub fn contains(&self, id: usize) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn info(&self) -> ClanInfo {
        ClanInfo {
            tag: self.tag.clone(),
            owner: self.owner_id,
        }
    }
}

/// The single owner of all world state
pub struct World {
    pub config: Arc<GameConfig>,
    pub players: Vec<Option<Player>>,
    pub resources: Vec<Resource>,
    pub clans: Vec<Clan>,
    rng: ChaCha8Rng,
}

impl World {
    pub fn new(config: Arc<GameConfig>, resources: Vec<Resource>, rng: ChaCha8Rng) -> Self {
        let players = vec![None; config.max_players];
        Self {
            config,
            players,
            resources,
            clans: Vec::new(),
            rng,
        }
    }

    /// Place a new player in the lowest free slot
    pub fn admit(&mut self, connection: Connection) -> Option<usize> {
        let slot = self.players.iter().position(Option::is_none)?;
        self.players[slot] = Some(Player::new(slot, connection, self.config.player_radius));
        Some(slot)
    }

    /// Free a slot, returning the player that held it
    pub fn remove(&mut self, id: usize) -> Option<Player> {
        self.players.get_mut(id).and_then(Option::take)
    }

    pub fn player(&self, id: usize) -> Option<&Player> {
        self.players.get(id).and_then(Option::as_ref)
    }

    pub fn player_mut(&mut self, id: usize) -> Option<&mut Player> {
        self.players.get_mut(id).and_then(Option::as_mut)
    }

    /// Player in `id` only if it still belongs to `session_id`
    pub fn resolve(&self, id: usize, session_id: Uuid) -> Option<&Player> {
        self.player(id).filter(|p| p.session_id() == session_id)
    }

    pub fn resolve_mut(&mut self, id: usize, session_id: Uuid) -> Option<&mut Player> {
        self.player_mut(id).filter(|p| p.session_id() == session_id)
    }

    /// Occupied slots in slot order
    pub fn connected(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().flatten()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.connected().filter(|p| p.alive)
    }

    pub fn connected_count(&self) -> usize {
        self.connected().count()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        self.connected().find(|p| p.name.as_deref() == Some(name))
    }

    pub fn send_to(&self, id: usize, msg: ServerMsg) {
        if let Some(player) = self.player(id) {
            player.send(msg);
        }
    }

    /// Send to every connected player
    pub fn broadcast(&self, msg: ServerMsg) {
        for player in self.connected() {
            player.send(msg.clone());
        }
    }

    pub fn clan(&self, tag: &str) -> Option<&Clan> {
        self.clans.iter().find(|c| c.tag == tag)
    }

    pub fn clan_mut(&mut self, tag: &str) -> Option<&mut Clan> {
        self.clans.iter_mut().find(|c| c.tag == tag)
    }

    pub fn clan_infos(&self) -> Vec<ClanInfo> {
        self.clans.iter().map(Clan::info).collect()
    }

    /// Uniformly random spawn point anywhere on the map.
    /// Overlap with other entities is not checked.
    pub fn spawn_position(&mut self) -> Vector2 {
        let max = self.config.map_size;
        Vector2::new(self.rng.gen_range(0.0..max), self.rng.gen_range(0.0..max))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn admit_fills_lowest_free_slot_and_reuses_it() {
        let mut world = empty_world();
        let (a, _ra) = connect(&mut world);
        let (b, _rb) = connect(&mut world);
        assert_eq!((a, b), (0, 1));

        world.remove(a);
        let (c, _rc) = connect(&mut world);
        assert_eq!(c, 0);
    }

    #[test]
    fn admit_fails_when_full() {
        let mut world = empty_world();
        let mut receivers = Vec::new();
        for _ in 0..4 {
            receivers.push(connect(&mut world));
        }
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        assert!(world.admit(Connection::new(Uuid::new_v4(), tx)).is_none());
    }

    #[test]
    fn new_player_starts_dead_at_origin() {
        let mut world = empty_world();
        let (id, _rx) = connect(&mut world);
        let player = world.player(id).unwrap();
        assert!(!player.alive);
        assert_eq!(player.position, Vector2::ZERO);
        assert_eq!(player.velocity, Vector2::ZERO);
        assert_eq!(player.display_name(), "unknown");
    }

    #[test]
    fn resolve_rejects_reused_slot() {
        let mut world = empty_world();
        let (id, _rx) = connect(&mut world);
        let old_session = world.player(id).unwrap().session_id();
        world.remove(id);
        let (same, _rx2) = connect(&mut world);
        assert_eq!(same, id);
        assert!(world.resolve(id, old_session).is_none());
    }

    #[test]
    fn resource_payload_layout() {
        let r = Resource::new(4, Vector2::new(10.0, 20.0), ResourceKind::Stone, 85.0, 0.5);
        let payload = r.payload();
        assert_eq!(payload.len(), 8);
        assert_eq!(payload[0], json!(4));
        assert_eq!(payload[5], json!(2));
        assert!(payload[6].is_null());
        assert_eq!(payload[7], json!(-1));
    }

    #[test]
    fn spawn_position_is_on_map() {
        let mut world = empty_world();
        for _ in 0..100 {
            let p = world.spawn_position();
            assert!(p.x >= 0.0 && p.x < world.config.map_size);
            assert!(p.y >= 0.0 && p.y < world.config.map_size);
        }
    }
}
