//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the world (or respawn)
    Join {
        name: String,
        #[serde(default)]
        skin: u32,
    },

    /// Facing direction in radians
    Aim { angle: f32 },

    /// Movement heading in radians, `None` to stop
    Move { angle: Option<f32> },

    /// Hold or release the attack button
    Attack { active: bool },

    /// Flip auto-attack on/off
    ToggleAutoAttack,

    CreateClan { tag: String },

    /// Leave the current clan, dissolving it if the sender owns it
    LeaveClan,

    /// Ask to join the clan with `tag`; its owner gets notified
    ClanInviteQuery { tag: String },

    /// Owner's answer to a join request
    ClanJoinDecision { member_id: usize, accept: bool },

    ClanKick { member_id: usize },

    /// Minimap ping at the sender's position
    Ping,

    Chat { text: String },

    StoreAction { buy: bool, item_id: u32 },
}

/// Messages sent from server to client.
///
/// The `data` arrays are flattened fixed-width records; see the
/// builders in `game::sync` for the record layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Assigned slot id and the clans that currently exist
    Init { id: usize, clans: Vec<ClanInfo> },

    /// Spawn confirmation
    Spawned { id: usize },

    /// Full status of one player
    PlayerStatus {
        status: PlayerStatus,
        is_self: bool,
    },

    /// `[id, x, y, aim, held_item, 0, 0, clan_tag|null, is_owner, 0, 0, 0]*`
    Players { data: Vec<Value> },

    /// `[id, x, y, angle, size, kind, null, -1]*`
    NewObjects { data: Vec<Value> },

    /// `[x, y]*` of fellow clan members
    Minimap { data: Vec<Value> },

    /// `[id, name, points]*`, best first
    Leaderboard { data: Vec<Value> },

    /// `[id, name]*`
    ClanRoster { data: Vec<Value> },

    /// Sender's affiliation after a clan transition
    ClanStatus { tag: Option<String>, is_owner: bool },

    /// A clan was created somewhere
    ClanAdded(ClanInfo),

    /// The clan the recipient belonged to was dissolved
    ClanDissolved { tag: String },

    /// Creator announcement sent when a clan is founded
    ClanMemberHint { id: usize, name: String },

    /// Sent to a clan owner when someone asks to join
    ClanJoinRequest { id: usize, name: String },

    Attack { id: usize },

    Level { xp: u32, max_xp: u32, level: u32 },

    ResourceUpdate { resource: String, amount: i64 },

    MapPing { x: f32, y: f32 },

    StoreUpdate { bought: bool, item_id: u32 },

    Chat { id: usize, text: String },

    /// Operator-issued client event
    ClientEvent { name: String, params: Value },

    /// The server is closing this connection
    Disconnect { reason: String },
}

/// Public description of a clan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanInfo {
    pub tag: String,
    pub owner: usize,
}

/// Player status record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub session_id: Uuid,
    pub id: usize,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub aim: f32,
    pub health: f32,
    pub max_health: f32,
    pub size: f32,
    pub skin: u32,
}
