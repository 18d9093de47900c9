//! Game simulation modules

pub mod admin;
pub mod clan;
pub mod combat;
pub mod physics;
pub mod server;
pub mod sync;
pub mod world;
pub mod worldgen;

pub use server::{GameHandle, GameServer, Simulation};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ws::connection::Connection;
use crate::ws::protocol::ClientMsg;

use admin::AdminAction;

/// Message from a connected player, addressed by slot and session
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub slot: usize,
    pub session_id: Uuid,
    pub msg: ClientMsg,
    /// Arrival time (ms); cooldowns and throttles are measured from it
    pub received_at: u64,
}

/// Everything the simulation loop consumes
#[derive(Debug)]
pub enum GameInput {
    /// New connection asking for a slot; `None` is sent back when full
    Connect {
        connection: Connection,
        reply: oneshot::Sender<Option<usize>>,
    },
    Player(PlayerInput),
    Disconnect { slot: usize, session_id: Uuid },
    Admin(AdminAction),
    /// Disconnect everyone, then acknowledge on `done`
    Shutdown {
        reason: String,
        done: oneshot::Sender<()>,
    },
}
