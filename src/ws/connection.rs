//! Outbound half of a client connection as seen by the simulation

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Handle for pushing messages to one client.
///
/// Sends never block the caller: a full queue drops the message and a
/// closed queue is ignored. The socket writer task owns the receiving end.
#[derive(Debug, Clone)]
pub struct Connection {
    session_id: Uuid,
    tx: mpsc::Sender<ServerMsg>,
}

impl Connection {
    pub fn new(session_id: Uuid, tx: mpsc::Sender<ServerMsg>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn send(&self, msg: ServerMsg) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(session_id = %self.session_id, "Outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
