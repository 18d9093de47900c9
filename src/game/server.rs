//! Authoritative simulation clock and intent dispatch

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{unix_millis, Timer};
use crate::util::vector::Vector2;
use crate::ws::connection::Connection;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::admin::{AdminAction, AdminCommand};
use super::clan::ClanSystem;
use super::combat::CombatSystem;
use super::physics::MovementSystem;
use super::sync::{SendThrottle, SyncSystem};
use super::world::{World, MAX_HEALTH};
use super::{GameInput, PlayerInput};

/// World plus the clock that advances it. All mutation goes through
/// [`Simulation::handle`] and [`Simulation::tick`].
pub struct Simulation {
    world: World,
    throttle: SendThrottle,
    last_tick_at: u64,
    tick: u64,
}

impl Simulation {
    pub fn new(world: World, started_at: u64) -> Self {
        let throttle = SendThrottle::new(world.config.client_send_rate);
        Self {
            world,
            throttle,
            last_tick_at: started_at,
            tick: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Run one simulation tick at wall-clock `now` (ms).
    /// Returns whether this tick broadcast.
    pub fn tick(&mut self, now: u64) -> bool {
        let delta = now.saturating_sub(self.last_tick_at) as f32;
        self.last_tick_at = now;
        self.tick += 1;
        self.reap_closed();

        let send = self.throttle.should_send();
        let config = self.world.config.clone();

        for player in self.world.players.iter_mut().flatten() {
            if !player.alive {
                continue;
            }
            MovementSystem::integrate(player, delta, &config);
            CombatSystem::check_attack(player, now, config.attack_cooldown_ms);
        }

        if send {
            SyncSystem::broadcast(&mut self.world);
        }
        send
    }

    /// Apply one inbound event immediately
    pub fn handle(&mut self, input: GameInput, now: u64) {
        match input {
            GameInput::Connect { connection, reply } => {
                let slot = self.connect(connection);
                let _ = reply.send(slot);
            }
            GameInput::Player(input) => self.apply(input, now),
            GameInput::Disconnect { slot, session_id } => self.disconnect(slot, session_id),
            GameInput::Admin(action) => action.apply(&mut self.world),
            GameInput::Shutdown { reason, done } => {
                AdminAction::Shutdown { reason }.apply(&mut self.world);
                let _ = done.send(());
            }
        }
    }

    fn connect(&mut self, connection: Connection) -> Option<usize> {
        match self.world.admit(connection.clone()) {
            Some(id) => {
                connection.send(ServerMsg::Init {
                    id,
                    clans: self.world.clan_infos(),
                });
                info!(
                    slot = id,
                    session_id = %connection.session_id(),
                    players = self.world.connected_count(),
                    "Player connected"
                );
                Some(id)
            }
            None => {
                connection.send(ServerMsg::Disconnect {
                    reason: "server is full".to_string(),
                });
                warn!(session_id = %connection.session_id(), "Rejected connection, server is full");
                None
            }
        }
    }

    fn disconnect(&mut self, slot: usize, session_id: Uuid) {
        if self.world.resolve(slot, session_id).is_none() {
            return;
        }
        ClanSystem::leave(&mut self.world, slot);
        self.world.remove(slot);
        info!(
            slot,
            session_id = %session_id,
            players = self.world.connected_count(),
            "Player disconnected"
        );
    }

    /// Drop players whose socket writer has gone away without a disconnect
    fn reap_closed(&mut self) {
        let closed: Vec<(usize, Uuid)> = self
            .world
            .connected()
            .filter(|p| p.connection.is_closed())
            .map(|p| (p.id, p.session_id()))
            .collect();
        for (slot, session_id) in closed {
            debug!(slot, "Reaping closed connection");
            self.disconnect(slot, session_id);
        }
    }

    /// Cooldowns use the arrival time, clamped so a message never
    /// appears to come from after the moment it is handled
    fn apply(&mut self, input: PlayerInput, handled_at: u64) {
        let PlayerInput {
            slot: id,
            session_id,
            msg,
            received_at,
        } = input;
        let now = received_at.min(handled_at);
        let cooldown = self.world.config.attack_cooldown_ms;
        let Some(player) = self.world.resolve_mut(id, session_id) else {
            debug!(slot = id, session_id = %session_id, "Input for stale session");
            return;
        };

        match msg {
            ClientMsg::Join { name, skin } => self.join(id, &name, skin),
            ClientMsg::Aim { angle } => {
                if angle.is_finite() {
                    player.aim_angle = angle;
                }
            }
            ClientMsg::Move { angle } => match angle {
                Some(a) if !a.is_finite() => {}
                angle => player.movement_angle = angle,
            },
            ClientMsg::Attack { active } => {
                player.manual_attack = active;
                if player.alive {
                    CombatSystem::check_attack(player, now, cooldown);
                }
            }
            ClientMsg::ToggleAutoAttack => {
                player.auto_attack = !player.auto_attack;
                if player.alive {
                    CombatSystem::check_attack(player, now, cooldown);
                }
            }
            ClientMsg::CreateClan { tag } => ClanSystem::create(&mut self.world, id, &tag),
            ClientMsg::LeaveClan => ClanSystem::leave(&mut self.world, id),
            ClientMsg::ClanInviteQuery { tag } => ClanSystem::request_join(&self.world, id, &tag),
            ClientMsg::ClanJoinDecision { member_id, accept } => {
                ClanSystem::decide_join(&mut self.world, id, member_id, accept)
            }
            ClientMsg::ClanKick { member_id } => ClanSystem::kick(&mut self.world, id, member_id),
            ClientMsg::Ping => self.ping(id, now),
            ClientMsg::Chat { text } => self.chat(id, text),
            ClientMsg::StoreAction { buy, item_id } => player.send(ServerMsg::StoreUpdate {
                bought: buy,
                item_id,
            }),
        }
    }

    fn join(&mut self, id: usize, name: &str, skin: u32) {
        let max_len = self.world.config.max_name_length;
        let name = name.trim();
        let name = if name.is_empty() || name.chars().count() > max_len {
            "unknown"
        } else {
            name
        };
        if let Some(player) = self.world.player_mut(id) {
            player.name = Some(name.to_string());
            player.skin = skin;
        }
        self.spawn(id);
        SyncSystem::disclose_to(&mut self.world, id);
    }

    /// Place the player at a random point and exchange status with everyone alive
    fn spawn(&mut self, id: usize) {
        let position = self.world.spawn_position();
        let Some(player) = self.world.player_mut(id) else {
            return;
        };
        player.alive = true;
        player.health = MAX_HEALTH;
        player.position = position;
        player.velocity = Vector2::ZERO;

        player.send(ServerMsg::Spawned { id });
        player.send(ServerMsg::PlayerStatus {
            status: player.status(),
            is_self: true,
        });
        player.send(ServerMsg::Level {
            xp: player.xp,
            max_xp: player.max_xp,
            level: player.level,
        });
        let status = player.status();

        let others: Vec<_> = self.world.alive().filter(|p| p.id != id).collect();
        for other in &others {
            other.send(ServerMsg::PlayerStatus {
                status: status.clone(),
                is_self: false,
            });
        }
        let statuses: Vec<_> = others.iter().map(|p| p.status()).collect();
        for status in statuses {
            self.world.send_to(
                id,
                ServerMsg::PlayerStatus {
                    status,
                    is_self: false,
                },
            );
        }
        debug!(slot = id, x = position.x, y = position.y, "Player spawned");
    }

    fn ping(&mut self, id: usize, now: u64) {
        let interval = self.world.config.ping_interval_ms;
        let Some(player) = self.world.player_mut(id) else {
            return;
        };
        if let Some(last) = player.last_ping_at {
            if now.saturating_sub(last) < interval {
                return;
            }
        }
        player.last_ping_at = Some(now);
        let position = player.position;
        self.world.broadcast(ServerMsg::MapPing {
            x: position.x,
            y: position.y,
        });
    }

    fn chat(&mut self, id: usize, text: String) {
        if let Some(password) = text.strip_prefix("login ") {
            let accepted = self.world.config.dev_password.as_deref() == Some(password);
            if let Some(player) = self.world.player_mut(id) {
                if accepted {
                    player.is_operator = true;
                    player.send(ServerMsg::Chat {
                        id,
                        text: "Logged in as Dev!".to_string(),
                    });
                    info!(slot = id, "Operator login");
                } else {
                    warn!(slot = id, "Failed operator login");
                }
            }
            return;
        }

        let is_operator = self.world.player(id).map_or(false, |p| p.is_operator);
        if let (true, Some(command)) = (is_operator, text.strip_prefix("sudo ")) {
            let reply = match command.parse::<AdminCommand>() {
                Ok(cmd) => match cmd.apply(&mut self.world, id) {
                    Ok(()) => text.clone(),
                    Err(e) => format!("sudo: {}", e),
                },
                Err(e) => format!("sudo: {}", e),
            };
            self.world.send_to(id, ServerMsg::Chat { id, text: reply });
            return;
        }

        self.world.broadcast(ServerMsg::Chat { id, text });
    }
}

/// Handle to the running simulation
#[derive(Clone)]
pub struct GameHandle {
    input_tx: mpsc::Sender<GameInput>,
    player_count: Arc<AtomicUsize>,
    resource_count: usize,
}

impl GameHandle {
    /// Ask for a slot. `None` when the server is full or gone.
    pub async fn connect(&self, connection: Connection) -> Option<usize> {
        let (reply, rx) = oneshot::channel();
        self.input_tx
            .send(GameInput::Connect { connection, reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Queue an input. Returns false if the simulation has stopped.
    pub async fn send(&self, input: GameInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }

    /// Disconnect every player and wait until the simulation has done so
    pub async fn shutdown(&self, reason: &str) -> bool {
        let (done, rx) = oneshot::channel();
        let input = GameInput::Shutdown {
            reason: reason.to_string(),
            done,
        };
        if self.input_tx.send(input).await.is_err() {
            return false;
        }
        rx.await.is_ok()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn resource_count(&self) -> usize {
        self.resource_count
    }
}

/// Single owner of the simulation. Ticks and inputs are handled one at a
/// time on one task, so no tick ever overlaps another or an input.
pub struct GameServer {
    sim: Simulation,
    input_rx: mpsc::Receiver<GameInput>,
    tick_interval: Duration,
    player_count: Arc<AtomicUsize>,
}

impl GameServer {
    pub fn new(world: World, queue_depth: usize) -> (Self, GameHandle) {
        let (input_tx, input_rx) = mpsc::channel(queue_depth);
        let player_count = Arc::new(AtomicUsize::new(0));
        let tick_interval = Duration::from_millis(world.config.tick_interval_ms);

        let handle = GameHandle {
            input_tx,
            player_count: player_count.clone(),
            resource_count: world.resources.len(),
        };

        let server = Self {
            sim: Simulation::new(world, unix_millis()),
            input_rx,
            tick_interval,
            player_count,
        };

        (server, handle)
    }

    /// Run the authoritative loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            resources = self.sim.world().resources.len(),
            "Simulation started"
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let timer = Timer::new();
                    self.sim.tick(unix_millis());
                    self.player_count
                        .store(self.sim.world().connected_count(), Ordering::Relaxed);
                    let elapsed = timer.elapsed_micros();
                    if elapsed > self.tick_interval.as_micros() as u64 {
                        debug!(tick = self.sim.tick_count(), elapsed_us = elapsed, "Tick overran interval");
                    }
                }
                input = self.input_rx.recv() => {
                    let Some(input) = input else {
                        break;
                    };
                    self.sim.handle(input, unix_millis());
                    self.player_count
                        .store(self.sim.world().connected_count(), Ordering::Relaxed);
                }
            }
        }

        info!("Simulation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::test_support::{drain, small_config, world_with};
    use crate::game::world::{Resource, ResourceKind};
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    struct Client {
        slot: usize,
        session_id: Uuid,
        rx: Receiver<ServerMsg>,
    }

    fn connect(sim: &mut Simulation) -> Option<Client> {
        let (tx, rx) = mpsc::channel(4096);
        let session_id = Uuid::new_v4();
        let (reply, mut reply_rx) = oneshot::channel();
        sim.handle(
            GameInput::Connect {
                connection: Connection::new(session_id, tx),
                reply,
            },
            0,
        );
        let slot = reply_rx.try_recv().ok().flatten()?;
        Some(Client {
            slot,
            session_id,
            rx,
        })
    }

    fn send(sim: &mut Simulation, client: &Client, msg: ClientMsg, now: u64) {
        sim.handle(
            GameInput::Player(PlayerInput {
                slot: client.slot,
                session_id: client.session_id,
                msg,
                received_at: now,
            }),
            now,
        );
    }

    fn join(sim: &mut Simulation, name: &str) -> Client {
        let mut client = connect(sim).expect("slot");
        send(
            sim,
            &client,
            ClientMsg::Join {
                name: name.to_string(),
                skin: 0,
            },
            0,
        );
        drain(&mut client.rx);
        client
    }

    fn sim() -> Simulation {
        Simulation::new(world_with(small_config()), 0)
    }

    #[test]
    fn connect_sends_init_and_rejects_when_full() {
        let mut sim = sim();
        let mut first = connect(&mut sim).unwrap();
        assert_eq!(
            drain(&mut first.rx),
            vec![ServerMsg::Init {
                id: 0,
                clans: Vec::new()
            }]
        );
        let _rest: Vec<_> = (0..3).map(|_| connect(&mut sim).unwrap()).collect();

        let (tx, mut rx) = mpsc::channel(4);
        let (reply, mut reply_rx) = oneshot::channel();
        sim.handle(
            GameInput::Connect {
                connection: Connection::new(Uuid::new_v4(), tx),
                reply,
            },
            0,
        );
        assert_eq!(reply_rx.try_recv().ok(), Some(None));
        assert_eq!(
            rx.try_recv().ok(),
            Some(ServerMsg::Disconnect {
                reason: "server is full".to_string()
            })
        );
    }

    #[test]
    fn join_spawns_and_exchanges_status() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        let mut b = connect(&mut sim).unwrap();
        drain(&mut b.rx);
        send(
            &mut sim,
            &b,
            ClientMsg::Join {
                name: "this name is far too long".to_string(),
                skin: 3,
            },
            0,
        );

        let player = sim.world().player(b.slot).unwrap();
        assert!(player.alive);
        assert_eq!(player.name.as_deref(), Some("unknown"));
        assert_eq!(player.skin, 3);

        let to_b = drain(&mut b.rx);
        assert_eq!(to_b[0], ServerMsg::Spawned { id: b.slot });
        assert!(to_b.iter().any(|m| matches!(
            m,
            ServerMsg::PlayerStatus { status, is_self: false } if status.id == a.slot
        )));
        let to_a = drain(&mut a.rx);
        assert!(to_a.iter().any(|m| matches!(
            m,
            ServerMsg::PlayerStatus { status, is_self: false } if status.id == b.slot
        )));
    }

    #[test]
    fn intents_apply_immediately_and_bad_values_are_ignored() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        send(&mut sim, &a, ClientMsg::Aim { angle: 1.5 }, 0);
        send(&mut sim, &a, ClientMsg::Aim { angle: f32::NAN }, 0);
        send(&mut sim, &a, ClientMsg::Move { angle: Some(0.5) }, 0);
        send(&mut sim, &a, ClientMsg::Move { angle: Some(f32::INFINITY) }, 0);

        let player = sim.world().player(a.slot).unwrap();
        assert_eq!(player.aim_angle, 1.5);
        assert_eq!(player.movement_angle, Some(0.5));

        send(&mut sim, &a, ClientMsg::Move { angle: None }, 0);
        assert_eq!(sim.world().player(a.slot).unwrap().movement_angle, None);
    }

    #[test]
    fn stale_session_input_is_dropped() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let impostor = Client {
            slot: a.slot,
            session_id: Uuid::new_v4(),
            rx: mpsc::channel(1).1,
        };
        send(&mut sim, &impostor, ClientMsg::Aim { angle: 2.0 }, 0);
        assert_eq!(sim.world().player(a.slot).unwrap().aim_angle, 0.0);
    }

    #[test]
    fn broadcast_every_nth_tick() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        let sent: Vec<bool> = (1..=10).map(|t| sim.tick(t * 9)).collect();
        assert_eq!(sent.iter().filter(|s| **s).count(), 2);
        assert!(sent[0] && sent[5]);

        let leaderboards = drain(&mut a.rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::Leaderboard { .. }))
            .count();
        assert_eq!(leaderboards, 2);
    }

    #[test]
    fn tick_uses_wall_clock_delta() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        {
            let p = sim.world_mut().player_mut(a.slot).unwrap();
            p.position = Vector2::new(4000.0, 4000.0);
            p.movement_angle = Some(0.0);
        }
        sim.tick(100);
        sim.tick(200);
        let config = sim.world().config.clone();
        let v = sim.world().player(a.slot).unwrap().velocity.x;
        let first = config.player_speed * 100.0;
        let expected = first * config.player_decel.powf(100.0) + first;
        assert!((v - expected).abs() < 1e-6);
    }

    #[test]
    fn held_attack_respects_cooldown_across_ticks() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        send(&mut sim, &a, ClientMsg::Attack { active: true }, 0);
        for t in (9..500).step_by(9) {
            sim.tick(t);
        }
        sim.tick(500);
        let attacks = drain(&mut a.rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::Attack { .. }))
            .count();
        assert_eq!(attacks, 2);
    }

    #[test]
    fn disconnect_frees_slot_and_dissolves_owned_clan() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let mut b = join(&mut sim, "bob");
        send(&mut sim, &a, ClientMsg::CreateClan { tag: "RED".to_string() }, 0);
        send(
            &mut sim,
            &a,
            ClientMsg::ClanJoinDecision {
                member_id: b.slot,
                accept: true,
            },
            0,
        );
        drain(&mut b.rx);

        sim.handle(
            GameInput::Disconnect {
                slot: a.slot,
                session_id: a.session_id,
            },
            0,
        );
        assert!(sim.world().player(a.slot).is_none());
        assert!(sim.world().clans.is_empty());
        assert!(sim.world().player(b.slot).unwrap().clan.is_none());
        assert!(drain(&mut b.rx)
            .iter()
            .any(|m| matches!(m, ServerMsg::ClanDissolved { .. })));
    }

    #[test]
    fn closed_connections_are_reaped_on_tick() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let b = join(&mut sim, "bob");
        drop(b.rx);
        sim.tick(9);
        assert!(sim.world().player(a.slot).is_some());
        assert!(sim.world().player(b.slot).is_none());
    }

    #[test]
    fn member_disconnect_updates_roster() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let b = join(&mut sim, "bob");
        send(&mut sim, &a, ClientMsg::CreateClan { tag: "RED".to_string() }, 0);
        send(
            &mut sim,
            &a,
            ClientMsg::ClanJoinDecision {
                member_id: b.slot,
                accept: true,
            },
            0,
        );
        sim.handle(
            GameInput::Disconnect {
                slot: b.slot,
                session_id: b.session_id,
            },
            0,
        );
        let clan = sim.world().clan("RED").unwrap();
        assert_eq!(clan.members.len(), 1);
        assert_eq!(clan.owner_id, a.slot);
    }

    #[test]
    fn new_connection_learns_existing_clans() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        send(&mut sim, &a, ClientMsg::CreateClan { tag: "RED".to_string() }, 0);
        let mut late = connect(&mut sim).unwrap();
        match &drain(&mut late.rx)[0] {
            ServerMsg::Init { clans, .. } => {
                assert_eq!(clans.len(), 1);
                assert_eq!(clans[0].tag, "RED");
                assert_eq!(clans[0].owner, a.slot);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn throttles_measure_from_arrival_time() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let mut b = join(&mut sim, "bob");
        send(&mut sim, &a, ClientMsg::Ping, 1_000);
        // arrived 1000ms after the first ping but sat in the queue
        sim.handle(
            GameInput::Player(PlayerInput {
                slot: a.slot,
                session_id: a.session_id,
                msg: ClientMsg::Ping,
                received_at: 2_000,
            }),
            3_300,
        );
        let pings = drain(&mut b.rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::MapPing { .. }))
            .count();
        assert_eq!(pings, 1);
    }

    #[test]
    fn shutdown_notifies_then_acknowledges() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        let (done, mut done_rx) = oneshot::channel();
        sim.handle(
            GameInput::Shutdown {
                reason: "bye".to_string(),
                done,
            },
            0,
        );
        assert_eq!(
            drain(&mut a.rx),
            vec![ServerMsg::Disconnect {
                reason: "bye".to_string()
            }]
        );
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn ping_is_rate_limited() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        let mut b = join(&mut sim, "bob");
        send(&mut sim, &a, ClientMsg::Ping, 1_000);
        send(&mut sim, &a, ClientMsg::Ping, 2_000);
        send(&mut sim, &a, ClientMsg::Ping, 3_200);
        let pings = drain(&mut b.rx)
            .into_iter()
            .filter(|m| matches!(m, ServerMsg::MapPing { .. }))
            .count();
        assert_eq!(pings, 2);
    }

    #[test]
    fn chat_broadcasts_and_operator_commands_stay_private() {
        let mut config = small_config();
        config.dev_password = Some("hunter2".to_string());
        let mut sim = Simulation::new(world_with(config), 0);
        let mut a = join(&mut sim, "alice");
        let mut b = join(&mut sim, "bob");

        send(&mut sim, &a, ClientMsg::Chat { text: "hello".to_string() }, 0);
        assert!(drain(&mut b.rx).contains(&ServerMsg::Chat {
            id: a.slot,
            text: "hello".to_string()
        }));
        drain(&mut a.rx);

        // not yet an operator: sudo is plain chat
        send(&mut sim, &a, ClientMsg::Chat { text: "sudo hyperspeed -s 4".to_string() }, 0);
        assert_eq!(sim.world().player(a.slot).unwrap().speed_factor, 1.0);
        drain(&mut b.rx);

        send(&mut sim, &a, ClientMsg::Chat { text: "login wrong".to_string() }, 0);
        assert!(!sim.world().player(a.slot).unwrap().is_operator);
        send(&mut sim, &a, ClientMsg::Chat { text: "login hunter2".to_string() }, 0);
        assert!(sim.world().player(a.slot).unwrap().is_operator);
        assert!(drain(&mut b.rx).is_empty());

        send(&mut sim, &a, ClientMsg::Chat { text: "sudo hyperspeed -s 4".to_string() }, 0);
        assert_eq!(sim.world().player(a.slot).unwrap().speed_factor, 4.0);
        send(&mut sim, &a, ClientMsg::Chat { text: "sudo fly".to_string() }, 0);
        assert!(drain(&mut b.rx).is_empty());
        let replies: Vec<String> = drain(&mut a.rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::Chat { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert!(replies.iter().any(|t| t.contains("unknown command")));
    }

    #[test]
    fn login_disabled_without_password() {
        let mut sim = sim();
        let a = join(&mut sim, "alice");
        send(&mut sim, &a, ClientMsg::Chat { text: "login ".to_string() }, 0);
        assert!(!sim.world().player(a.slot).unwrap().is_operator);
    }

    #[test]
    fn admin_event_reaches_everyone() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        let mut idle = connect(&mut sim).unwrap();
        drain(&mut idle.rx);
        sim.handle(
            GameInput::Admin(AdminAction::ClientEvent {
                name: "banner".to_string(),
                params: json!({ "text": "restart soon" }),
            }),
            0,
        );
        for rx in [&mut a.rx, &mut idle.rx] {
            assert_eq!(drain(rx).len(), 1);
        }
    }

    #[test]
    fn broadcast_discloses_nearby_resources() {
        let mut sim = sim();
        let mut a = join(&mut sim, "alice");
        sim.world_mut().player_mut(a.slot).unwrap().position = Vector2::new(5000.0, 5000.0);
        sim.world_mut().resources = vec![
            Resource::new(0, Vector2::new(5100.0, 5100.0), ResourceKind::Wood, 140.0, 0.0),
            Resource::new(1, Vector2::new(12000.0, 5000.0), ResourceKind::Stone, 90.0, 0.0),
        ];
        sim.tick(9);
        let disclosed: Vec<_> = drain(&mut a.rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::NewObjects { data } => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(disclosed.len(), 1);
        assert_eq!(disclosed[0][0], json!(0));
        assert_eq!(disclosed[0].len(), 8);
    }

    #[tokio::test]
    async fn game_server_round_trip() {
        let world = world_with(small_config());
        let (server, handle) = GameServer::new(world, 64);
        let task = tokio::spawn(server.run());

        let (tx, mut rx) = mpsc::channel(64);
        let session_id = Uuid::new_v4();
        let slot = handle
            .connect(Connection::new(session_id, tx))
            .await
            .expect("slot");
        assert_eq!(slot, 0);
        assert_eq!(
            rx.recv().await,
            Some(ServerMsg::Init {
                id: 0,
                clans: Vec::new()
            })
        );

        assert!(
            handle
                .send(GameInput::Disconnect { slot, session_id })
                .await
        );
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_broadcast() {
        let (server, handle) = GameServer::new(world_with(small_config()), 64);
        let task = tokio::spawn(server.run());

        let (tx, mut rx) = mpsc::channel(64);
        handle
            .connect(Connection::new(Uuid::new_v4(), tx))
            .await
            .expect("slot");
        assert!(handle.shutdown("maintenance").await);

        let mut received = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            received.push(msg);
        }
        assert!(received.contains(&ServerMsg::Disconnect {
            reason: "maintenance".to_string()
        }));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn player_count_follows_reaping() {
        let (server, handle) = GameServer::new(world_with(small_config()), 64);
        let task = tokio::spawn(server.run());

        let (tx, rx) = mpsc::channel(64);
        handle
            .connect(Connection::new(Uuid::new_v4(), tx))
            .await
            .expect("slot");
        // the count is refreshed on the next input or tick
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(handle.player_count(), 1);

        drop(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.player_count(), 0);

        drop(handle);
        task.await.unwrap();
    }
}
