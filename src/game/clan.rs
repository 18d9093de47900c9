//! Clan lifecycle: create, join, kick, leave and dissolve
//!
//! Every transition runs to completion against the world before the next
//! command is handled. Invalid transitions are logged and ignored.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::ws::protocol::ServerMsg;

use super::world::{Clan, ClanMember, World};

pub const MAX_TAG_LENGTH: usize = 16;

pub struct ClanSystem;

impl ClanSystem {
    /// Found a new clan with `founder` as owner and sole member
    pub fn create(world: &mut World, founder: usize, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LENGTH {
            debug!(slot = founder, "Rejected clan tag");
            return;
        }
        if world.clan(tag).is_some() {
            debug!(slot = founder, tag, "Clan tag already taken");
            return;
        }
        let Some(player) = world.player(founder) else {
            return;
        };
        if player.clan.is_some() {
            debug!(slot = founder, "Already in a clan");
            return;
        }

        let name = player.display_name().to_string();
        let clan = Clan {
            tag: tag.to_string(),
            owner_id: founder,
            members: vec![ClanMember {
                id: founder,
                session_id: player.session_id(),
                name: name.clone(),
            }],
        };
        let info = clan.info();
        world.clans.push(clan);
        if let Some(player) = world.player_mut(founder) {
            player.clan = Some(tag.to_string());
        }

        world.broadcast(ServerMsg::ClanMemberHint { id: founder, name });
        world.send_to(
            founder,
            ServerMsg::ClanStatus {
                tag: Some(tag.to_string()),
                is_owner: true,
            },
        );
        world.broadcast(ServerMsg::ClanAdded(info));
        info!(slot = founder, tag, "Clan created");
    }

    /// Leave the current clan. An owner leaving dissolves the clan.
    pub fn leave(world: &mut World, id: usize) {
        let Some(tag) = world.player(id).and_then(|p| p.clan.clone()) else {
            return;
        };
        let Some(clan) = world.clan(&tag) else {
            // stale reference to a clan that no longer exists
            if let Some(player) = world.player_mut(id) {
                player.clan = None;
            }
            return;
        };

        if clan.owner_id == id {
            Self::dissolve(world, &tag);
            return;
        }

        Self::remove_member(world, &tag, id);
        world.send_to(
            id,
            ServerMsg::ClanStatus {
                tag: None,
                is_owner: false,
            },
        );
        debug!(slot = id, tag = %tag, "Left clan");
    }

    /// Ask the owner of `tag` to let `requester` in. Notification only.
    pub fn request_join(world: &World, requester: usize, tag: &str) {
        let (Some(player), Some(clan)) = (world.player(requester), world.clan(tag)) else {
            return;
        };
        if player.clan.is_some() {
            return;
        }
        let Some(owner) = clan
            .members
            .iter()
            .find(|m| m.id == clan.owner_id)
            .and_then(|m| world.resolve(m.id, m.session_id))
        else {
            return;
        };
        owner.send(ServerMsg::ClanJoinRequest {
            id: requester,
            name: player.display_name().to_string(),
        });
    }

    /// Owner's decision on a pending join. Accepting admits `member_id`.
    pub fn decide_join(world: &mut World, owner: usize, member_id: usize, accept: bool) {
        let Some(tag) = Self::owned_clan(world, owner) else {
            return;
        };
        if !accept {
            debug!(slot = owner, member = member_id, "Join request denied");
            return;
        }
        let Some(candidate) = world.player(member_id) else {
            return;
        };
        if candidate.clan.is_some() {
            debug!(slot = member_id, "Candidate already in a clan");
            return;
        }

        let member = ClanMember {
            id: member_id,
            session_id: candidate.session_id(),
            name: candidate.display_name().to_string(),
        };
        if let Some(clan) = world.clan_mut(&tag) {
            clan.members.push(member);
        }
        if let Some(player) = world.player_mut(member_id) {
            player.clan = Some(tag.clone());
        }

        Self::push_roster(world, &tag);
        world.send_to(
            member_id,
            ServerMsg::ClanStatus {
                tag: Some(tag.clone()),
                is_owner: false,
            },
        );
        info!(slot = member_id, tag = %tag, "Joined clan");
    }

    /// Owner removes `member_id` from the clan
    pub fn kick(world: &mut World, owner: usize, member_id: usize) {
        let Some(tag) = Self::owned_clan(world, owner) else {
            return;
        };
        if member_id == owner {
            return;
        }
        if !world.clan(&tag).map_or(false, |c| c.contains(member_id)) {
            return;
        }

        Self::remove_member(world, &tag, member_id);
        world.send_to(
            member_id,
            ServerMsg::ClanStatus {
                tag: None,
                is_owner: false,
            },
        );
        info!(slot = member_id, tag = %tag, "Kicked from clan");
    }

    /// Tag of the clan `owner` owns, if any
    fn owned_clan(world: &World, owner: usize) -> Option<String> {
        let tag = world.player(owner)?.clan.clone()?;
        let clan = world.clan(&tag)?;
        (clan.owner_id == owner).then_some(tag)
    }

    /// Drop `id` from the roster, clear its reference and push the new
    /// roster. An emptied clan is deleted.
    fn remove_member(world: &mut World, tag: &str, id: usize) {
        let now_empty = match world.clan_mut(tag) {
            Some(clan) => {
                clan.members.retain(|m| m.id != id);
                clan.members.is_empty()
            }
            None => false,
        };
        if let Some(player) = world.player_mut(id) {
            if player.clan.as_deref() == Some(tag) {
                player.clan = None;
            }
        }
        if now_empty {
            world.clans.retain(|c| c.tag != tag);
        } else {
            Self::push_roster(world, tag);
        }
    }

    /// Remove the clan and release every member
    fn dissolve(world: &mut World, tag: &str) {
        let Some(index) = world.clans.iter().position(|c| c.tag == tag) else {
            return;
        };
        let clan = world.clans.remove(index);
        for member in &clan.members {
            let Some(player) = world.resolve_mut(member.id, member.session_id) else {
                continue;
            };
            player.clan = None;
            player.send(ServerMsg::ClanStatus {
                tag: None,
                is_owner: false,
            });
            player.send(ServerMsg::ClanDissolved {
                tag: clan.tag.clone(),
            });
        }
        info!(tag, members = clan.members.len(), "Clan dissolved");
    }

    /// Current roster flattened as `[id, name]*`
    pub fn roster(clan: &Clan) -> Vec<Value> {
        clan.members
            .iter()
            .flat_map(|m| [json!(m.id), json!(m.name)])
            .collect()
    }

    /// Send the current roster to every member
    fn push_roster(world: &World, tag: &str) {
        let Some(clan) = world.clan(tag) else {
            return;
        };
        let data = Self::roster(clan);
        for member in &clan.members {
            if let Some(player) = world.resolve(member.id, member.session_id) {
                player.send(ServerMsg::ClanRoster { data: data.clone() });
            }
        }
    }
}
