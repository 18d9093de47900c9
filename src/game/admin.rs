//! Operator commands
//!
//! Chat operators issue `sudo <command> [flags]`. The text is parsed once
//! into an [`AdminCommand`]; anything unrecognized is rejected with an error
//! reported back to the operator. The HTTP surface issues [`AdminAction`]s.

use std::str::FromStr;

use serde_json::Value;
use tracing::info;

use crate::ws::protocol::ServerMsg;

use super::world::World;

/// Command issued by an operator from chat
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// Move the operator to a point, or onto the named player
    Teleport {
        x: Option<f32>,
        y: Option<f32>,
        target: Option<String>,
    },
    /// Set points on the named player, or the operator
    SetPoints { points: i64, target: Option<String> },
    /// Scale the operator's body radius
    SetSize { factor: f32 },
    /// Scale the operator's movement speed
    SetSpeed { factor: f32 },
}

/// Action issued over the authenticated HTTP surface
#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    /// Broadcast a named client-side event
    ClientEvent { name: String, params: Value },
    /// Disconnect everyone with a reason
    Shutdown { reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdminParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("unknown flag `{0}`")]
    UnknownFlag(String),

    #[error("flag `{0}` needs a value")]
    MissingValue(&'static str),

    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: &'static str, value: String },

    #[error("{0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdminError {
    #[error("no player named `{0}`")]
    UnknownPlayer(String),

    #[error("operator is not connected")]
    NoOperator,
}

/// Flags and their values, in order of appearance
struct Flags {
    entries: Vec<(&'static str, String)>,
}

impl Flags {
    /// Split `args` on known flags; words after a flag form its value
    fn parse(args: &str, known: &[&'static str]) -> Result<Self, AdminParseError> {
        let mut entries: Vec<(&'static str, Vec<&str>)> = Vec::new();
        for word in args.split_whitespace() {
            if word.starts_with('-') && word.len() > 1 && word.parse::<f64>().is_err() {
                let flag = known
                    .iter()
                    .copied()
                    .find(|k| *k == word)
                    .ok_or_else(|| AdminParseError::UnknownFlag(word.to_string()))?;
                entries.push((flag, Vec::new()));
            } else if let Some((_, words)) = entries.last_mut() {
                words.push(word);
            } else {
                return Err(AdminParseError::Usage("values must follow a flag"));
            }
        }
        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(flag, words)| (flag, words.join(" ")))
                .collect(),
        })
    }

    fn has(&self, flag: &str) -> bool {
        self.entries.iter().any(|(f, _)| *f == flag)
    }

    fn text(&self, flag: &'static str) -> Result<Option<String>, AdminParseError> {
        match self.entries.iter().rev().find(|(f, _)| *f == flag) {
            None => Ok(None),
            Some((_, v)) if v.is_empty() => Err(AdminParseError::MissingValue(flag)),
            Some((_, v)) => Ok(Some(v.clone())),
        }
    }

    fn number<T: FromStr>(&self, flag: &'static str) -> Result<Option<T>, AdminParseError> {
        match self.text(flag)? {
            None => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| AdminParseError::InvalidValue { flag, value: v }),
        }
    }

    /// Like `number`, but `NaN` and infinities are rejected
    fn finite(&self, flag: &'static str) -> Result<Option<f32>, AdminParseError> {
        match self.number::<f32>(flag)? {
            Some(v) if !v.is_finite() => Err(AdminParseError::InvalidValue {
                flag,
                value: v.to_string(),
            }),
            v => Ok(v),
        }
    }
}

impl FromStr for AdminCommand {
    type Err = AdminParseError;

    /// Parse the text following `sudo `
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (command, args) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        match command {
            "" => Err(AdminParseError::Empty),
            "teleport" => {
                let flags = Flags::parse(args, &["-x", "-y", "-p"])?;
                let target = flags.text("-p")?;
                let x = flags.finite("-x")?;
                let y = flags.finite("-y")?;
                if target.is_none() && x.is_none() && y.is_none() {
                    return Err(AdminParseError::Usage("teleport needs -x/-y or -p"));
                }
                Ok(AdminCommand::Teleport { x, y, target })
            }
            "setpts" => {
                let flags = Flags::parse(args, &["-n", "-p"])?;
                let points = flags
                    .number("-n")?
                    .ok_or(AdminParseError::MissingValue("-n"))?;
                Ok(AdminCommand::SetPoints {
                    points,
                    target: flags.text("-p")?,
                })
            }
            "giant" => {
                let flags = Flags::parse(args, &["-q", "-s"])?;
                if flags.has("-q") {
                    return Ok(AdminCommand::SetSize { factor: 1.0 });
                }
                let factor = flags
                    .finite("-s")?
                    .ok_or(AdminParseError::Usage("giant needs -s <factor> or -q"))?;
                Ok(AdminCommand::SetSize {
                    factor: factor.max(0.0),
                })
            }
            "hyperspeed" => {
                let flags = Flags::parse(args, &["-n", "-s"])?;
                if flags.has("-n") {
                    return Ok(AdminCommand::SetSpeed { factor: 1.0 });
                }
                let factor = flags
                    .finite("-s")?
                    .ok_or(AdminParseError::Usage("hyperspeed needs -s <factor> or -n"))?;
                Ok(AdminCommand::SetSpeed { factor })
            }
            other => Err(AdminParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl AdminCommand {
    /// Apply on behalf of `operator`
    pub fn apply(&self, world: &mut World, operator: usize) -> Result<(), AdminError> {
        match self {
            AdminCommand::Teleport { x, y, target } => {
                let destination = match target {
                    Some(name) => Some(
                        world
                            .find_by_name(name)
                            .map(|p| p.position)
                            .ok_or_else(|| AdminError::UnknownPlayer(name.clone()))?,
                    ),
                    None => None,
                };
                let player = world.player_mut(operator).ok_or(AdminError::NoOperator)?;
                match destination {
                    Some(position) => player.position = position,
                    None => {
                        if let Some(x) = x {
                            player.position.x = *x;
                        }
                        if let Some(y) = y {
                            player.position.y = *y;
                        }
                    }
                }
            }
            AdminCommand::SetPoints { points, target } => {
                let id = match target {
                    Some(name) => world
                        .find_by_name(name)
                        .map(|p| p.id)
                        .ok_or_else(|| AdminError::UnknownPlayer(name.clone()))?,
                    None => operator,
                };
                let player = world.player_mut(id).ok_or(AdminError::NoOperator)?;
                player.points = *points;
                player.send(ServerMsg::ResourceUpdate {
                    resource: "points".to_string(),
                    amount: *points,
                });
            }
            AdminCommand::SetSize { factor } => {
                let radius = world.config.player_radius;
                let player = world.player_mut(operator).ok_or(AdminError::NoOperator)?;
                player.size = radius * factor;
                player.send(ServerMsg::PlayerStatus {
                    status: player.status(),
                    is_self: true,
                });
            }
            AdminCommand::SetSpeed { factor } => {
                let player = world.player_mut(operator).ok_or(AdminError::NoOperator)?;
                player.speed_factor = *factor;
            }
        }
        info!(slot = operator, command = ?self, "Operator command applied");
        Ok(())
    }
}

impl AdminAction {
    pub fn apply(self, world: &mut World) {
        match self {
            AdminAction::ClientEvent { name, params } => {
                info!(event = %name, "Broadcasting client event");
                world.broadcast(ServerMsg::ClientEvent { name, params });
            }
            AdminAction::Shutdown { reason } => {
                info!(reason = %reason, "Disconnecting all players");
                world.broadcast(ServerMsg::Disconnect { reason });
            }
        }
    }
}

/// Client event names are restricted to a short identifier
pub fn valid_event_name(name: &str) -> bool {
    (1..=32).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::test_support::{drain, empty_world, spawn_at};
    use crate::util::vector::Vector2;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn parses_teleport_variants() {
        assert_eq!(
            "teleport -x 100 -y 250.5".parse::<AdminCommand>(),
            Ok(AdminCommand::Teleport {
                x: Some(100.0),
                y: Some(250.5),
                target: None
            })
        );
        assert_eq!(
            "teleport -p Big Bob".parse::<AdminCommand>(),
            Ok(AdminCommand::Teleport {
                x: None,
                y: None,
                target: Some("Big Bob".to_string())
            })
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        for input in ["teleport -x NaN", "teleport -y inf", "giant -s NaN", "hyperspeed -s -inf"] {
            assert!(
                matches!(
                    input.parse::<AdminCommand>(),
                    Err(AdminParseError::InvalidValue { .. })
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn parses_points_size_and_speed() {
        assert_eq!(
            "setpts -n 500 -p bob".parse::<AdminCommand>(),
            Ok(AdminCommand::SetPoints {
                points: 500,
                target: Some("bob".to_string())
            })
        );
        assert_eq!("giant -s 2".parse::<AdminCommand>(), Ok(AdminCommand::SetSize { factor: 2.0 }));
        assert_eq!("giant -s -3".parse::<AdminCommand>(), Ok(AdminCommand::SetSize { factor: 0.0 }));
        assert_eq!("giant -q".parse::<AdminCommand>(), Ok(AdminCommand::SetSize { factor: 1.0 }));
        assert_eq!("hyperspeed -s 3".parse::<AdminCommand>(), Ok(AdminCommand::SetSpeed { factor: 3.0 }));
        assert_eq!("hyperspeed -n".parse::<AdminCommand>(), Ok(AdminCommand::SetSpeed { factor: 1.0 }));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!("".parse::<AdminCommand>(), Err(AdminParseError::Empty));
        assert_eq!(
            "fly -x 1".parse::<AdminCommand>(),
            Err(AdminParseError::UnknownCommand("fly".to_string()))
        );
        assert_eq!(
            "teleport -z 1".parse::<AdminCommand>(),
            Err(AdminParseError::UnknownFlag("-z".to_string()))
        );
        assert_eq!(
            "setpts -n lots".parse::<AdminCommand>(),
            Err(AdminParseError::InvalidValue {
                flag: "-n",
                value: "lots".to_string()
            })
        );
        assert_err!("setpts -p bob".parse::<AdminCommand>());
        assert_err!("giant".parse::<AdminCommand>());
        assert_err!("teleport".parse::<AdminCommand>());
    }

    #[test]
    fn teleport_onto_player() {
        let mut world = empty_world();
        let (op, _r) = spawn_at(&mut world, "op", Vector2::new(100.0, 100.0));
        let (_t, _rt) = spawn_at(&mut world, "target", Vector2::new(900.0, 800.0));

        let cmd: AdminCommand = assert_ok!("teleport -p target".parse::<AdminCommand>());
        assert_ok!(cmd.apply(&mut world, op));
        assert_eq!(world.player(op).unwrap().position, Vector2::new(900.0, 800.0));

        let missing: AdminCommand = assert_ok!("teleport -p ghost".parse::<AdminCommand>());
        assert_eq!(
            missing.apply(&mut world, op),
            Err(AdminError::UnknownPlayer("ghost".to_string()))
        );
    }

    #[test]
    fn set_points_notifies_target() {
        let mut world = empty_world();
        let (op, mut rop) = spawn_at(&mut world, "op", Vector2::new(100.0, 100.0));
        let (t, mut rt) = spawn_at(&mut world, "bob", Vector2::new(100.0, 100.0));
        let cmd = AdminCommand::SetPoints {
            points: 42,
            target: Some("bob".to_string()),
        };
        assert_ok!(cmd.apply(&mut world, op));
        assert_eq!(world.player(t).unwrap().points, 42);
        assert_eq!(
            drain(&mut rt),
            vec![ServerMsg::ResourceUpdate {
                resource: "points".to_string(),
                amount: 42
            }]
        );
        assert!(drain(&mut rop).is_empty());
    }

    #[test]
    fn size_scales_from_base_radius() {
        let mut world = empty_world();
        let (op, _r) = spawn_at(&mut world, "op", Vector2::new(100.0, 100.0));
        assert_ok!(AdminCommand::SetSize { factor: 2.0 }.apply(&mut world, op));
        assert_ok!(AdminCommand::SetSize { factor: 3.0 }.apply(&mut world, op));
        assert_eq!(world.player(op).unwrap().size, world.config.player_radius * 3.0);
    }

    #[test]
    fn event_names_are_restricted() {
        assert!(valid_event_name("show_banner"));
        assert!(!valid_event_name(""));
        assert!(!valid_event_name("alert('x')"));
        assert!(!valid_event_name(&"a".repeat(33)));
    }
}
