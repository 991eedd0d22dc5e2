use serde::{Deserialize, Serialize};

use crate::datatypes::{LenPrefix, ReadBuf, WriteBuf};

use super::{write_count, Message, MessageError};

/// Reply to [`super::QueryOpcode::Info`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Whether a password is required to join.
    pub closed: bool,
    pub players: u16,
    pub max_players: u16,
    pub server_name: String,
    pub game_mode_name: String,
    pub language: String,
}

/// Well-known rule keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleName {
    LagComp,
    MapName,
    Version,
    Weather,
    WebUrl,
    WorldTime,
    /// Any key outside the known set, as sent by modded servers.
    Custom(String),
}

/// One entry of the reply to [`super::QueryOpcode::Rules`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRule {
    pub name: RuleName,
    pub value: String,
}

/// One entry of the reply to [`super::QueryOpcode::Players`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub score: i32,
}

/// One entry of the reply to [`super::QueryOpcode::PlayersDetailed`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDetailed {
    pub id: u8,
    pub name: String,
    pub score: i32,
    pub ping: i32,
}

impl RuleName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::LagComp => "lagcomp",
            Self::MapName => "mapname",
            Self::Version => "version",
            Self::Weather => "weather",
            Self::WebUrl => "weburl",
            Self::WorldTime => "worldtime",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for RuleName {
    fn from(value: String) -> Self {
        match value.as_str() {
            "lagcomp" => Self::LagComp,
            "mapname" => Self::MapName,
            "version" => Self::Version,
            "weather" => Self::Weather,
            "weburl" => Self::WebUrl,
            "worldtime" => Self::WorldTime,
            _ => Self::Custom(value),
        }
    }
}

impl From<RuleName> for String {
    fn from(value: RuleName) -> Self {
        match value {
            RuleName::Custom(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl Message for ServerInfo {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        buf.write_bool(self.closed)?;
        buf.write_u16(self.players)?;
        buf.write_u16(self.max_players)?;
        buf.write_str(&self.server_name, LenPrefix::U32)?;
        buf.write_str(&self.game_mode_name, LenPrefix::U32)?;
        buf.write_str(&self.language, LenPrefix::U32)?;
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        Ok(Self {
            closed: buf.read_bool()?,
            players: buf.read_u16()?,
            max_players: buf.read_u16()?,
            server_name: buf.read_str(LenPrefix::U32)?,
            game_mode_name: buf.read_str(LenPrefix::U32)?,
            language: buf.read_str(LenPrefix::U32)?,
        })
    }
}

impl Message for Vec<ServerRule> {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        write_count(buf, self.len())?;
        for rule in self {
            buf.write_str(rule.name.as_str(), LenPrefix::U8)?;
            buf.write_str(&rule.value, LenPrefix::U8)?;
        }
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        let count = buf.read_u16()?;
        let mut rules = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = RuleName::from(buf.read_str(LenPrefix::U8)?);
            let value = buf.read_str(LenPrefix::U8)?;
            rules.push(ServerRule { name, value });
        }
        Ok(rules)
    }
}

impl Message for Vec<Player> {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        write_count(buf, self.len())?;
        for player in self {
            buf.write_str(&player.name, LenPrefix::U8)?;
            buf.write_i32(player.score)?;
        }
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        let count = buf.read_u16()?;
        let mut players = Vec::with_capacity(count as usize);
        for _ in 0..count {
            players.push(Player {
                name: buf.read_str(LenPrefix::U8)?,
                score: buf.read_i32()?,
            });
        }
        Ok(players)
    }
}

impl Message for Vec<PlayerDetailed> {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError> {
        write_count(buf, self.len())?;
        for player in self {
            buf.write_u8(player.id)?;
            buf.write_str(&player.name, LenPrefix::U8)?;
            buf.write_i32(player.score)?;
            buf.write_i32(player.ping)?;
        }
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError> {
        let count = buf.read_u16()?;
        let mut players = Vec::with_capacity(count as usize);
        for _ in 0..count {
            players.push(PlayerDetailed {
                id: buf.read_u8()?,
                name: buf.read_str(LenPrefix::U8)?,
                score: buf.read_i32()?,
                ping: buf.read_i32()?,
            });
        }
        Ok(players)
    }
}
