//! JSON wire protocol.
//!
//! Every frame is a text frame shaped `{"event": "<name>", "data": {...}}`;
//! `data` is omitted for events without a payload (`save-world`,
//! `load-world`).

use std::collections::BTreeMap;

use craftsync_engine::world::block::{Block, Color};
use craftsync_engine::world::position::BlockPos;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountId;
use crate::error::{ClientError, ErrorKind};
use crate::player_registry::{ConnectionId, Pose, PoseDelta, Session};

// ── Shared payloads ─────────────────────────────────────────────────────

/// A bare block coordinate (`remove` in both directions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coords {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl From<BlockPos> for Coords {
    fn from(pos: BlockPos) -> Self {
        Self { x: pos.x, y: pos.y, z: pos.z }
    }
}

impl From<Coords> for BlockPos {
    fn from(c: Coords) -> Self {
        BlockPos::new(c.x, c.y, c.z)
    }
}

/// One block as clients and snapshot files see it. Indestructibility is
/// server-side knowledge and never leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRecord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub color: u32,
}

impl BlockRecord {
    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }

    pub fn color(&self) -> Color {
        Color(self.color)
    }
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        Self {
            x: block.pos.x,
            y: block.pos.y,
            z: block.pos.z,
            color: block.color.0,
        }
    }
}

/// A session as broadcast to other players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: ConnectionId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub name: String,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            x: session.pose.x,
            y: session.pose.y,
            z: session.pose.z,
            yaw: session.pose.yaw,
            name: session.name.clone(),
        }
    }
}

// ── Client -> server ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JoinRequest {
    #[serde(flatten)]
    pub pose: Pose,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameChange {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BuildRequest {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    #[serde(default)]
    pub color: Option<u32>,
}

impl BuildRequest {
    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }

    /// The requested color, or the default green when none was sent.
    pub fn color(&self) -> Color {
        self.color.map(Color).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join(JoinRequest),
    Move(PoseDelta),
    NameChange(NameChange),
    Build(BuildRequest),
    Remove(Coords),
    SaveWorld,
    LoadWorld,
    Login(Credentials),
    Signup(Credentials),
}

impl ClientMessage {
    /// Event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Move(_) => "move",
            Self::NameChange(_) => "name-change",
            Self::Build(_) => "build",
            Self::Remove(_) => "remove",
            Self::SaveWorld => "save-world",
            Self::LoadWorld => "load-world",
            Self::Login(_) => "login",
            Self::Signup(_) => "signup",
        }
    }
}

// ── Server -> client ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    /// The receiving connection's own id.
    pub id: ConnectionId,
    pub blocks: Vec<BlockRecord>,
    pub players: BTreeMap<ConnectionId, SessionRecord>,
}

/// Pose and/or name delta for one player. Absent fields did not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub id: ConnectionId,
    #[serde(flatten)]
    pub pose: PoseDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeave {
    pub id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldReset {
    pub blocks: Vec<BlockRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSaved {
    pub blocks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated {
    pub account: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Init(InitPayload),
    PlayerJoin(SessionRecord),
    PlayerUpdate(PlayerUpdate),
    PlayerLeave(PlayerLeave),
    Build(BlockRecord),
    Remove(Coords),
    WorldReset(WorldReset),
    WorldSaved(WorldSaved),
    Authenticated(Authenticated),
    Error(ErrorReport),
}

impl ServerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::PlayerJoin(_) => "player-join",
            Self::PlayerUpdate(_) => "player-update",
            Self::PlayerLeave(_) => "player-leave",
            Self::Build(_) => "build",
            Self::Remove(_) => "remove",
            Self::WorldReset(_) => "world-reset",
            Self::WorldSaved(_) => "world-saved",
            Self::Authenticated(_) => "authenticated",
            Self::Error(_) => "error",
        }
    }
}

// ── Codec ───────────────────────────────────────────────────────────────

/// Parse one inbound text frame.
pub fn decode(text: &str) -> Result<ClientMessage, ClientError> {
    serde_json::from_str(text).map_err(|e| ClientError::Validation(e.to_string()))
}

/// Render one outbound message as a text frame.
pub fn encode(message: &ServerMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_build_with_default_color() {
        let msg = decode(r#"{"event":"build","data":{"x":5,"y":0,"z":5}}"#).unwrap();
        let ClientMessage::Build(req) = msg else {
            panic!("expected build, got {:?}", msg);
        };
        assert_eq!(req.pos(), BlockPos::new(5, 0, 5));
        assert_eq!(req.color(), Color::DEFAULT);
    }

    #[test]
    fn decodes_join_without_yaw() {
        let msg = decode(r#"{"event":"join","data":{"x":0,"y":2.5,"z":0,"name":"Alice"}}"#).unwrap();
        let ClientMessage::Join(req) = msg else {
            panic!("expected join, got {:?}", msg);
        };
        assert_eq!(req.name, "Alice");
        assert_eq!(req.pose, Pose { x: 0.0, y: 2.5, z: 0.0, yaw: 0.0 });
    }

    #[test]
    fn decodes_partial_move_and_unit_events() {
        let msg = decode(r#"{"event":"move","data":{"yaw":1.5}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move(PoseDelta { yaw: Some(1.5), ..PoseDelta::default() })
        );
        assert_eq!(decode(r#"{"event":"save-world"}"#).unwrap(), ClientMessage::SaveWorld);
        assert_eq!(decode(r#"{"event":"load-world"}"#).unwrap(), ClientMessage::LoadWorld);
    }

    #[test]
    fn rejects_malformed_frames() {
        for bad in [
            "not json",
            r#"{"event":"teleport","data":{}}"#,
            r#"{"event":"build","data":{"x":1,"y":2}}"#,
            r#"{"event":"remove","data":{"x":"a","y":0,"z":0}}"#,
        ] {
            let err = decode(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad}");
        }
    }

    #[test]
    fn player_update_omits_unchanged_fields() {
        let msg = ServerMessage::PlayerUpdate(PlayerUpdate {
            id: ConnectionId(7),
            pose: PoseDelta { x: Some(1.0), y: Some(2.0), z: Some(3.0), yaw: Some(0.5) },
            name: None,
        });
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "player-update", "data": {"id": 7, "x": 1.0, "y": 2.0, "z": 3.0, "yaw": 0.5}})
        );
    }

    #[test]
    fn init_players_are_keyed_by_id() {
        let mut players = BTreeMap::new();
        players.insert(
            ConnectionId(3),
            SessionRecord { id: ConnectionId(3), x: 0.0, y: 2.5, z: 0.0, yaw: 0.0, name: "Alice".into() },
        );
        let msg = ServerMessage::Init(InitPayload {
            id: ConnectionId(4),
            blocks: vec![BlockRecord { x: 5, y: 0, z: 5, color: 0xff0000 }],
            players,
        });
        let text = encode(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["data"]["players"]["3"]["name"], "Alice");
        assert_eq!(value["data"]["blocks"][0]["color"], 0xff0000);

        let back: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);
    }
}
