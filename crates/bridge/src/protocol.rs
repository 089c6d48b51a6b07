//! Protocol module - JSON messages exchanged with the agent
//!
//! Every frame is one JSON object with a `"type"` discriminator. Tags the
//! bridge does not know decode to [`Message::Other`] rather than failing, so
//! newer agents can add messages without breaking older bridges.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::types::{PieceKind, Rotation, BOARD_WIDTH};

/// Piece kind as it travels on the wire: one uppercase letter, decoded case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceCode(pub PieceKind);

impl From<PieceKind> for PieceCode {
    fn from(value: PieceKind) -> Self {
        Self(value)
    }
}

impl From<PieceCode> for PieceKind {
    fn from(value: PieceCode) -> Self {
        value.0
    }
}

impl Serialize for PieceCode {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for PieceCode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PieceKind::from_str(&s)
            .map(PieceCode)
            .ok_or_else(|| serde::de::Error::custom("invalid piece kind"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Orientation {
    #[serde(rename = "north")]
    North,
    #[serde(rename = "east")]
    East,
    #[serde(rename = "south")]
    South,
    #[serde(rename = "west")]
    West,
}

impl<'de> Deserialize<'de> for Orientation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.eq_ignore_ascii_case("north") {
            Ok(Self::North)
        } else if s.eq_ignore_ascii_case("east") {
            Ok(Self::East)
        } else if s.eq_ignore_ascii_case("south") {
            Ok(Self::South)
        } else if s.eq_ignore_ascii_case("west") {
            Ok(Self::West)
        } else {
            Err(serde::de::Error::custom("invalid orientation"))
        }
    }
}

impl From<Rotation> for Orientation {
    fn from(value: Rotation) -> Self {
        match value {
            Rotation::North => Self::North,
            Rotation::East => Self::East,
            Rotation::South => Self::South,
            Rotation::West => Self::West,
        }
    }
}

impl From<Orientation> for Rotation {
    fn from(value: Orientation) -> Self {
        match value {
            Orientation::North => Rotation::North,
            Orientation::East => Rotation::East,
            Orientation::South => Rotation::South,
            Orientation::West => Rotation::West,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spin {
    None,
    Mini,
    Full,
}

/// Which of the two wire shapes a placement travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlacementForm {
    /// `{"piece","column","row"?,"orientation","spin"?}`
    #[default]
    Flat,
    /// `{"location":{"type","orientation","x","y"},"spin"?}`
    Location,
}

/// A placement for the agent's next piece.
///
/// `column`/`row` address the rotation-centre mino, bottom-up. Both wire
/// shapes decode; `form` remembers which one arrived so an acknowledgement
/// goes back in the shape the agent speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlacementRepr", into = "PlacementRepr")]
pub struct Placement {
    pub piece: PieceCode,
    pub column: i8,
    pub row: Option<i8>,
    pub orientation: Orientation,
    pub spin: Option<Spin>,
    pub form: PlacementForm,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PlacementRepr {
    Flat {
        piece: PieceCode,
        column: i8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        row: Option<i8>,
        orientation: Orientation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spin: Option<Spin>,
    },
    Location {
        location: PieceLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spin: Option<Spin>,
    },
}

#[derive(Serialize, Deserialize)]
struct PieceLocation {
    #[serde(rename = "type")]
    piece: PieceCode,
    orientation: Orientation,
    x: i8,
    y: i8,
}

impl From<PlacementRepr> for Placement {
    fn from(value: PlacementRepr) -> Self {
        match value {
            PlacementRepr::Flat {
                piece,
                column,
                row,
                orientation,
                spin,
            } => Placement {
                piece,
                column,
                row,
                orientation,
                spin,
                form: PlacementForm::Flat,
            },
            PlacementRepr::Location { location, spin } => Placement {
                piece: location.piece,
                column: location.x,
                row: Some(location.y),
                orientation: location.orientation,
                spin,
                form: PlacementForm::Location,
            },
        }
    }
}

impl From<Placement> for PlacementRepr {
    fn from(value: Placement) -> Self {
        match (value.form, value.row) {
            // The nested shape needs a row; without one only the flat shape fits.
            (PlacementForm::Location, Some(y)) => PlacementRepr::Location {
                location: PieceLocation {
                    piece: value.piece,
                    orientation: value.orientation,
                    x: value.column,
                    y,
                },
                spin: value.spin,
            },
            _ => PlacementRepr::Flat {
                piece: value.piece,
                column: value.column,
                row: value.row,
                orientation: value.orientation,
                spin: value.spin,
            },
        }
    }
}

/// Agent identification, diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

/// Randomizer state attached to a start snapshot when the whole queue is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RandomizerState {
    SevenBag { bag_state: Vec<PieceCode> },
    #[serde(other)]
    Unknown,
}

/// Full game state for the agent. Board rows are bottom-up (row 0 is the floor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSnapshot {
    pub board: Vec<[Option<PieceCode>; BOARD_WIDTH]>,
    pub queue: Vec<PieceCode>,
    #[serde(default)]
    pub hold: Option<PieceCode>,
    pub combo: u32,
    pub back_to_back: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomizer: Option<RandomizerState>,
}

/// Every message either side may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Info(AgentInfo),
    Rules,
    Ready,
    Start(StartSnapshot),
    Suggest,
    Suggestion {
        moves: Vec<Placement>,
    },
    Play {
        #[serde(rename = "move")]
        mv: Placement,
    },
    Stop,
    NewPiece {
        piece: PieceCode,
    },
    Quit,
    Error {
        #[serde(default)]
        reason: String,
    },
    /// A tag this bridge does not understand; never sent.
    #[serde(skip)]
    Other {
        kind: String,
    },
}

const KNOWN_TAGS: [&str; 11] = [
    "info",
    "rules",
    "ready",
    "start",
    "suggest",
    "suggestion",
    "play",
    "stop",
    "new_piece",
    "quit",
    "error",
];

impl Message {
    /// Wire tag, for logging.
    pub fn tag(&self) -> &str {
        match self {
            Message::Info(_) => "info",
            Message::Rules => "rules",
            Message::Ready => "ready",
            Message::Start(_) => "start",
            Message::Suggest => "suggest",
            Message::Suggestion { .. } => "suggestion",
            Message::Play { .. } => "play",
            Message::Stop => "stop",
            Message::NewPiece { .. } => "new_piece",
            Message::Quit => "quit",
            Message::Error { .. } => "error",
            Message::Other { kind } => kind,
        }
    }
}

// ============== Codec ==============

/// Encode a message as one JSON frame (no trailing newline).
pub fn encode(msg: &Message) -> Result<String> {
    if let Message::Other { kind } = msg {
        return Err(BridgeError::Protocol(format!(
            "cannot encode unrecognized message {kind:?}"
        )));
    }
    Ok(serde_json::to_string(msg)?)
}

/// Decode one JSON frame.
///
/// Unknown tags yield [`Message::Other`]; a malformed frame, a missing tag, or
/// a known tag with the wrong shape is a protocol error.
pub fn decode(frame: &str) -> Result<Message> {
    #[derive(Debug, Deserialize)]
    struct TypeOnly {
        #[serde(rename = "type")]
        msg_type: Option<String>,
    }

    let kind = serde_json::from_str::<TypeOnly>(frame)?
        .msg_type
        .ok_or_else(|| BridgeError::Protocol("frame has no \"type\" field".into()))?;

    if !KNOWN_TAGS.contains(&kind.as_str()) {
        return Ok(Message::Other { kind });
    }
    serde_json::from_str::<Message>(frame)
        .map_err(|e| BridgeError::Protocol(format!("malformed {kind:?} message: {e}")))
}
