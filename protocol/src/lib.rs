use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod cards;

pub use cards::{Card, ParseCardError, Rank, Suit};

/// The slam bid. A team that bids 57 commits to taking every trick.
pub const THANI_BID: i64 = 57;

/// ---- Game stages ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GameStage {
    Unknown = 0,
    WaitingForPlayers = 1,
    Bidding = 2,
    SelectingTrump = 3,
    PlayingCards = 4,
    GameOver = 5,
}

impl GameStage {
    /// Lossy decode of the wire number; anything unrecognized is `Unknown`.
    pub fn from_i64(n: i64) -> GameStage {
        match n {
            1 => GameStage::WaitingForPlayers,
            2 => GameStage::Bidding,
            3 => GameStage::SelectingTrump,
            4 => GameStage::PlayingCards,
            5 => GameStage::GameOver,
            _ => GameStage::Unknown,
        }
    }
}

impl Default for GameStage {
    fn default() -> Self {
        GameStage::Unknown
    }
}

impl fmt::Display for GameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStage::Unknown => "unknown",
            GameStage::WaitingForPlayers => "waiting for players",
            GameStage::Bidding => "bidding",
            GameStage::SelectingTrump => "selecting trump",
            GameStage::PlayingCards => "playing cards",
            GameStage::GameOver => "game over",
        };
        write!(f, "{s}")
    }
}

/// ---- Table types ----
///
/// The table type fixes the number of seats. The mapping is a table rule,
/// not server state, so clients recompute it from the type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TableType {
    FourSeat = 0,
    SixSeat = 1,
    EightSeat = 2,
}

impl TableType {
    pub fn from_i64(n: i64) -> TableType {
        match n {
            1 => TableType::SixSeat,
            2 => TableType::EightSeat,
            _ => TableType::FourSeat,
        }
    }

    pub fn max_players(self) -> i64 {
        match self {
            TableType::FourSeat => 4,
            TableType::SixSeat => 6,
            TableType::EightSeat => 8,
        }
    }
}

impl Default for TableType {
    fn default() -> Self {
        TableType::FourSeat
    }
}

/// ---- Hub methods ----
///
/// Server-side method identifiers as they appear in `OnError` payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HubMethod {
    Unknown = 0,
    RegisterPlayer = 1,
    JoinTable = 2,
    PlaceBid = 3,
    PassBid = 4,
    SelectTrump = 5,
    PlayCard = 6,
    ShowTrump = 7,
    StartNextGame = 8,
    RefreshState = 9,
    ForfeitGame = 10,
}

impl HubMethod {
    pub fn from_i64(n: i64) -> HubMethod {
        match n {
            1 => HubMethod::RegisterPlayer,
            2 => HubMethod::JoinTable,
            3 => HubMethod::PlaceBid,
            4 => HubMethod::PassBid,
            5 => HubMethod::SelectTrump,
            6 => HubMethod::PlayCard,
            7 => HubMethod::ShowTrump,
            8 => HubMethod::StartNextGame,
            9 => HubMethod::RefreshState,
            10 => HubMethod::ForfeitGame,
            _ => HubMethod::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HubMethod::Unknown => "Unknown",
            HubMethod::RegisterPlayer => methods::REGISTER_PLAYER,
            HubMethod::JoinTable => methods::JOIN_TABLE,
            HubMethod::PlaceBid => methods::PLACE_BID,
            HubMethod::PassBid => methods::PASS_BID,
            HubMethod::SelectTrump => methods::SELECT_TRUMP,
            HubMethod::PlayCard => methods::PLAY_CARD,
            HubMethod::ShowTrump => methods::SHOW_TRUMP,
            HubMethod::StartNextGame => methods::START_NEXT_GAME,
            HubMethod::RefreshState => methods::REFRESH_STATE,
            HubMethod::ForfeitGame => methods::FORFEIT_GAME,
        }
    }
}

impl fmt::Display for HubMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wire names of the methods a client may invoke.
pub mod methods {
    pub const REGISTER_PLAYER: &str = "RegisterPlayer";
    pub const JOIN_TABLE: &str = "JoinTable";
    pub const PLACE_BID: &str = "PlaceBid";
    pub const PASS_BID: &str = "PassBid";
    pub const SELECT_TRUMP: &str = "SelectTrump";
    pub const PLAY_CARD: &str = "PlayCard";
    pub const SHOW_TRUMP: &str = "ShowTrump";
    pub const START_NEXT_GAME: &str = "StartNextGame";
    pub const REFRESH_STATE: &str = "RefreshState";
    pub const FORFEIT_GAME: &str = "ForfeitGame";
    pub const UNREGISTER_PLAYER: &str = "UnregisterPlayer";
}

/// Wire names of the events the server pushes.
pub mod events {
    pub const ON_ERROR: &str = "OnError";
    pub const ON_STATE_UPDATED: &str = "OnStateUpdated";
    pub const ON_REGISTER_PLAYER_COMPLETED: &str = "OnRegisterPlayerCompleted";
}

/// ---- Event payloads ----

/// Payload of `OnRegisterPlayerCompleted`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPlayer {
    #[serde(rename = "playerID")]
    pub player_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub watch_only: bool,
}

/// Payload of `OnError`, assembled from the event's positional arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    pub error_code: i64,
    pub method: HubMethod,
    pub message: String,
    pub data: Value,
}

/// ---- Frame envelope ----
///
/// Everything on the websocket is a JSON frame tagged with `type`. Clients
/// send invocations; the server answers each with a completion carrying the
/// same id and pushes events at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Invocation {
        id: u64,
        method: String,
        args: Vec<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Completion {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        name: String,
        args: Vec<Value>,
    },
}
