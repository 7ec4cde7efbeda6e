use serde_json::Value;
use std::sync::Arc;

use super::{array_of, int_or, pair_of, string_list, table_section};

/// One trick. The sentinel round (all seats -1, nothing played) stands in
/// when no round has started yet, so callers never deal with "no round".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub first_player_seat: i64,
    pub next_player_seat: i64,
    /// Card codes in play order, starting with `first_player_seat`.
    pub played_cards: Vec<String>,
    /// Per-play trump-exposure flags, parallel to `played_cards` when sent.
    pub trump_exposed: Vec<bool>,
    pub winner_seat: Option<i64>,
    pub score: Option<i64>,
    /// Card the server asks the client to play automatically, if any.
    pub auto_play_card: Option<String>,
}

impl Default for Round {
    fn default() -> Self {
        Round {
            first_player_seat: -1,
            next_player_seat: -1,
            played_cards: Vec::new(),
            trump_exposed: Vec::new(),
            winner_seat: None,
            score: None,
            auto_play_card: None,
        }
    }
}

/// The tricks played so far plus the running team score.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayHistory {
    pub rounds: Vec<Round>,
    pub team_score: [i64; 2],
}

impl PlayHistory {
    /// The round in progress — the sentinel round if none has started.
    pub fn current_round(&self) -> Round {
        self.rounds.last().cloned().unwrap_or_default()
    }

    /// The finished round before the current one, when there is one.
    pub fn previous_round(&self) -> Option<&Round> {
        self.rounds.len().checked_sub(2).map(|i| &self.rounds[i])
    }

    pub fn update(prev: &Arc<PlayHistory>, raw: &Value) -> (Arc<PlayHistory>, bool) {
        let section = table_section(raw);

        let rounds = match array_of(section, "Rounds") {
            Some(entries) => entries.iter().map(parse_round).collect(),
            None => prev.rounds.clone(),
        };

        let next = PlayHistory {
            rounds,
            team_score: pair_of(section, "TeamScore").unwrap_or(prev.team_score),
        };

        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}

fn parse_round(entry: &Value) -> Round {
    let trump_exposed = array_of(entry, "TrumpExposed")
        .map(|flags| flags.iter().map(|flag| flag.as_bool().unwrap_or(false)).collect())
        .unwrap_or_default();

    let auto_play_card = entry
        .get("AutoPlayNextCard")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .map(str::to_string);

    Round {
        first_player_seat: int_or(entry, "FirstPlayer", -1),
        next_player_seat: int_or(entry, "NextPlayer", -1),
        played_cards: string_list(entry, "PlayedCards").unwrap_or_default(),
        trump_exposed,
        winner_seat: entry.get("Winner").and_then(Value::as_i64),
        score: entry.get("Score").and_then(Value::as_i64),
        auto_play_card,
    }
}
