use cards56_protocol::{GameStage, THANI_BID};
use serde_json::Value;
use std::sync::Arc;

use super::{bool_or, int_or, pair_of, table_section};

/// Per-team standing for the game in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeamStatus {
    pub current_score: i64,
    /// Points this team must reach to win the game; 0 while there is no bid.
    pub score_needed: i64,
    pub coolie_count: i64,
}

/// Where the current game stands: stage, dealer, trump and the two teams'
/// standings, including targets derived from the winning bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProgress {
    pub stage: GameStage,
    pub cancelled: bool,
    pub forfeited: bool,
    pub dealer_seat: i64,
    pub coolie_count: [i64; 2],
    pub trump_exposed: bool,
    pub trump_card: Option<String>,
    pub teams: [TeamStatus; 2],
}

impl Default for GameProgress {
    fn default() -> Self {
        GameProgress {
            stage: GameStage::Unknown,
            cancelled: false,
            forfeited: false,
            dealer_seat: 0,
            coolie_count: [0, 0],
            trump_exposed: false,
            trump_card: None,
            teams: [TeamStatus::default(); 2],
        }
    }
}

impl GameProgress {
    pub fn update(prev: &Arc<GameProgress>, raw: &Value) -> (Arc<GameProgress>, bool) {
        let section = table_section(raw);

        let stage = raw
            .get("GameStage")
            .and_then(Value::as_i64)
            .map(GameStage::from_i64)
            .unwrap_or(prev.stage);

        let coolie_count = pair_of(section, "CoolieCount").unwrap_or(prev.coolie_count);

        let trump_card = match raw.get("TrumpCard").and_then(Value::as_str) {
            Some(code) if !code.is_empty() => Some(code.to_string()),
            Some(_) => None,
            None => prev.trump_card.clone(),
        };

        let current_scores = pair_of(section, "TeamScore")
            .unwrap_or([prev.teams[0].current_score, prev.teams[1].current_score]);
        let targets = match section.get("Bid") {
            Some(bid) if bid.is_object() => {
                score_targets(int_or(bid, "HighBid", 0), int_or(bid, "HighBidder", -1))
            }
            _ => [prev.teams[0].score_needed, prev.teams[1].score_needed],
        };

        let mut teams = [TeamStatus::default(); 2];
        for (i, team) in teams.iter_mut().enumerate() {
            *team = TeamStatus {
                current_score: current_scores[i],
                score_needed: targets[i],
                coolie_count: coolie_count[i],
            };
        }

        let next = GameProgress {
            stage,
            cancelled: bool_or(section, "GameCancelled", prev.cancelled),
            forfeited: bool_or(section, "GameForfeited", prev.forfeited),
            dealer_seat: int_or(section, "DealerPos", prev.dealer_seat),
            coolie_count,
            trump_exposed: bool_or(raw, "TrumpExposed", prev.trump_exposed),
            trump_card,
            teams,
        };

        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}

/// Point targets for both teams given the winning bid. The bidding team must
/// make its bid; the defenders need the complement of the 57 total. A Thani
/// (slam) bid instead pits all eight tricks against a single one.
fn score_targets(high_bid: i64, high_bidder: i64) -> [i64; 2] {
    if high_bid <= 0 || high_bidder < 0 {
        return [0, 0];
    }
    let bidding = (high_bidder % 2) as usize;
    let mut targets = [0i64; 2];
    if high_bid == THANI_BID {
        targets[bidding] = 8;
        targets[1 - bidding] = 1;
    } else {
        targets[bidding] = high_bid;
        targets[1 - bidding] = THANI_BID - high_bid;
    }
    targets
}
