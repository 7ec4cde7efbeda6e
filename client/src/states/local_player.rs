use serde_json::Value;
use std::sync::Arc;

use super::{array_of, bool_or, int_or, str_or, string_list, table_section};

/// The player this client is logged in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPlayer {
    pub player_id: String,
    pub display_name: String,
    pub lang: String,
    pub watch_only: bool,
    /// -1 until the server seats (or registers) the player.
    pub seat_position: i64,
    /// Card codes in server-sent order.
    pub hand_cards: Vec<String>,
}

impl Default for LocalPlayer {
    fn default() -> Self {
        LocalPlayer {
            player_id: String::new(),
            display_name: String::new(),
            lang: String::new(),
            watch_only: false,
            seat_position: -1,
            hand_cards: Vec::new(),
        }
    }
}

impl LocalPlayer {
    /// Team the player sits on (-1 while unseated). Even seats are one team,
    /// odd seats the other.
    pub fn home_team(&self) -> i64 {
        if self.seat_position < 0 {
            -1
        } else {
            self.seat_position % 2
        }
    }

    pub fn other_team(&self) -> i64 {
        if self.seat_position < 0 {
            -1
        } else {
            1 - self.seat_position % 2
        }
    }

    pub fn update(prev: &Arc<LocalPlayer>, raw: &Value) -> (Arc<LocalPlayer>, bool) {
        let player_id = str_or(raw, "PlayerID", &prev.player_id);
        let seat_position = int_or(raw, "PlayerPosition", prev.seat_position);
        let watch_only = bool_or(raw, "WatchOnly", prev.watch_only);
        let hand_cards = string_list(raw, "PlayerCards").unwrap_or_else(|| prev.hand_cards.clone());

        // The player's own name and language travel inside the seating
        // block, keyed by seat.
        let mut display_name = prev.display_name.clone();
        let mut lang = prev.lang.clone();
        if seat_position >= 0 {
            if let Some(entry) = seated_entry(raw, seat_position, watch_only, &player_id) {
                display_name = str_or(entry, "Name", &display_name);
                lang = str_or(entry, "Lang", &lang);
            }
        }

        let next = LocalPlayer {
            player_id,
            display_name,
            lang,
            watch_only,
            seat_position,
            hand_cards,
        };

        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}

/// Finds the payload record describing the local player: the occupant of
/// their chair, or the matching watcher when watching.
fn seated_entry<'a>(
    raw: &'a Value,
    seat_position: i64,
    watch_only: bool,
    player_id: &str,
) -> Option<&'a Value> {
    let chairs = array_of(table_section(raw), "Chairs")?;
    let chair = chairs
        .iter()
        .find(|chair| int_or(chair, "Position", -1) == seat_position)?;
    if watch_only {
        array_of(chair, "Watchers")?
            .iter()
            .find(|watcher| str_or(watcher, "PlayerID", "") == player_id)
    } else {
        chair.get("Occupant").filter(|occupant| occupant.is_object())
    }
}
