//! Derived-state projections.
//!
//! Each projection is an immutable snapshot distilled from the raw server
//! state. `update(prev, raw)` builds a candidate from the payload — falling
//! back to the previous value for any field that is absent or mistyped —
//! and returns the previous `Arc` untouched when nothing relevant changed.
//! Downstream consumers compare identity (`Arc::ptr_eq`), not contents, to
//! decide whether to re-render.
//!
//! The server has historically used two payload shapes: table fields at the
//! root, or nested under `TableInfo`. The sub-tree wins when it is present.

use serde_json::Value;

pub mod bidding;
pub mod game_progress;
pub mod local_player;
pub mod play_history;
pub mod seating;
pub mod table_meta;

pub use bidding::{BidEntry, Bidding};
pub use game_progress::{GameProgress, TeamStatus};
pub use local_player::LocalPlayer;
pub use play_history::{PlayHistory, Round};
pub use seating::{Chair, SeatOccupant, Seating, Watcher};
pub use table_meta::TableMeta;

/// The `TableInfo` sub-tree when present, the root otherwise.
pub(crate) fn table_section(raw: &Value) -> &Value {
    match raw.get("TableInfo") {
        Some(section) if section.is_object() => section,
        _ => raw,
    }
}

pub(crate) fn int_or(section: &Value, key: &str, fallback: i64) -> i64 {
    section.get(key).and_then(Value::as_i64).unwrap_or(fallback)
}

pub(crate) fn bool_or(section: &Value, key: &str, fallback: bool) -> bool {
    section.get(key).and_then(Value::as_bool).unwrap_or(fallback)
}

pub(crate) fn str_or(section: &Value, key: &str, fallback: &str) -> String {
    section
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

/// A present-and-well-typed array, or `None` so the caller keeps the
/// previous value.
pub(crate) fn array_of<'a>(section: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    section.get(key).and_then(Value::as_array)
}

/// Whole-replacement string list: `Some` only when the field is present and
/// an array; elements of other types are skipped rather than failing the
/// update.
pub(crate) fn string_list(section: &Value, key: &str) -> Option<Vec<String>> {
    array_of(section, key).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// A two-slot score/count array, or `None` when absent or malformed.
pub(crate) fn pair_of(section: &Value, key: &str) -> Option<[i64; 2]> {
    let items = array_of(section, key)?;
    match (items.first().and_then(Value::as_i64), items.get(1).and_then(Value::as_i64)) {
        (Some(a), Some(b)) => Some([a, b]),
        _ => None,
    }
}

/// Rotates `seat` so the local player sits at position 0. Used by view
/// layers to arrange the table around the viewer.
pub fn relative_seat(seat: i64, local_seat: i64, max_players: i64) -> i64 {
    if max_players <= 0 {
        return seat;
    }
    (seat - local_seat).rem_euclid(max_players)
}
