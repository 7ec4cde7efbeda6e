use serde_json::Value;
use std::sync::Arc;

use super::{array_of, bool_or, int_or, str_or, table_section};

/// A player occupying a chair. Strings are always present (possibly empty)
/// so seat rendering never trips over a half-described occupant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeatOccupant {
    pub player_id: String,
    pub name: String,
    pub lang: String,
    pub watch_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Watcher {
    pub player_id: String,
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chair {
    pub seat_position: i64,
    pub occupant: Option<SeatOccupant>,
    pub watchers: Vec<Watcher>,
    pub coolie_count: i64,
    /// Set for one update when a coolie was just hung on this seat; the UI
    /// uses it to delay the game-over controls.
    pub coolie_just_awarded: bool,
}

/// Who sits (and watches) where. The server resends the whole `Chairs`
/// array whenever it is present, so the list is replaced, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Seating {
    pub chairs: Vec<Chair>,
}

impl Seating {
    pub fn chair_at(&self, position: i64) -> Option<&Chair> {
        self.chairs.iter().find(|chair| chair.seat_position == position)
    }

    /// True if any chair just had a coolie awarded in this update.
    pub fn coolie_just_awarded(&self) -> bool {
        self.chairs.iter().any(|chair| chair.coolie_just_awarded)
    }

    pub fn update(prev: &Arc<Seating>, raw: &Value) -> (Arc<Seating>, bool) {
        let chairs = match array_of(table_section(raw), "Chairs") {
            Some(entries) => entries.iter().map(parse_chair).collect(),
            None => prev.chairs.clone(),
        };

        let next = Seating { chairs };
        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}

fn parse_chair(entry: &Value) -> Chair {
    let occupant = entry
        .get("Occupant")
        .filter(|occupant| occupant.is_object())
        .map(|occupant| SeatOccupant {
            player_id: str_or(occupant, "PlayerID", ""),
            name: str_or(occupant, "Name", ""),
            lang: str_or(occupant, "Lang", ""),
            watch_only: bool_or(occupant, "WatchOnly", false),
        });

    let watchers = array_of(entry, "Watchers")
        .map(|watchers| {
            watchers
                .iter()
                .filter(|watcher| watcher.is_object())
                .map(|watcher| Watcher {
                    player_id: str_or(watcher, "PlayerID", ""),
                    name: str_or(watcher, "Name", ""),
                    lang: str_or(watcher, "Lang", ""),
                })
                .collect()
        })
        .unwrap_or_default();

    Chair {
        seat_position: int_or(entry, "Position", -1),
        occupant,
        watchers,
        coolie_count: int_or(entry, "KodiCount", 0),
        coolie_just_awarded: bool_or(entry, "KodiJustInstalled", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_chairs() -> Value {
        json!({
            "TableInfo": {
                "Chairs": [
                    {"Position": 0,
                     "Occupant": {"PlayerID": "p1", "Name": "asha", "Lang": "ml"},
                     "Watchers": [{"PlayerID": "w1", "Name": "lurker"}],
                     "KodiCount": 1,
                     "KodiJustInstalled": true},
                    {"Position": 1, "Occupant": null, "Watchers": []}
                ]
            }
        })
    }

    #[test]
    fn parses_occupied_and_empty_chairs() {
        let prev = Arc::new(Seating::default());
        let (next, changed) = Seating::update(&prev, &two_chairs());
        assert!(changed);
        assert_eq!(next.chairs.len(), 2);

        let first = next.chair_at(0).unwrap();
        let occupant = first.occupant.as_ref().unwrap();
        assert_eq!(occupant.name, "asha");
        assert_eq!(occupant.lang, "ml");
        assert_eq!(first.watchers.len(), 1);
        assert_eq!(first.watchers[0].name, "lurker");
        assert_eq!(first.coolie_count, 1);
        assert!(first.coolie_just_awarded);
        assert!(next.coolie_just_awarded());

        let second = next.chair_at(1).unwrap();
        assert!(second.occupant.is_none());
        assert!(second.watchers.is_empty());
    }

    #[test]
    fn half_described_occupant_gets_empty_strings() {
        let prev = Arc::new(Seating::default());
        let raw = json!({"TableInfo": {"Chairs": [{"Position": 0, "Occupant": {"PlayerID": "p2"}}]}});
        let (next, _) = Seating::update(&prev, &raw);
        let occupant = next.chair_at(0).unwrap().occupant.as_ref().unwrap();
        assert_eq!(occupant.player_id, "p2");
        assert_eq!(occupant.name, "");
        assert_eq!(occupant.lang, "");
    }

    #[test]
    fn chairs_are_replaced_wholesale() {
        let prev = Arc::new(Seating::default());
        let (loaded, _) = Seating::update(&prev, &two_chairs());
        let raw = json!({"TableInfo": {"Chairs": [{"Position": 5}]}});
        let (next, changed) = Seating::update(&loaded, &raw);
        assert!(changed);
        assert_eq!(next.chairs.len(), 1);
        assert_eq!(next.chairs[0].seat_position, 5);
    }

    #[test]
    fn missing_chairs_keep_the_previous_seating() {
        let prev = Arc::new(Seating::default());
        let (loaded, _) = Seating::update(&prev, &two_chairs());
        let (next, changed) = Seating::update(&loaded, &json!({"GameStage": 2}));
        assert!(!changed);
        assert!(Arc::ptr_eq(&loaded, &next));
    }

    #[test]
    fn identical_payload_keeps_identity() {
        let prev = Arc::new(Seating::default());
        let raw = two_chairs();
        let (first, _) = Seating::update(&prev, &raw);
        let (second, changed) = Seating::update(&first, &raw);
        assert!(!changed);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
