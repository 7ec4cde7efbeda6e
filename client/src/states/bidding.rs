use serde_json::Value;
use std::sync::Arc;

use super::{array_of, int_or, table_section};

/// One entry in the bid history. An amount of 0 records a pass — distinct
/// from a seat that has not bid at all, which simply has no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidEntry {
    pub seat_position: i64,
    pub bid_amount: i64,
}

impl BidEntry {
    pub fn is_pass(self) -> bool {
        self.bid_amount == 0
    }
}

/// The auction in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bidding {
    pub high_bid: i64,
    pub high_bidder: i64,
    pub next_bidder: i64,
    pub next_min_bid: i64,
    pub bid_history: Vec<BidEntry>,
}

impl Default for Bidding {
    fn default() -> Self {
        Bidding {
            high_bid: 0,
            high_bidder: -1,
            next_bidder: -1,
            next_min_bid: 0,
            bid_history: Vec::new(),
        }
    }
}

impl Bidding {
    pub fn update(prev: &Arc<Bidding>, raw: &Value) -> (Arc<Bidding>, bool) {
        // No Bid block at all means nothing to reconcile.
        let bid = match table_section(raw).get("Bid") {
            Some(bid) if bid.is_object() => bid,
            _ => return (Arc::clone(prev), false),
        };

        let bid_history = match array_of(bid, "BidHistory") {
            Some(entries) => entries
                .iter()
                .filter(|entry| entry.is_object())
                .map(|entry| BidEntry {
                    seat_position: int_or(entry, "Position", -1),
                    bid_amount: int_or(entry, "Bid", 0),
                })
                .collect(),
            None => prev.bid_history.clone(),
        };

        let next = Bidding {
            high_bid: int_or(bid, "HighBid", prev.high_bid),
            high_bidder: int_or(bid, "HighBidder", prev.high_bidder),
            next_bidder: int_or(bid, "NextBidder", prev.next_bidder),
            next_min_bid: int_or(bid, "NextMinBid", prev.next_min_bid),
            bid_history,
        };

        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_the_bid_block() {
        let prev = Arc::new(Bidding::default());
        let raw = json!({
            "TableInfo": {
                "Bid": {
                    "HighBid": 32,
                    "HighBidder": 3,
                    "NextBidder": 0,
                    "NextMinBid": 33,
                    "BidHistory": [
                        {"Position": 1, "Bid": 28},
                        {"Position": 2, "Bid": 0},
                        {"Position": 3, "Bid": 32}
                    ]
                }
            }
        });
        let (next, changed) = Bidding::update(&prev, &raw);
        assert!(changed);
        assert_eq!(next.high_bid, 32);
        assert_eq!(next.high_bidder, 3);
        assert_eq!(next.next_min_bid, 33);
        assert_eq!(next.bid_history.len(), 3);
        assert!(!next.bid_history[0].is_pass());
        assert!(next.bid_history[1].is_pass());
    }

    #[test]
    fn missing_bid_block_is_a_no_op() {
        let prev = Arc::new(Bidding {
            high_bid: 30,
            ..Bidding::default()
        });
        let (next, changed) = Bidding::update(&prev, &json!({"TableInfo": {}}));
        assert!(!changed);
        assert!(Arc::ptr_eq(&prev, &next));
    }

    #[test]
    fn history_is_replaced_wholesale() {
        let prev = Arc::new(Bidding {
            bid_history: vec![BidEntry { seat_position: 0, bid_amount: 28 }],
            ..Bidding::default()
        });
        let raw = json!({"TableInfo": {"Bid": {"BidHistory": []}}});
        let (next, changed) = Bidding::update(&prev, &raw);
        assert!(changed);
        assert!(next.bid_history.is_empty());
    }

    #[test]
    fn identical_payload_keeps_identity() {
        let prev = Arc::new(Bidding::default());
        let raw = json!({"TableInfo": {"Bid": {"HighBid": 29, "HighBidder": 1, "NextBidder": 2, "NextMinBid": 30, "BidHistory": []}}});
        let (first, changed) = Bidding::update(&prev, &raw);
        assert!(changed);
        let (second, changed) = Bidding::update(&first, &raw);
        assert!(!changed);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
