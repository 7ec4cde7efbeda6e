use cards56_protocol::TableType;
use serde_json::Value;
use std::sync::Arc;

use super::{bool_or, str_or, table_section};

/// Identity of the table the player sits at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub table_type: TableType,
    /// Always recomputed from `table_type`; the seat count is a table rule,
    /// not server-mutable state, so a transmitted `MaxPlayers` is ignored.
    pub max_players: i64,
    pub table_name: String,
    pub table_full: bool,
}

impl Default for TableMeta {
    fn default() -> Self {
        let table_type = TableType::default();
        TableMeta {
            table_type,
            max_players: table_type.max_players(),
            table_name: String::new(),
            table_full: false,
        }
    }
}

impl TableMeta {
    pub fn update(prev: &Arc<TableMeta>, raw: &Value) -> (Arc<TableMeta>, bool) {
        let section = table_section(raw);

        let table_type = section
            .get("Type")
            .and_then(Value::as_i64)
            .map(TableType::from_i64)
            .unwrap_or(prev.table_type);

        // TableFull shows up at the root in some payload revisions.
        let table_full = raw
            .get("TableFull")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| bool_or(section, "TableFull", prev.table_full));

        let next = TableMeta {
            table_type,
            max_players: table_type.max_players(),
            table_name: str_or(section, "TableName", &prev.table_name),
            table_full,
        };

        if next == **prev {
            (Arc::clone(prev), false)
        } else {
            (Arc::new(next), true)
        }
    }
}
