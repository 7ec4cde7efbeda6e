//! Persisted login parameters.
//!
//! One key-value entry survives restarts: the last identity and table
//! selection the player confirmed. `LoginParams` follows the same identity
//! contract as the projections — `update` returns the current instance
//! unchanged unless something really changed, and persists only on change.

use cards56_protocol::TableType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

pub const LOGIN_PARAMS_KEY: &str = "56cards_last_login_params";

/// Minimal key-value persistence seam. The client stores exactly one entry;
/// anything that can hold a string under a key qualifies.
pub trait ParamStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> std::io::Result<()>;
}

/// File-per-key store rooted in a directory.
#[derive(Debug)]
pub struct FileParamStore {
    dir: PathBuf,
}

impl FileParamStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileParamStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ParamStore for FileParamStore {
    fn load(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn save(&self, key: &str, value: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryParamStore {
    entries: Mutex<HashMap<String, String>>,
}

impl ParamStore for MemoryParamStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// What the player last logged in as. `table_type` stays a stringified
/// number because that is what the stored entry and the join form carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginParams {
    pub user_name: String,
    pub table_type: String,
    pub table_name: String,
    pub language: String,
    pub watch: bool,
}

impl Default for LoginParams {
    fn default() -> Self {
        LoginParams {
            user_name: String::new(),
            table_type: "0".to_string(),
            table_name: String::new(),
            language: "ml".to_string(),
            watch: false,
        }
    }
}

/// A partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct LoginParamsPatch {
    pub user_name: Option<String>,
    pub table_type: Option<String>,
    pub table_name: Option<String>,
    pub language: Option<String>,
    pub watch: Option<bool>,
}

impl LoginParams {
    /// Loads the stored entry, falling back to defaults when it is missing
    /// or not valid JSON. A corrupt entry must never block login.
    pub fn create(store: &dyn ParamStore) -> LoginParams {
        let Some(stored) = store.load(LOGIN_PARAMS_KEY) else {
            info!("no stored login params, using defaults");
            return LoginParams::default();
        };
        match serde_json::from_str(&stored) {
            Ok(params) => params,
            Err(err) => {
                warn!(error = %err, "stored login params unreadable, using defaults");
                LoginParams::default()
            }
        }
    }

    /// Merges `patch` into `current`. On a real change the merged value is
    /// persisted and returned with `true`; otherwise `current` comes back
    /// untouched.
    pub fn update(
        current: &LoginParams,
        patch: LoginParamsPatch,
        store: &dyn ParamStore,
    ) -> (LoginParams, bool) {
        let next = LoginParams {
            user_name: patch.user_name.unwrap_or_else(|| current.user_name.clone()),
            table_type: patch.table_type.unwrap_or_else(|| current.table_type.clone()),
            table_name: patch.table_name.unwrap_or_else(|| current.table_name.clone()),
            language: patch.language.unwrap_or_else(|| current.language.clone()),
            watch: patch.watch.unwrap_or(current.watch),
        };

        if next == *current {
            return (current.clone(), false);
        }

        match serde_json::to_string(&next) {
            Ok(serialized) => {
                if let Err(err) = store.save(LOGIN_PARAMS_KEY, &serialized) {
                    warn!(error = %err, "failed to persist login params");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize login params"),
        }
        (next, true)
    }

    /// The table type as the number `JoinTable` expects.
    pub fn table_type_num(&self) -> i64 {
        self.table_type.parse().unwrap_or(0)
    }

    pub fn table_kind(&self) -> TableType {
        TableType::from_i64(self.table_type_num())
    }
}
