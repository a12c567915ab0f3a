use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};

pub const DATA_DIR_VAR: &str = "FOCUSCYCLE_DATA_DIR";
pub const USER_ID_VAR: &str = "FOCUSCYCLE_USER_ID";
pub const EPHEMERAL_VAR: &str = "FOCUSCYCLE_EPHEMERAL";

const APP_DIR_NAME: &str = "focuscycle";
const DEFAULT_USER_ID: &str = "local";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub user_id: String,
    /// Keep sessions in memory instead of SQLite.
    pub ephemeral: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or_else(|| anyhow!("no data directory available; set {DATA_DIR_VAR}"))?,
        };

        let user_id = lookup(USER_ID_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

        let ephemeral = lookup(EPHEMERAL_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            user_id,
            ephemeral,
        })
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.data_dir.join("local-storage")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("focuscycle.sqlite3")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn explicit_values_win() {
        let config = config_from(&[
            (DATA_DIR_VAR, "/tmp/fc"),
            (USER_ID_VAR, " alice "),
            (EPHEMERAL_VAR, "TRUE"),
        ]);

        assert_eq!(config.data_dir, PathBuf::from("/tmp/fc"));
        assert_eq!(config.user_id, "alice");
        assert!(config.ephemeral);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/fc/focuscycle.sqlite3"));
        assert_eq!(config.settings_dir(), PathBuf::from("/tmp/fc/local-storage"));
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[(DATA_DIR_VAR, "/tmp/fc"), (USER_ID_VAR, "  ")]);
        assert_eq!(config.user_id, DEFAULT_USER_ID);
        assert!(!config.ephemeral);
    }

    #[test]
    fn only_one_and_true_enable_ephemeral() {
        for (value, expected) in [("1", true), ("true", true), ("yes", false), ("0", false)] {
            let config = config_from(&[(DATA_DIR_VAR, "/tmp/fc"), (EPHEMERAL_VAR, value)]);
            assert_eq!(config.ephemeral, expected, "value {value}");
        }
    }
}
