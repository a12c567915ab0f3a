use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::timer::TimerMode;

pub const SETTINGS_KEY: &str = "timer-settings";
pub const DAILY_GOAL_KEY: &str = "daily-goal";
pub const DEFAULT_DAILY_GOAL: u32 = 8;

/// Sound id meaning "do not play anything".
pub const SOUND_NONE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub long_break_interval: u32,
    pub auto_start_breaks: bool,
    pub auto_start_focus: bool,
    pub alarm_sound: String,
    pub alarm_volume: u8,
    pub background_sound: String,
    pub background_volume: u8,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            long_break_interval: 4,
            auto_start_breaks: false,
            auto_start_focus: false,
            alarm_sound: "bell".into(),
            alarm_volume: 50,
            background_sound: SOUND_NONE.into(),
            background_volume: 30,
        }
    }
}

impl TimerSettings {
    pub fn duration_secs(&self, mode: TimerMode) -> u64 {
        let minutes = match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        };
        u64::from(minutes) * 60
    }

    pub fn alarm_enabled(&self) -> bool {
        is_enabled(&self.alarm_sound)
    }

    pub fn background_enabled(&self) -> bool {
        is_enabled(&self.background_sound)
    }

    pub fn validate(&self) -> Result<()> {
        if self.focus_minutes == 0 {
            bail!("focus duration must be at least 1 minute");
        }
        if self.short_break_minutes == 0 {
            bail!("short break duration must be at least 1 minute");
        }
        if self.long_break_minutes == 0 {
            bail!("long break duration must be at least 1 minute");
        }
        if self.long_break_interval == 0 {
            bail!("long break interval must be at least 1");
        }
        if self.alarm_volume > 100 {
            bail!("alarm volume must be between 0 and 100");
        }
        if self.background_volume > 100 {
            bail!("background volume must be between 0 and 100");
        }
        if self.alarm_sound.trim().is_empty() || self.background_sound.trim().is_empty() {
            bail!("sound ids cannot be empty (use \"{SOUND_NONE}\" to disable)");
        }
        Ok(())
    }
}

fn is_enabled(sound_id: &str) -> bool {
    !sound_id.eq_ignore_ascii_case(SOUND_NONE)
}

/// One file per key under a directory; the on-disk analogue of browser
/// local storage.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create local storage at {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.dir.join(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.dir.join(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[derive(Debug, Clone)]
struct StoredSettings {
    timer: TimerSettings,
    daily_goal: u32,
}

/// Single source of truth for user configuration. Every decision point in
/// the timer reads through `timer_settings()`.
pub struct SettingsStore {
    storage: LocalStorage,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(storage: LocalStorage) -> Self {
        let timer = load_timer_settings(&storage);
        let daily_goal = load_daily_goal(&storage);

        Self {
            storage,
            data: RwLock::new(StoredSettings { timer, daily_goal }),
        }
    }

    pub fn timer_settings(&self) -> TimerSettings {
        self.read().timer.clone()
    }

    pub fn daily_goal(&self) -> u32 {
        self.read().daily_goal
    }

    pub fn update_timer_settings(&self, settings: TimerSettings) -> Result<()> {
        settings.validate()?;
        let serialized = serde_json::to_string_pretty(&settings)?;
        let mut guard = self.write();
        self.storage.set(SETTINGS_KEY, &serialized)?;
        guard.timer = settings;
        Ok(())
    }

    pub fn update_daily_goal(&self, goal: u32) -> Result<()> {
        if goal == 0 {
            bail!("daily goal must be at least 1 session");
        }
        let mut guard = self.write();
        self.storage.set(DAILY_GOAL_KEY, &goal.to_string())?;
        guard.daily_goal = goal;
        Ok(())
    }

    pub fn reload(&self) {
        let timer = load_timer_settings(&self.storage);
        let daily_goal = load_daily_goal(&self.storage);
        *self.write() = StoredSettings { timer, daily_goal };
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn load_timer_settings(storage: &LocalStorage) -> TimerSettings {
    let raw = match storage.get(SETTINGS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return TimerSettings::default(),
        Err(err) => {
            warn!("Falling back to default timer settings: {err:#}");
            return TimerSettings::default();
        }
    };

    match serde_json::from_str::<TimerSettings>(&raw) {
        Ok(settings) => match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                warn!("Stored timer settings rejected ({err}); using defaults");
                TimerSettings::default()
            }
        },
        Err(err) => {
            warn!("Stored timer settings are not valid JSON ({err}); using defaults");
            TimerSettings::default()
        }
    }
}

fn load_daily_goal(storage: &LocalStorage) -> u32 {
    match storage.get(DAILY_GOAL_KEY) {
        Ok(Some(raw)) => match raw.trim().parse::<u32>() {
            Ok(goal) if goal > 0 => goal,
            _ => {
                warn!("Stored daily goal {raw:?} is invalid; using {DEFAULT_DAILY_GOAL}");
                DEFAULT_DAILY_GOAL
            }
        },
        Ok(None) => DEFAULT_DAILY_GOAL,
        Err(err) => {
            warn!("Failed to read daily goal: {err:#}");
            DEFAULT_DAILY_GOAL
        }
    }
}
