//! Alarm and background-sound cues.
//!
//! The dispatcher decides *when* something should be audible; a
//! [`CuePlayer`] does the actual playback. Playback errors are logged and
//! otherwise ignored: a broken speaker must never hold up the timer.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::settings::TimerSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub trait CuePlayer: Send + Sync {
    /// `volume` is 0.0..=1.0.
    fn play_alarm(&self, sound_id: &str, volume: f32) -> Result<()>;
    fn start_background(&self, sound_id: &str, volume: f32) -> Result<()>;
    fn set_background_volume(&self, volume: f32) -> Result<()>;
    fn pause_background(&self) -> Result<()>;
    fn resume_background(&self) -> Result<()>;
    fn stop_background(&self) -> Result<()>;
}

/// Player for builds without audio output. Every cue becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl CuePlayer for SilentPlayer {
    fn play_alarm(&self, sound_id: &str, volume: f32) -> Result<()> {
        log_info!("alarm '{sound_id}' at {:.0}%", volume * 100.0);
        Ok(())
    }

    fn start_background(&self, sound_id: &str, volume: f32) -> Result<()> {
        log_info!("background '{sound_id}' started at {:.0}%", volume * 100.0);
        Ok(())
    }

    fn set_background_volume(&self, volume: f32) -> Result<()> {
        log_debug!("background volume {:.0}%", volume * 100.0);
        Ok(())
    }

    fn pause_background(&self) -> Result<()> {
        log_debug!("background paused");
        Ok(())
    }

    fn resume_background(&self) -> Result<()> {
        log_debug!("background resumed");
        Ok(())
    }

    fn stop_background(&self) -> Result<()> {
        log_debug!("background stopped");
        Ok(())
    }
}

/// What the background track should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundCue {
    Play,
    Pause,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
enum Background {
    Stopped,
    Playing { sound_id: String, volume: u8 },
    Paused { sound_id: String, volume: u8 },
}

pub struct CueDispatcher {
    player: Arc<dyn CuePlayer>,
    background: Mutex<Background>,
}

impl CueDispatcher {
    pub fn new(player: Arc<dyn CuePlayer>) -> Self {
        Self {
            player,
            background: Mutex::new(Background::Stopped),
        }
    }

    /// One-shot alarm for a mode transition.
    pub fn transition(&self, settings: &TimerSettings) {
        if !settings.alarm_enabled() {
            return;
        }
        if let Err(err) = self
            .player
            .play_alarm(&settings.alarm_sound, volume_fraction(settings.alarm_volume))
        {
            log_warn!("alarm playback failed: {err:#}");
        }
    }

    /// Bring the background track in line with `cue` and the current
    /// settings. Disabling the sound always stops it.
    pub fn background(&self, cue: BackgroundCue, settings: &TimerSettings) {
        let mut state = self.lock();
        let cue = if settings.background_enabled() {
            cue
        } else {
            BackgroundCue::Stop
        };

        let next = match (cue, &*state) {
            (BackgroundCue::Stop, Background::Stopped) => Background::Stopped,
            (BackgroundCue::Stop, _) => {
                self.report(self.player.stop_background(), "stop");
                Background::Stopped
            }
            (BackgroundCue::Pause, Background::Playing { sound_id, volume }) => {
                self.report(self.player.pause_background(), "pause");
                Background::Paused {
                    sound_id: sound_id.clone(),
                    volume: *volume,
                }
            }
            (BackgroundCue::Pause, other) => other.clone(),
            (BackgroundCue::Play, current) => self.play(current, settings),
        };

        *state = next;
    }

    fn play(&self, current: &Background, settings: &TimerSettings) -> Background {
        let wanted = settings.background_sound.as_str();
        let wanted_volume = settings.background_volume;

        match current {
            Background::Playing { sound_id, volume } | Background::Paused { sound_id, volume }
                if sound_id == wanted =>
            {
                if matches!(current, Background::Paused { .. }) {
                    self.report(self.player.resume_background(), "resume");
                }
                if *volume != wanted_volume {
                    self.report(
                        self.player.set_background_volume(volume_fraction(wanted_volume)),
                        "volume change",
                    );
                }
            }
            Background::Stopped => {
                self.report(
                    self.player
                        .start_background(wanted, volume_fraction(wanted_volume)),
                    "start",
                );
            }
            Background::Playing { .. } | Background::Paused { .. } => {
                self.report(self.player.stop_background(), "stop");
                self.report(
                    self.player
                        .start_background(wanted, volume_fraction(wanted_volume)),
                    "start",
                );
            }
        }

        Background::Playing {
            sound_id: wanted.to_string(),
            volume: wanted_volume,
        }
    }

    fn report(&self, result: Result<()>, action: &str) {
        if let Err(err) = result {
            log_warn!("background sound {action} failed: {err:#}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Background> {
        match self.background.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn volume_fraction(volume: u8) -> f32 {
    f32::from(volume.min(100)) / 100.0
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPlayer;
    use super::*;

    fn with_background(sound: &str) -> TimerSettings {
        TimerSettings {
            background_sound: sound.into(),
            background_volume: 40,
            ..TimerSettings::default()
        }
    }

    fn dispatcher() -> (Arc<RecordingPlayer>, CueDispatcher) {
        let player = Arc::new(RecordingPlayer::default());
        (player.clone(), CueDispatcher::new(player))
    }

    #[test]
    fn alarm_respects_sound_setting() {
        let (player, cues) = dispatcher();

        cues.transition(&TimerSettings::default());
        assert_eq!(player.take(), ["alarm bell 0.50"]);

        let muted = TimerSettings {
            alarm_sound: "none".into(),
            ..TimerSettings::default()
        };
        cues.transition(&muted);
        assert!(player.take().is_empty());
    }

    #[test]
    fn background_follows_running_state() {
        let (player, cues) = dispatcher();
        let settings = with_background("rain");

        cues.background(BackgroundCue::Play, &settings);
        cues.background(BackgroundCue::Play, &settings);
        cues.background(BackgroundCue::Pause, &settings);
        cues.background(BackgroundCue::Play, &settings);
        cues.background(BackgroundCue::Stop, &settings);
        cues.background(BackgroundCue::Stop, &settings);

        assert_eq!(player.take(), ["start rain 0.40", "pause", "resume", "stop"]);
    }

    #[test]
    fn disabling_background_stops_it() {
        let (player, cues) = dispatcher();

        cues.background(BackgroundCue::Play, &with_background("brown"));
        cues.background(BackgroundCue::Play, &with_background("none"));

        assert_eq!(player.take(), ["start brown 0.40", "stop"]);
    }

    #[test]
    fn changing_sound_or_volume_updates_playback() {
        let (player, cues) = dispatcher();

        cues.background(BackgroundCue::Play, &with_background("brown"));
        cues.background(BackgroundCue::Play, &with_background("rain"));

        let mut louder = with_background("rain");
        louder.background_volume = 80;
        cues.background(BackgroundCue::Play, &louder);

        assert_eq!(
            player.take(),
            ["start brown 0.40", "stop", "start rain 0.40", "volume 0.80"]
        );
    }

    #[test]
    fn disabled_sounds_have_no_side_effects() {
        let (player, cues) = dispatcher();
        let settings = TimerSettings {
            alarm_sound: "none".into(),
            ..TimerSettings::default()
        };

        cues.transition(&settings);
        cues.background(BackgroundCue::Play, &settings);
        cues.background(BackgroundCue::Pause, &settings);
        cues.background(BackgroundCue::Stop, &settings);

        assert!(player.take().is_empty());
    }

    #[test]
    fn playback_failures_are_swallowed() {
        let player = Arc::new(RecordingPlayer::failing());
        let cues = CueDispatcher::new(player.clone());

        cues.transition(&TimerSettings::default());
        cues.background(BackgroundCue::Play, &with_background("rain"));

        assert_eq!(player.take().len(), 2);
    }
}
