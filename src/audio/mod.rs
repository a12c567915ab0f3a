//! rodio playback for cues, compiled with the `audio` feature.

pub mod brown_noise;
pub mod chime;
pub mod rain;

use anyhow::{anyhow, bail, Result};
use brown_noise::BrownNoise;
use chime::Chime;
use log::warn;
use rain::RainSound;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::cue::CuePlayer;

pub(crate) const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ambience {
    BrownNoise,
    Rain,
}

impl Ambience {
    fn from_id(sound_id: &str) -> Result<Self> {
        match sound_id {
            "brown" | "brown-noise" => Ok(Ambience::BrownNoise),
            "rain" => Ok(Ambience::Rain),
            other => bail!("unknown background sound '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmTone {
    Bell,
    Digital,
}

impl AlarmTone {
    fn from_id(sound_id: &str) -> Result<Self> {
        match sound_id {
            "bell" => Ok(AlarmTone::Bell),
            "digital" => Ok(AlarmTone::Digital),
            other => bail!("unknown alarm sound '{other}'"),
        }
    }
}

enum AudioCommand {
    Alarm { tone: AlarmTone, volume: f32 },
    StartBackground { ambience: Ambience, volume: f32 },
    SetVolume(f32),
    Pause,
    Resume,
    Stop,
}

/// Owns the audio thread. rodio's output stream is not `Send`, so it
/// lives on a dedicated thread fed through a channel.
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio engine lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut background: Option<Sink> = None;

                fn ensure_output(
                    output: &mut Option<(OutputStream, OutputStreamHandle)>,
                ) -> Result<OutputStreamHandle, String> {
                    if output.is_none() {
                        let pair = OutputStream::try_default()
                            .map_err(|e| format!("Failed to open audio output: {e}"))?;
                        *output = Some(pair);
                    }
                    output
                        .as_ref()
                        .map(|(_, handle)| handle.clone())
                        .ok_or_else(|| "audio output unavailable".to_string())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Alarm { tone, volume } => {
                            let sink = ensure_output(&mut output)
                                .and_then(|h| Sink::try_new(&h).map_err(|e| e.to_string()));
                            match sink {
                                Ok(sink) => {
                                    sink.set_volume(volume.clamp(0.0, 1.0));
                                    match tone {
                                        AlarmTone::Bell => sink.append(Chime::bell()),
                                        AlarmTone::Digital => sink.append(Chime::digital()),
                                    }
                                    sink.detach();
                                }
                                Err(e) => warn!("alarm skipped: {e}"),
                            }
                        }
                        AudioCommand::StartBackground { ambience, volume } => {
                            if let Some(old) = background.take() {
                                old.stop();
                            }
                            let sink = ensure_output(&mut output)
                                .and_then(|h| Sink::try_new(&h).map_err(|e| e.to_string()));
                            match sink {
                                Ok(sink) => {
                                    sink.set_volume(volume.clamp(0.0, 1.0));
                                    match ambience {
                                        Ambience::BrownNoise => sink.append(BrownNoise::new()),
                                        Ambience::Rain => sink.append(RainSound::new()),
                                    }
                                    background = Some(sink);
                                }
                                Err(e) => warn!("background sound skipped: {e}"),
                            }
                        }
                        AudioCommand::SetVolume(v) => {
                            if let Some(ref s) = background {
                                s.set_volume(v.clamp(0.0, 1.0));
                            }
                        }
                        AudioCommand::Pause => {
                            if let Some(ref s) = background {
                                s.pause();
                            }
                        }
                        AudioCommand::Resume => {
                            if let Some(ref s) = background {
                                s.play();
                            }
                        }
                        AudioCommand::Stop => {
                            if let Some(s) = background.take() {
                                s.stop();
                            }
                        }
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn audio thread: {e}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, command: AudioCommand) -> Result<()> {
        self.ensure_thread()?
            .send(command)
            .map_err(|_| anyhow!("audio thread has exited"))
    }
}

impl CuePlayer for AudioEngineHandle {
    fn play_alarm(&self, sound_id: &str, volume: f32) -> Result<()> {
        let tone = AlarmTone::from_id(sound_id)?;
        self.send(AudioCommand::Alarm { tone, volume })
    }

    fn start_background(&self, sound_id: &str, volume: f32) -> Result<()> {
        let ambience = Ambience::from_id(sound_id)?;
        self.send(AudioCommand::StartBackground { ambience, volume })
    }

    fn set_background_volume(&self, volume: f32) -> Result<()> {
        self.send(AudioCommand::SetVolume(volume))
    }

    fn pause_background(&self) -> Result<()> {
        self.send(AudioCommand::Pause)
    }

    fn resume_background(&self) -> Result<()> {
        self.send(AudioCommand::Resume)
    }

    fn stop_background(&self) -> Result<()> {
        // Nothing to stop if the thread never started.
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_ids_resolve() {
        assert_eq!(Ambience::from_id("rain").unwrap(), Ambience::Rain);
        assert_eq!(Ambience::from_id("brown").unwrap(), Ambience::BrownNoise);
        assert!(Ambience::from_id("whale").is_err());
        assert_eq!(AlarmTone::from_id("bell").unwrap(), AlarmTone::Bell);
        assert!(AlarmTone::from_id("gong").is_err());
    }
}
