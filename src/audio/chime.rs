use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

/// Short struck-bell tone used for the transition alarm.
pub struct Chime {
    sample_rate: u32,
    frequency: f32,
    decay: f32,
    position: u32,
    total_samples: u32,
}

impl Chime {
    pub fn new(frequency: f32, length: Duration, decay: f32) -> Self {
        let sample_rate = super::SAMPLE_RATE;
        Self {
            sample_rate,
            frequency,
            decay,
            position: 0,
            total_samples: (length.as_secs_f32() * sample_rate as f32) as u32,
        }
    }

    pub fn bell() -> Self {
        Self::new(880.0, Duration::from_millis(1_500), 3.0)
    }

    pub fn digital() -> Self {
        Self::new(1_320.0, Duration::from_millis(400), 8.0)
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }
        let t = self.position as f32 / self.sample_rate as f32;
        self.position += 1;

        // Fundamental plus a quiet octave partial.
        let tone = (TAU * self.frequency * t).sin() + 0.3 * (TAU * self.frequency * 2.0 * t).sin();
        Some(tone * (-self.decay * t).exp() * 0.4)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples.saturating_sub(self.position) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / self.sample_rate as f32,
        ))
    }
}
