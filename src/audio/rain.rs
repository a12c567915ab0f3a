use rodio::Source;
use std::time::Duration;

use super::brown_noise::BrownNoise;

/// Rain: band-passed brown noise with a slow swell.
pub struct RainSound {
    sample_rate: u32,
    noise: BrownNoise,
    // biquad history
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    swell_phase: f32,
}

impl RainSound {
    pub fn new() -> Self {
        Self {
            sample_rate: super::SAMPLE_RATE,
            noise: BrownNoise::new(),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            swell_phase: 0.0,
        }
    }

    // Roughly 3 kHz centre, Q about 0.7.
    fn band_pass(&mut self, input: f32) -> f32 {
        const B0: f32 = 0.1;
        const B2: f32 = -0.1;
        const A1: f32 = -1.8;
        const A2: f32 = 0.85;

        let output = B0 * input + B2 * self.x2 - A1 * self.y1 - A2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

impl Iterator for RainSound {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let brown = self.noise.step();
        let filtered = self.band_pass(brown);

        self.swell_phase += 0.3 / self.sample_rate as f32;
        if self.swell_phase > std::f32::consts::TAU {
            self.swell_phase -= std::f32::consts::TAU;
        }
        let swell = 0.7 + 0.3 * self.swell_phase.sin();

        Some((filtered * 0.8 + brown * 0.2) * swell * 0.4)
    }
}

impl Source for RainSound {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
