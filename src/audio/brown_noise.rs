use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::time::Duration;

/// Brown (Brownian/red) noise: integrated white noise, power falling
/// 6 dB per octave. Endless; the sink loops it for as long as a session runs.
pub struct BrownNoise {
    sample_rate: u32,
    last_value: f32,
    rng: StdRng,
}

impl BrownNoise {
    pub fn new() -> Self {
        Self {
            sample_rate: super::SAMPLE_RATE,
            last_value: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Next raw sample in -1.0..=1.0, shared with the rain generator.
    pub(super) fn step(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        self.last_value = (self.last_value + white * 0.02).clamp(-1.0, 1.0);
        // Leak toward zero so the walk does not park at a rail.
        self.last_value *= 0.9999;
        self.last_value
    }
}

impl Iterator for BrownNoise {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.step() * 0.3)
    }
}

impl Source for BrownNoise {
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
