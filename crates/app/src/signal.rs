use std::f32::consts::TAU;

const TONE_HZ: f32 = 440.0;
const TONE_LEVEL: f32 = 0.15;
const KICK_HZ: f32 = 55.0;
const KICK_LEVEL: f32 = 0.9;
/// Kick amplitude falls by e every this many seconds.
const KICK_DECAY_SECONDS: f32 = 0.08;

/// Deterministic test signal: a steady tone with a decaying low kick every
/// `beat_seconds`.
#[derive(Debug, Clone)]
pub struct SyntheticSignal {
    sample_rate: f32,
    beat_seconds: f32,
    position: u64,
}

impl SyntheticSignal {
    pub fn new(sample_rate: u32, bpm: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as f32,
            beat_seconds: 60.0 / bpm.max(1.0),
            position: 0,
        }
    }

    /// Fills both channels with the next block. The right channel lags the
    /// left by a quarter of the tone period.
    pub fn fill(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        for i in 0..frames {
            let t = (self.position + i as u64) as f32 / self.sample_rate;
            let since_kick = t % self.beat_seconds;
            let kick = KICK_LEVEL
                * (-since_kick / KICK_DECAY_SECONDS).exp()
                * (TAU * KICK_HZ * since_kick).sin();

            left[i] = TONE_LEVEL * (TAU * TONE_HZ * t).sin() + kick;
            right[i] = TONE_LEVEL * (TAU * TONE_HZ * t - TAU * 0.25).sin() + kick;
        }
        self.position += frames as u64;
    }
}
