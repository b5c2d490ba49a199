//! Beat pulse bank: one rolling baseline per analysis channel, and a pulse
//! that measures how far the newest sample rises above it in standard
//! deviations.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::{
    config::DEFAULT_BEAT_SENSITIVITY,
    envelope::{BandState, Envelope},
    source::CHANNEL_COUNT,
};

/// Samples kept per channel.
pub const HISTORY_LEN: usize = 80;

/// Keeps the pulse finite when the window is constant.
pub const VARIANCE_EPSILON: f32 = 1e-6;

/// Upper bound of any pulse.
pub const PULSE_LIMIT: f32 = 100.0;

/// Samples are clamped to this ceiling so the window variance stays finite
/// in `f32`.
pub const SAMPLE_LIMIT: f32 = 1e18;

/// One analysis channel: a ring of recent samples plus the statistics
/// derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisChannel {
    history: [f32; HISTORY_LEN],
    write_pos: usize,
    filled: usize,
    instant: f32,
    running_value: f32,
    variance: f32,
    pulse: f32,
}

impl Default for AnalysisChannel {
    fn default() -> Self {
        Self {
            history: [0.0; HISTORY_LEN],
            write_pos: 0,
            filled: 0,
            instant: 0.0,
            running_value: 0.0,
            variance: 0.0,
            pulse: 0.0,
        }
    }
}

impl AnalysisChannel {
    /// Feeds one sample and returns the resulting pulse.
    ///
    /// The pulse compares `instant` against the window as it was before this
    /// sample was written. An empty window yields no pulse.
    pub fn push(&mut self, instant: f32, sensitivity: f32) -> f32 {
        let instant = if instant.is_finite() {
            instant.clamp(0.0, SAMPLE_LIMIT)
        } else {
            tracing::trace!(instant, substitute = self.instant, "non-finite channel sample");
            self.instant
        };

        let rise = (instant - self.running_value).max(0.0);
        let silenced = sensitivity.is_nan() || sensitivity <= 0.0;
        self.pulse = if self.filled == 0 || rise == 0.0 || silenced {
            0.0
        } else if sensitivity.is_infinite() {
            PULSE_LIMIT
        } else {
            let pulse = sensitivity * rise / (self.variance + VARIANCE_EPSILON).sqrt();
            pulse.min(PULSE_LIMIT)
        };

        self.instant = instant;
        self.history[self.write_pos] = instant;
        self.write_pos = (self.write_pos + 1) % HISTORY_LEN;
        self.filled = (self.filled + 1).min(HISTORY_LEN);
        self.update_statistics();

        self.pulse
    }

    fn update_statistics(&mut self) {
        let window = &self.history[..self.filled];
        let count = window.len() as f64;
        let mean = window.iter().map(|&v| v as f64).sum::<f64>() / count;
        let variance = window
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count;

        self.running_value = mean as f32;
        self.variance = variance.clamp(0.0, f32::MAX as f64) as f32;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Most recent sample fed to the channel.
    pub fn instant(&self) -> f32 {
        self.instant
    }

    /// Mean of the window.
    pub fn running_value(&self) -> f32 {
        self.running_value
    }

    /// Population variance of the window.
    pub fn variance(&self) -> f32 {
        self.variance
    }

    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    /// Index the next sample is written to; always below [`HISTORY_LEN`].
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Number of samples written since construction or reset, capped at
    /// [`HISTORY_LEN`].
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Samples in the window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        let start = if self.filled < HISTORY_LEN {
            0
        } else {
            self.write_pos
        };
        (0..self.filled).map(move |i| self.history[(start + i) % HISTORY_LEN])
    }
}

/// Fixed bank of [`CHANNEL_COUNT`] independent analysis channels.
///
/// Each channel's pulse is also envelope-followed, giving a per-channel
/// attacked pulse that lingers after a beat.
#[derive(Debug, Clone)]
pub struct PulseBank {
    channels: [AnalysisChannel; CHANNEL_COUNT],
    envelope: Envelope,
    smoothed: [BandState; CHANNEL_COUNT],
}

impl Default for PulseBank {
    fn default() -> Self {
        Self::with_envelope(Envelope::default())
    }
}

impl PulseBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_envelope(envelope: Envelope) -> Self {
        Self {
            channels: std::array::from_fn(|_| AnalysisChannel::default()),
            envelope,
            smoothed: [BandState::default(); CHANNEL_COUNT],
        }
    }

    /// Feeds one sample into every channel.
    pub fn update(&mut self, instants: &[f32; CHANNEL_COUNT], sensitivity: f32) {
        let envelope = self.envelope;
        for ((channel, smoothed), &instant) in self
            .channels
            .iter_mut()
            .zip(self.smoothed.iter_mut())
            .zip(instants)
        {
            let pulse = channel.push(instant, sensitivity);
            envelope.follow(smoothed, pulse);
        }
    }

    pub fn pulses(&self) -> [f32; CHANNEL_COUNT] {
        std::array::from_fn(|i| self.channels[i].pulse)
    }

    /// Envelope-followed pulse of every channel.
    pub fn attacked_pulses(&self) -> [f32; CHANNEL_COUNT] {
        std::array::from_fn(|i| self.smoothed[i].attacked)
    }

    pub fn channel(&self, index: usize) -> Option<&AnalysisChannel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[AnalysisChannel; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(AnalysisChannel::reset);
        self.smoothed = [BandState::default(); CHANNEL_COUNT];
    }
}

/// Shared beat sensitivity. Clones refer to the same value, so a UI thread can
/// hold one handle while the engine reads another.
///
/// Stored as `f32` bits in an atomic; readers always see a whole value and a
/// new value reaches the tick thread within a tick or so.
#[derive(Debug, Clone)]
pub struct BeatSensitivity {
    bits: Arc<AtomicU32>,
}

impl Default for BeatSensitivity {
    fn default() -> Self {
        Self::new(DEFAULT_BEAT_SENSITIVITY)
    }
}

impl BeatSensitivity {
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}
