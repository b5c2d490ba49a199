use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_ATTACK, DEFAULT_DECAY};

/// Raw and smoothed value of one named band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandState {
    /// Instantaneous value of the current tick.
    pub raw: f32,
    /// Envelope-followed value carried across ticks.
    pub attacked: f32,
}

/// Asymmetric one-pole smoothing coefficients. `attack < decay` makes the
/// follower rise in fewer ticks than it falls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: DEFAULT_ATTACK,
            decay: DEFAULT_DECAY,
        }
    }
}

impl Envelope {
    pub fn new(attack: f32, decay: f32) -> Self {
        Self { attack, decay }
    }

    /// Overwrites `band.raw` and moves `band.attacked` toward it.
    #[inline]
    pub fn follow(&self, band: &mut BandState, raw: f32) {
        band.raw = raw;
        let alpha = if raw > band.attacked {
            self.attack
        } else {
            self.decay
        };
        band.attacked = band.attacked * alpha + raw * (1.0 - alpha);
    }
}

/// Envelope followers for bass, mid, treble and volume.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeTracker {
    envelope: Envelope,
    pub bass: BandState,
    pub mid: BandState,
    pub treb: BandState,
    pub vol: BandState,
}

impl EnvelopeTracker {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            ..Default::default()
        }
    }

    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    /// Advances every band by one tick. Inputs are expected to be finite and
    /// non-negative.
    pub fn update(&mut self, bass: f32, mid: f32, treb: f32, vol: f32) {
        let envelope = self.envelope;
        envelope.follow(&mut self.bass, bass);
        envelope.follow(&mut self.mid, mid);
        envelope.follow(&mut self.treb, treb);
        envelope.follow(&mut self.vol, vol);
    }

    pub fn reset(&mut self) {
        self.bass = BandState::default();
        self.mid = BandState::default();
        self.treb = BandState::default();
        self.vol = BandState::default();
    }
}
