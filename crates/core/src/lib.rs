//! Real-time audio feature extraction for visualisers.
//!
//! A [`BeatDetect`] engine is ticked once per rendered frame. Each tick turns
//! one PCM block into smoothed bass, mid, treble and volume levels, a beat
//! pulse per analysis channel, and a gain factor for waveform drawing. The
//! spectral transform and audio capture live outside this crate, behind
//! [`BandEnergySource`].

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod gain;
pub mod pulse;
pub mod source;

pub use config::EngineConfig;
pub use engine::{AudioFrame, BeatDetect, EngineState};
pub use envelope::{BandState, Envelope, EnvelopeTracker};
pub use error::{BeatDetectError, Result};
pub use gain::AdaptiveGain;
pub use pulse::{AnalysisChannel, BeatSensitivity, PulseBank};
pub use source::{BandEnergySource, EnergyBlock, PcmBlock, WindowedEnergy, CHANNEL_COUNT};
