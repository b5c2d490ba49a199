use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{
    envelope::{Envelope, EnvelopeTracker},
    gain::AdaptiveGain,
    pulse::{BeatSensitivity, PulseBank},
    source::{
        BandEnergySource, EnergyBlock, PcmBlock, BASS_CHANNELS, CHANNEL_COUNT, MID_CHANNELS,
        TREB_CHANNELS,
    },
    EngineConfig, Result,
};

/// Lifecycle of an engine between construction (or reset) and its first
/// processed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Zero state, nothing processed yet.
    Uninitialized,
    /// At least one tick has been processed.
    Ready,
}

/// Read-only snapshot of everything a visual consumer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub vol: f32,
    pub bass_att: f32,
    pub mid_att: f32,
    pub treb_att: f32,
    pub vol_att: f32,
    pub pulses: [f32; CHANNEL_COUNT],
    /// Envelope-followed pulses, one per channel.
    pub pulses_att: [f32; CHANNEL_COUNT],
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treb: 0.0,
            vol: 0.0,
            bass_att: 0.0,
            mid_att: 0.0,
            treb_att: 0.0,
            vol_att: 0.0,
            pulses: [0.0; CHANNEL_COUNT],
            pulses_att: [0.0; CHANNEL_COUNT],
        }
    }
}

impl AudioFrame {
    /// Strongest pulse among the bass channels.
    pub fn bass_pulse(&self) -> f32 {
        self.max_pulse(BASS_CHANNELS)
    }

    pub fn mid_pulse(&self) -> f32 {
        self.max_pulse(MID_CHANNELS)
    }

    pub fn treb_pulse(&self) -> f32 {
        self.max_pulse(TREB_CHANNELS)
    }

    fn max_pulse(&self, range: Range<usize>) -> f32 {
        self.pulses[range].iter().copied().fold(0.0, f32::max)
    }
}

/// Per-frame audio feature engine.
///
/// Each call to [`tick`](Self::tick) runs the energy source over one PCM
/// block, follows the named band envelopes, feeds the pulse bank and updates
/// the adaptive gain. All storage is allocated by the constructor; ticking
/// never allocates and never fails.
pub struct BeatDetect<S> {
    source: S,
    energies: EnergyBlock,
    tracker: EnvelopeTracker,
    bank: PulseBank,
    gain: AdaptiveGain,
    sensitivity: BeatSensitivity,
    ticks: u64,
}

impl<S: BandEnergySource> BeatDetect<S> {
    /// Creates an engine with the default configuration.
    pub fn new(source: S) -> Self {
        Self::build(source, &EngineConfig::default())
    }

    /// Creates an engine after validating `config`.
    pub fn with_config(source: S, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: S, config: &EngineConfig) -> Self {
        tracing::debug!(?config, "creating beat detector");
        let envelope = Envelope::new(config.attack, config.decay);
        Self {
            source,
            energies: EnergyBlock::default(),
            tracker: EnvelopeTracker::new(envelope),
            bank: PulseBank::with_envelope(envelope),
            gain: AdaptiveGain::new(config.volume_smoothing),
            sensitivity: BeatSensitivity::new(config.beat_sensitivity),
            ticks: 0,
        }
    }

    /// Processes one PCM block through the energy source.
    pub fn tick(&mut self, pcm: &PcmBlock<'_>) -> AudioFrame {
        self.source.analyze(pcm, &mut self.energies);
        let energies = self.energies;
        self.tick_energies(&energies)
    }
}

impl<S> BeatDetect<S> {
    /// Processes energies that were computed elsewhere.
    pub fn tick_energies(&mut self, energies: &EnergyBlock) -> AudioFrame {
        let bass = sanitize_band("bass", energies.bass);
        let mid = sanitize_band("mid", energies.mid);
        let treb = sanitize_band("treb", energies.treb);
        let vol = sanitize_band("vol", energies.vol);

        self.tracker.update(bass, mid, treb, vol);
        self.bank.update(&energies.channels, self.sensitivity.get());
        self.gain.update(vol);
        self.ticks += 1;

        self.frame()
    }

    /// Snapshot of the last processed tick.
    pub fn frame(&self) -> AudioFrame {
        let tracker = &self.tracker;
        AudioFrame {
            bass: tracker.bass.raw,
            mid: tracker.mid.raw,
            treb: tracker.treb.raw,
            vol: tracker.vol.raw,
            bass_att: tracker.bass.attacked,
            mid_att: tracker.mid.attacked,
            treb_att: tracker.treb.attacked,
            vol_att: tracker.vol.attacked,
            pulses: self.bank.pulses(),
            pulses_att: self.bank.attacked_pulses(),
        }
    }

    /// Current waveform rescale factor.
    pub fn pcm_scale(&self) -> f32 {
        self.gain.pcm_scale()
    }

    /// Writes the rescaled waveform of `pcm` into the output buffers and
    /// returns the number of frames written per channel.
    pub fn scale_waveform(
        &self,
        pcm: &PcmBlock<'_>,
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) -> usize {
        let left = self.gain.scale_into(pcm.left, left_out);
        let right = self.gain.scale_into(pcm.right, right_out);
        left.min(right)
    }

    /// Returns every band, channel and the volume history to their
    /// construction state. Sensitivity and coefficients are kept.
    pub fn reset(&mut self) {
        tracing::debug!(ticks = self.ticks, "resetting beat detector");
        self.energies = EnergyBlock::default();
        self.tracker.reset();
        self.bank.reset();
        self.gain.reset();
        self.ticks = 0;
    }

    pub fn state(&self) -> EngineState {
        if self.ticks == 0 {
            EngineState::Uninitialized
        } else {
            EngineState::Ready
        }
    }

    /// Ticks processed since construction or the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Handle to the shared sensitivity, for use from other threads.
    pub fn sensitivity(&self) -> BeatSensitivity {
        self.sensitivity.clone()
    }

    pub fn set_sensitivity(&self, value: f32) {
        self.sensitivity.set(value);
    }

    pub fn tracker(&self) -> &EnvelopeTracker {
        &self.tracker
    }

    pub fn bank(&self) -> &PulseBank {
        &self.bank
    }

    pub fn gain(&self) -> &AdaptiveGain {
        &self.gain
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

fn sanitize_band(band: &'static str, value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::trace!(band, value, "replacing degenerate band energy");
        0.0
    }
}

impl<S> fmt::Debug for BeatDetect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeatDetect")
            .field("state", &self.state())
            .field("ticks", &self.ticks)
            .field("sensitivity", &self.sensitivity.get())
            .field("volume_history", &self.gain.history())
            .field("envelope", &self.tracker.envelope())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pulse::{AnalysisChannel, HISTORY_LEN},
        source::WindowedEnergy,
    };

    fn silent_source() -> impl FnMut(&PcmBlock<'_>, &mut EnergyBlock) {
        |_: &PcmBlock<'_>, out: &mut EnergyBlock| *out = EnergyBlock::default()
    }

    fn assert_zero_state<S>(engine: &BeatDetect<S>) {
        assert_eq!(engine.frame(), AudioFrame::default());
        assert_eq!(engine.gain().history(), 0.0);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        for channel in engine.bank().channels() {
            assert_eq!(channel, &AnalysisChannel::default());
        }
    }

    #[test]
    fn starts_in_zero_state() {
        let engine = BeatDetect::new(silent_source());
        assert_zero_state(&engine);
        assert_eq!(engine.pcm_scale(), 5000.0);
    }

    #[test]
    fn tick_moves_to_ready() {
        let mut engine = BeatDetect::new(silent_source());
        engine.tick(&PcmBlock::mono(&[0.0; 16]));
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.ticks(), 1);
    }

    #[test]
    fn reset_is_idempotent_and_keeps_sensitivity() {
        let mut engine = BeatDetect::new(WindowedEnergy::new());
        engine.set_sensitivity(3.5);

        let loud = vec![0.8_f32; 512];
        for i in 0..120 {
            let block = if i % 10 == 0 { &loud[..] } else { &loud[..256] };
            engine.tick(&PcmBlock::mono(block));
        }

        engine.reset();
        let once = format!("{engine:?}");
        assert_zero_state(&engine);

        engine.reset();
        assert_eq!(format!("{engine:?}"), once);
        assert_zero_state(&engine);
        assert_eq!(engine.sensitivity().get(), 3.5);
    }

    #[test]
    fn degenerate_bands_are_clamped() {
        let mut engine = BeatDetect::new(silent_source());
        let mut energies = EnergyBlock::from_bands(1.0, 1.0, 1.0, 1.0);
        engine.tick_energies(&energies);

        energies.bass = f32::NAN;
        energies.mid = f32::INFINITY;
        energies.treb = -4.0;
        energies.vol = f32::NEG_INFINITY;
        let frame = engine.tick_energies(&energies);

        assert_eq!(frame.bass, 0.0);
        assert_eq!(frame.mid, 0.0);
        assert_eq!(frame.treb, 0.0);
        assert_eq!(frame.vol, 0.0);
        assert!(frame.bass_att.is_finite() && frame.bass_att > 0.0);
        assert!(engine.pcm_scale().is_finite());
    }

    #[test]
    fn silence_never_increases_attacked_values() {
        let mut engine = BeatDetect::new(silent_source());
        let mut frame = engine.tick_energies(&EnergyBlock::from_bands(2.0, 1.0, 0.5, 3.0));

        for _ in 0..200 {
            let next = engine.tick_energies(&EnergyBlock::default());
            for (now, before) in [
                (next.bass_att, frame.bass_att),
                (next.mid_att, frame.mid_att),
                (next.treb_att, frame.treb_att),
                (next.vol_att, frame.vol_att),
            ] {
                assert!(now >= 0.0);
                assert!(now <= before);
            }
            frame = next;
        }
    }

    #[test]
    fn kick_after_steady_tone_pulses_the_bass() {
        let mut engine = BeatDetect::new(silent_source());
        let steady = EnergyBlock::from_bands(0.2, 0.2, 0.2, 0.2);
        let mut loudest = 0.0_f32;
        for _ in 0..HISTORY_LEN {
            loudest = loudest.max(engine.tick_energies(&steady).bass_pulse());
        }

        let frame = engine.tick_energies(&EnergyBlock::from_bands(5.0, 0.2, 0.2, 1.0));

        assert!(frame.bass_pulse() > loudest);
        assert!(frame.mid_pulse() < 1e-3);
        assert!(frame.treb_pulse() < 1e-3);
        assert!(frame.pulses_att[0] > 0.0);
        assert!(frame.pulses_att[0] < frame.pulses[0]);
        assert_eq!(frame.pulses_att[10], 0.0);
    }

    #[test]
    fn nan_sensitivity_from_host_keeps_steady_input_quiet() {
        let mut engine = BeatDetect::new(silent_source());
        engine.sensitivity().set(f32::NAN);
        let steady = EnergyBlock::from_bands(0.4, 0.4, 0.4, 0.4);

        for _ in 0..(HISTORY_LEN * 2) {
            let frame = engine.tick_energies(&steady);
            assert!(frame.pulses.iter().all(|&p| p == 0.0));
            assert!(frame.pulses_att.iter().all(|&p| p == 0.0));
        }
    }

    #[test]
    fn sensitivity_handle_reaches_the_tick_path() {
        let mut engine = BeatDetect::new(silent_source());
        let handle = engine.sensitivity();
        let steady = EnergyBlock::from_bands(0.1, 0.1, 0.1, 0.1);
        for _ in 0..HISTORY_LEN {
            engine.tick_energies(&steady);
        }

        handle.set(0.0);
        let frame = engine.tick_energies(&EnergyBlock::from_bands(1.0, 1.0, 1.0, 1.0));
        assert!(frame.pulses.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn scales_waveform_with_gain() {
        let mut engine = BeatDetect::new(WindowedEnergy::new());
        let samples = [0.5_f32; 64];
        let pcm = PcmBlock::mono(&samples);
        for _ in 0..1_000 {
            engine.tick(&pcm);
        }

        let mut left = [0.0; 64];
        let mut right = [0.0; 32];
        let written = engine.scale_waveform(&pcm, &mut left, &mut right);

        assert_eq!(written, 32);
        let expected = 0.5 * engine.pcm_scale();
        assert!((left[0] - expected).abs() < 1e-6);
        assert!((right[31] - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            attack: 0.95,
            decay: 0.5,
            ..Default::default()
        };
        assert!(BeatDetect::with_config(silent_source(), &config).is_err());
    }

    #[test]
    fn config_seeds_sensitivity() {
        let config = EngineConfig {
            beat_sensitivity: 7.0,
            ..Default::default()
        };
        let engine = BeatDetect::with_config(WindowedEnergy::new(), &config).unwrap();
        assert_eq!(engine.sensitivity().get(), 7.0);
    }
}
