use crate::config::DEFAULT_VOLUME_SMOOTHING;

/// Floor applied to the square root of the volume history.
pub const MIN_VOLUME_ROOT: f32 = 0.0001;

/// Target level the PCM scale normalises toward.
pub const PCM_TARGET: f32 = 0.5;

/// Long-run loudness estimate used to rescale waveform data for visuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveGain {
    smoothing: f32,
    history: f32,
}

impl Default for AdaptiveGain {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME_SMOOTHING)
    }
}

impl AdaptiveGain {
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing,
            history: 0.0,
        }
    }

    /// Moves the history toward `vol`. `vol` must be finite and non-negative.
    pub fn update(&mut self, vol: f32) {
        self.history = self.history * self.smoothing + vol * (1.0 - self.smoothing);
    }

    pub fn history(&self) -> f32 {
        self.history
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Multiplier for raw PCM samples; finite and at most
    /// `PCM_TARGET / MIN_VOLUME_ROOT`.
    pub fn pcm_scale(&self) -> f32 {
        PCM_TARGET / MIN_VOLUME_ROOT.max(self.history.sqrt())
    }

    /// Writes scaled copies of `samples` into `out` and returns how many were
    /// written.
    pub fn scale_into(&self, samples: &[f32], out: &mut [f32]) -> usize {
        let scale = self.pcm_scale();
        let count = samples.len().min(out.len());
        for (dst, src) in out[..count].iter_mut().zip(samples) {
            *dst = src * scale;
        }
        count
    }

    pub fn reset(&mut self) {
        self.history = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_history(history: f32) -> AdaptiveGain {
        AdaptiveGain {
            history,
            ..Default::default()
        }
    }

    #[test]
    fn unit_history_gives_half_scale() {
        assert_eq!(with_history(1.0).pcm_scale(), 0.5);
    }

    #[test]
    fn floor_engages_for_quiet_history() {
        assert_eq!(with_history(0.0).pcm_scale(), 5000.0);
        assert_eq!(with_history(1e-9).pcm_scale(), 5000.0);
        assert!(with_history(1e-8).pcm_scale() <= 5000.0);
    }

    #[test]
    fn loud_history_attenuates() {
        assert!((with_history(4.0).pcm_scale() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn history_tracks_volume_slowly() {
        let mut gain = AdaptiveGain::default();
        gain.update(1.0);
        assert!((gain.history() - 0.01).abs() < 1e-6);

        for _ in 0..2_000 {
            gain.update(1.0);
        }
        assert!((gain.history() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn query_does_not_mutate() {
        let gain = with_history(0.3);
        let before = gain;
        let _ = gain.pcm_scale();
        assert_eq!(gain, before);
    }

    #[test]
    fn scales_into_the_shorter_buffer() {
        let gain = with_history(1.0);
        let mut out = [0.0; 2];
        let written = gain.scale_into(&[1.0, -2.0, 3.0], &mut out);
        assert_eq!(written, 2);
        assert_eq!(out, [0.5, -1.0]);
    }

    #[test]
    fn reset_keeps_smoothing() {
        let mut gain = AdaptiveGain::new(0.995);
        gain.update(2.0);
        gain.reset();
        assert_eq!(gain.history(), 0.0);
        assert_eq!(gain.smoothing(), 0.995);
    }
}
