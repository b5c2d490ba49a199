use std::{f32::consts::PI, fmt, sync::Arc};

use beat_detect_core::{BandEnergySource, EnergyBlock, PcmBlock, CHANNEL_COUNT};
use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

const LOWEST_BAND_HZ: f32 = 20.0;

/// FFT based energy source with [`CHANNEL_COUNT`] log-spaced bands between
/// 20 Hz and Nyquist.
///
/// Buffers are sized for `block_size` up front. Shorter blocks are zero
/// padded and longer ones truncated, so `analyze` never allocates.
pub struct SpectrumEnergy {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Vec<f32>,
    band_edges: [usize; CHANNEL_COUNT + 1],
}

impl SpectrumEnergy {
    pub fn new(block_size: usize, sample_rate: u32) -> Self {
        let size = block_size.max(2);
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let window = (0..size).map(|i| hann_value(i, size)).collect();
        let band_edges = band_edges(size, spectrum.len(), sample_rate);

        Self {
            size,
            plan,
            input,
            spectrum,
            scratch,
            window,
            band_edges,
        }
    }

    /// First spectrum bin of every band, followed by the end of the last band.
    pub fn band_edges(&self) -> &[usize; CHANNEL_COUNT + 1] {
        &self.band_edges
    }
}

impl BandEnergySource for SpectrumEnergy {
    fn analyze(&mut self, pcm: &PcmBlock<'_>, out: &mut EnergyBlock) {
        let len = pcm.len().min(self.size);
        for (i, slot) in self.input.iter_mut().enumerate() {
            *slot = if i < len {
                0.5 * (pcm.left[i] + pcm.right[i]) * self.window[i]
            } else {
                0.0
            };
        }

        out.vol = if len > 0 {
            (0..len)
                .map(|i| pcm.left[i] * pcm.left[i] + pcm.right[i] * pcm.right[i])
                .sum::<f32>()
                / len as f32
        } else {
            0.0
        };

        if let Err(err) =
            self.plan
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            tracing::warn!(%err, "fft failed, reporting silence for this block");
            out.channels = [0.0; CHANNEL_COUNT];
            out.derive_bands();
            return;
        }

        let norm = 1.0 / self.size as f32;
        for (channel, slot) in out.channels.iter_mut().enumerate() {
            let bins = &self.spectrum[self.band_edges[channel]..self.band_edges[channel + 1]];
            *slot = if bins.is_empty() {
                0.0
            } else {
                bins.iter().map(|bin| bin.norm_sqr() * norm).sum::<f32>() / bins.len() as f32
            };
        }
        out.derive_bands();
    }
}

impl fmt::Debug for SpectrumEnergy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumEnergy")
            .field("size", &self.size)
            .field("band_edges", &self.band_edges)
            .finish()
    }
}

/// Log-spaced band boundaries, each band at least one bin wide while bins
/// remain.
fn band_edges(size: usize, bins: usize, sample_rate: u32) -> [usize; CHANNEL_COUNT + 1] {
    let nyquist = (sample_rate as f32).max(2.0 * LOWEST_BAND_HZ + 1.0) * 0.5;
    let bin_hz = (sample_rate as f32).max(1.0) / size as f32;
    let ratio = nyquist / LOWEST_BAND_HZ;

    let mut edges = [0; CHANNEL_COUNT + 1];
    for (band, edge) in edges.iter_mut().enumerate().skip(1) {
        let hz = LOWEST_BAND_HZ * ratio.powf(band as f32 / CHANNEL_COUNT as f32);
        *edge = ((hz / bin_hz).round() as usize).min(bins);
    }
    edges[CHANNEL_COUNT] = bins;

    for band in 1..=CHANNEL_COUNT {
        let floor = (edges[band - 1] + 1).min(bins);
        edges[band] = edges[band].max(floor);
    }
    edges
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
