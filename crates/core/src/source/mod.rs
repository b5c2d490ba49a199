//! Band energy input: the PCM block handed in for one tick, the raw energies
//! derived from it, and the trait that turns one into the other.
//!
//! The 32 analysis channels are ordered from low to high frequency and split
//! into fixed ranges for the named bands:
//!
//! | band   | channels |
//! |--------|----------|
//! | bass   | `0..2`   |
//! | mid    | `2..20`  |
//! | treble | `20..32` |

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Number of analysis channels in the pulse bank.
pub const CHANNEL_COUNT: usize = 32;

pub const BASS_CHANNELS: Range<usize> = 0..2;
pub const MID_CHANNELS: Range<usize> = 2..20;
pub const TREB_CHANNELS: Range<usize> = 20..CHANNEL_COUNT;

/// Borrowed stereo PCM for a single tick. Never retained past the tick.
#[derive(Debug, Clone, Copy)]
pub struct PcmBlock<'a> {
    pub left: &'a [f32],
    pub right: &'a [f32],
}

impl<'a> PcmBlock<'a> {
    pub fn new(left: &'a [f32], right: &'a [f32]) -> Self {
        Self { left, right }
    }

    /// Uses the same samples for both channels.
    pub fn mono(samples: &'a [f32]) -> Self {
        Self {
            left: samples,
            right: samples,
        }
    }

    /// Number of frames present in both channels.
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw, unsmoothed energies of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBlock {
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub vol: f32,
    pub channels: [f32; CHANNEL_COUNT],
}

impl Default for EnergyBlock {
    fn default() -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treb: 0.0,
            vol: 0.0,
            channels: [0.0; CHANNEL_COUNT],
        }
    }
}

impl EnergyBlock {
    /// Builds a block from per-channel energies; each named band is the mean
    /// of its channel range.
    pub fn from_channels(channels: [f32; CHANNEL_COUNT], vol: f32) -> Self {
        Self {
            bass: range_mean(&channels, BASS_CHANNELS),
            mid: range_mean(&channels, MID_CHANNELS),
            treb: range_mean(&channels, TREB_CHANNELS),
            vol,
            channels,
        }
    }

    /// Builds a block from the four named scalars, copying each band's value
    /// into every channel of its range.
    pub fn from_bands(bass: f32, mid: f32, treb: f32, vol: f32) -> Self {
        let mut channels = [0.0; CHANNEL_COUNT];
        channels[BASS_CHANNELS].fill(bass);
        channels[MID_CHANNELS].fill(mid);
        channels[TREB_CHANNELS].fill(treb);
        Self {
            bass,
            mid,
            treb,
            vol,
            channels,
        }
    }

    /// Recomputes the named bands from the current channel values.
    pub fn derive_bands(&mut self) {
        self.bass = range_mean(&self.channels, BASS_CHANNELS);
        self.mid = range_mean(&self.channels, MID_CHANNELS);
        self.treb = range_mean(&self.channels, TREB_CHANNELS);
    }
}

fn range_mean(channels: &[f32; CHANNEL_COUNT], range: Range<usize>) -> f32 {
    let len = range.len();
    if len == 0 {
        return 0.0;
    }
    channels[range].iter().sum::<f32>() / len as f32
}

/// Supplies raw energies for the PCM block of the current tick.
///
/// Implementations must not allocate in `analyze`; scratch space belongs in
/// the implementing type and is created up front.
pub trait BandEnergySource {
    fn analyze(&mut self, pcm: &PcmBlock<'_>, out: &mut EnergyBlock);
}

impl<F> BandEnergySource for F
where
    F: FnMut(&PcmBlock<'_>, &mut EnergyBlock),
{
    fn analyze(&mut self, pcm: &PcmBlock<'_>, out: &mut EnergyBlock) {
        self(pcm, out)
    }
}

/// Time-domain energy source that needs no spectral transform.
///
/// The block is cut into [`CHANNEL_COUNT`] consecutive windows whose width
/// grows linearly with the channel index; each channel reports the mean of
/// `l² + r²` over its window. Volume is the same mean over the whole block.
#[derive(Debug, Clone, Default)]
pub struct WindowedEnergy;

impl WindowedEnergy {
    pub fn new() -> Self {
        Self
    }

    /// Start offset of `channel`'s window in a block of `len` frames.
    /// `window_start(CHANNEL_COUNT, len) == len`.
    pub fn window_start(channel: usize, len: usize) -> usize {
        // Width of window x is proportional to (x + 8), as in sub-band
        // windows that widen toward the top of the bank.
        const OFFSET: usize = 8;
        let total = CHANNEL_COUNT * (CHANNEL_COUNT - 1) / 2 + OFFSET * CHANNEL_COUNT;
        let before = channel * channel.saturating_sub(1) / 2 + OFFSET * channel;
        len * before / total
    }
}

impl BandEnergySource for WindowedEnergy {
    fn analyze(&mut self, pcm: &PcmBlock<'_>, out: &mut EnergyBlock) {
        let len = pcm.len();
        let power = |i: usize| pcm.left[i] * pcm.left[i] + pcm.right[i] * pcm.right[i];

        for (channel, slot) in out.channels.iter_mut().enumerate() {
            let start = Self::window_start(channel, len);
            let end = Self::window_start(channel + 1, len);
            *slot = if end > start {
                (start..end).map(power).sum::<f32>() / (end - start) as f32
            } else {
                0.0
            };
        }

        out.vol = if len > 0 {
            (0..len).map(power).sum::<f32>() / len as f32
        } else {
            0.0
        };
        out.derive_bands();
    }
}
