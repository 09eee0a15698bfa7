/*!
 * Owned interleaved sample buffers.
 *
 * Every buffer that flows through the engine (synthesized lines, retrieved
 * sounds, track buses, the final mix) is an `AudioBuffer`: `f32` samples in
 * interleaved frame order, plus the sample rate and channel count needed to
 * interpret them.
 */

/// Floor used when converting silence to decibels
pub const SILENCE_DB: f64 = -120.0;

/// Convert decibels relative to full scale to a linear multiplier
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert a linear amplitude to decibels, floored at `SILENCE_DB`
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * linear.log10()).max(SILENCE_DB)
    }
}

/// Number of frames covering `secs` at `sample_rate`, rounded to the nearest frame
pub fn secs_to_frames(secs: f64, sample_rate: u32) -> usize {
    if secs <= 0.0 || !secs.is_finite() {
        0
    } else {
        (secs * sample_rate as f64).round() as usize
    }
}

/// Interleaved audio with a known rate and channel layout
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Wrap interleaved samples. Trailing samples that do not fill a whole frame are dropped.
    pub fn from_samples(sample_rate: u32, channels: u16, mut samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// A buffer of `frames` zeroed frames
    pub fn with_frames(sample_rate: u32, channels: u16, frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            sample_rate,
            channels,
            samples: vec![0.0; frames * channels as usize],
        }
    }

    /// Silence lasting `secs`
    pub fn silence(sample_rate: u32, channels: u16, secs: f64) -> Self {
        Self::with_frames(sample_rate, channels, secs_to_frames(secs, sample_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Absolute peak over all channels
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square over all channels
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt()
    }

    /// True when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// Multiply every sample by a linear gain
    pub fn apply_gain(&mut self, gain: f32) {
        if (gain - 1.0).abs() < f32::EPSILON {
            return;
        }
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }

    /// Linear fade in over the first `frames` frames and fade out over the last `frames`
    pub fn apply_fades(&mut self, fade_in: usize, fade_out: usize) {
        let total = self.frames();
        let channels = self.channels as usize;
        let fade_in = fade_in.min(total);
        let fade_out = fade_out.min(total);

        for frame in 0..fade_in {
            let gain = frame as f32 / fade_in as f32;
            for ch in 0..channels {
                self.samples[frame * channels + ch] *= gain;
            }
        }
        for i in 0..fade_out {
            let frame = total - 1 - i;
            let gain = i as f32 / fade_out as f32;
            for ch in 0..channels {
                self.samples[frame * channels + ch] *= gain;
            }
        }
    }

    /// Per-channel view of the samples
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let channels = self.channels as usize;
        let mut planes = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (plane, sample) in planes.iter_mut().zip(frame) {
                plane.push(*sample);
            }
        }
        planes
    }

    /// Rebuild from per-channel planes; planes are truncated to the shortest one
    pub fn interleave(sample_rate: u32, planes: &[Vec<f32>]) -> Self {
        let channels = planes.len().max(1);
        let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for plane in planes {
                samples.push(plane[frame]);
            }
        }
        Self::from_samples(sample_rate, channels as u16, samples)
    }

    /// Map to another channel count: mono is copied to every channel,
    /// anything else downmixed to mono is averaged
    pub fn to_channels(&self, channels: u16) -> Self {
        let channels = channels.max(1);
        if channels == self.channels {
            return self.clone();
        }

        let src = self.channels as usize;
        let dst = channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * dst);
        for frame in self.samples.chunks_exact(src) {
            if dst == 1 {
                let sum: f32 = frame.iter().sum();
                samples.push(sum / src as f32);
            } else {
                for ch in 0..dst {
                    samples.push(frame[ch % src]);
                }
            }
        }
        Self::from_samples(self.sample_rate, channels, samples)
    }

    /// Linear-interpolation resampling to `sample_rate`
    pub fn resampled(&self, sample_rate: u32) -> Self {
        if sample_rate == self.sample_rate || self.is_empty() || self.sample_rate == 0 {
            return Self {
                sample_rate,
                ..self.clone()
            };
        }

        let ratio = self.sample_rate as f64 / sample_rate as f64;
        let src_frames = self.frames();
        let dst_frames = ((src_frames as f64) / ratio).round().max(1.0) as usize;
        let channels = self.channels as usize;
        let mut samples = Vec::with_capacity(dst_frames * channels);

        for frame in 0..dst_frames {
            let pos = frame as f64 * ratio;
            let i0 = (pos.floor() as usize).min(src_frames - 1);
            let i1 = (i0 + 1).min(src_frames - 1);
            let frac = (pos - i0 as f64) as f32;
            for ch in 0..channels {
                let a = self.samples[i0 * channels + ch];
                let b = self.samples[i1 * channels + ch];
                samples.push(a + (b - a) * frac);
            }
        }
        Self::from_samples(sample_rate, self.channels, samples)
    }

    /// Convert to the given rate and channel layout
    pub fn conformed(&self, sample_rate: u32, channels: u16) -> Self {
        self.to_channels(channels).resampled(sample_rate)
    }

    /// Trim or zero-pad to exactly `secs`
    pub fn fit_to_duration(&mut self, secs: f64) {
        let frames = secs_to_frames(secs, self.sample_rate);
        self.samples.resize(frames * self.channels as usize, 0.0);
    }

    /// Repeat the content until it lasts `secs`, then trim
    pub fn looped_to(&self, secs: f64) -> Self {
        let frames = secs_to_frames(secs, self.sample_rate);
        let channels = self.channels as usize;
        if self.is_empty() {
            return Self::with_frames(self.sample_rate, self.channels, frames);
        }
        let samples = self
            .samples
            .iter()
            .copied()
            .cycle()
            .take(frames * channels)
            .collect();
        Self::from_samples(self.sample_rate, self.channels, samples)
    }

    /// Add `other` into this buffer starting at `offset` frames, growing as needed.
    /// Both buffers must share the channel count.
    pub fn mix_at(&mut self, other: &AudioBuffer, offset: usize, gain: f32) {
        let channels = self.channels as usize;
        debug_assert_eq!(channels, other.channels as usize);
        let needed = (offset + other.frames()) * channels;
        if self.samples.len() < needed {
            self.samples.resize(needed, 0.0);
        }
        let start = offset * channels;
        for (dst, src) in self.samples[start..needed].iter_mut().zip(&other.samples) {
            *dst += src * gain;
        }
    }
}
