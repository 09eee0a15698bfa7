/*!
 * Dynamics processors shared by the effect processor and the mastering chain.
 *
 * All processors are stereo-linked: detection uses the loudest channel of each
 * frame and the same gain is applied to every channel of that frame.
 */

use crate::audio::buffer::{db_to_linear, linear_to_db, AudioBuffer};

/// RMS detection window
pub const RMS_WINDOW_SECS: f64 = 0.01;

/// One-pole smoothing coefficient for a time constant
fn time_coeff(secs: f64, sample_rate: u32) -> f64 {
    let samples = (secs * sample_rate as f64).max(1.0);
    (-1.0 / samples).exp()
}

/// Attack/release smoothing of a gain curve
#[derive(Debug, Clone, Copy)]
pub struct GainSmoother {
    attack: f64,
    release: f64,
    current: f64,
}

impl GainSmoother {
    pub fn new(attack_secs: f64, release_secs: f64, sample_rate: u32) -> Self {
        Self {
            attack: time_coeff(attack_secs, sample_rate),
            release: time_coeff(release_secs, sample_rate),
            current: 1.0,
        }
    }

    /// Move toward `target`, using the attack rate while the gain is falling
    pub fn next(&mut self, target: f64) -> f64 {
        let coeff = if target < self.current {
            self.attack
        } else {
            self.release
        };
        self.current = coeff * self.current + (1.0 - coeff) * target;
        self.current
    }
}

/// Per-frame RMS envelope over a sliding window, summed across channels
pub fn rms_envelope(buffer: &AudioBuffer, window_secs: f64) -> Vec<f64> {
    let channels = buffer.channels() as usize;
    let window = ((window_secs * buffer.sample_rate() as f64) as usize).max(1);
    let energy: Vec<f64> = buffer
        .samples()
        .chunks_exact(channels)
        .map(|frame| {
            frame.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>() / channels as f64
        })
        .collect();

    let mut envelope = Vec::with_capacity(energy.len());
    let mut running = 0.0;
    for (i, e) in energy.iter().enumerate() {
        running += e;
        if i >= window {
            running -= energy[i - window];
        }
        let count = (i + 1).min(window) as f64;
        envelope.push((running.max(0.0) / count).sqrt());
    }
    envelope
}

/// RMS compressor with a hard knee
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compressor {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_secs: f64,
    pub release_secs: f64,
}

impl Compressor {
    pub fn new(threshold_db: f64, ratio: f64, attack_secs: f64, release_secs: f64) -> Self {
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            attack_secs,
            release_secs,
        }
    }

    /// Static gain in dB for a detector level in dB
    pub fn gain_db(&self, level_db: f64) -> f64 {
        let over = level_db - self.threshold_db;
        if over > 0.0 {
            -over * (1.0 - 1.0 / self.ratio)
        } else {
            0.0
        }
    }

    pub fn process(&self, buffer: &mut AudioBuffer) {
        if self.ratio <= 1.0 || buffer.is_empty() {
            return;
        }
        let channels = buffer.channels() as usize;
        let envelope = rms_envelope(buffer, RMS_WINDOW_SECS);
        let mut smoother = GainSmoother::new(self.attack_secs, self.release_secs, buffer.sample_rate());

        for (frame, level) in buffer.samples_mut().chunks_exact_mut(channels).zip(envelope) {
            let target = db_to_linear(self.gain_db(linear_to_db(level)));
            let gain = smoother.next(target) as f32;
            for sample in frame {
                *sample *= gain;
            }
        }
    }
}

/// Peak limiter with instant attack and exponential release
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limiter {
    pub ceiling: f64,
    pub release_secs: f64,
}

impl Limiter {
    pub fn new(ceiling: f64, release_secs: f64) -> Self {
        Self {
            ceiling: ceiling.max(0.0),
            release_secs: release_secs.max(0.0001),
        }
    }

    pub fn process(&self, buffer: &mut AudioBuffer) {
        let channels = buffer.channels() as usize;
        let release = 1.0 - time_coeff(self.release_secs, buffer.sample_rate());
        let mut current = 1.0f64;

        for frame in buffer.samples_mut().chunks_exact_mut(channels) {
            let level = frame.iter().fold(0.0f64, |acc, s| acc.max(s.abs() as f64));
            let target = if level > self.ceiling {
                self.ceiling / level.max(1e-9)
            } else {
                1.0
            };

            if target < current {
                current = target;
            } else {
                current += (target - current) * release;
            }

            // Release may overshoot the instant requirement of this frame
            let gain = if level * current > self.ceiling {
                target
            } else {
                current
            };
            for sample in frame.iter_mut() {
                *sample = (*sample as f64 * gain) as f32;
            }
        }
    }
}
