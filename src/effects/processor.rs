/*!
 * Effect processor.
 *
 * Every effect is a pure buffer-to-buffer transform. A chain is applied in
 * order: outer region presets first, the line-local preset last, and the
 * effects of each preset in their authored order.
 */

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use super::catalog::{EffectChain, EffectKind, EffectSpec};
use super::dynamics::Compressor;
use crate::audio::buffer::{db_to_linear, AudioBuffer};

/// Crossovers of the three-band equalizer
pub const EQ_LOW_CROSSOVER_HZ: f64 = 300.0;
pub const EQ_HIGH_CROSSOVER_HZ: f64 = 3000.0;

/// Apply a resolved chain
pub fn apply_chain(buffer: &AudioBuffer, chain: &EffectChain) -> AudioBuffer {
    apply_effects(buffer, chain.effects())
}

/// Apply effects in iteration order
pub fn apply_effects<'a, I>(buffer: &AudioBuffer, effects: I) -> AudioBuffer
where
    I: IntoIterator<Item = &'a EffectSpec>,
{
    effects
        .into_iter()
        .fold(buffer.clone(), |current, spec| apply_effect(&current, spec))
}

/// Apply a single effect
pub fn apply_effect(buffer: &AudioBuffer, spec: &EffectSpec) -> AudioBuffer {
    if buffer.is_empty() {
        return buffer.clone();
    }
    trace!("Applying {} {:?}", spec.kind, spec.params);

    let sample_rate = buffer.sample_rate();
    match spec.kind {
        EffectKind::Gain => {
            let mut out = buffer.clone();
            out.apply_gain(db_to_linear(spec.param("db")) as f32);
            out
        }
        EffectKind::Reverb => map_planes(buffer, |plane| {
            reverb(
                plane,
                sample_rate,
                spec.param("room_size"),
                spec.param("damping"),
                spec.param("wet"),
                spec.param("dry"),
            )
        }),
        EffectKind::Echo => map_planes(buffer, |plane| {
            echo(plane, sample_rate, spec.param("delay"), spec.param("decay"))
        }),
        EffectKind::PitchShift => map_planes(buffer, |plane| {
            pitch_shift(plane, sample_rate, spec.param("ratio"))
        }),
        EffectKind::TimeStretch => map_planes(buffer, |plane| {
            time_stretch(plane, sample_rate, spec.param("ratio"))
        }),
        EffectKind::Distortion => map_samples(buffer, distortion(spec.param("amount"))),
        EffectKind::Tremolo => tremolo(buffer, spec.param("depth"), spec.param("rate")),
        EffectKind::Lowpass | EffectKind::Highpass | EffectKind::Bandpass => {
            let mode = match spec.kind {
                EffectKind::Lowpass => FilterMode::Lowpass,
                EffectKind::Highpass => FilterMode::Highpass,
                _ => FilterMode::Bandpass,
            };
            let cutoff_hz = spec.param("cutoff") * sample_rate as f64 / 2.0;
            let q = spec.param("q");
            map_planes(buffer, |plane| {
                let mut filter = Svf::new(mode, cutoff_hz, q, sample_rate);
                plane.iter().map(|s| filter.process(*s)).collect()
            })
        }
        EffectKind::Eq => equalize(
            buffer,
            spec.param("low_db"),
            spec.param("mid_db"),
            spec.param("high_db"),
        ),
        EffectKind::Compressor => {
            let mut out = buffer.clone();
            Compressor::new(
                spec.param("threshold_db"),
                spec.param("ratio"),
                spec.param("attack"),
                spec.param("release"),
            )
            .process(&mut out);
            out
        }
        EffectKind::Noise => add_noise(buffer, spec.param("amount")),
    }
}

/// Three-band equalizer with crossovers at 300 Hz and 3 kHz
pub fn equalize(buffer: &AudioBuffer, low_db: f64, mid_db: f64, high_db: f64) -> AudioBuffer {
    if low_db.abs() < 1e-3 && mid_db.abs() < 1e-3 && high_db.abs() < 1e-3 {
        return buffer.clone();
    }
    let sample_rate = buffer.sample_rate();
    let (low_gain, mid_gain, high_gain) = (
        db_to_linear(low_db) as f32,
        db_to_linear(mid_db) as f32,
        db_to_linear(high_db) as f32,
    );

    map_planes(buffer, |plane| {
        let mut low = Svf::new(FilterMode::Lowpass, EQ_LOW_CROSSOVER_HZ, 0.707, sample_rate);
        let mut high = Svf::new(FilterMode::Highpass, EQ_HIGH_CROSSOVER_HZ, 0.707, sample_rate);
        plane
            .iter()
            .map(|x| {
                let l = low.process(*x);
                let h = high.process(*x);
                let m = x - l - h;
                l * low_gain + m * mid_gain + h * high_gain
            })
            .collect()
    })
}

fn map_planes<F>(buffer: &AudioBuffer, mut f: F) -> AudioBuffer
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    let planes: Vec<Vec<f32>> = buffer.deinterleave().iter().map(|p| f(p.as_slice())).collect();
    AudioBuffer::interleave(buffer.sample_rate(), &planes)
}

fn map_samples<F>(buffer: &AudioBuffer, f: F) -> AudioBuffer
where
    F: Fn(f32) -> f32,
{
    let mut out = buffer.clone();
    for sample in out.samples_mut() {
        *sample = f(*sample);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Trapezoidal state-variable filter
struct Svf {
    mode: FilterMode,
    k: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    ic1eq: f64,
    ic2eq: f64,
}

impl Svf {
    fn new(mode: FilterMode, cutoff_hz: f64, q: f64, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let cutoff = cutoff_hz.clamp(10.0, sr * 0.49);
        let g = (PI * cutoff / sr).tan();
        let k = 1.0 / q.max(0.05);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        Self {
            mode,
            k,
            a1,
            a2,
            a3,
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let input = input as f64;
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        let out = match self.mode {
            FilterMode::Lowpass => v2,
            FilterMode::Highpass => input - self.k * v1 - v2,
            FilterMode::Bandpass => v1,
        };
        out as f32
    }
}

// Comb and allpass tunings in samples at 48 kHz
const COMB_DELAYS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_DELAYS: [usize; 2] = [225, 556];
const ALLPASS_GAIN: f64 = 0.5;

fn scaled_delay(base: usize, sample_rate: u32) -> usize {
    ((base as f64 * sample_rate as f64 / 48_000.0) as usize).max(1)
}

/// Schroeder reverb: four parallel damped combs into two series allpasses
fn reverb(
    input: &[f32],
    sample_rate: u32,
    room_size: f64,
    damping: f64,
    wet: f64,
    dry: f64,
) -> Vec<f32> {
    let feedback = 0.7 + 0.28 * room_size;
    let mut combs: Vec<(Vec<f64>, usize, f64)> = COMB_DELAYS
        .iter()
        .map(|d| (vec![0.0; scaled_delay(*d, sample_rate)], 0, 0.0))
        .collect();
    let mut allpasses: Vec<(Vec<f64>, usize)> = ALLPASS_DELAYS
        .iter()
        .map(|d| (vec![0.0; scaled_delay(*d, sample_rate)], 0))
        .collect();

    input
        .iter()
        .map(|x| {
            let x = *x as f64;
            let mut acc = 0.0;
            for (line, pos, filtered) in combs.iter_mut() {
                let delayed = line[*pos];
                *filtered = delayed * (1.0 - damping) + *filtered * damping;
                line[*pos] = x + *filtered * feedback;
                *pos = (*pos + 1) % line.len();
                acc += delayed;
            }
            let mut out = acc * 0.25;
            for (line, pos) in allpasses.iter_mut() {
                let delayed = line[*pos];
                let y = -ALLPASS_GAIN * out + delayed;
                line[*pos] = out + ALLPASS_GAIN * delayed;
                *pos = (*pos + 1) % line.len();
                out = y;
            }
            (dry * x + wet * out) as f32
        })
        .collect()
}

/// Feedback delay, rescaled to the input's peak
fn echo(input: &[f32], sample_rate: u32, delay_secs: f64, decay: f64) -> Vec<f32> {
    let delay = ((delay_secs * sample_rate as f64) as usize).max(1);
    let mut out: Vec<f32> = input.to_vec();
    for i in delay..out.len() {
        out[i] += out[i - delay] * decay as f32;
    }

    let in_peak = input.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    let out_peak = out.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if out_peak > in_peak && out_peak > 0.0 {
        let scale = in_peak / out_peak;
        for sample in &mut out {
            *sample *= scale;
        }
    }
    out
}

fn grain_size(sample_rate: u32) -> usize {
    ((sample_rate as f64 * 0.04) as usize).max(64)
}

/// Overlap-add time stretch. Ratios above 1 shorten the signal.
fn time_stretch(input: &[f32], sample_rate: u32, ratio: f64) -> Vec<f32> {
    if (ratio - 1.0).abs() < 1e-6 || input.is_empty() {
        return input.to_vec();
    }
    let out_len = ((input.len() as f64) / ratio).round().max(1.0) as usize;
    let grain = grain_size(sample_rate);
    let hop_out = (grain / 2).max(1);
    let hop_in = hop_out as f64 * ratio;
    let window: Vec<f64> = (0..grain)
        .map(|j| 0.5 - 0.5 * (2.0 * PI * j as f64 / grain as f64).cos())
        .collect();

    let mut out = vec![0.0f64; out_len + grain];
    let mut norm = vec![0.0f64; out_len + grain];
    let mut k = 0usize;
    while k * hop_out < out_len {
        let out_pos = k * hop_out;
        let in_pos = (k as f64 * hop_in).round() as usize;
        for (j, w) in window.iter().enumerate() {
            let sample = input.get(in_pos + j).copied().unwrap_or(0.0) as f64;
            out[out_pos + j] += sample * w;
            norm[out_pos + j] += w;
        }
        k += 1;
    }

    out.truncate(out_len);
    out.iter()
        .zip(norm)
        .map(|(s, n)| if n > 1e-3 { (s / n) as f32 } else { *s as f32 })
        .collect()
}

/// Duration-preserving pitch shift: stretch by the ratio, then read back at the ratio
fn pitch_shift(input: &[f32], sample_rate: u32, ratio: f64) -> Vec<f32> {
    if (ratio - 1.0).abs() < 1e-6 || input.is_empty() {
        return input.to_vec();
    }
    let stretched = time_stretch(input, sample_rate, 1.0 / ratio);
    let last = stretched.len().saturating_sub(1);
    (0..input.len())
        .map(|i| {
            let pos = i as f64 * ratio;
            let i0 = (pos.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let frac = (pos - i0 as f64).clamp(0.0, 1.0) as f32;
            stretched[i0] + (stretched[i1] - stretched[i0]) * frac
        })
        .collect()
}

/// Soft-clipping waveshaper
fn distortion(amount: f64) -> impl Fn(f32) -> f32 {
    let k = if amount < 1.0 {
        2.0 * amount / (1.0 - amount)
    } else {
        20.0
    };
    let norm = if k > 1e-6 { k.tanh() } else { 1.0 };
    move |x| {
        if k <= 1e-6 {
            x
        } else {
            ((k * x as f64).tanh() / norm) as f32
        }
    }
}

/// Sinusoidal amplitude modulation
fn tremolo(buffer: &AudioBuffer, depth: f64, rate: f64) -> AudioBuffer {
    let channels = buffer.channels() as usize;
    let sample_rate = buffer.sample_rate() as f64;
    let mut out = buffer.clone();
    for (i, frame) in out.samples_mut().chunks_exact_mut(channels).enumerate() {
        let t = i as f64 / sample_rate;
        let gain = (1.0 - depth * 0.5 * (1.0 + (2.0 * PI * rate * t).sin())) as f32;
        for sample in frame {
            *sample *= gain;
        }
    }
    out
}

/// Additive white noise, seeded from the buffer length so output is reproducible
fn add_noise(buffer: &AudioBuffer, amount: f64) -> AudioBuffer {
    if amount <= 0.0 {
        return buffer.clone();
    }
    let seed = (buffer.frames() as u64).rotate_left(17) ^ amount.to_bits();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = buffer.clone();
    for sample in out.samples_mut() {
        let noise: f64 = rng.random_range(-1.0..1.0);
        *sample = (*sample as f64 + noise * amount).clamp(-1.0, 1.0) as f32;
    }
    out
}
